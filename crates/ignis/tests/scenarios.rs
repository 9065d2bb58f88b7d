//! End-to-end scenarios exercising the whole stack -- admin store, apps
//! provisioning through the supervisor, real shared sockets -- the way a
//! deployment would actually see them, rather than one crate at a time.
//! Scenario numbering matches the spec's own §8 list.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ignis::Engine;
use ignis_admin::AdminMethod;
use ignis_registry::{global, ModuleFactory, ModuleHandle, ModuleId, ModuleInfo, Provisioner, RegistryError};
use ignis_test_support::{register_demo_app, register_demo_listen_app, unique_module_id};
use serde_json::json;
use tokio::net::TcpStream;

/// A module that always fails in `Provision`, for exercising rollback.
struct AlwaysFailsProvision;

impl ModuleHandle for AlwaysFailsProvision {
    fn as_provisioner(&mut self) -> Option<&mut dyn Provisioner> {
        Some(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Provisioner for AlwaysFailsProvision {
    fn provision(&mut self, _ctx: &mut dyn Any) -> Result<(), RegistryError> {
        Err(RegistryError::factory("always-fails-provision", "provision deliberately failed"))
    }
}

fn register_failing_provision_app(id: &str) {
    let module_id = ModuleId::new(id.to_string()).expect("valid id");
    let factory: Arc<dyn ModuleFactory> = Arc::new(|| Box::new(AlwaysFailsProvision) as Box<dyn ModuleHandle>);
    global().register(ModuleInfo { id: module_id, factory }).expect("unique id per test");
}

/// Scenario 1: a shared socket survives a forced reload of the same
/// config, and an already-open connection on the old generation is
/// unaffected.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_1_shared_socket_across_reload() {
    let engine = Engine::new();
    let app_id = unique_module_id("s1_demo");
    let counters = register_demo_listen_app(&app_id);

    let config = json!({"apps": {app_id.clone(): {"listen": "127.0.0.1:0"}}});
    engine.bootstrap(config.clone(), false).unwrap();

    let addr: SocketAddr = counters.local_addr.lock().expect("provisioned listener records its bound address");
    let c1 = TcpStream::connect(addr).await.unwrap();

    // Same config, forced reload: a fresh generation is provisioned while
    // the old one is still live, so the pool key briefly carries two
    // references before the old generation's listener is closed.
    engine.bootstrap(config, true).unwrap();

    // The original connection is untouched by the reload.
    assert!(c1.peer_addr().is_ok(), "original connection should still be alive after reload");

    let refcount = engine.listener_pool.refcount("127.0.0.1:0");
    assert_eq!(refcount, Some(1), "only the new generation's wrapper should remain after the old one shut down");

    drop(c1);
}

/// Scenario 2: a reload that fails in `Provision` leaves the running
/// generation untouched and its raw bytes unchanged.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_2_failed_reload_rolls_back() {
    let engine = Engine::new();
    let good_id = unique_module_id("s2_demo");
    let counters = register_demo_listen_app(&good_id);

    let good_config = json!({"apps": {good_id.clone(): {"listen": "127.0.0.1:0"}}});
    engine.bootstrap(good_config, false).unwrap();
    let addr: SocketAddr = counters.local_addr.lock().expect("provisioned listener records its bound address");
    let before = engine.supervisor.raw_bytes();

    let bad_id = unique_module_id("s2_bad");
    register_failing_provision_app(&bad_id);
    let bad_config = json!({"apps": {bad_id: {}}});
    let err = engine.bootstrap(bad_config, true);
    assert!(err.is_err(), "a config whose only app fails Provision must be rejected");

    assert_eq!(engine.supervisor.raw_bytes(), before, "raw config bytes must be unchanged after a failed reload");

    // The original app is still serving: a fresh connection succeeds.
    let reconnect = tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await;
    assert!(reconnect.is_ok(), "original generation must still be accepting connections after a rolled-back reload");
}

/// Scenario 3: an `@id` alias resolves to the same path as its expanded
/// `/config/...` location, a PATCH through the alias is visible at the
/// expanded path, and the config handed to module decoding carries no
/// `@id` field.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_3_id_alias_round_trips_and_strips_from_decoded_config() {
    let engine = Engine::new();
    let app_id = unique_module_id("s3_demo");
    register_demo_app(&app_id);

    let config = json!({"apps": {app_id.clone(): {"@id": "alpha", "v": 1}}});
    engine.bootstrap(config, false).unwrap();

    let by_id_path = engine.admin.parse_path("/id/alpha/v").unwrap();
    let by_config_path = engine.admin.parse_path(&format!("/config/apps/{app_id}/v")).unwrap();
    assert_eq!(by_id_path, by_config_path, "an @id alias must resolve to the same path as its expanded form");

    engine.admin.handle(AdminMethod::Patch, "/id/alpha/v", Some(json!(2)), false).unwrap();

    let via_config = engine.admin.handle(AdminMethod::Get, &format!("/config/apps/{app_id}/v"), None, false).unwrap();
    assert_eq!(via_config, Some(json!(2)), "a PATCH through the /id alias must be visible at the expanded /config path");

    // The on-the-wire bytes fed to the supervisor never carry `@id`.
    let raw = engine.supervisor.raw_bytes();
    let decoded: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert!(!format!("{decoded}").contains("@id"), "the canonical config handed to the supervisor must have @id stripped");
}

/// Scenario 5: concurrent admin mutations against a single shared
/// sequence all land, none lost, none duplicated.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_5_concurrent_admin_mutations_all_land() {
    // "list" lives under the deferred-decoding `admin` blob (a plain
    // `serde_json::Value`, per §6) rather than at the config top level,
    // since the top-level `Config` struct strictly denies unknown fields
    // and only recognizes `admin`/`logging`/`storage`/`apps`.
    let engine = Engine::new();
    engine.bootstrap(json!({"admin": {"list": []}, "apps": {}}), false).unwrap();

    let admin = Arc::clone(&engine.admin);
    let mut tasks = Vec::new();
    for i in 0..100 {
        let admin = Arc::clone(&admin);
        tasks.push(tokio::spawn(async move {
            admin.handle(AdminMethod::Post, "/config/admin/list", Some(json!(i)), false).unwrap();
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    let value = engine.admin.handle(AdminMethod::Get, "/config/admin/list", None, false).unwrap().unwrap();
    let array = value.as_array().unwrap();
    assert_eq!(array.len(), 100, "every concurrent POST must have landed exactly once");

    let mut seen: Vec<i64> = array.iter().map(|v| v.as_i64().unwrap()).collect();
    seen.sort_unstable();
    let expected: Vec<i64> = (0..100).collect();
    assert_eq!(seen, expected, "the final multiset must equal the submitted values");
}

/// Scenario 6: two wrappers over the same listener key close independently;
/// closing one never disturbs the other's accept loop, and the key is
/// fully released (and rebindable) only once both are closed.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_6_fake_close_is_independent_per_wrapper() {
    let pool = ignis_listener::ListenerPool::new();
    let l1 = pool.listen("127.0.0.1:0").unwrap();
    let addr = l1.local_addr().unwrap();
    let l2 = pool.listen(&addr.to_string()).unwrap();

    l1.close();
    let err = tokio::time::timeout(Duration::from_millis(100), l1.accept()).await.unwrap().unwrap_err();
    assert!(matches!(err, ignis_listener::ListenerError::Closed));

    // l2's accept loop is unaffected by l1's close.
    let connector = TcpStream::connect(addr).await.unwrap();
    let accepted = tokio::time::timeout(Duration::from_millis(200), l2.accept()).await;
    assert!(accepted.is_ok());
    drop(connector);

    l2.close();
    // Both wrappers released: a fresh listen on the same address binds a
    // new underlying socket rather than erroring.
    let rebound = pool.listen(&addr.to_string());
    assert!(rebound.is_ok());
}
