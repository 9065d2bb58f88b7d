use std::any::Any;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ignis_listener::ListenerPoolHandle;
use ignis_loader::Erased;
use ignis_registry::{global, App, CleanerUpper, ModuleFactory, ModuleHandle, ModuleId, ModuleInfo, Provisioner, RegistryError};
use parking_lot::Mutex;

/// Fixed id under which `ignis`'s bootstrap wires the shared listener pool
/// into every load's `Context`, mirroring how `ignis-supervisor` exposes
/// its own storage backend under `ignis.storage`.
pub const LISTENER_POOL_MODULE_ID: &str = "ignis.listener_pool";

/// Counters and observed state one [`DemoListenApp`] instance updates,
/// shared with the test that registered it.
#[derive(Default)]
pub struct DemoListenAppCounters {
    pub accepted: AtomicUsize,
    pub local_addr: Mutex<Option<SocketAddr>>,
}

/// An app module that actually binds a TCP listener through the shared
/// listener pool reachable via its `Context`, so tests can dial a real
/// socket across a reload instead of only inspecting in-memory state.
/// Configured via `{"listen": "<address>"}`; absent defaults to an
/// ephemeral loopback port.
pub struct DemoListenApp {
    address: String,
    counters: Arc<DemoListenAppCounters>,
    listener: Option<Arc<ignis_listener::FakeCloseListener>>,
    accept_task: Option<tokio::task::JoinHandle<()>>,
}

impl DemoListenApp {
    pub fn new(counters: Arc<DemoListenAppCounters>) -> Self {
        Self { address: "127.0.0.1:0".to_string(), counters, listener: None, accept_task: None }
    }
}

impl ModuleHandle for DemoListenApp {
    fn decode(&mut self, raw: &serde_json::Value) -> Result<(), serde_json::Error> {
        if let Some(address) = raw.get("listen").and_then(|v| v.as_str()) {
            self.address = address.to_string();
        }
        Ok(())
    }

    fn as_provisioner(&mut self) -> Option<&mut dyn Provisioner> {
        Some(self)
    }
    fn as_app(&mut self) -> Option<&mut dyn App> {
        Some(self)
    }
    fn as_cleaner(&mut self) -> Option<&mut dyn CleanerUpper> {
        Some(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Provisioner for DemoListenApp {
    fn provision(&mut self, ctx: &mut dyn Any) -> Result<(), RegistryError> {
        let erased = ctx
            .downcast_mut::<Erased>()
            .ok_or_else(|| RegistryError::factory("ignis-test-support.demo_listen_app", "loader handed a non-Erased context"))?;
        let context = erased.context();
        let pool_id = ModuleId::new(LISTENER_POOL_MODULE_ID).expect("static id");
        let listener = context
            .with_module(&pool_id, |handle| {
                handle.as_any_mut().downcast_mut::<ListenerPoolHandle>().map(|pool| pool.tcp.listen(&self.address))
            })
            .flatten()
            .ok_or_else(|| RegistryError::factory("ignis-test-support.demo_listen_app", "ignis.listener_pool not found in context"))?
            .map_err(|err| RegistryError::factory("ignis-test-support.demo_listen_app", err))?;
        *self.counters.local_addr.lock() = listener.local_addr().ok();
        self.listener = Some(Arc::new(listener));
        Ok(())
    }
}

impl App for DemoListenApp {
    fn start(&mut self) -> Result<(), RegistryError> {
        let listener = self
            .listener
            .clone()
            .ok_or_else(|| RegistryError::factory("ignis-test-support.demo_listen_app", "start called before provision"))?;
        let counters = Arc::clone(&self.counters);
        self.accept_task = Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        counters.accepted.fetch_add(1, Ordering::SeqCst);
                        drop(stream);
                    }
                    Err(_) => break,
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RegistryError> {
        if let Some(listener) = self.listener.take() {
            listener.close();
        }
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        Ok(())
    }
}

impl CleanerUpper for DemoListenApp {
    fn cleanup(&mut self) -> Result<(), RegistryError> {
        if let Some(listener) = self.listener.take() {
            listener.close();
        }
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        Ok(())
    }
}

/// Registers a fresh [`DemoListenApp`] factory under `id` and returns the
/// counters/observed-address cell the resulting instances will update.
pub fn register_demo_listen_app(id: &str) -> Arc<DemoListenAppCounters> {
    let counters = Arc::new(DemoListenAppCounters::default());
    let for_factory = Arc::clone(&counters);
    let factory: Arc<dyn ModuleFactory> = Arc::new(move || Box::new(DemoListenApp::new(Arc::clone(&for_factory))) as Box<dyn ModuleHandle>);
    let module_id = ModuleId::new(id.to_string()).expect("caller passes a valid dotted id");
    global().register(ModuleInfo { id: module_id, factory }).expect("caller passes a unique id");
    counters
}
