//! Instance lifecycle: Load/Run/Stop/Validate (§4.E.2), built on top of
//! `ignis-loader`'s `Context` the same way a module loads its own nested
//! modules — the supervisor is simply the outermost caller of
//! `Context::load_module`.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use ignis_listener::{DatagramPool, ListenerPool, ListenerPoolHandle};
use ignis_loader::{CancelGuard, Context, LoadMeta, LoadedModule, RawModuleField};
use ignis_registry::{ModuleHandle, ModuleId, StorageBackend};
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::SupervisorError;
use crate::fs_storage::FileSystemStorage;
use crate::id_index::{strip_ids, IdIndex};
use crate::log_sink::LogSink;
use crate::logging::SupervisorLoggerSource;
use crate::storage_handle::StorageHandle;

fn storage_handle_id() -> ModuleId {
    ModuleId::new("ignis.storage").expect("static id")
}

fn storage_module_id() -> ModuleId {
    ModuleId::new("ignis.storage.module").expect("static id")
}

fn listener_pool_id() -> ModuleId {
    ModuleId::new("ignis.listener_pool").expect("static id")
}

/// The running embodiment of one configuration generation.
///
/// Carries a [`CancelGuard`] alongside the literal `context`/`config`/`apps`
/// fields the distilled spec names: the guard is what actually fires
/// cancellation (on `drop` or explicit `cancel()`), so something has to own
/// it for as long as this generation is meant to stay live, and `Instance`
/// is that owner.
pub struct Instance {
    context: Context,
    guard: CancelGuard,
    config: Config,
    apps: BTreeMap<String, Box<dyn ModuleHandle>>,
    /// Held for the lifetime of the generation so its `Drop` impl runs the
    /// configured writers'/encoders' `Cleanup` exactly once, alongside the
    /// rest of this instance's teardown.
    log_sink: Arc<LogSink>,
}

impl Instance {
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Calls `Stop()` on every app (errors logged, not propagated), then
    /// cancels the generation's `Context`.
    fn shutdown(self) {
        let Instance { apps, guard, .. } = self;
        for (name, mut handle) in apps {
            if let Some(app) = handle.as_app() {
                if let Err(err) = app.stop() {
                    tracing::error!(app = %name, error = %err, "app stop failed");
                }
            }
            if let Some(cleaner) = handle.as_cleaner() {
                if let Err(err) = cleaner.cleanup() {
                    tracing::error!(app = %name, error = %err, "app cleanup failed");
                }
            }
        }
        guard.cancel();
    }
}

/// Owns the current generation, the raw config bytes and `@id` index it was
/// built from, and the two genuinely process-global collaborators (the
/// listener pool and the "current default storage" slot, per the distilled
/// spec's §9 "Global state" note — the module registry is the third, and
/// is reached directly through `ignis_registry::global()` rather than
/// through a field here, since `Context::load_by_id` already binds to it).
pub struct Supervisor {
    current: RwLock<Option<Instance>>,
    raw_bytes: Mutex<Vec<u8>>,
    id_index: Mutex<IdIndex>,
    listener_pool: Arc<ListenerPool>,
    datagram_pool: Arc<DatagramPool>,
    default_storage: ArcSwapOption<dyn StorageBackend>,
}

impl Supervisor {
    pub fn new(listener_pool: Arc<ListenerPool>, datagram_pool: Arc<DatagramPool>) -> Self {
        Self {
            current: RwLock::new(None),
            raw_bytes: Mutex::new(Vec::new()),
            id_index: Mutex::new(IdIndex::default()),
            listener_pool,
            datagram_pool,
            default_storage: ArcSwapOption::from(None),
        }
    }

    /// The canonical serialization the current generation was built from
    /// (the full tree, `@id` fields included) — what a fresh `Load` call is
    /// compared against for the byte-identical no-op short-circuit.
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.raw_bytes.lock().clone()
    }

    pub fn id_index(&self) -> IdIndex {
        self.id_index.lock().clone()
    }

    pub fn has_current(&self) -> bool {
        self.current.read().is_some()
    }

    /// §4.E.2 `Load`. Steps 1–5: no-op on byte-identical resubmission,
    /// index and strip `@id` fields, strict-decode, `Run(cfg, start=true)`,
    /// and on success retain the new raw bytes and id index.
    ///
    /// The distilled spec's step 5 describes undoing in-place mutations to
    /// a shared mutable tree on failure; this implementation never mutates
    /// `raw_bytes`/`id_index` until `Run` has already succeeded, so there is
    /// nothing to roll back here — `Run` itself already restores the prior
    /// default-storage pointer and cancels the failed generation's
    /// `Context` before this function ever sees the error.
    pub fn load(&self, raw: &[u8], force_reload: bool) -> Result<(), SupervisorError> {
        let tree: serde_json::Value = serde_json::from_slice(raw).map_err(SupervisorError::Decode)?;
        let canonical = serde_json::to_vec(&tree).map_err(SupervisorError::Decode)?;

        if !force_reload && canonical == *self.raw_bytes.lock() {
            return Ok(());
        }

        let new_index = IdIndex::build(&tree);
        let mut decodable = tree;
        strip_ids(&mut decodable);
        let config: Config = serde_json::from_value(decodable).map_err(SupervisorError::Decode)?;

        self.run(config, true)?;
        *self.raw_bytes.lock() = canonical;
        *self.id_index.lock() = new_index;
        Ok(())
    }

    /// §4.E.2 `Run`. Builds a fresh generation from `config` and, when
    /// `start` is true, installs it as current (swapping out and shutting
    /// down the previous generation *after* the swap, per step 7). When
    /// `start` is false this is a dry run: the freshly provisioned
    /// `Instance` is torn down immediately instead of being installed,
    /// which is exactly what `Validate` needs.
    pub fn run(&self, mut config: Config, start: bool) -> Result<(), SupervisorError> {
        let prior_storage = self.default_storage.load_full();
        config.logging.synthesize_default();
        config.logging.validate()?;

        let logger_source = Arc::new(SupervisorLoggerSource::new(config.logging.clone()));
        let (ctx, guard) = ignis_loader::new_context_with_logger(
            None,
            Some(Arc::clone(&logger_source) as Arc<dyn ignis_loader::LoggerSource>),
        );

        match self.provision(ctx, guard, config, start, &logger_source) {
            Ok(instance) if start => {
                let previous = self.current.write().replace(instance);
                if let Some(prev) = previous {
                    prev.shutdown();
                }
                Ok(())
            }
            Ok(instance) => {
                instance.shutdown();
                self.default_storage.store(prior_storage);
                Ok(())
            }
            Err(err) => {
                self.default_storage.store(prior_storage);
                Err(err)
            }
        }
    }

    /// §4.E.2 `Stop`. `Stop()` on every app of the current instance
    /// (errors logged, not propagated), cancel its `Context`, clear the
    /// current slot and the raw config.
    pub fn stop(&self) -> Result<(), SupervisorError> {
        if let Some(instance) = self.current.write().take() {
            instance.shutdown();
        }
        *self.raw_bytes.lock() = Vec::new();
        *self.id_index.lock() = IdIndex::default();
        Ok(())
    }

    /// §4.E.2 `Validate`: `Run(cfg, start=false)` followed by an immediate
    /// `Context` cancel — already exactly what `run` does for
    /// `start=false`, so this is a thin, explicitly named wrapper.
    pub fn validate(&self, config: Config) -> Result<(), SupervisorError> {
        self.run(config, false)
    }

    /// Provisions logging, storage, then apps for one generation. Step
    /// numbers refer to §4.E.2 `Run`.
    fn provision(
        &self,
        ctx: Context,
        guard: CancelGuard,
        config: Config,
        start: bool,
        logger_source: &Arc<SupervisorLoggerSource>,
    ) -> Result<Instance, SupervisorError> {
        // Step 2: Logging. Instantiates the writer+encoder module for every
        // non-discarded log and wires the result back into `logger_source`,
        // which every `ModuleLogger` handed out by this `Context` (including
        // ones built during the steps below) already holds a reference to.
        let log_sink = Arc::new(LogSink::provision(&ctx, config.logging.logs_to_provision())?);
        logger_source.set_sink(Arc::clone(&log_sink));

        // Step 3: StorageRaw if present (namespace `caddy.storage`),
        // otherwise the file-system default rooted at the data dir.
        // Either way, publish to the process-wide default-storage slot.
        let storage: Arc<dyn StorageBackend> = match &config.storage {
            Some(raw) => {
                let field = RawModuleField::Single(raw.clone());
                let meta = LoadMeta::namespace("caddy.storage");
                let loaded = ctx.load_module(&field, &meta)?;
                let handle = match loaded {
                    LoadedModule::Single(h) => h,
                    _ => unreachable!("Single shape always yields LoadedModule::Single"),
                };
                let backend = handle
                    .as_storage_converter()
                    .ok_or_else(|| SupervisorError::Storage("configured storage module has no StorageConverter".to_string()))?
                    .certmagic_storage()?;
                ctx.insert_handle(storage_module_id(), handle);
                backend
            }
            None => Arc::new(FileSystemStorage::new(crate::dirs::data_dir())?),
        };
        self.default_storage.store(Some(Arc::clone(&storage)));
        ctx.insert_handle(storage_handle_id(), Box::new(StorageHandle(storage)));
        ctx.insert_handle(
            listener_pool_id(),
            Box::new(ListenerPoolHandle::new(Arc::clone(&self.listener_pool), Arc::clone(&self.datagram_pool))),
        );

        // Step 4: the `apps` map, top-level namespace.
        let apps_field = RawModuleField::Map(config.apps.clone());
        let apps_meta = LoadMeta::namespace("");
        let loaded_apps = ctx.load_module(&apps_field, &apps_meta)?;
        let mut apps = match loaded_apps {
            LoadedModule::Map(m) => m,
            _ => unreachable!("Map shape always yields LoadedModule::Map"),
        };

        // Step 5: validate-only callers stop here.
        if !start {
            return Ok(Instance { context: ctx, guard, config, apps, log_sink });
        }

        // Step 6: Start every app; on failure, Stop already-started apps
        // (combining errors) and return.
        let mut started: Vec<String> = Vec::new();
        for name in apps.keys().cloned().collect::<Vec<_>>() {
            let handle = apps.get_mut(&name).expect("key just enumerated from this map");
            let Some(app) = handle.as_app() else { continue };
            if let Err(_source) = app.start() {
                let mut stop_errors = Vec::new();
                for done in started.iter().rev() {
                    if let Some(done_handle) = apps.get_mut(done) {
                        if let Some(done_app) = done_handle.as_app() {
                            if let Err(e) = done_app.stop() {
                                stop_errors.push(format!("{done}: {e}"));
                            }
                        }
                    }
                }
                let failed = ModuleId::new(name)?;
                let already_started =
                    started.into_iter().map(ModuleId::new).collect::<Result<Vec<_>, _>>()?;
                return Err(SupervisorError::Start { failed, already_started, stop_errors });
            }
            started.push(name);
        }

        // Step 7 (install) happens in `run`, after this returns, so the
        // swap-then-cancel-previous ordering is visible at one call site.
        Ok(Instance { context: ctx, guard, config, apps, log_sink })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_registry::{global, App as AppTrait, ModuleFactory, ModuleInfo, RegistryError};
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn unique_name(label: &str) -> String {
        format!("test.supervisor.{label}.{}", COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    #[derive(Default)]
    struct DemoApp {
        started: bool,
        fail_start: bool,
    }

    impl ModuleHandle for DemoApp {
        fn decode(&mut self, raw: &serde_json::Value) -> Result<(), serde_json::Error> {
            self.fail_start = raw.get("fail_start").and_then(|v| v.as_bool()).unwrap_or(false);
            Ok(())
        }
        fn as_app(&mut self) -> Option<&mut dyn AppTrait> {
            Some(self)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl AppTrait for DemoApp {
        fn start(&mut self) -> Result<(), RegistryError> {
            if self.fail_start {
                return Err(RegistryError::factory("demo", "boom"));
            }
            self.started = true;
            Ok(())
        }
        fn stop(&mut self) -> Result<(), RegistryError> {
            self.started = false;
            Ok(())
        }
    }

    fn register_app(id: &str) {
        let id = ModuleId::new(id.to_string()).unwrap();
        let factory: Arc<dyn ModuleFactory> = Arc::new(|| Box::new(DemoApp::default()) as Box<dyn ModuleHandle>);
        global().register(ModuleInfo { id, factory }).unwrap();
    }

    fn supervisor() -> Supervisor {
        Supervisor::new(Arc::new(ListenerPool::new()), Arc::new(DatagramPool::new()))
    }

    #[test]
    fn run_starts_apps_and_installs_current_instance() {
        let name = unique_name("ok");
        register_app(&name);
        let sup = supervisor();
        let mut apps = BTreeMap::new();
        apps.insert(name.clone(), serde_json::json!({}));
        let config = Config { apps, ..Config::default() };
        sup.run(config, true).unwrap();
        assert!(sup.has_current());
    }

    #[test]
    fn validate_does_not_install_current_instance() {
        let name = unique_name("validate");
        register_app(&name);
        let sup = supervisor();
        let mut apps = BTreeMap::new();
        apps.insert(name.clone(), serde_json::json!({}));
        let config = Config { apps, ..Config::default() };
        sup.validate(config).unwrap();
        assert!(!sup.has_current());
    }

    #[test]
    fn failed_start_rolls_back_already_started_apps_and_installs_nothing() {
        let ok_name = unique_name("a_ok");
        let bad_name = unique_name("z_bad");
        register_app(&ok_name);
        register_app(&bad_name);
        let sup = supervisor();
        let mut apps = BTreeMap::new();
        apps.insert(ok_name, serde_json::json!({}));
        apps.insert(bad_name, serde_json::json!({"fail_start": true}));
        let config = Config { apps, ..Config::default() };
        let err = sup.run(config, true).unwrap_err();
        assert!(matches!(err, SupervisorError::Start { .. }));
        assert!(!sup.has_current());
    }

    #[test]
    fn load_is_a_no_op_on_byte_identical_resubmission() {
        let name = unique_name("noop");
        register_app(&name);
        let sup = supervisor();
        let raw = format!(r#"{{"apps":{{"{name}":{{}}}}}}"#);
        sup.load(raw.as_bytes(), false).unwrap();
        let first = sup.raw_bytes();
        sup.load(raw.as_bytes(), false).unwrap();
        assert_eq!(sup.raw_bytes(), first);
    }

    #[test]
    fn stop_clears_current_instance_and_raw_config() {
        let name = unique_name("stop");
        register_app(&name);
        let sup = supervisor();
        let raw = format!(r#"{{"apps":{{"{name}":{{}}}}}}"#);
        sup.load(raw.as_bytes(), false).unwrap();
        sup.stop().unwrap();
        assert!(!sup.has_current());
        assert!(sup.raw_bytes().is_empty());
    }

    #[test]
    fn failed_load_leaves_previous_raw_bytes_untouched() {
        let good_name = unique_name("good");
        register_app(&good_name);
        let sup = supervisor();
        let good_raw = format!(r#"{{"apps":{{"{good_name}":{{}}}}}}"#);
        sup.load(good_raw.as_bytes(), false).unwrap();
        let before = sup.raw_bytes();

        let bad_name = unique_name("bad");
        register_app(&bad_name);
        let bad_raw = format!(r#"{{"apps":{{"{bad_name}":{{"fail_start":true}}}}}}"#);
        assert!(sup.load(bad_raw.as_bytes(), false).is_err());
        assert_eq!(sup.raw_bytes(), before);
    }
}
