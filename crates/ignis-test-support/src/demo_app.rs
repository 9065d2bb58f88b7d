use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ignis_registry::{global, App, CleanerUpper, ModuleFactory, ModuleHandle, ModuleId, ModuleInfo, Provisioner, RegistryError, Validator};

/// Counters one [`DemoApp`] instance updates over its lifecycle, shared
/// with the test that registered it so assertions don't need to reach
/// into the module through `as_any_mut`.
#[derive(Default)]
pub struct DemoAppCounters {
    pub provisions: AtomicUsize,
    pub validations: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub cleanups: AtomicUsize,
}

/// An in-memory "app" module: no I/O, just lifecycle bookkeeping and an
/// optional `fail_start` knob for exercising rollback paths. Configured
/// via `{"fail_start": bool}`; absent defaults to `false`.
pub struct DemoApp {
    counters: Arc<DemoAppCounters>,
    fail_start: bool,
    started: bool,
}

impl DemoApp {
    pub fn new(counters: Arc<DemoAppCounters>) -> Self {
        Self { counters, fail_start: false, started: false }
    }
}

impl ModuleHandle for DemoApp {
    fn decode(&mut self, raw: &serde_json::Value) -> Result<(), serde_json::Error> {
        self.fail_start = raw.get("fail_start").and_then(|v| v.as_bool()).unwrap_or(false);
        Ok(())
    }

    fn as_provisioner(&mut self) -> Option<&mut dyn Provisioner> {
        Some(self)
    }
    fn as_validator(&self) -> Option<&dyn Validator> {
        Some(self)
    }
    fn as_cleaner(&mut self) -> Option<&mut dyn CleanerUpper> {
        Some(self)
    }
    fn as_app(&mut self) -> Option<&mut dyn App> {
        Some(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Provisioner for DemoApp {
    fn provision(&mut self, _ctx: &mut dyn Any) -> Result<(), RegistryError> {
        self.counters.provisions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Validator for DemoApp {
    fn validate(&self) -> Result<(), RegistryError> {
        self.counters.validations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl CleanerUpper for DemoApp {
    fn cleanup(&mut self) -> Result<(), RegistryError> {
        self.counters.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl App for DemoApp {
    fn start(&mut self) -> Result<(), RegistryError> {
        if self.fail_start {
            return Err(RegistryError::factory("ignis-test-support.demo_app", "fail_start requested"));
        }
        self.started = true;
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RegistryError> {
        self.started = false;
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Registers a fresh [`DemoApp`] factory under `id` (caller-chosen so
/// tests sharing the process-global registry don't collide) and returns
/// the counters the resulting instances will update.
pub fn register_demo_app(id: &str) -> Arc<DemoAppCounters> {
    let counters = Arc::new(DemoAppCounters::default());
    let for_factory = Arc::clone(&counters);
    let factory: Arc<dyn ModuleFactory> = Arc::new(move || Box::new(DemoApp::new(Arc::clone(&for_factory))) as Box<dyn ModuleHandle>);
    let module_id = ModuleId::new(id.to_string()).expect("caller passes a valid dotted id");
    global().register(ModuleInfo { id: module_id, factory }).expect("caller passes a unique id");
    counters
}
