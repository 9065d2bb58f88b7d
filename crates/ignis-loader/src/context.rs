use std::collections::HashMap;
use std::sync::Arc;

use ignis_registry::{global, ModuleHandle, ModuleId};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::LoaderError;
use crate::logger::{LoggerSource, ModuleLogger};

struct Inner {
    cancellation: CancellationToken,
    ancestry: Mutex<Vec<ModuleId>>,
    cleanup_fns: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    exit_fns: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    instances: Mutex<HashMap<ModuleId, Box<dyn ModuleHandle>>>,
    logger_source: Option<Arc<dyn LoggerSource>>,
}

/// A cancellable scope tying the lifetime of a set of module instances to
/// a single cancellation signal. Cheap to clone — clones share the same
/// underlying scope, which is what lets a module hold on to its own
/// `Context` (e.g. to register further cleanup) after `load_by_id` returns.
#[derive(Clone)]
pub struct Context(Arc<Inner>);

impl Context {
    /// Cancellation propagated to every module provisioned in this scope,
    /// exposed so `Provisioner` implementations can watch for shutdown.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.0.cancellation
    }

    /// The ancestry chain of module identifiers provisioned so far in this
    /// scope, most recently loaded last.
    pub fn ancestry(&self) -> Vec<ModuleId> {
        self.0.ancestry.lock().clone()
    }

    /// Registers a function to run, in LIFO order with other registered
    /// cleanup functions, when this scope is canceled.
    pub fn register_cleanup(&self, f: impl FnOnce() + Send + 'static) {
        self.0.cleanup_fns.lock().push(Box::new(f));
    }

    /// Registers a function to run only on graceful process shutdown, not
    /// on ordinary cancellation (e.g. during hot reload). The engine's
    /// exit path is expected to drain these explicitly; `Context` itself
    /// never calls them.
    pub fn register_exit(&self, f: impl FnOnce() + Send + 'static) {
        self.0.exit_fns.lock().push(Box::new(f));
    }

    pub fn take_exit_fns(&self) -> Vec<Box<dyn FnOnce() + Send>> {
        std::mem::take(&mut *self.0.exit_fns.lock())
    }

    /// A logger named after this scope's current ancestry, deferring to
    /// whatever `LoggerSource` was supplied (typically the supervisor's
    /// include/exclude policy). Absent a source, every log is enabled —
    /// appropriate for tests and for contexts built before logging itself
    /// has been provisioned.
    pub fn logger(&self) -> ModuleLogger {
        let name = self.ancestry().iter().map(ModuleId::as_str).collect::<Vec<_>>().join(".");
        match &self.0.logger_source {
            Some(source) => source.logger_for(&name),
            None => ModuleLogger::permissive(name),
        }
    }

    /// Looks up an already-loaded module instance by id and runs `f`
    /// against it. This is the name-based cross-module access the engine
    /// uses instead of direct references, so module graphs never form
    /// reference cycles: a module that needs a sibling looks it up by
    /// `ModuleId` through its `Context` rather than holding an `Arc` to it.
    pub fn with_module<R>(&self, id: &ModuleId, f: impl FnOnce(&mut dyn ModuleHandle) -> R) -> Option<R> {
        let mut instances = self.0.instances.lock();
        instances.get_mut(id).map(|handle| f(handle.as_mut()))
    }

    /// Implements the eight-step `LoadByID` protocol: look up the factory,
    /// instantiate, strictly decode (if `raw` is non-empty), extend
    /// ancestry, provision, validate, register, and return the instance.
    /// On `Provision`/`Validate` failure the instance's `Cleanup` (if any)
    /// runs before the error is returned; a cleanup failure at that point
    /// is logged, not folded into the propagated error.
    pub fn load_by_id(&self, id: &ModuleId, raw: Option<&serde_json::Value>) -> Result<(), LoaderError> {
        let info = global().get(id).ok_or_else(|| LoaderError::UnknownModule(id.clone()))?;
        let mut instance = info.factory.new_instance();

        if let Some(raw) = raw {
            if !raw.is_null() {
                instance.decode(raw).map_err(|source| LoaderError::Decode { id: id.clone(), source })?;
            }
        }

        self.0.ancestry.lock().push(id.clone());

        if let Some(provisioner) = instance.as_provisioner() {
            // `Any` is the only object-safe way to hand this scope to a
            // module defined in a crate that cannot depend on `Context`
            // (see `ignis_registry::Provisioner`'s own doc comment).
            if let Err(source) = provisioner.provision(&mut Erased(self.clone())) {
                self.best_effort_cleanup(id, &mut instance);
                return Err(LoaderError::Provision { id: id.clone(), source: Box::new(source) });
            }
        }

        if let Some(validator) = instance.as_validator() {
            if let Err(source) = validator.validate() {
                self.best_effort_cleanup(id, &mut instance);
                return Err(LoaderError::Validate { id: id.clone(), source: Box::new(source) });
            }
        }

        self.0.instances.lock().insert(id.clone(), instance);
        Ok(())
    }

    /// Returns the instance just loaded by `load_by_id`, for callers that
    /// need to keep working with it (e.g. the supervisor collecting `apps`
    /// into its own map rather than leaving them solely in the Context).
    pub fn take(&self, id: &ModuleId) -> Option<Box<dyn ModuleHandle>> {
        self.0.instances.lock().remove(id)
    }

    /// Places a host-provided handle (not backed by any registered
    /// factory) under `id`, so modules provisioned afterward can reach it
    /// by name through [`Context::with_module`] — the same
    /// no-direct-references, lookup-by-identifier pattern used for
    /// module-to-module access, applied to engine-provided infrastructure
    /// like the listener pool or the active storage backend.
    pub fn insert_handle(&self, id: ModuleId, handle: Box<dyn ModuleHandle>) {
        self.0.instances.lock().insert(id, handle);
    }

    fn best_effort_cleanup(&self, id: &ModuleId, instance: &mut Box<dyn ModuleHandle>) {
        if let Some(cleaner) = instance.as_cleaner() {
            if let Err(err) = cleaner.cleanup() {
                tracing::error!(module = %id, error = %err, "cleanup after failed provision/validate also failed");
            }
        }
    }

    fn cancel_now(&self) {
        if self.0.cancellation.is_cancelled() {
            return;
        }
        self.0.cancellation.cancel();

        let cleanups = std::mem::take(&mut *self.0.cleanup_fns.lock());
        for f in cleanups.into_iter().rev() {
            f();
        }

        let mut instances = self.0.instances.lock();
        for (id, mut handle) in instances.drain() {
            if let Some(cleaner) = handle.as_cleaner() {
                if let Err(err) = cleaner.cleanup() {
                    tracing::error!(module = %id, error = %err, "module cleanup on cancel failed");
                }
            }
        }
    }
}

/// A thin `Any` wrapper so `ignis_registry::Provisioner` implementations
/// (which receive `&mut dyn Any`) can recover the concrete [`Context`] via
/// `downcast_mut`.
pub struct Erased(pub Context);

impl Erased {
    pub fn context(&mut self) -> &mut Context {
        &mut self.0
    }
}

/// Creates a fresh scope, optionally rooted under `parent`'s cancellation
/// tree, and a guard that tears it down exactly once — either when
/// explicitly told to (`CancelGuard::cancel`) or implicitly on drop.
pub fn new_context(parent: Option<&Context>) -> (Context, CancelGuard) {
    new_context_with_logger(parent, parent.and_then(|p| p.0.logger_source.clone()))
}

/// As [`new_context`], but lets the caller supply (or override) the logger
/// source explicitly — used by the supervisor once it has provisioned the
/// logging subsystem for the generation this scope belongs to.
pub fn new_context_with_logger(parent: Option<&Context>, logger_source: Option<Arc<dyn LoggerSource>>) -> (Context, CancelGuard) {
    let cancellation = match parent {
        Some(p) => p.0.cancellation.child_token(),
        None => CancellationToken::new(),
    };
    let ctx = Context(Arc::new(Inner {
        cancellation,
        ancestry: Mutex::new(Vec::new()),
        cleanup_fns: Mutex::new(Vec::new()),
        exit_fns: Mutex::new(Vec::new()),
        instances: Mutex::new(HashMap::new()),
        logger_source,
    }));
    let guard = CancelGuard { ctx: ctx.clone() };
    (ctx, guard)
}

pub struct CancelGuard {
    ctx: Context,
}

impl CancelGuard {
    pub fn cancel(self) {
        self.ctx.cancel_now();
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.ctx.cancel_now();
    }
}
