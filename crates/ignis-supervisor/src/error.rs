use ignis_registry::ModuleId;

/// Errors raised while applying a configuration generation.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// A `logging.logs.*` entry violates the include/exclude disjoint-and-
    /// nested invariant, or some other logging-policy contradiction.
    #[error("logging policy error: {0}")]
    LoggingPolicy(String),

    /// The raw configuration bytes could not be strictly decoded into a
    /// typed `Config`.
    #[error("decoding configuration failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// Provisioning (Logging, Storage, or an app module) failed.
    #[error("provisioning failed: {0}")]
    Provision(#[from] ignis_loader::LoaderError),

    /// One or more apps failed to `Start`. Already-started apps were
    /// stopped (best-effort; stop errors are logged and also collected
    /// here for the caller, but never block rollback).
    #[error("app {failed} failed to start; {} already-started app(s) were rolled back", already_started.len())]
    Start { failed: ModuleId, already_started: Vec<ModuleId>, stop_errors: Vec<String> },

    /// A module-facing storage backend operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Listener(#[from] ignis_listener::ListenerError),

    #[error(transparent)]
    Registry(#[from] ignis_registry::RegistryError),
}
