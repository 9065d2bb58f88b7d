/// Errors surfaced by the usage pool and module registry.
///
/// Both collaborators are cold-path, startup-adjacent structures, so this
/// type stays flat rather than distinguishing pool errors from registry
/// errors at the type level — callers downstream (the loader, the
/// supervisor) already know which operation they invoked.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A factory invoked by `UsagePool::load_or_new` returned an error.
    /// No entry is left behind for the key.
    #[error("factory for key {key:?} failed: {source}")]
    Factory {
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A value's `destroy()` failed while its refcount reached zero. The
    /// entry is removed regardless; this is surfaced for the caller to log
    /// or report, not to block teardown.
    #[error("destructor for key {key:?} failed: {source}")]
    Destructor {
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A module identifier failed validation (empty string, empty segment
    /// between two dots, leading/trailing dot).
    #[error("invalid module id {raw:?}: {reason}")]
    InvalidModuleId { raw: String, reason: &'static str },

    /// `register` was called twice for the same identifier with
    /// observably different factories.
    #[error("module id {id} is already registered with a different factory")]
    Conflict { id: String },

    /// A `StorageBackend`/`WriterOpener` implementation hit a filesystem
    /// error.
    #[error("storage io error: {0}")]
    StorageIo(#[from] std::io::Error),
}

impl RegistryError {
    pub fn factory(key: impl Into<String>, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Factory { key: key.into(), source: source.into() }
    }

    pub fn destructor(key: impl Into<String>, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Destructor { key: key.into(), source: source.into() }
    }
}

