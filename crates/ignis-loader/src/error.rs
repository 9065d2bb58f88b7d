use ignis_registry::ModuleId;

/// Errors raised while instantiating a module graph from JSON.
///
/// When a module's `Provision`/`Validate` fails and its best-effort
/// `Cleanup` also fails, the cleanup failure is logged (`tracing::error!`)
/// rather than folded into this type — it does not change what the caller
/// needs to do (propagate the original failure and abandon the instance),
/// matching the "operational errors are logged, not propagated" policy
/// applied to destructor/Stop failures elsewhere in the engine.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("unknown module {0}")]
    UnknownModule(ModuleId),

    #[error("decoding module {id}: {source}")]
    Decode { id: ModuleId, source: serde_json::Error },

    #[error("provisioning module {id} failed: {source}")]
    Provision { id: ModuleId, source: Box<dyn std::error::Error + Send + Sync> },

    #[error("validating module {id} failed: {source}")]
    Validate { id: ModuleId, source: Box<dyn std::error::Error + Send + Sync> },

    #[error("module value in namespace {namespace:?} is null")]
    NullModule { namespace: String },

    #[error("field in namespace {namespace:?} is missing a \"module\" name")]
    MissingModuleName { namespace: String },

    #[error("inline key for field in namespace {namespace:?} carried a non-string value")]
    InlineKeyNotString { namespace: String },

    #[error(transparent)]
    Registry(#[from] ignis_registry::RegistryError),
}
