//! Reference-counted usage pool and process-global module registry.
//!
//! These two structures are the leaves of the engine's dependency graph:
//! the listener pool (`ignis-listener`) is a specialization of the usage
//! pool keyed by `network/address`, and the loader (`ignis-loader`) looks
//! every module up through the registry before instantiating it.

mod error;
mod module_handle;
mod registry;
mod usage_pool;

pub use error::RegistryError;
pub use module_handle::{
    App, CleanerUpper, LogEncoder, LogLevel, LogRecord, ModuleFactory, ModuleHandle, Provisioner,
    StorageBackend, StorageConverter, Validator, WriterOpener,
};
pub use registry::{global, ModuleId, ModuleInfo, ModuleRegistry};
pub use usage_pool::{Destructible, UsagePool};
