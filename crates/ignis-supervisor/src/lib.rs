//! Instance lifecycle management: the logging sub-policy, the typed
//! top-level `Config`, the default content-addressed filesystem storage,
//! XDG directory discovery, and the `Supervisor` itself (Load/Run/Stop/
//! Validate, §4.E).

mod config;
mod dirs;
mod error;
mod fs_storage;
mod id_index;
mod log_sink;
mod logging;
mod storage_handle;
mod supervisor;

pub use config::Config;
pub use dirs::{config_dir, data_dir};
pub use error::SupervisorError;
pub use fs_storage::FileSystemStorage;
pub use id_index::{strip_ids, IdIndex, JsonPath, PathSegment};
pub use log_sink::{register_builtin_logging_modules, LogSink};
pub use logging::{CustomLog, LogEncoder, LogRecord, LoggingConfig, Sampling, SupervisorLoggerSource};
pub use storage_handle::StorageHandle;
pub use supervisor::{Instance, Supervisor};
