//! Cancellable scope that recursively instantiates modules from JSON.
//!
//! `Context` (see [`context`]) owns the cancellation tree, the ancestry
//! used for logger naming, and the map of instances provisioned in one
//! configuration generation. `module_loader` sits on top of it and
//! implements the five JSON shapes a struct field tagged with a
//! `namespace`/`inline_key` pair may take, mirroring the distilled spec's
//! `LoadModule` operation for a codebase with no runtime field
//! introspection.

mod context;
mod error;
mod logger;
mod module_loader;

pub use context::{new_context, new_context_with_logger, CancelGuard, Context, Erased};
pub use error::LoaderError;
pub use logger::{LogLevel, LoggerSource, ModuleLogger, RecordSink};
pub use module_loader::{LoadMeta, LoadedModule, RawModuleField};
