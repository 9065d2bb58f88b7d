use std::any::Any;

use crate::error::RegistryError;

/// A module that receives a construction-time scope and may fail.
///
/// `ctx` arrives as `&mut dyn Any` rather than a concrete `Context` type
/// because `ignis-registry` sits below `ignis-loader` in the dependency
/// graph and must not depend on it. Implementations downcast with
/// `ctx.downcast_mut::<ignis_loader::Context>()`, which the loader — the
/// only caller of `provision` — guarantees will always succeed.
pub trait Provisioner: Send + Sync {
    fn provision(&mut self, ctx: &mut dyn Any) -> Result<(), RegistryError>;
}

/// Checks invariants once construction/provisioning has completed.
pub trait Validator: Send + Sync {
    fn validate(&self) -> Result<(), RegistryError>;
}

/// Releases resources held by a module instance.
pub trait CleanerUpper: Send + Sync {
    fn cleanup(&mut self) -> Result<(), RegistryError>;
}

/// A long-running service with an explicit start/stop lifecycle.
pub trait App: Send + Sync {
    fn start(&mut self) -> Result<(), RegistryError>;
    fn stop(&mut self) -> Result<(), RegistryError>;
}

/// A log writer module: opens a closable byte sink for a `CustomLog`.
/// Named `WriterOpener` per the distilled spec's module-facing contract
/// (§6), living here rather than in `ignis-supervisor` since capability
/// detection against a `dyn ModuleHandle` only works for capabilities the
/// registry itself knows how to probe for.
pub trait WriterOpener: Send + Sync {
    fn writer_key(&self) -> String;
    fn open_writer(&self) -> Result<Box<dyn std::io::Write + Send>, RegistryError>;
}

/// A severity threshold, mirroring the level field every custom log
/// configuration carries. Lives here, not `ignis-supervisor`, for the same
/// reason as [`LogEncoder`] below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A single emitted log record, handed to a [`LogEncoder`].
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub logger: String,
    pub level: LogLevel,
    pub message: String,
    pub fields: std::collections::BTreeMap<String, serde_json::Value>,
}

/// One-directional log encoding — narrower than a full codec on purpose,
/// since logs are never decoded back. Kept here rather than
/// `ignis-supervisor` for the same reason as `WriterOpener`: capability
/// probing against a `dyn ModuleHandle` only works for traits the registry
/// itself knows about.
pub trait LogEncoder: Send + Sync {
    fn encode(&self, record: &LogRecord) -> Result<Vec<u8>, RegistryError>;
}

/// The minimal blob-store contract a storage module must satisfy — the
/// distilled spec's "storage" collaborator (§6), kept here (not
/// `ignis-supervisor`) for the same reason as `WriterOpener`: it is what
/// `StorageConverter` hands back, and the registry is the common layer
/// every module-bearing crate depends on.
pub trait StorageBackend: Send + Sync {
    fn load(&self, key: &str) -> Result<Vec<u8>, RegistryError>;
    fn store(&self, key: &str, value: &[u8]) -> Result<(), RegistryError>;
    fn exists(&self, key: &str) -> bool;
    fn delete(&self, key: &str) -> Result<(), RegistryError>;
    fn list(&self, prefix: &str) -> Result<Vec<String>, RegistryError>;
}

/// A module that can hand back a storage backend (the distilled spec's
/// `StorageConverter.CertMagicStorage()`).
pub trait StorageConverter: Send + Sync {
    fn certmagic_storage(&self) -> Result<std::sync::Arc<dyn StorageBackend>, RegistryError>;
}

/// The capability-probing vtable every registered module instance
/// implements.
///
/// Rust has no runtime upcasting from `dyn Any` to an arbitrary trait
/// object, so a factory that only promised `Box<dyn Any + Send + Sync>`
/// would leave the loader unable to ask "does this implement
/// `Provisioner`?" without already knowing the concrete type. `ModuleHandle`
/// sidesteps that by having each concrete module type implement these
/// accessor methods itself, overriding exactly the ones matching the
/// capabilities it actually has; the rest keep the default `None` body.
/// This is the statically-typed stand-in for the reflection-based capability
/// detection a dynamically typed host would use.
pub trait ModuleHandle: Any + Send + Sync {
    /// Strictly decodes `raw` into `self`.
    ///
    /// The loader operates on `dyn ModuleHandle` and cannot derive a
    /// generic `Deserialize` implementation for an unknown concrete type,
    /// so each module overrides this to call `serde_json::from_value`
    /// against its own concrete config struct (typically annotated with
    /// `#[serde(deny_unknown_fields)]` to get the "unknown fields reject"
    /// behavior the loader's contract requires). Modules with no
    /// configuration of their own can leave the default no-op.
    fn decode(&mut self, raw: &serde_json::Value) -> Result<(), serde_json::Error> {
        let _ = raw;
        Ok(())
    }

    fn as_provisioner(&mut self) -> Option<&mut dyn Provisioner> {
        None
    }
    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }
    fn as_cleaner(&mut self) -> Option<&mut dyn CleanerUpper> {
        None
    }
    fn as_app(&mut self) -> Option<&mut dyn App> {
        None
    }
    fn as_writer_opener(&self) -> Option<&dyn WriterOpener> {
        None
    }
    fn as_storage_converter(&self) -> Option<&dyn StorageConverter> {
        None
    }
    fn as_log_encoder(&self) -> Option<&dyn LogEncoder> {
        None
    }
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Produces a fresh module instance as a capability-probing handle.
pub trait ModuleFactory: Send + Sync {
    fn new_instance(&self) -> Box<dyn ModuleHandle>;
}

impl<F> ModuleFactory for F
where
    F: Fn() -> Box<dyn ModuleHandle> + Send + Sync,
{
    fn new_instance(&self) -> Box<dyn ModuleHandle> {
        (self)()
    }
}
