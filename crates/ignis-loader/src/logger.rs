use std::sync::Arc;

pub use ignis_registry::LogLevel;

/// Something that can name a logger for a module and decide (via the
/// supervisor's include/exclude policy) whether it is enabled.
///
/// `ignis-loader` depends only on this trait, not on `ignis-supervisor`
/// itself, which is what implements it — keeping the dependency arrow
/// pointing one way (loader → trait, supervisor → impl) even though
/// logically "logging policy" is a supervisor concern.
pub trait LoggerSource: Send + Sync {
    fn logger_for(&self, module_name: &str) -> ModuleLogger;
}

/// Something a provisioned log's writer+encoder pair can be reached
/// through, once the supervisor has actually instantiated them. Kept
/// separate from `LoggerSource` since a `Context` built before logging is
/// provisioned (or a test context) has a policy but no sink yet.
pub trait RecordSink: Send + Sync {
    fn emit(&self, logger_name: &str, level: LogLevel, message: &str);
}

/// A logger bound to one module's ancestry-derived name.
///
/// This wraps `tracing` rather than reimplementing level filtering or
/// sinks: `enabled` reflects the *configured logging policy's* verdict
/// for this module (the include/exclude matching rule), while the actual
/// emission still goes through `tracing`'s own dispatcher so sinks already
/// attached to the process (stderr, a test subscriber) still see it. When a
/// [`RecordSink`] is attached (the supervisor has provisioned real writer
/// and encoder modules for this generation) the same record is also handed
/// to it, so configured `logging.writers`/`logging.encoders` modules see
/// real traffic rather than existing purely as naming policy.
pub struct ModuleLogger {
    name: String,
    enabled: bool,
    sink: Option<Arc<dyn RecordSink>>,
}

impl ModuleLogger {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self { name: name.into(), enabled, sink: None }
    }

    pub fn with_sink(name: impl Into<String>, enabled: bool, sink: Arc<dyn RecordSink>) -> Self {
        Self { name: name.into(), enabled, sink: Some(sink) }
    }

    /// A logger that accepts everything — used before the logging
    /// subsystem has been provisioned, and in tests.
    pub fn permissive(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn emit(&self, level: LogLevel, message: &str) {
        if !self.enabled {
            return;
        }
        match level {
            LogLevel::Debug => tracing::debug!(target: "ignis::module", module = %self.name, "{message}"),
            LogLevel::Info => tracing::info!(target: "ignis::module", module = %self.name, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "ignis::module", module = %self.name, "{message}"),
            LogLevel::Error => tracing::error!(target: "ignis::module", module = %self.name, "{message}"),
        }
        if let Some(sink) = &self.sink {
            sink.emit(&self.name, level, message);
        }
    }

    pub fn info(&self, message: &str) {
        self.emit(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(LogLevel::Error, message);
    }
}
