//! Actually provisions the `logging.writers`/`logging.encoders` modules a
//! [`crate::logging::CustomLog`] names, rather than leaving them as policy
//! metadata the include/exclude matcher never opens. Grounded on the same
//! capability-probing pattern `ignis-registry` already uses for storage:
//! `open_writer()`/`encode()` are called through `ModuleHandle::as_*`
//! accessors, not a concrete type known ahead of time.

use std::io::Write;
use std::sync::Once;

use ignis_loader::{Context, LogLevel, RecordSink};
use ignis_registry::{
    global, CleanerUpper, LogEncoder, LogRecord, ModuleFactory, ModuleHandle, ModuleId, ModuleInfo, RegistryError,
    WriterOpener,
};
use parking_lot::Mutex;

use crate::error::SupervisorError;
use crate::logging::CustomLog;

struct StderrWriter;

impl ModuleHandle for StderrWriter {
    fn as_writer_opener(&self) -> Option<&dyn WriterOpener> {
        Some(self)
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl WriterOpener for StderrWriter {
    fn writer_key(&self) -> String {
        "stderr".to_string()
    }
    fn open_writer(&self) -> Result<Box<dyn Write + Send>, RegistryError> {
        Ok(Box::new(std::io::stderr()))
    }
}

struct DiscardWriter;

impl ModuleHandle for DiscardWriter {
    fn as_writer_opener(&self) -> Option<&dyn WriterOpener> {
        Some(self)
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl WriterOpener for DiscardWriter {
    fn writer_key(&self) -> String {
        "discard".to_string()
    }
    fn open_writer(&self) -> Result<Box<dyn Write + Send>, RegistryError> {
        Ok(Box::new(std::io::sink()))
    }
}

struct JsonEncoder;

impl ModuleHandle for JsonEncoder {
    fn as_log_encoder(&self) -> Option<&dyn LogEncoder> {
        Some(self)
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl LogEncoder for JsonEncoder {
    fn encode(&self, record: &LogRecord) -> Result<Vec<u8>, RegistryError> {
        let level = match record.level {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        let mut value = serde_json::json!({
            "logger": record.logger,
            "level": level,
            "msg": record.message,
        });
        if !record.fields.is_empty() {
            if let Some(obj) = value.as_object_mut() {
                for (k, v) in &record.fields {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }
        let mut bytes = serde_json::to_vec(&value)
            .map_err(|e| RegistryError::factory("logging.encoders.json", e))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn factory_for<F>(f: F) -> std::sync::Arc<dyn ModuleFactory>
where
    F: Fn() -> Box<dyn ModuleHandle> + Send + Sync + 'static,
{
    std::sync::Arc::new(f)
}

static BUILTINS_REGISTERED: Once = Once::new();

/// Registers the built-in `logging.writers.stderr`, `logging.writers.discard`
/// and `logging.encoders.json` modules the synthesized default log (and any
/// config that references them by name) expects to exist. Idempotent —
/// callers do not need to track whether some earlier generation already
/// registered them.
pub fn register_builtin_logging_modules() {
    BUILTINS_REGISTERED.call_once(|| {
        let registrations: &[(&str, std::sync::Arc<dyn ModuleFactory>)] = &[
            ("logging.writers.stderr", factory_for(|| Box::new(StderrWriter) as Box<dyn ModuleHandle>)),
            ("logging.writers.discard", factory_for(|| Box::new(DiscardWriter) as Box<dyn ModuleHandle>)),
            ("logging.encoders.json", factory_for(|| Box::new(JsonEncoder) as Box<dyn ModuleHandle>)),
        ];
        for (id, factory) in registrations {
            let id = ModuleId::new(*id).expect("static id");
            global().register(ModuleInfo { id, factory: factory.clone() }).expect("builtin module ids never conflict");
        }
    });
}

struct LogEntry {
    log: CustomLog,
    writer_handle: Box<dyn ModuleHandle>,
    encoder_handle: Box<dyn ModuleHandle>,
    writer: Mutex<Box<dyn Write + Send>>,
}

/// The live counterpart to [`crate::logging::LoggingConfig`]: one entry per
/// provisioned (non-discarded) log, each holding the writer it actually
/// opened and the encoder module it will call for every accepted record.
///
/// Implements [`RecordSink`] so a [`crate::logging::SupervisorLoggerSource`]
/// can hand every `ModuleLogger` it builds a reference to the same sink,
/// letting real log traffic reach the configured writers instead of the
/// include/exclude policy being the only thing those module ids are used
/// for.
pub struct LogSink {
    entries: Vec<LogEntry>,
}

impl LogSink {
    /// Loads the writer and encoder module named by every log
    /// [`crate::logging::LoggingConfig::logs_to_provision`] yields, opening
    /// each writer once up front. Each log gets its own module instances —
    /// two logs both naming `logging.writers.stderr` get two independent
    /// `Stderr` handles, not a shared one, matching how every other module
    /// load in this engine produces a fresh instance per reference.
    pub fn provision<'a>(
        ctx: &Context,
        logs: impl Iterator<Item = (&'a String, &'a CustomLog)>,
    ) -> Result<Self, SupervisorError> {
        register_builtin_logging_modules();
        let mut entries = Vec::new();
        for (name, log) in logs {
            ctx.load_by_id(&log.writer, None).map_err(|e| {
                SupervisorError::LoggingPolicy(format!("log {name:?}: loading writer {}: {e}", log.writer))
            })?;
            let writer_handle = ctx.take(&log.writer).expect("just loaded by load_by_id");
            let writer = writer_handle
                .as_writer_opener()
                .ok_or_else(|| SupervisorError::LoggingPolicy(format!("module {} is not a log writer", log.writer)))?
                .open_writer()?;

            ctx.load_by_id(&log.encoder, None).map_err(|e| {
                SupervisorError::LoggingPolicy(format!("log {name:?}: loading encoder {}: {e}", log.encoder))
            })?;
            let encoder_handle = ctx.take(&log.encoder).expect("just loaded by load_by_id");
            if encoder_handle.as_log_encoder().is_none() {
                return Err(SupervisorError::LoggingPolicy(format!("module {} is not a log encoder", log.encoder)));
            }

            entries.push(LogEntry { log: log.clone(), writer_handle, encoder_handle, writer: Mutex::new(writer) });
        }
        Ok(Self { entries })
    }
}

impl RecordSink for LogSink {
    fn emit(&self, logger_name: &str, level: LogLevel, message: &str) {
        for entry in &self.entries {
            if level < entry.log.level || !entry.log.accepts(logger_name) {
                continue;
            }
            let encoder = entry.encoder_handle.as_log_encoder().expect("checked at provision time");
            let record = LogRecord {
                logger: logger_name.to_string(),
                level,
                message: message.to_string(),
                fields: Default::default(),
            };
            match encoder.encode(&record) {
                Ok(bytes) => {
                    if let Err(err) = entry.writer.lock().write_all(&bytes) {
                        tracing::error!(error = %err, writer = %entry.log.writer, "log writer failed");
                    }
                }
                Err(err) => tracing::error!(error = %err, encoder = %entry.log.encoder, "log encoder failed"),
            }
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        for entry in &mut self.entries {
            if let Some(cleaner) = entry.writer_handle.as_cleaner() {
                if let Err(err) = cleaner.cleanup() {
                    tracing::error!(error = %err, "log writer cleanup failed");
                }
            }
            if let Some(cleaner) = entry.encoder_handle.as_cleaner() {
                if let Err(err) = cleaner.cleanup() {
                    tracing::error!(error = %err, "log encoder cleanup failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LoggingConfig;
    use ignis_loader::new_context;

    #[test]
    fn provisions_default_log_against_real_stderr_writer() {
        let mut cfg = LoggingConfig::default();
        cfg.synthesize_default();
        let (ctx, _guard) = new_context(None);
        let sink = LogSink::provision(&ctx, cfg.logs_to_provision()).unwrap();
        assert_eq!(sink.entries.len(), 1);
        sink.emit("some.module", LogLevel::Info, "hello");
    }

    #[test]
    fn below_threshold_records_are_not_encoded() {
        let mut cfg = LoggingConfig::default();
        cfg.synthesize_default();
        cfg.logs.get_mut("default").unwrap().level = LogLevel::Warn;
        let (ctx, _guard) = new_context(None);
        let sink = LogSink::provision(&ctx, cfg.logs_to_provision()).unwrap();
        // Below threshold: loop body's `continue` means no writer/encoder
        // call happens. Nothing to assert on directly without a capturing
        // writer, so this just exercises the skip path without panicking.
        sink.emit("some.module", LogLevel::Debug, "too quiet");
    }
}
