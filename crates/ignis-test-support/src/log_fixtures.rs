use std::sync::Once;

use ignis_registry::{global, LogEncoder, LogRecord, ModuleFactory, ModuleHandle, ModuleId, ModuleInfo, RegistryError, WriterOpener};

pub const TEST_DISCARD_WRITER: &str = "ignis-test-support.writers.discard";
pub const TEST_JSON_ENCODER: &str = "ignis-test-support.encoders.json";

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
        "ignis-test-support-discard".to_string()
    }
    fn open_writer(&self) -> Result<Box<dyn std::io::Write + Send>, RegistryError> {
        Ok(Box::new(std::io::sink()))
    }
}

/// Encodes every record as a single JSON line, independent of
/// `ignis-supervisor`'s own built-in encoder, so a crate lower in the
/// dependency graph can still exercise logging without depending on
/// `ignis-supervisor`.
struct JsonEncoderStub;

impl ModuleHandle for JsonEncoderStub {
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

impl LogEncoder for JsonEncoderStub {
    fn encode(&self, record: &LogRecord) -> Result<Vec<u8>, RegistryError> {
        let mut bytes = serde_json::to_vec(&serde_json::json!({
            "logger": record.logger,
            "message": record.message,
        }))
        .map_err(|e| RegistryError::factory(TEST_JSON_ENCODER, e))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

static REGISTERED: Once = Once::new();

/// Registers the discard writer and JSON encoder stub under their fixed,
/// test-namespaced ids. Idempotent, like `ignis_supervisor`'s own
/// `register_builtin_logging_modules`.
pub fn register_test_log_modules() {
    REGISTERED.call_once(|| {
        let writer: std::sync::Arc<dyn ModuleFactory> = std::sync::Arc::new(|| Box::new(DiscardWriter) as Box<dyn ModuleHandle>);
        let encoder: std::sync::Arc<dyn ModuleFactory> = std::sync::Arc::new(|| Box::new(JsonEncoderStub) as Box<dyn ModuleHandle>);
        global()
            .register(ModuleInfo { id: ModuleId::new(TEST_DISCARD_WRITER).expect("static id"), factory: writer })
            .expect("fixture ids never collide");
        global()
            .register(ModuleInfo { id: ModuleId::new(TEST_JSON_ENCODER).expect("static id"), factory: encoder })
            .expect("fixture ids never collide");
    });
}
