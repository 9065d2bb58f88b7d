//! Logging sub-policy: which custom logs exist, which module names each
//! one accepts, and the always-present `default` log.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use ignis_loader::LogLevel;
use ignis_registry::ModuleId;
use serde::{Deserialize, Serialize};

use crate::error::SupervisorError;
use crate::log_sink::LogSink;

pub use ignis_registry::{LogEncoder, LogRecord};

/// Rate limiting applied to a log before it reaches the writer: after the
/// first `first` records within `interval` seconds, only every
/// `thereafter`-th record is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sampling {
    pub interval: u32,
    pub first: u32,
    pub thereafter: u32,
}

/// One named log: where it writes, how it encodes, and which module names
/// it accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomLog {
    pub writer: ModuleId,
    pub encoder: ModuleId,
    #[serde(default = "default_level")]
    pub level: LogLevel,
    #[serde(default)]
    pub sampling: Option<Sampling>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

/// Appends `.` to `s` so `"foo.b"` cannot be mistaken for a prefix match
/// of `"foo.bar"` — required by the longest-prefix tie-break rule.
fn dotted(s: &str) -> String {
    let mut owned = s.to_string();
    owned.push('.');
    owned
}

fn longest_matching_prefix_len(module_dotted: &str, prefixes: &[String]) -> Option<usize> {
    prefixes
        .iter()
        .map(|p| dotted(p))
        .filter(|p| module_dotted.starts_with(p.as_str()))
        .map(|p| p.len())
        .max()
}

impl CustomLog {
    /// The §4.E.1 matching rule: longest-prefix tie-break between
    /// `include` and `exclude`, with an empty `include` meaning "match
    /// everything not excluded".
    pub fn accepts(&self, module_name: &str) -> bool {
        if self.include.is_empty() && self.exclude.is_empty() {
            return true;
        }
        let module_dotted = dotted(module_name);
        let include_len = longest_matching_prefix_len(&module_dotted, &self.include).unwrap_or(0);
        let exclude_len = longest_matching_prefix_len(&module_dotted, &self.exclude);

        if !self.include.is_empty() && include_len == 0 {
            return false;
        }
        match exclude_len {
            Some(exclude_len) if exclude_len > include_len => false,
            _ => true,
        }
    }

    /// Both lists present ⇒ they must be pairwise disjoint and every
    /// element of one must relate to some element of the other by prefix
    /// (nested), never simply unrelated strings.
    fn validate_include_exclude(&self) -> Result<(), SupervisorError> {
        if self.include.is_empty() || self.exclude.is_empty() {
            return Ok(());
        }
        for inc in &self.include {
            for exc in &self.exclude {
                if inc == exc {
                    return Err(SupervisorError::LoggingPolicy(format!(
                        "include and exclude both contain {inc:?}"
                    )));
                }
            }
        }
        for inc in &self.include {
            let related = self.exclude.iter().any(|exc| is_prefix_or_superset(inc, exc));
            if !related {
                return Err(SupervisorError::LoggingPolicy(format!(
                    "include entry {inc:?} is not nested with any exclude entry"
                )));
            }
        }
        for exc in &self.exclude {
            let related = self.include.iter().any(|inc| is_prefix_or_superset(inc, exc));
            if !related {
                return Err(SupervisorError::LoggingPolicy(format!(
                    "exclude entry {exc:?} is not nested with any include entry"
                )));
            }
        }
        Ok(())
    }
}

fn is_prefix_or_superset(a: &str, b: &str) -> bool {
    let a_dotted = dotted(a);
    let b_dotted = dotted(b);
    b_dotted.starts_with(&a_dotted) || a_dotted.starts_with(&b_dotted)
}

/// The `logging` top-level configuration key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub sink: Option<serde_json::Value>,
    #[serde(default)]
    pub logs: BTreeMap<String, CustomLog>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { sink: None, logs: BTreeMap::new() }
    }
}

const DISCARD_WRITER: &str = "logging.writers.discard";
const DEFAULT_LOG: &str = "default";

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), SupervisorError> {
        for (name, log) in &self.logs {
            log.validate_include_exclude()
                .map_err(|e| SupervisorError::LoggingPolicy(format!("log {name:?}: {e}")))?;
        }
        Ok(())
    }

    /// Inserts a stderr + JSON + info-level `default` log if the user did
    /// not configure one. Must run before any other provisioning in the
    /// new generation, matching §4.E.1.
    pub fn synthesize_default(&mut self) {
        self.logs.entry(DEFAULT_LOG.to_string()).or_insert_with(|| CustomLog {
            writer: ModuleId::new("logging.writers.stderr").expect("static id"),
            encoder: ModuleId::new("logging.encoders.json").expect("static id"),
            level: LogLevel::Info,
            sampling: None,
            include: Vec::new(),
            exclude: Vec::new(),
        });
    }

    /// Logs whose writer is the discard module are never actually
    /// constructed — except `default`, which always exists.
    pub fn logs_to_provision(&self) -> impl Iterator<Item = (&String, &CustomLog)> {
        self.logs.iter().filter(|(name, log)| name.as_str() == DEFAULT_LOG || log.writer.as_str() != DISCARD_WRITER)
    }
}

/// Implements `ignis_loader::LoggerSource` against a generation's
/// `LoggingConfig`: a module's logger is enabled whenever at least one
/// provisioned (non-discarded) log accepts its name. The policy is fully
/// known from the decoded config before any module is provisioned, so the
/// supervisor builds this before creating the generation's `Context`
/// rather than patching logger behavior in after the fact.
///
/// The actual writer/encoder modules cannot be provisioned until a
/// `Context` exists, which this source is itself handed to in order to
/// build that `Context` — so `sink` starts empty and the supervisor calls
/// [`SupervisorLoggerSource::set_sink`] once logging provisioning
/// completes. Loggers handed out before that point still honor the
/// include/exclude policy; they simply have nothing to forward records to
/// yet.
pub struct SupervisorLoggerSource {
    logging: LoggingConfig,
    sink: ArcSwapOption<LogSink>,
}

impl SupervisorLoggerSource {
    pub fn new(logging: LoggingConfig) -> Self {
        Self { logging, sink: ArcSwapOption::from(None) }
    }

    pub fn set_sink(&self, sink: Arc<LogSink>) {
        self.sink.store(Some(sink));
    }
}

impl ignis_loader::LoggerSource for SupervisorLoggerSource {
    fn logger_for(&self, module_name: &str) -> ignis_loader::ModuleLogger {
        let enabled = self.logging.logs_to_provision().any(|(_, log)| log.accepts(module_name));
        match self.sink.load_full() {
            Some(sink) => {
                ignis_loader::ModuleLogger::with_sink(module_name, enabled, sink as Arc<dyn ignis_loader::RecordSink>)
            }
            None => ignis_loader::ModuleLogger::new(module_name, enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(include: &[&str], exclude: &[&str]) -> CustomLog {
        CustomLog {
            writer: ModuleId::new("logging.writers.stderr").unwrap(),
            encoder: ModuleId::new("logging.encoders.json").unwrap(),
            level: LogLevel::Info,
            sampling: None,
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn empty_lists_accept_everything() {
        assert!(log(&[], &[]).accepts("anything.at.all"));
    }

    #[test]
    fn include_does_not_match_sibling_with_shared_prefix_text() {
        let l = log(&["foo.b"], &[]);
        assert!(!l.accepts("foo.bar"));
        assert!(l.accepts("foo.b"));
        assert!(l.accepts("foo.b.c"));
    }

    #[test]
    fn scenario_4_include_exclude_matrix() {
        let l = log(&["http"], &["http.handlers.debug"]);
        assert!(l.accepts("http.handlers.file_server"));
        assert!(l.accepts("http.server"));
        assert!(!l.accepts("http.handlers.debug.tracer"));
        assert!(!l.accepts("dns.resolver"));
    }

    #[test]
    fn exclude_longer_than_include_rejects() {
        let l = log(&["http.handlers"], &["http.handlers.debug"]);
        assert!(!l.accepts("http.handlers.debug"));
        assert!(l.accepts("http.handlers.file_server"));
    }

    #[test]
    fn disjoint_non_nested_lists_fail_validation() {
        let l = log(&["http"], &["dns"]);
        assert!(l.validate_include_exclude().is_err());
    }

    #[test]
    fn nested_lists_pass_validation() {
        let l = log(&["http"], &["http.handlers.debug"]);
        assert!(l.validate_include_exclude().is_ok());
    }

    #[test]
    fn synthesize_default_only_inserts_when_absent() {
        let mut cfg = LoggingConfig::default();
        cfg.synthesize_default();
        assert!(cfg.logs.contains_key(DEFAULT_LOG));
        cfg.logs.get_mut(DEFAULT_LOG).unwrap().level = LogLevel::Error;
        cfg.synthesize_default();
        assert_eq!(cfg.logs.get(DEFAULT_LOG).unwrap().level, LogLevel::Error);
    }

    #[test]
    fn discard_writer_logs_are_elided_except_default() {
        let mut cfg = LoggingConfig::default();
        cfg.synthesize_default();
        cfg.logs.insert(
            "quiet".to_string(),
            CustomLog {
                writer: ModuleId::new(DISCARD_WRITER).unwrap(),
                encoder: ModuleId::new("logging.encoders.json").unwrap(),
                level: LogLevel::Info,
                sampling: None,
                include: Vec::new(),
                exclude: Vec::new(),
            },
        );
        let kept: Vec<_> = cfg.logs_to_provision().map(|(name, _)| name.clone()).collect();
        assert!(kept.contains(&DEFAULT_LOG.to_string()));
        assert!(!kept.contains(&"quiet".to_string()));
    }
}
