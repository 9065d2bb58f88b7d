use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RegistryError;
use crate::module_handle::ModuleFactory;

/// A dotted module identifier, e.g. `http.handlers.file_server`.
///
/// Construction validates that the string is non-empty and contains no
/// empty segment (`"a..b"`, leading `.`, trailing `.` are all rejected).
/// The empty string itself is a valid identifier: it names the top-level
/// namespace used for `apps`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(Cow<'static, str>);

impl ModuleId {
    pub fn new(raw: impl Into<Cow<'static, str>>) -> Result<Self, RegistryError> {
        let raw = raw.into();
        if !raw.is_empty() {
            if raw.starts_with('.') || raw.ends_with('.') {
                return Err(RegistryError::InvalidModuleId {
                    raw: raw.into_owned(),
                    reason: "leading or trailing '.'",
                });
            }
            if raw.split('.').any(str::is_empty) {
                return Err(RegistryError::InvalidModuleId {
                    raw: raw.into_owned(),
                    reason: "empty segment between dots",
                });
            }
        }
        Ok(Self(raw))
    }

    /// The root namespace, matched by `get_by_namespace("")`.
    pub fn top_level() -> Self {
        Self(Cow::Borrowed(""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `self` lies within `ns` (dot-delimited prefix match). The
    /// empty namespace matches everything.
    pub fn in_namespace(&self, ns: &str) -> bool {
        if ns.is_empty() {
            return true;
        }
        let mut prefix = ns.to_string();
        prefix.push('.');
        self.0 == ns || self.0.starts_with(&prefix)
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ModuleId::new(raw).map_err(D::Error::custom)
    }
}

#[derive(Clone)]
pub struct ModuleInfo {
    pub id: ModuleId,
    pub factory: Arc<dyn ModuleFactory>,
}

impl std::fmt::Debug for ModuleInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInfo").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Process-global catalog of named module factories.
///
/// Backed by a `BTreeMap` rather than a `HashMap` so `get_by_namespace` can
/// walk a sorted prefix range and so iteration order is stable across runs
/// — useful for anything that hashes or diffs the set of registered
/// modules (tests, audit logging).
pub struct ModuleRegistry {
    entries: RwLock<BTreeMap<ModuleId, ModuleInfo>>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self { entries: RwLock::new(BTreeMap::new()) }
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `info`. Idempotent when called twice with the same id and
    /// the same factory pointer (`Arc::ptr_eq`); a second registration
    /// under the same id with a *different* factory is a hard conflict,
    /// since module identifiers are meant to be unique process-wide and
    /// registered once at startup.
    pub fn register(&self, info: ModuleInfo) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        match entries.get(&info.id) {
            None => {
                entries.insert(info.id.clone(), info);
                Ok(())
            }
            Some(existing) if Arc::ptr_eq(&existing.factory, &info.factory) => Ok(()),
            Some(_) => Err(RegistryError::Conflict { id: info.id.to_string() }),
        }
    }

    pub fn get(&self, id: &ModuleId) -> Option<ModuleInfo> {
        self.entries.read().get(id).cloned()
    }

    /// Every module whose id lies in `ns` (dot-delimited prefix, empty
    /// matches everything).
    pub fn get_by_namespace(&self, ns: &str) -> Vec<ModuleInfo> {
        self.entries.read().values().filter(|info| info.id.in_namespace(ns)).cloned().collect()
    }
}

static GLOBAL: OnceLock<ModuleRegistry> = OnceLock::new();

/// The process-wide module registry singleton.
///
/// `OnceLock` rather than a `lazy_static`/`once_cell` dependency: it is
/// stable standard library, and nothing else in this workspace already
/// depends on an external lazy-init crate that this could instead reuse.
pub fn global() -> &'static ModuleRegistry {
    GLOBAL.get_or_init(ModuleRegistry::new)
}
