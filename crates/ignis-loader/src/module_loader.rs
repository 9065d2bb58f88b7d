//! Dispatches a struct field's raw JSON into loaded module instances.
//!
//! The distilled spec's `LoadModule` is described in terms of runtime field
//! introspection (a host language that can read a field's type and a tag
//! string off it at runtime). `ignis-loader` has no such introspection, so
//! callers construct a [`RawModuleField`] themselves — picking the variant
//! that matches their field's JSON shape — and hand it to
//! [`Context::load_module`] alongside a parsed [`LoadMeta`]. This is Design
//! Note §9(b)'s "explicit loader objects registered alongside each host
//! module" resolved concretely: the host module (e.g. a supervisor's
//! `apps: BTreeMap<String, serde_json::Value>` field) is the one that knows
//! its own shape and constructs the matching variant.

use std::collections::BTreeMap;

use ignis_registry::{ModuleHandle, ModuleId};

use crate::context::Context;
use crate::error::LoaderError;

/// Parsed `namespace=...;inline_key=...` field tag.
///
/// `namespace` constrains which modules may appear in this field (empty
/// means top-level, used for `apps`). `inline_key` names the JSON field
/// inside a raw blob that carries the module's local name — defaulting to
/// `"module"` when absent, matching the discriminator key most config
/// shapes in this family use.
#[derive(Debug, Clone, Default)]
pub struct LoadMeta {
    pub namespace: String,
    pub inline_key: Option<String>,
}

impl LoadMeta {
    /// Parses a tag string of semicolon-separated `key=value` pairs, e.g.
    /// `"namespace=http.handlers;inline_key=handler"`. Unknown keys are
    /// ignored rather than rejected, since this is a small, internal
    /// grammar rather than a format other tools need to validate strictly.
    pub fn parse(tag: &str) -> Self {
        let mut namespace = String::new();
        let mut inline_key = None;
        for pair in tag.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((key, value)) = pair.split_once('=') {
                match key.trim() {
                    "namespace" => namespace = value.trim().to_string(),
                    "inline_key" => inline_key = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }
        Self { namespace, inline_key }
    }

    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), inline_key: None }
    }

    pub fn with_inline_key(mut self, key: impl Into<String>) -> Self {
        self.inline_key = Some(key.into());
        self
    }

    fn discriminator_key(&self) -> &str {
        self.inline_key.as_deref().unwrap_or("module")
    }
}

/// The five JSON shapes a module-bearing struct field may take, per the
/// distilled spec's `LoadModule` operation.
#[derive(Debug, Clone)]
pub enum RawModuleField {
    Single(serde_json::Value),
    Sequence(Vec<serde_json::Value>),
    Sequence2D(Vec<Vec<serde_json::Value>>),
    /// Ordered for deterministic replay — same rationale as
    /// `ModuleRegistry`'s `BTreeMap` choice.
    Map(BTreeMap<String, serde_json::Value>),
    SequenceOfMaps(Vec<BTreeMap<String, serde_json::Value>>),
}

impl RawModuleField {
    /// Replaces every raw blob in this field with `null` and returns the
    /// pre-clear value. The distilled spec notes this is observable: a
    /// caller that re-serializes the field after a successful load will
    /// see `null` in the slot the raw JSON used to occupy.
    pub fn take_for_gc(&mut self) -> RawModuleField {
        let nulled = match self {
            RawModuleField::Single(_) => RawModuleField::Single(serde_json::Value::Null),
            RawModuleField::Sequence(items) => {
                RawModuleField::Sequence(vec![serde_json::Value::Null; items.len()])
            }
            RawModuleField::Sequence2D(rows) => RawModuleField::Sequence2D(
                rows.iter().map(|row| vec![serde_json::Value::Null; row.len()]).collect(),
            ),
            RawModuleField::Map(map) => {
                RawModuleField::Map(map.keys().cloned().map(|k| (k, serde_json::Value::Null)).collect())
            }
            RawModuleField::SequenceOfMaps(rows) => RawModuleField::SequenceOfMaps(
                rows.iter()
                    .map(|m| m.keys().cloned().map(|k| (k, serde_json::Value::Null)).collect())
                    .collect(),
            ),
        };
        std::mem::replace(self, nulled)
    }
}

/// The module instances produced by [`Context::load_module`], one variant
/// per [`RawModuleField`] shape.
pub enum LoadedModule {
    Single(Box<dyn ModuleHandle>),
    Sequence(Vec<Box<dyn ModuleHandle>>),
    Sequence2D(Vec<Vec<Box<dyn ModuleHandle>>>),
    Map(BTreeMap<String, Box<dyn ModuleHandle>>),
    SequenceOfMaps(Vec<BTreeMap<String, Box<dyn ModuleHandle>>>),
}

fn full_id(namespace: &str, name: &str) -> Result<ModuleId, LoaderError> {
    let raw = if namespace.is_empty() { name.to_string() } else { format!("{namespace}.{name}") };
    Ok(ModuleId::new(raw)?)
}

/// Pulls the discriminator field named `key` out of `value` (which must be
/// a JSON object) and returns it as the module's local name. The field is
/// removed in place so the remaining object can be strictly decoded
/// against a concrete config struct without an "unknown field" complaint
/// about the discriminator itself.
fn extract_discriminator(value: &mut serde_json::Value, namespace: &str, key: &str) -> Result<String, LoaderError> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| LoaderError::MissingModuleName { namespace: namespace.to_string() })?;
    let raw = obj.remove(key).ok_or_else(|| LoaderError::MissingModuleName { namespace: namespace.to_string() })?;
    match raw {
        serde_json::Value::String(name) => Ok(name),
        _ => Err(LoaderError::InlineKeyNotString { namespace: namespace.to_string() }),
    }
}

/// Loads one module instance whose local name is carried inline in its own
/// JSON object (the `Single`/`Sequence`/`Sequence2D` shapes, and the `Map`
/// shape when `inline_key` is set).
fn load_inline(ctx: &Context, namespace: &str, meta: &LoadMeta, value: &serde_json::Value) -> Result<Box<dyn ModuleHandle>, LoaderError> {
    if value.is_null() {
        return Err(LoaderError::NullModule { namespace: namespace.to_string() });
    }
    let mut owned = value.clone();
    let name = extract_discriminator(&mut owned, namespace, meta.discriminator_key())?;
    let id = full_id(namespace, &name)?;
    ctx.load_by_id(&id, Some(&owned))?;
    ctx.take(&id).ok_or_else(|| LoaderError::NullModule { namespace: namespace.to_string() })
}

/// Loads one module instance whose local name IS the map key it appeared
/// under (the `Map` shape with no `inline_key`).
fn load_keyed(ctx: &Context, namespace: &str, local_name: &str, value: &serde_json::Value) -> Result<Box<dyn ModuleHandle>, LoaderError> {
    if value.is_null() {
        return Err(LoaderError::NullModule { namespace: namespace.to_string() });
    }
    let id = full_id(namespace, local_name)?;
    ctx.load_by_id(&id, Some(value))?;
    ctx.take(&id).ok_or_else(|| LoaderError::NullModule { namespace: namespace.to_string() })
}

fn load_map(ctx: &Context, meta: &LoadMeta, map: &BTreeMap<String, serde_json::Value>) -> Result<BTreeMap<String, Box<dyn ModuleHandle>>, LoaderError> {
    let mut out = BTreeMap::new();
    for (key, value) in map {
        let instance = match &meta.inline_key {
            None => load_keyed(ctx, &meta.namespace, key, value)?,
            Some(_) => load_inline(ctx, &meta.namespace, meta, value)?,
        };
        out.insert(key.clone(), instance);
    }
    Ok(out)
}

impl Context {
    /// Dispatches `field` against `meta`'s namespace/inline-key policy,
    /// producing the matching [`LoadedModule`] shape. Each individual
    /// instantiation goes through [`Context::load_by_id`], so the usual
    /// Provision/Validate/Cleanup sequencing and ancestry tracking apply
    /// uniformly regardless of which shape the field took.
    pub fn load_module(&self, field: &RawModuleField, meta: &LoadMeta) -> Result<LoadedModule, LoaderError> {
        match field {
            RawModuleField::Single(value) => {
                Ok(LoadedModule::Single(load_inline(self, &meta.namespace, meta, value)?))
            }
            RawModuleField::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for value in items {
                    out.push(load_inline(self, &meta.namespace, meta, value)?);
                }
                Ok(LoadedModule::Sequence(out))
            }
            RawModuleField::Sequence2D(rows) => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut inner = Vec::with_capacity(row.len());
                    for value in row {
                        inner.push(load_inline(self, &meta.namespace, meta, value)?);
                    }
                    out.push(inner);
                }
                Ok(LoadedModule::Sequence2D(out))
            }
            RawModuleField::Map(map) => Ok(LoadedModule::Map(load_map(self, meta, map)?)),
            RawModuleField::SequenceOfMaps(rows) => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    out.push(load_map(self, meta, row)?);
                }
                Ok(LoadedModule::SequenceOfMaps(out))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_registry::{global, ModuleFactory, ModuleInfo};
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Echo {
        value: i64,
    }

    impl ModuleHandle for Echo {
        fn decode(&mut self, raw: &serde_json::Value) -> Result<(), serde_json::Error> {
            self.value = raw.get("value").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    // Each test registers under a unique namespace (a monotonic counter)
    // since `ignis_registry::global()` is a process-wide singleton shared
    // across every test in this binary.
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn unique_namespace(label: &str) -> String {
        format!("test.module_loader.{label}.{}", COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    fn register_echo(namespace: &str, name: &str) {
        let id = ModuleId::new(format!("{namespace}.{name}")).unwrap();
        let factory: Arc<dyn ModuleFactory> = Arc::new(|| Box::new(Echo::default()) as Box<dyn ModuleHandle>);
        global().register(ModuleInfo { id, factory }).unwrap();
    }

    fn echo_value(handle: &Box<dyn ModuleHandle>) -> i64 {
        handle.as_any().downcast_ref::<Echo>().unwrap().value
    }

    #[test]
    fn single_shape_extracts_inline_module_name() {
        let namespace = unique_namespace("single");
        register_echo(&namespace, "a");
        let (ctx, _guard) = crate::new_context(None);

        let field = RawModuleField::Single(serde_json::json!({"module": "a", "value": 7}));
        let meta = LoadMeta::namespace(namespace);
        let loaded = ctx.load_module(&field, &meta).unwrap();
        match loaded {
            LoadedModule::Single(handle) => assert_eq!(echo_value(&handle), 7),
            _ => panic!("expected Single"),
        }
    }

    #[test]
    fn sequence_shape_loads_each_element_in_order() {
        let namespace = unique_namespace("sequence");
        register_echo(&namespace, "a");
        let (ctx, _guard) = crate::new_context(None);

        let field = RawModuleField::Sequence(vec![
            serde_json::json!({"module": "a", "value": 1}),
            serde_json::json!({"module": "a", "value": 2}),
        ]);
        let meta = LoadMeta::namespace(namespace);
        let loaded = ctx.load_module(&field, &meta).unwrap();
        match loaded {
            LoadedModule::Sequence(items) => {
                assert_eq!(items.iter().map(echo_value).collect::<Vec<_>>(), vec![1, 2]);
            }
            _ => panic!("expected Sequence"),
        }
    }

    #[test]
    fn map_without_inline_key_uses_the_map_key_as_module_name() {
        let namespace = unique_namespace("map_keyed");
        register_echo(&namespace, "a");
        register_echo(&namespace, "b");
        let (ctx, _guard) = crate::new_context(None);

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), serde_json::json!({"value": 10}));
        map.insert("b".to_string(), serde_json::json!({"value": 20}));
        let field = RawModuleField::Map(map);
        let meta = LoadMeta::namespace(namespace);
        let loaded = ctx.load_module(&field, &meta).unwrap();
        match loaded {
            LoadedModule::Map(instances) => {
                assert_eq!(echo_value(instances.get("a").unwrap()), 10);
                assert_eq!(echo_value(instances.get("b").unwrap()), 20);
            }
            _ => panic!("expected Map"),
        }
    }

    #[test]
    fn map_with_inline_key_treats_map_key_as_a_user_label() {
        let namespace = unique_namespace("map_inline");
        register_echo(&namespace, "a");
        let (ctx, _guard) = crate::new_context(None);

        let mut map = BTreeMap::new();
        map.insert("route1".to_string(), serde_json::json!({"handler": "a", "value": 99}));
        let field = RawModuleField::Map(map);
        let meta = LoadMeta::namespace(namespace).with_inline_key("handler");
        let loaded = ctx.load_module(&field, &meta).unwrap();
        match loaded {
            LoadedModule::Map(instances) => {
                assert_eq!(echo_value(instances.get("route1").unwrap()), 99);
            }
            _ => panic!("expected Map"),
        }
    }

    #[test]
    fn null_module_value_is_a_hard_error() {
        let namespace = unique_namespace("null");
        let (ctx, _guard) = crate::new_context(None);
        let field = RawModuleField::Single(serde_json::Value::Null);
        let meta = LoadMeta::namespace(namespace);
        let err = ctx.load_module(&field, &meta).unwrap_err();
        assert!(matches!(err, LoaderError::NullModule { .. }));
    }

    #[test]
    fn non_string_inline_key_value_is_a_hard_error() {
        let namespace = unique_namespace("bad_inline");
        register_echo(&namespace, "a");
        let (ctx, _guard) = crate::new_context(None);
        let field = RawModuleField::Single(serde_json::json!({"module": 5, "value": 1}));
        let meta = LoadMeta::namespace(namespace);
        let err = ctx.load_module(&field, &meta).unwrap_err();
        assert!(matches!(err, LoaderError::InlineKeyNotString { .. }));
    }

    #[test]
    fn take_for_gc_nulls_every_blob_and_preserves_shape() {
        let mut field = RawModuleField::Sequence(vec![serde_json::json!(1), serde_json::json!(2)]);
        let original = field.take_for_gc();
        match (&field, original) {
            (RawModuleField::Sequence(nulled), RawModuleField::Sequence(original)) => {
                assert_eq!(nulled.len(), 2);
                assert!(nulled.iter().all(|v| v.is_null()));
                assert_eq!(original, vec![serde_json::json!(1), serde_json::json!(2)]);
            }
            _ => panic!("expected Sequence"),
        }
    }
}
