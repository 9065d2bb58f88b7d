use std::sync::Arc;

use ignis_supervisor::{IdIndex, Supervisor};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use crate::error::AdminError;
use crate::path::{self, segment_to_string, AdminPath};

/// The five verbs the admin API recognizes. Anything else is a 405 at the
/// HTTP layer before it ever reaches [`AdminStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// The live admin tree plus the machinery that turns HTTP verbs
/// into JSON mutations and JSON mutations into reloaded generations.
///
/// `tree`'s top level is always `{"config": <value>}`; everything under
/// `config` is what `Supervisor::load` ultimately decodes. `raw_bytes` and
/// `id_index` cache the last canonical serialization actually handed to
/// the supervisor, so a byte-identical resubmission short-circuits (see
/// step 3) the same way `Supervisor::load` itself does for its own
/// generation-level no-op check -- the two checks guard different layers
/// (this store's view of the tree vs. the supervisor's applied config)
/// and are each meaningful on their own.
pub struct AdminStore {
    tree: RwLock<Value>,
    raw_bytes: Mutex<Vec<u8>>,
    id_index: Mutex<IdIndex>,
    supervisor: Arc<Supervisor>,
}

impl AdminStore {
    /// An empty store: `{"config": {}}`, nothing yet handed to the
    /// supervisor. Call [`AdminStore::bootstrap`] to load an initial
    /// configuration and start the first generation.
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self {
            tree: RwLock::new(Value::Object(Map::new())),
            raw_bytes: Mutex::new(Vec::new()),
            id_index: Mutex::new(IdIndex::default()),
            supervisor,
        }
    }

    /// Installs `config` as the tree and runs the change protocol against
    /// it, starting the first generation. Equivalent to a `POST /config`
    /// against a fresh store.
    pub fn bootstrap(&self, config: Value, force_reload: bool) -> Result<(), AdminError> {
        {
            let mut tree = self.tree.write();
            *tree = Value::Object(Map::from_iter([("config".to_string(), config)]));
        }
        self.apply_change(force_reload)
    }

    /// Splits a raw request path (`/config/...` or `/id/<id>/...`) into a
    /// config-relative [`AdminPath`], resolving the `/id/` alias through
    /// the cached id index.
    pub fn parse_path(&self, raw: &str) -> Result<AdminPath, AdminError> {
        let index = self.id_index.lock();
        path::parse(raw, |id| {
            index.get(id).map(|p| p.segments().iter().map(segment_to_string).collect())
        })
    }

    /// The in-memory tree mutation alone (the object-parent / sequence-
    /// parent matrix), without the change protocol. [`AdminStore::handle`]
    /// is what the HTTP server calls for real requests; it holds a single
    /// write lock across mutate-then-apply so concurrent requests fully
    /// serialize. This method and [`AdminStore::apply_change`] are
    /// exposed separately mainly so each half of the pipeline is testable
    /// in isolation.
    pub fn mutate(&self, path: &AdminPath, method: AdminMethod, body: Option<Value>) -> Result<Option<Value>, AdminError> {
        if method == AdminMethod::Get {
            let tree = self.tree.read();
            return get_at(&tree, path).cloned().map(Some);
        }
        let mut tree = self.tree.write();
        mutate_at(&mut tree, path, method, body)
    }

    /// The four-step change protocol: canonically serialize the current
    /// `config` value, short-circuit if it is byte-identical to the last
    /// applied generation (unless `force_reload`), hand it to the
    /// supervisor, and on success rebuild the id index and refresh the
    /// cached bytes. On failure the tree is rolled back to whatever was
    /// last successfully applied.
    pub fn apply_change(&self, force_reload: bool) -> Result<(), AdminError> {
        let mut tree = self.tree.write();
        let config = tree.get("config").cloned().unwrap_or(Value::Null);
        let canonical = serde_json::to_vec(&config).map_err(AdminError::Decode)?;

        if !force_reload && canonical == *self.raw_bytes.lock() {
            return Ok(());
        }

        match self.supervisor.load(&canonical, force_reload) {
            Ok(()) => {
                *self.id_index.lock() = IdIndex::build(&config);
                *self.raw_bytes.lock() = canonical;
                Ok(())
            }
            Err(err) => {
                let previous: Value = serde_json::from_slice(&self.raw_bytes.lock()).unwrap_or(Value::Null);
                if let Some(slot) = tree.get_mut("config") {
                    *slot = previous;
                }
                Err(AdminError::Supervisor(err))
            }
        }
    }

    /// Parses `raw_path`, mutates the tree, and runs the change protocol,
    /// all under one held write lock -- the atomic unit the HTTP server
    /// actually exposes. `GET` only ever takes the read lock.
    pub fn handle(
        &self,
        method: AdminMethod,
        raw_path: &str,
        body: Option<Value>,
        force_reload: bool,
    ) -> Result<Option<Value>, AdminError> {
        let path = self.parse_path(raw_path)?;
        if method == AdminMethod::Get {
            let tree = self.tree.read();
            return get_at(&tree, &path).cloned().map(Some);
        }

        let mut tree = self.tree.write();
        let snapshot = tree.clone();
        let result = mutate_at(&mut tree, &path, method, body)?;

        let config = tree.get("config").cloned().unwrap_or(Value::Null);
        let canonical = serde_json::to_vec(&config).map_err(AdminError::Decode)?;
        if !force_reload && canonical == *self.raw_bytes.lock() {
            return Ok(result);
        }

        match self.supervisor.load(&canonical, force_reload) {
            Ok(()) => {
                *self.id_index.lock() = IdIndex::build(&config);
                *self.raw_bytes.lock() = canonical;
                Ok(result)
            }
            Err(err) => {
                *tree = snapshot;
                Err(AdminError::Supervisor(err))
            }
        }
    }
}

fn require_body(body: Option<Value>) -> Result<Value, AdminError> {
    body.ok_or(AdminError::MissingBody)
}

fn parse_index(seg: &str, path: &AdminPath) -> Result<usize, AdminError> {
    seg.parse().map_err(|_| AdminError::TypeMismatch(path.clone()))
}

fn get_at<'a>(tree: &'a Value, path: &AdminPath) -> Result<&'a Value, AdminError> {
    let mut current = tree.get("config").ok_or_else(|| AdminError::PathNotFound(path.clone()))?;
    for seg in path.segments() {
        current = step(current, seg, path)?;
    }
    Ok(current)
}

fn step<'a>(current: &'a Value, seg: &str, path: &AdminPath) -> Result<&'a Value, AdminError> {
    match current {
        Value::Object(map) => map.get(seg).ok_or_else(|| AdminError::PathNotFound(path.clone())),
        Value::Array(items) => {
            let idx = parse_index(seg, path)?;
            items.get(idx).ok_or_else(|| AdminError::IndexOutOfRange(path.clone()))
        }
        _ => Err(AdminError::TypeMismatch(path.clone())),
    }
}

fn mutate_at(tree: &mut Value, path: &AdminPath, method: AdminMethod, body: Option<Value>) -> Result<Option<Value>, AdminError> {
    if path.is_empty() {
        return mutate_root(tree, method, body, path);
    }

    let config = tree.get_mut("config").expect("tree always carries a config key");
    let (parent_segs, last) = path.parent_and_last();
    let last = last.expect("non-empty path has a last segment");

    let mut current = config;
    for seg in parent_segs {
        current = match current {
            Value::Object(map) => map.get_mut(seg.as_str()).ok_or_else(|| AdminError::PathNotFound(path.clone()))?,
            Value::Array(items) => {
                let idx = parse_index(seg, path)?;
                items.get_mut(idx).ok_or_else(|| AdminError::IndexOutOfRange(path.clone()))?
            }
            _ => return Err(AdminError::TypeMismatch(path.clone())),
        };
    }

    match current {
        Value::Object(map) => mutate_object(map, last, method, body, path),
        Value::Array(items) => mutate_array(items, last, method, body, path),
        _ => Err(AdminError::TypeMismatch(path.clone())),
    }
}

fn mutate_root(tree: &mut Value, method: AdminMethod, body: Option<Value>, path: &AdminPath) -> Result<Option<Value>, AdminError> {
    match method {
        AdminMethod::Get => unreachable!("GET is handled before mutate_at is reached"),
        AdminMethod::Post | AdminMethod::Patch => {
            let slot = tree.get_mut("config").expect("tree always carries a config key");
            *slot = require_body(body)?;
            Ok(None)
        }
        AdminMethod::Put => {
            let present = tree.get("config").is_some_and(|v| !v.is_null());
            if present {
                return Err(AdminError::DuplicateKey(path.clone()));
            }
            let slot = tree.get_mut("config").expect("tree always carries a config key");
            *slot = require_body(body)?;
            Ok(None)
        }
        AdminMethod::Delete => {
            let slot = tree.get_mut("config").expect("tree always carries a config key");
            *slot = Value::Null;
            Ok(None)
        }
    }
}

fn mutate_object(map: &mut Map<String, Value>, key: &str, method: AdminMethod, body: Option<Value>, path: &AdminPath) -> Result<Option<Value>, AdminError> {
    match method {
        AdminMethod::Get => unreachable!("GET is handled before mutate_at is reached"),
        AdminMethod::Post => {
            let value = require_body(body)?;
            match map.get_mut(key) {
                Some(Value::Array(items)) => items.push(value),
                _ => {
                    map.insert(key.to_string(), value);
                }
            }
            Ok(None)
        }
        AdminMethod::Put => {
            if map.contains_key(key) {
                return Err(AdminError::DuplicateKey(path.clone()));
            }
            map.insert(key.to_string(), require_body(body)?);
            Ok(None)
        }
        AdminMethod::Patch => {
            if !map.contains_key(key) {
                return Err(AdminError::MissingKey(path.clone()));
            }
            map.insert(key.to_string(), require_body(body)?);
            Ok(None)
        }
        AdminMethod::Delete => {
            map.remove(key).ok_or_else(|| AdminError::PathNotFound(path.clone()))?;
            Ok(None)
        }
    }
}

fn mutate_array(items: &mut Vec<Value>, seg: &str, method: AdminMethod, body: Option<Value>, path: &AdminPath) -> Result<Option<Value>, AdminError> {
    match method {
        AdminMethod::Get => unreachable!("GET is handled before mutate_at is reached"),
        AdminMethod::Post => {
            items.push(require_body(body)?);
            Ok(None)
        }
        AdminMethod::Put => {
            let idx = parse_index(seg, path)?;
            if idx > items.len() {
                return Err(AdminError::IndexOutOfRange(path.clone()));
            }
            items.insert(idx, require_body(body)?);
            Ok(None)
        }
        AdminMethod::Patch => {
            let idx = parse_index(seg, path)?;
            let slot = items.get_mut(idx).ok_or_else(|| AdminError::IndexOutOfRange(path.clone()))?;
            *slot = require_body(body)?;
            Ok(None)
        }
        AdminMethod::Delete => {
            let idx = parse_index(seg, path)?;
            if idx >= items.len() {
                return Err(AdminError::IndexOutOfRange(path.clone()));
            }
            items.remove(idx);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ignis_listener::{DatagramPool, ListenerPool};
    use ignis_supervisor::Supervisor;
    use serde_json::json;

    use super::*;

    fn store() -> AdminStore {
        AdminStore::new(Arc::new(Supervisor::new(Arc::new(ListenerPool::new()), Arc::new(DatagramPool::new()))))
    }

    #[test]
    fn bootstrap_then_get_round_trips_a_scalar() {
        let s = store();
        s.bootstrap(json!({"logging": {}, "apps": {}}), false).unwrap();
        let path = s.parse_path("/config/logging").unwrap();
        let value = s.mutate(&path, AdminMethod::Get, None).unwrap();
        assert_eq!(value, Some(json!({})));
    }

    #[test]
    fn put_on_object_parent_requires_absent_key() {
        let s = store();
        s.bootstrap(json!({"apps": {}}), false).unwrap();
        let path = s.parse_path("/config/apps/http").unwrap();
        s.mutate(&path, AdminMethod::Put, Some(json!({"servers": {}}))).unwrap();
        let err = s.mutate(&path, AdminMethod::Put, Some(json!({}))).unwrap_err();
        assert!(matches!(err, AdminError::DuplicateKey(_)));
    }

    #[test]
    fn patch_on_object_parent_requires_present_key() {
        let s = store();
        s.bootstrap(json!({"apps": {}}), false).unwrap();
        let path = s.parse_path("/config/apps/missing").unwrap();
        let err = s.mutate(&path, AdminMethod::Patch, Some(json!({}))).unwrap_err();
        assert!(matches!(err, AdminError::MissingKey(_)));
    }

    #[test]
    fn post_on_existing_array_appends() {
        let s = store();
        s.bootstrap(json!({"apps": {"http": {"servers": []}}}), false).unwrap();
        let path = s.parse_path("/config/apps/http/servers").unwrap();
        s.mutate(&path, AdminMethod::Post, Some(json!({"id": 1}))).unwrap();
        s.mutate(&path, AdminMethod::Post, Some(json!({"id": 2}))).unwrap();
        let value = s.mutate(&path, AdminMethod::Get, None).unwrap().unwrap();
        assert_eq!(value, json!([{"id": 1}, {"id": 2}]));
    }

    #[test]
    fn post_on_non_sequence_key_sets_it() {
        let s = store();
        s.bootstrap(json!({"apps": {}}), false).unwrap();
        let path = s.parse_path("/config/apps/http").unwrap();
        s.mutate(&path, AdminMethod::Post, Some(json!({"servers": {}}))).unwrap();
        let value = s.mutate(&path, AdminMethod::Get, None).unwrap().unwrap();
        assert_eq!(value, json!({"servers": {}}));
    }

    #[test]
    fn put_into_sequence_inserts_at_index() {
        let s = store();
        s.bootstrap(json!({"apps": {"list": ["a", "c"]}}), false).unwrap();
        let path = s.parse_path("/config/apps/list/1").unwrap();
        s.mutate(&path, AdminMethod::Put, Some(json!("b"))).unwrap();
        let value = s.mutate(&s.parse_path("/config/apps/list").unwrap(), AdminMethod::Get, None).unwrap().unwrap();
        assert_eq!(value, json!(["a", "b", "c"]));
    }

    #[test]
    fn put_into_sequence_at_len_appends() {
        let s = store();
        s.bootstrap(json!({"apps": {"list": ["a"]}}), false).unwrap();
        let path = s.parse_path("/config/apps/list/1").unwrap();
        s.mutate(&path, AdminMethod::Put, Some(json!("b"))).unwrap();
        let value = s.mutate(&s.parse_path("/config/apps/list").unwrap(), AdminMethod::Get, None).unwrap().unwrap();
        assert_eq!(value, json!(["a", "b"]));
    }

    #[test]
    fn put_into_sequence_out_of_range_errors() {
        let s = store();
        s.bootstrap(json!({"apps": {"list": ["a"]}}), false).unwrap();
        let path = s.parse_path("/config/apps/list/5").unwrap();
        let err = s.mutate(&path, AdminMethod::Put, Some(json!("z"))).unwrap_err();
        assert!(matches!(err, AdminError::IndexOutOfRange(_)));
    }

    #[test]
    fn delete_from_sequence_removes_by_index() {
        let s = store();
        s.bootstrap(json!({"apps": {"list": ["a", "b", "c"]}}), false).unwrap();
        let path = s.parse_path("/config/apps/list/1").unwrap();
        s.mutate(&path, AdminMethod::Delete, None).unwrap();
        let value = s.mutate(&s.parse_path("/config/apps/list").unwrap(), AdminMethod::Get, None).unwrap().unwrap();
        assert_eq!(value, json!(["a", "c"]));
    }

    #[test]
    fn non_numeric_index_into_sequence_is_type_mismatch() {
        let s = store();
        s.bootstrap(json!({"apps": {"list": ["a"]}}), false).unwrap();
        let path = s.parse_path("/config/apps/list/notanumber").unwrap();
        let err = s.mutate(&path, AdminMethod::Get, None).unwrap_err();
        assert!(matches!(err, AdminError::TypeMismatch(_)));
    }

    #[test]
    fn traversal_into_scalar_is_type_mismatch() {
        let s = store();
        s.bootstrap(json!({"apps": {"flag": true}}), false).unwrap();
        let path = s.parse_path("/config/apps/flag/nested").unwrap();
        let err = s.mutate(&path, AdminMethod::Get, None).unwrap_err();
        assert!(matches!(err, AdminError::TypeMismatch(_)));
    }

    #[test]
    fn get_missing_key_is_path_not_found() {
        let s = store();
        s.bootstrap(json!({"apps": {}}), false).unwrap();
        let path = s.parse_path("/config/apps/missing").unwrap();
        let err = s.mutate(&path, AdminMethod::Get, None).unwrap_err();
        assert!(matches!(err, AdminError::PathNotFound(_)));
    }

    #[test]
    fn failed_mutation_leaves_tree_untouched_by_handle() {
        let s = store();
        s.bootstrap(json!({"apps": {"list": ["a"]}}), false).unwrap();
        let err = s.handle(AdminMethod::Put, "/config/apps/list/5", Some(json!("z")), false).unwrap_err();
        assert!(matches!(err, AdminError::IndexOutOfRange(_)));
        let value = s.handle(AdminMethod::Get, "/config/apps/list", None, false).unwrap();
        assert_eq!(value, Some(json!(["a"])));
    }

    #[test]
    fn id_alias_resolves_to_the_same_value_as_its_config_path() {
        let s = store();
        s.bootstrap(
            json!({"apps": {"http": {"servers": {"srv0": {"@id": "srv0", "listen": [":80"]}}}}}),
            false,
        )
        .unwrap();
        let by_config = s.handle(AdminMethod::Get, "/config/apps/http/servers/srv0/listen", None, false).unwrap();
        let by_id = s.handle(AdminMethod::Get, "/id/srv0/listen", None, false).unwrap();
        assert_eq!(by_config, by_id);
    }

    #[test]
    fn change_protocol_no_op_on_byte_identical_resubmission() {
        let s = store();
        s.bootstrap(json!({"apps": {}}), false).unwrap();
        let before = s.handle(AdminMethod::Get, "/config", None, false).unwrap();
        s.handle(AdminMethod::Post, "/config/apps", Some(json!({})), false).unwrap();
        let after = s.handle(AdminMethod::Get, "/config", None, false).unwrap();
        assert_eq!(before, after);
    }
}
