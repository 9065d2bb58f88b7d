use std::collections::BTreeMap;

use serde_json::Value;

/// One step of a path into a JSON tree: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A fully-resolved path into the config tree, rooted at the top-level
/// `config` key (the segment list does not itself include `"config"`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonPath(pub Vec<PathSegment>);

impl JsonPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Navigates `root` by this path's segments, returning `None` if any
    /// step traverses into a scalar, or indexes out of range.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.0 {
            current = match (segment, current) {
                (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
                (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = root;
        for segment in &self.0 {
            current = match (segment, current) {
                (PathSegment::Key(k), Value::Object(map)) => map.get_mut(k)?,
                (PathSegment::Index(i), Value::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl std::fmt::Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(k) => write!(f, "/{k}")?,
                PathSegment::Index(i) => write!(f, "/{i}")?,
            }
        }
        Ok(())
    }
}

/// Maps an `@id` value (string or number, always stored stringified) to
/// the path of the object that carried it.
#[derive(Debug, Clone, Default)]
pub struct IdIndex(BTreeMap<String, JsonPath>);

impl IdIndex {
    pub fn get(&self, id: &str) -> Option<&JsonPath> {
        self.0.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Walks `root` recursively, recording the path of every object that
    /// carries an `@id` field. Run fresh on every mutation per the
    /// distilled spec's change protocol ("rebuild the id index").
    pub fn build(root: &Value) -> Self {
        let mut index = BTreeMap::new();
        let mut path = Vec::new();
        walk(root, &mut path, &mut index);
        Self(index)
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn walk(value: &Value, path: &mut Vec<PathSegment>, index: &mut BTreeMap<String, JsonPath>) {
    match value {
        Value::Object(map) => {
            if let Some(id) = map.get("@id").and_then(id_to_string) {
                index.insert(id, JsonPath::new(path.clone()));
            }
            for (key, child) in map {
                if key == "@id" {
                    continue;
                }
                path.push(PathSegment::Key(key.clone()));
                walk(child, path, index);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(PathSegment::Index(i));
                walk(child, path, index);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Recursively removes every `@id` field from `value` in place. `@id` is
/// admin-store metadata, not module configuration, so it must not reach a
/// module's strict (`deny_unknown_fields`) decode.
pub fn strip_ids(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("@id");
            for child in map.values_mut() {
                strip_ids(child);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_ids(child);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_indexes_nested_ids_and_skips_bare_field() {
        let tree = json!({
            "config": {
                "apps": {
                    "x": {"@id": "alpha", "v": 1}
                }
            }
        });
        let index = IdIndex::build(&tree);
        let path = index.get("alpha").unwrap();
        assert_eq!(path.resolve(&tree).unwrap(), &json!({"@id": "alpha", "v": 1}));
    }

    #[test]
    fn strip_ids_removes_every_occurrence() {
        let mut tree = json!({"a": {"@id": "1", "b": [{"@id": "2"}]}});
        strip_ids(&mut tree);
        assert_eq!(tree, json!({"a": {"b": [{}]}}));
    }

    #[test]
    fn numeric_id_is_stringified() {
        let tree = json!({"x": {"@id": 7, "v": true}});
        let index = IdIndex::build(&tree);
        assert!(index.get("7").is_some());
    }
}
