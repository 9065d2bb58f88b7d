use std::fmt;

use ignis_supervisor::PathSegment;

/// A slash-separated path into the admin tree, relative to the top-level
/// `config` key.
///
/// Segments are plain strings rather than `ignis_supervisor::JsonPath`'s
/// typed `Key`/`Index` pair: a path parsed out of a URL does not know in
/// advance whether a given step indexes an object or an array, that is
/// only decidable once the mutation walks the live tree and sees what is
/// actually sitting there.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdminPath(Vec<String>);

impl AdminPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parent_and_last(&self) -> (&[String], Option<&str>) {
        match self.0.split_last() {
            Some((last, parent)) => (parent, Some(last.as_str())),
            None => (&[], None),
        }
    }
}

impl fmt::Display for AdminPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config")?;
        for seg in &self.0 {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

pub(crate) fn segment_to_string(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Key(k) => k.clone(),
        PathSegment::Index(i) => i.to_string(),
    }
}

/// Parses the part of a request path after the method-independent prefix:
/// either `config/...` or `id/<id>/...`. `lookup_id` resolves an `@id` to
/// its base path (as plain strings); a `None` means the id is unknown.
pub(crate) fn parse(
    raw: &str,
    lookup_id: impl FnOnce(&str) -> Option<Vec<String>>,
) -> Result<AdminPath, crate::error::AdminError> {
    let trimmed = raw.trim_start_matches('/');
    let mut parts = trimmed.split('/').filter(|s| !s.is_empty());
    match parts.next() {
        Some("config") => Ok(AdminPath(parts.map(str::to_string).collect())),
        Some("id") => {
            let id = parts
                .next()
                .ok_or_else(|| crate::error::AdminError::UnknownId(String::new()))?;
            let mut segments = lookup_id(id)
                .ok_or_else(|| crate::error::AdminError::UnknownId(id.to_string()))?;
            segments.extend(parts.map(str::to_string));
            Ok(AdminPath(segments))
        }
        _ => Err(crate::error::AdminError::PathNotFound(AdminPath::default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_path_into_segments() {
        let path = parse("/config/apps/http/servers", |_| None).unwrap();
        assert_eq!(path.segments(), &["apps", "http", "servers"]);
    }

    #[test]
    fn parses_root_config_as_empty_path() {
        let path = parse("/config", |_| None).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn resolves_id_alias_and_appends_remaining_segments() {
        let path = parse("/id/srv0/listen", |id| {
            assert_eq!(id, "srv0");
            Some(vec!["apps".to_string(), "http".to_string(), "servers".to_string(), "0".to_string()])
        })
        .unwrap();
        assert_eq!(path.segments(), &["apps", "http", "servers", "0", "listen"]);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let err = parse("/id/missing", |_| None).unwrap_err();
        assert!(matches!(err, crate::error::AdminError::UnknownId(id) if id == "missing"));
    }

    #[test]
    fn display_echoes_the_config_relative_path() {
        let path = AdminPath::new(vec!["apps".to_string(), "0".to_string()]);
        assert_eq!(path.to_string(), "config/apps/0");
    }
}
