//! File naming conventions for stored resources.
//!
//! # Layout
//!
//! ```text
//! {collection}/{id}/.../{collection}/{id}/resource.{timestamp_micros:016}
//! ```
//!
//! Each resource directory holds exactly one version file, named by the
//! resource's creation timestamp. Zero padding keeps lexical and numeric
//! order in step for any timestamp before the year 2286.

use crate::resource_id::ResourceId;

pub const RESOURCE_PREFIX: &str = "resource.";

/// File name for a version created at `timestamp_micros`.
pub fn resource_file_name(timestamp_micros: i64) -> String {
    format!("{}{:016}", RESOURCE_PREFIX, timestamp_micros)
}

/// Full path of the version file of `id`.
pub fn resource_path(id: &ResourceId, timestamp_micros: i64) -> String {
    format!("{}/{}", id, resource_file_name(timestamp_micros))
}

/// Glob matching the version files of every resource matched by `id`.
pub fn resource_glob(id: &ResourceId) -> String {
    format!("{}/{}*", id, RESOURCE_PREFIX)
}

/// Split a version file path into its resource id string and file name.
pub fn split_resource_path(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('/')
        .filter(|(_, file_name)| file_name.starts_with(RESOURCE_PREFIX))
}

/// Timestamp encoded in a version file name.
pub fn parse_timestamp(file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix(RESOURCE_PREFIX)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

/// Resource id and timestamp of a version file path.
///
/// Useful for filtering file callbacks down to one collection.
pub fn parse_resource_path(path: &str) -> Option<(ResourceId, i64)> {
    let (id, file_name) = split_resource_path(path)?;
    let timestamp = parse_timestamp(file_name)?;
    let id = id.parse().ok()?;
    Some((id, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_id::Collection;

    #[test]
    fn test_file_name_is_zero_padded() {
        assert_eq!(resource_file_name(42), "resource.0000000000000042");
        assert_eq!(
            resource_file_name(1_618_000_000_000_000),
            "resource.1618000000000000"
        );
    }

    #[test]
    fn test_resource_path() {
        let id: ResourceId = "projects/p1/brains/b1".parse().unwrap();
        assert_eq!(
            resource_path(&id, 7),
            "projects/p1/brains/b1/resource.0000000000000007"
        );
        assert_eq!(resource_glob(&id), "projects/p1/brains/b1/resource.*");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("resource.0000000000000042"), Some(42));
        assert_eq!(parse_timestamp("resource.tmp"), None);
        assert_eq!(parse_timestamp("resource."), None);
        assert_eq!(parse_timestamp("resource.-5"), None);
        assert_eq!(parse_timestamp("other.0000000000000042"), None);
    }

    #[test]
    fn test_parse_resource_path() {
        let (id, ts) =
            parse_resource_path("projects/p1/brains/b1/sessions/s1/resource.0000000000000009")
                .unwrap();
        assert_eq!(id.collection(), Collection::Sessions);
        assert_eq!(ts, 9);

        assert!(parse_resource_path("projects/p1/notes.txt").is_none());
        assert!(parse_resource_path("resource.0000000000000009").is_none());
    }
}
