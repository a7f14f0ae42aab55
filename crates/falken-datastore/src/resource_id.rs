//! Hierarchical resource identifiers.
//!
//! A resource id is an ordered list of `(collection, id)` pairs. The last
//! pair names the resource itself, the preceding ones its ancestors:
//!
//! ```text
//! projects/p1/brains/b1/sessions/s1/episodes/e1/chunks/0
//! ```
//!
//! Id segments may contain `*` and `{a,b,c}` to address many resources at
//! once; such ids are patterns and are only valid for listing.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DataStoreError, DataStoreResult};
use crate::namespace::glob::is_pattern;

/// Characters never allowed inside an id segment.
///
/// Besides the separator and glob syntax this covers every printable ASCII
/// character object stores escape in keys; an escaped key no longer matches
/// its own id when listed.
const FORBIDDEN_CHARS: [char; 14] = [
    '/', '\\', '?', '[', ']', '~', '%', '#', '|', '<', '>', '^', '"', '`',
];

/// The closed set of collections in the resource hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Projects,
    Brains,
    Snapshots,
    Sessions,
    Episodes,
    Chunks,
    OnlineEvaluations,
    Assignments,
    Models,
    SerializedModels,
    OfflineEvaluations,
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::Projects,
        Collection::Brains,
        Collection::Snapshots,
        Collection::Sessions,
        Collection::Episodes,
        Collection::Chunks,
        Collection::OnlineEvaluations,
        Collection::Assignments,
        Collection::Models,
        Collection::SerializedModels,
        Collection::OfflineEvaluations,
    ];

    /// Path segment naming this collection.
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Brains => "brains",
            Collection::Snapshots => "snapshots",
            Collection::Sessions => "sessions",
            Collection::Episodes => "episodes",
            Collection::Chunks => "chunks",
            Collection::OnlineEvaluations => "online_evaluations",
            Collection::Assignments => "assignments",
            Collection::Models => "models",
            Collection::SerializedModels => "serialized_models",
            Collection::OfflineEvaluations => "offline_evaluations",
        }
    }

    /// The collection this one nests under, `None` for the root.
    pub fn parent(self) -> Option<Collection> {
        match self {
            Collection::Projects => None,
            Collection::Brains => Some(Collection::Projects),
            Collection::Snapshots | Collection::Sessions => Some(Collection::Brains),
            Collection::Episodes
            | Collection::OnlineEvaluations
            | Collection::Assignments
            | Collection::Models
            | Collection::SerializedModels => Some(Collection::Sessions),
            Collection::Chunks => Some(Collection::Episodes),
            Collection::OfflineEvaluations => Some(Collection::Models),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = DataStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DataStoreError::UnsupportedCollection {
                collection: s.to_string(),
            })
    }
}

/// Canonical hierarchical resource identifier.
///
/// Equality and ordering follow the canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    parts: Vec<(Collection, String)>,
}

impl ResourceId {
    /// Build an id from ordered `(collection, id)` pairs.
    ///
    /// The chain must start at `projects` and follow the hierarchy.
    pub fn new<I, S>(parts: I) -> DataStoreResult<Self>
    where
        I: IntoIterator<Item = (Collection, S)>,
        S: Into<String>,
    {
        let parts: Vec<(Collection, String)> =
            parts.into_iter().map(|(c, id)| (c, id.into())).collect();
        let candidate = Self { parts };
        candidate.validate()?;
        Ok(candidate)
    }

    /// Start a builder addressing resources by named key values.
    pub fn builder() -> ResourceIdBuilder {
        ResourceIdBuilder::default()
    }

    fn validate(&self) -> DataStoreResult<()> {
        let invalid = |reason: String| DataStoreError::InvalidResourceId {
            resource_id: self.to_string(),
            reason,
        };

        if self.parts.is_empty() {
            return Err(invalid("resource id has no parts".to_string()));
        }

        let mut expected_parent = None;
        for (collection, id) in &self.parts {
            if collection.parent() != expected_parent {
                return Err(invalid(format!(
                    "collection '{}' cannot follow {}",
                    collection,
                    expected_parent.map_or("the root".to_string(), |p| format!("'{}'", p))
                )));
            }
            if id.is_empty() {
                return Err(invalid(format!("empty id for collection '{}'", collection)));
            }
            if id.contains(FORBIDDEN_CHARS) {
                return Err(invalid(format!("id '{}' contains a forbidden character", id)));
            }
            if !id.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
                return Err(invalid(format!(
                    "id '{}' must be printable ASCII",
                    id.escape_debug()
                )));
            }
            if id == "." || id == ".." {
                return Err(invalid(format!("'{}' is not a valid id", id)));
            }
            expected_parent = Some(*collection);
        }
        Ok(())
    }

    /// The `(collection, id)` pairs, root first.
    pub fn parts(&self) -> &[(Collection, String)] {
        &self.parts
    }

    /// The collection of the addressed resource.
    pub fn collection(&self) -> Collection {
        self.last().0
    }

    /// The id of the addressed resource within its collection.
    pub fn id(&self) -> &str {
        &self.last().1
    }

    fn last(&self) -> &(Collection, String) {
        // Construction guarantees at least one part.
        &self.parts[self.parts.len() - 1]
    }

    /// Id of the given ancestor (or own) collection, if present.
    pub fn get(&self, collection: Collection) -> Option<&str> {
        self.parts
            .iter()
            .find(|(c, _)| *c == collection)
            .map(|(_, id)| id.as_str())
    }

    /// The identifier of the parent resource, `None` for a project.
    pub fn parent(&self) -> Option<ResourceId> {
        (self.parts.len() > 1).then(|| ResourceId {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }

    /// True if any segment contains wildcards or alternations.
    pub fn is_pattern(&self) -> bool {
        self.parts.iter().any(|(_, id)| is_pattern(id))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (collection, id)) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}/{}", collection, id)?;
        }
        Ok(())
    }
}

impl FromStr for ResourceId {
    type Err = DataStoreError;

    /// Parse the canonical form `collection/id[/collection/id...]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('/').collect();
        if segments.len() % 2 != 0 {
            return Err(DataStoreError::InvalidResourceId {
                resource_id: s.to_string(),
                reason: "expected alternating collection and id segments".to_string(),
            });
        }

        let parts = segments
            .chunks(2)
            .map(|pair| Ok((pair[0].parse::<Collection>()?, pair[1])))
            .collect::<DataStoreResult<Vec<_>>>()?;
        ResourceId::new(parts)
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

/// Builds a [`ResourceId`] from named key values.
///
/// Keys are emitted in hierarchy order regardless of call order:
///
/// ```
/// use falken_datastore::ResourceId;
///
/// let id = ResourceId::builder()
///     .brain("b1")
///     .project("p1")
///     .snapshot("*")
///     .build()
///     .unwrap();
/// assert_eq!(id.to_string(), "projects/p1/brains/b1/snapshots/*");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResourceIdBuilder {
    values: Vec<(Collection, String)>,
}

impl ResourceIdBuilder {
    pub fn project(self, id: impl Into<String>) -> Self {
        self.with(Collection::Projects, id)
    }

    pub fn brain(self, id: impl Into<String>) -> Self {
        self.with(Collection::Brains, id)
    }

    pub fn snapshot(self, id: impl Into<String>) -> Self {
        self.with(Collection::Snapshots, id)
    }

    pub fn session(self, id: impl Into<String>) -> Self {
        self.with(Collection::Sessions, id)
    }

    pub fn episode(self, id: impl Into<String>) -> Self {
        self.with(Collection::Episodes, id)
    }

    pub fn chunk(self, id: impl Into<String>) -> Self {
        self.with(Collection::Chunks, id)
    }

    pub fn online_evaluation(self, id: impl Into<String>) -> Self {
        self.with(Collection::OnlineEvaluations, id)
    }

    pub fn assignment(self, id: impl Into<String>) -> Self {
        self.with(Collection::Assignments, id)
    }

    pub fn model(self, id: impl Into<String>) -> Self {
        self.with(Collection::Models, id)
    }

    pub fn serialized_model(self, id: impl Into<String>) -> Self {
        self.with(Collection::SerializedModels, id)
    }

    pub fn offline_evaluation(self, id: impl Into<String>) -> Self {
        self.with(Collection::OfflineEvaluations, id)
    }

    /// Set the id for `collection`, replacing any earlier value.
    pub fn with(mut self, collection: Collection, id: impl Into<String>) -> Self {
        self.values.retain(|(c, _)| *c != collection);
        self.values.push((collection, id.into()));
        self
    }

    pub fn build(mut self) -> DataStoreResult<ResourceId> {
        self.values.sort_by_key(|(c, _)| *c);
        ResourceId::new(self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_string() {
        let id = ResourceId::builder()
            .project("p1")
            .brain("b1")
            .session("s1")
            .model("m1")
            .build()
            .unwrap();
        assert_eq!(id.to_string(), "projects/p1/brains/b1/sessions/s1/models/m1");
        assert_eq!(id.collection(), Collection::Models);
        assert_eq!(id.id(), "m1");
        assert_eq!(id.get(Collection::Brains), Some("b1"));
    }

    #[test]
    fn test_parse_roundtrip() {
        let s = "projects/p1/brains/b1/sessions/s1/episodes/e1/chunks/3";
        let id: ResourceId = s.parse().unwrap();
        assert_eq!(id.to_string(), s);
        assert_eq!(id.parts().len(), 5);
    }

    #[test]
    fn test_parse_rejects_unknown_collection() {
        let err = "projects/p1/widgets/w1".parse::<ResourceId>().unwrap_err();
        assert!(matches!(err, DataStoreError::UnsupportedCollection { .. }));
    }

    #[test]
    fn test_parse_rejects_odd_segments() {
        let err = "projects/p1/brains".parse::<ResourceId>().unwrap_err();
        assert!(matches!(err, DataStoreError::InvalidResourceId { .. }));
    }

    #[test]
    fn test_hierarchy_is_enforced() {
        let err = ResourceId::new([(Collection::Projects, "p1"), (Collection::Sessions, "s1")])
            .unwrap_err();
        assert!(matches!(err, DataStoreError::InvalidResourceId { .. }));

        let err = ResourceId::builder().brain("b1").build().unwrap_err();
        assert!(matches!(err, DataStoreError::InvalidResourceId { .. }));
    }

    #[test]
    fn test_segment_validation() {
        for bad in ["", "a/b", "a?", "[ab]"] {
            let result = ResourceId::builder().project(bad).build();
            assert!(result.is_err(), "expected {:?} to be rejected", bad);
        }
    }

    #[test]
    fn test_key_escaped_segments_are_rejected() {
        for bad in [
            "a~b", "100%", "x#y", "p|q", "<p>", "a^b", "say\"hi\"", "`p`", ".", "..", "caf\u{e9}",
            "tab\there", "line\n",
        ] {
            let err = ResourceId::builder().project(bad).build().unwrap_err();
            assert!(
                matches!(err, DataStoreError::InvalidResourceId { .. }),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_common_id_characters_are_accepted() {
        for good in [
            "0f8c2b1e-3a4d-4c5e-9f60-7a8b9c0d1e2f",
            "model_v1.2",
            "run:7@host",
            "with space",
            "...",
        ] {
            let id = ResourceId::builder().project(good).build().unwrap();
            assert_eq!(id.id(), good);
        }
    }

    #[test]
    fn test_pattern_detection() {
        let concrete = ResourceId::builder().project("p1").brain("b1").build().unwrap();
        assert!(!concrete.is_pattern());

        let glob = ResourceId::builder()
            .project("p1")
            .brain("b1")
            .session("{s1,s2}")
            .build()
            .unwrap();
        assert!(glob.is_pattern());
        assert_eq!(glob.to_string(), "projects/p1/brains/b1/sessions/{s1,s2}");
    }

    #[test]
    fn test_parent() {
        let id: ResourceId = "projects/p1/brains/b1".parse().unwrap();
        assert_eq!(id.parent().unwrap().to_string(), "projects/p1");
        assert!(id.parent().unwrap().parent().is_none());
    }

    #[test]
    fn test_ordering_is_by_canonical_string() {
        let a: ResourceId = "projects/p1/brains/b10".parse().unwrap();
        let b: ResourceId = "projects/p1/brains/b2".parse().unwrap();
        assert!(a < b);
    }
}
