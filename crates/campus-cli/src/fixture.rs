use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use campus_core::models::Identity;
use campus_core::store::{Collection, MemoryStore};

/// A signed-in identity plus seed documents, loaded from a JSON file.
///
/// ```json
/// {
///   "identity": {"id": "me", "role": "student", "collegeId": "A"},
///   "collections": {"posts": [{"id": "p1", "authorId": "ann", "timestamp": 1}]}
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub identity: Identity,
    /// Collection name -> documents
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<Value>>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse fixture file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize fixture")
    }

    /// Insert every document into `store`. Returns how many were inserted.
    pub fn seed(&self, store: &MemoryStore) -> Result<usize> {
        let mut inserted = 0;
        for (name, documents) in &self.collections {
            let Some(collection) = Collection::from_name(name) else {
                bail!("unknown collection '{}' in fixture", name);
            };
            for document in documents {
                let Value::Object(document) = document else {
                    bail!("{} contains a non-object document", name);
                };
                store
                    .insert(collection, document.clone())
                    .with_context(|| format!("Failed to seed {}", name))?;
                inserted += 1;
            }
        }
        tracing::debug!("fixture: seeded {} documents", inserted);
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::models::Role;

    #[test]
    fn test_parse_and_seed() {
        let json = r#"{
            "identity": {"id": "me", "role": "faculty", "collegeId": "A", "department": "cs"},
            "collections": {
                "posts": [{"id": "p1", "authorId": "ann", "collegeId": "A", "timestamp": 5}],
                "departmentChannels": [
                    {"id": "d1", "collegeId": "A", "department": "cs", "name": "CS"}
                ]
            }
        }"#;
        let fixture = Fixture::from_json(json).unwrap();
        assert_eq!(fixture.identity.role, Role::Faculty);
        assert!(fixture.identity.approved);

        let store = MemoryStore::new();
        assert_eq!(fixture.seed(&store).unwrap(), 2);
        assert_eq!(store.len(Collection::Posts), 1);
        assert_eq!(store.len(Collection::DepartmentChannels), 1);
    }

    #[test]
    fn test_unknown_collection_is_rejected() {
        let json = r#"{
            "identity": {"id": "me", "role": "student"},
            "collections": {"memes": [{}]}
        }"#;
        let fixture = Fixture::from_json(json).unwrap();
        let err = fixture.seed(&MemoryStore::new()).unwrap_err();
        assert!(err.to_string().contains("memes"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        std::fs::write(&path, r#"{"identity": {"id": "me", "role": "super_admin"}}"#).unwrap();

        let fixture = Fixture::load(&path).unwrap();
        assert!(fixture.identity.role.is_global());
        assert!(fixture.collections.is_empty());
    }
}
