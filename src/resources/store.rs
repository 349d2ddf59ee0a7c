//! In-memory document collections backing the default sub-routers.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Map, Value};

/// Field holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// A schema-less collection of JSON documents keyed by id.
#[derive(Debug, Default)]
pub struct Collection {
    docs: DashMap<String, Map<String, Value>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new document, assigning `_id` and `createdAt`.
    pub fn create(&self, mut doc: Map<String, Value>) -> Map<String, Value> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        doc.insert("createdAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        self.docs.insert(id, doc.clone());
        doc
    }

    pub fn get(&self, id: &str) -> Option<Map<String, Value>> {
        self.docs.get(id).map(|d| d.value().clone())
    }

    /// All documents, oldest first.
    pub fn list(&self) -> Vec<Map<String, Value>> {
        let mut docs: Vec<_> = self.docs.iter().map(|d| d.value().clone()).collect();
        docs.sort_by(|a, b| created_at(a).cmp(created_at(b)));
        docs
    }

    /// Shallow-merge `changes` into the document. `_id` cannot change.
    pub fn update(&self, id: &str, changes: Map<String, Value>) -> Option<Map<String, Value>> {
        let mut doc = self.docs.get_mut(id)?;
        for (key, value) in changes {
            if key != ID_FIELD {
                doc.insert(key, value);
            }
        }
        doc.insert("updatedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        Some(doc.value().clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        self.docs.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

fn created_at(doc: &Map<String, Value>) -> &str {
    doc.get("createdAt").and_then(Value::as_str).unwrap_or_default()
}

/// Every collection, by resource name. Shared by the default sub-routers.
#[derive(Debug, Clone, Default)]
pub struct Store {
    collections: Arc<BTreeMap<&'static str, Arc<Collection>>>,
}

impl Store {
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            collections: Arc::new(
                names
                    .iter()
                    .map(|name| (*name, Arc::new(Collection::new())))
                    .collect(),
            ),
        }
    }

    pub fn collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.get(name).cloned()
    }

    /// Document count per collection.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        self.collections
            .iter()
            .map(|(name, c)| (*name, c.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_assigns_id() {
        let c = Collection::new();
        let created = c.create(doc(json!({"name": "Teff"})));
        let id = created[ID_FIELD].as_str().unwrap();

        assert_eq!(c.get(id).unwrap()["name"], "Teff");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_update_merges_and_keeps_id() {
        let c = Collection::new();
        let created = c.create(doc(json!({"name": "Sugar", "unit": "kg"})));
        let id = created[ID_FIELD].as_str().unwrap().to_string();

        let updated = c
            .update(&id, doc(json!({"unit": "quintal", "_id": "hijack"})))
            .unwrap();
        assert_eq!(updated["unit"], "quintal");
        assert_eq!(updated["name"], "Sugar");
        assert_eq!(updated[ID_FIELD], id.as_str());
        assert!(c.update("missing", Map::new()).is_none());
    }

    #[test]
    fn test_delete() {
        let c = Collection::new();
        let created = c.create(Map::new());
        let id = created[ID_FIELD].as_str().unwrap();
        assert!(c.delete(id));
        assert!(!c.delete(id));
        assert!(c.is_empty());
    }

    #[test]
    fn test_store_counts() {
        let store = Store::new(&["users", "alerts"]);
        store.collection("users").unwrap().create(Map::new());
        assert_eq!(store.counts().get("users"), Some(&1));
        assert_eq!(store.counts().get("alerts"), Some(&0));
        assert!(store.collection("nope").is_none());
    }
}
