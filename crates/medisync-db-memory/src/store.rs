use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use medisync_storage::{Collection, DocumentStore, Mutation, Query, StorageError};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::trace;

type Documents = IndexMap<String, Value>;

/// In-memory document store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: DashMap<Collection, Arc<RwLock<Documents>>>,
    sequences: DashMap<String, u64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let collections = DashMap::new();
        for collection in Collection::ALL {
            collections.insert(collection, Arc::new(RwLock::new(Documents::new())));
        }
        Self {
            collections,
            sequences: DashMap::new(),
        }
    }

    fn documents(&self, collection: Collection) -> Arc<RwLock<Documents>> {
        self.collections.entry(collection).or_default().value().clone()
    }
}

fn ensure_object(doc: &Value) -> Result<(), StorageError> {
    if doc.is_object() {
        Ok(())
    } else {
        Err(StorageError::invalid_document("document must be a JSON object"))
    }
}

fn set_id(doc: &mut Value, id: &str) {
    if let Some(map) = doc.as_object_mut() {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
}

fn unique_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_lowercase()),
        other => Some(other.to_string()),
    }
}

/// Reject `doc` if one of the collection's unique fields clashes with a
/// different document. Must be called with the collection write lock held.
fn check_unique(
    collection: Collection,
    docs: &Documents,
    id: &str,
    doc: &Value,
) -> Result<(), StorageError> {
    for field in collection.unique_fields() {
        let Some(wanted) = doc.get(*field).and_then(unique_key) else {
            continue;
        };
        let clash = docs.iter().any(|(other_id, other)| {
            other_id != id && other.get(*field).and_then(unique_key).as_ref() == Some(&wanted)
        });
        if clash {
            let shown = doc
                .get(*field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(wanted);
            return Err(StorageError::unique_violation(
                collection.as_str(),
                *field,
                shown,
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, collection: Collection, mut doc: Value) -> Result<Value, StorageError> {
        ensure_object(&doc)?;
        let id = match doc.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        set_id(&mut doc, &id);

        let documents = self.documents(collection);
        let mut docs = documents.write().await;
        if docs.contains_key(&id) {
            return Err(StorageError::already_exists(collection.as_str(), id));
        }
        check_unique(collection, &docs, &id, &doc)?;
        docs.insert(id.clone(), doc.clone());
        trace!(collection = %collection, id = %id, "document inserted");
        Ok(doc)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError> {
        let documents = self.documents(collection);
        let docs = documents.read().await;
        Ok(docs.get(id).cloned())
    }

    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        mut doc: Value,
    ) -> Result<Value, StorageError> {
        ensure_object(&doc)?;
        set_id(&mut doc, id);

        let documents = self.documents(collection);
        let mut docs = documents.write().await;
        if !docs.contains_key(id) {
            return Err(StorageError::not_found(collection.as_str(), id));
        }
        check_unique(collection, &docs, id, &doc)?;
        docs.insert(id.to_string(), doc.clone());
        Ok(doc)
    }

    async fn modify(
        &self,
        collection: Collection,
        id: &str,
        mutation: Mutation,
    ) -> Result<Value, StorageError> {
        let documents = self.documents(collection);
        let mut docs = documents.write().await;
        let mut doc = docs
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(collection.as_str(), id))?;

        mutation(&mut doc)?;
        ensure_object(&doc)?;
        set_id(&mut doc, id);
        check_unique(collection, &docs, id, &doc)?;
        docs.insert(id.to_string(), doc.clone());
        Ok(doc)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<Value, StorageError> {
        let documents = self.documents(collection);
        let mut docs = documents.write().await;
        docs.shift_remove(id)
            .ok_or_else(|| StorageError::not_found(collection.as_str(), id))
    }

    async fn delete_where(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<usize, StorageError> {
        let documents = self.documents(collection);
        let mut docs = documents.write().await;
        let before = docs.len();
        docs.retain(|_, doc| !query.matches(doc));
        Ok(before - docs.len())
    }

    async fn find(&self, collection: Collection, query: &Query) -> Result<Vec<Value>, StorageError> {
        let documents = self.documents(collection);
        let docs = documents.read().await;
        Ok(query.apply(docs.values().filter(|d| query.matches(d)).cloned()))
    }

    async fn count(&self, collection: Collection, query: &Query) -> Result<usize, StorageError> {
        let documents = self.documents(collection);
        let docs = documents.read().await;
        Ok(docs.values().filter(|d| query.matches(d)).count())
    }

    async fn next_sequence(&self, key: &str) -> Result<u64, StorageError> {
        let mut counter = self.sequences.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medisync_storage::Filter;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_id_and_get_returns_it() {
        let store = InMemoryStore::new();
        let doc = store
            .insert(Collection::Patients, json!({"name": "Jane"}))
            .await
            .unwrap();
        let id = doc["id"].as_str().unwrap();
        let fetched = store.get(Collection::Patients, id).await.unwrap().unwrap();
        assert_eq!(fetched["name"], "Jane");
        assert!(store.get(Collection::Patients, "nope").await.unwrap().is_none());
        assert!(
            store
                .require(Collection::Patients, "nope")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = InMemoryStore::new();
        store
            .insert(Collection::Users, json!({"id": "u1", "email": "a@x.io"}))
            .await
            .unwrap();
        let err = store
            .insert(Collection::Users, json!({"id": "u1", "email": "b@x.io"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_unique_fields_ignore_case() {
        let store = InMemoryStore::new();
        store
            .insert(Collection::Departments, json!({"id": "d1", "name": "Cardiology", "code": "CARD"}))
            .await
            .unwrap();
        let err = store
            .insert(Collection::Departments, json!({"name": "Other", "code": "card"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { ref field, .. } if field == "code"));

        // Replacing a document with its own values is not a clash.
        store
            .replace(
                Collection::Departments,
                "d1",
                json!({"name": "Cardiology", "code": "CARD", "description": "Heart"}),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_modify_failure_leaves_document_untouched() {
        let store = InMemoryStore::new();
        store
            .insert(Collection::Medications, json!({"id": "m1", "currentStock": 5}))
            .await
            .unwrap();

        let err = store
            .modify(
                Collection::Medications,
                "m1",
                Box::new(|doc| {
                    doc["currentStock"] = json!(-1);
                    Err(StorageError::precondition("Not enough stock available"))
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Not enough stock available");

        let doc = store.require(Collection::Medications, "m1").await.unwrap();
        assert_eq!(doc["currentStock"], 5);
    }

    #[tokio::test]
    async fn test_find_delete_where_and_order() {
        let store = InMemoryStore::new();
        for (id, patient) in [("a", "p1"), ("b", "p2"), ("c", "p1")] {
            store
                .insert(Collection::Prescriptions, json!({"id": id, "patient": patient}))
                .await
                .unwrap();
        }
        let query = Query::new().filter(Filter::eq("patient", "p1"));
        let found = store.find(Collection::Prescriptions, &query).await.unwrap();
        let ids: Vec<_> = found.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        assert_eq!(
            store.delete_where(Collection::Prescriptions, &query).await.unwrap(),
            2
        );
        assert_eq!(
            store.count(Collection::Prescriptions, &Query::new()).await.unwrap(),
            1
        );
        let removed = store.delete(Collection::Prescriptions, "b").await.unwrap();
        assert_eq!(removed["patient"], "p2");
        assert!(
            store
                .delete(Collection::Prescriptions, "b")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sequences_are_unique_under_concurrency() {
        let store = Arc::new(InMemoryStore::new());
        let tasks = (0..64).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.next_sequence("patient-token/d1").await.unwrap() })
        });
        let mut values: Vec<u64> = futures_util::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        values.sort_unstable();
        assert_eq!(values, (1..=64).collect::<Vec<_>>());
        assert_eq!(store.next_sequence("patient-token/d2").await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_cannot_both_pass_unique_check() {
        let store = Arc::new(InMemoryStore::new());
        let tasks = (0..16).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .insert(Collection::Medications, json!({"name": "Aspirin"}))
                    .await
            })
        });
        let ok = futures_util::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(ok, 1);
    }
}
