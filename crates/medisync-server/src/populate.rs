//! Reference expansion for responses.
//!
//! Stored documents reference other entities by id. Responses replace those
//! ids with the referenced document (departments) or a small summary (users,
//! patients). A dangling reference becomes `null`.

use std::collections::HashMap;

use medisync_core::model::{Operation, Patient};
use medisync_storage::{Collection, DocumentStore, Filter, Query, StorageResult, encode};
use serde_json::{Map, Value};

const USER_SUMMARY: &[&str] = &["id", "name"];
const PATIENT_SUMMARY: &[&str] = &["id", "name", "age", "gender", "tokenNumber"];

/// Memoizing reference loader, scoped to one response.
pub struct Populator<'a> {
    store: &'a dyn DocumentStore,
    cache: HashMap<(Collection, String), Option<Value>>,
}

impl<'a> Populator<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    async fn load(&mut self, collection: Collection, id: &str) -> StorageResult<Option<Value>> {
        let key = (collection, id.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }
        let doc = self.store.get(collection, id).await?;
        self.cache.insert(key, doc.clone());
        Ok(doc)
    }

    async fn summary(
        &mut self,
        collection: Collection,
        id: &str,
        fields: &[&str],
    ) -> StorageResult<Value> {
        Ok(self
            .load(collection, id)
            .await?
            .map(|doc| pick(&doc, fields))
            .unwrap_or(Value::Null))
    }

    /// Patient with `department` (full document), `doctor` (`{id, name}`) and
    /// its prescriptions in prescribed order.
    pub async fn patient(&mut self, patient: &Patient) -> StorageResult<Value> {
        let mut doc = encode(patient)?;
        let department = self
            .load(Collection::Departments, &patient.department)
            .await?
            .unwrap_or(Value::Null);
        let doctor = match &patient.doctor {
            Some(id) => self.summary(Collection::Users, id, USER_SUMMARY).await?,
            None => Value::Null,
        };
        let prescriptions = self
            .store
            .find(
                Collection::Prescriptions,
                &Query::new()
                    .filter(Filter::eq("patient", patient.id.as_str()))
                    .sort_asc("prescribed"),
            )
            .await?;

        if let Some(obj) = doc.as_object_mut() {
            obj.insert("department".into(), department);
            obj.insert("doctor".into(), doctor);
            obj.insert("prescriptions".into(), Value::Array(prescriptions));
        }
        Ok(doc)
    }

    pub async fn patients(&mut self, patients: &[Patient]) -> StorageResult<Vec<Value>> {
        let mut out = Vec::with_capacity(patients.len());
        for patient in patients {
            out.push(self.patient(patient).await?);
        }
        Ok(out)
    }

    /// Operation with a patient summary and `{id, name}` for every surgeon and
    /// assisting staff member. Unknown staff ids are dropped from the lists.
    pub async fn operation(&mut self, operation: &Operation) -> StorageResult<Value> {
        let mut doc = encode(operation)?;
        let patient = self
            .summary(Collection::Patients, &operation.patient, PATIENT_SUMMARY)
            .await?;
        let surgeons = self.staff(&operation.surgeons).await?;
        let assisting = self.staff(&operation.assisting_staff).await?;

        if let Some(obj) = doc.as_object_mut() {
            obj.insert("patient".into(), patient);
            obj.insert("surgeons".into(), Value::Array(surgeons));
            obj.insert("assistingStaff".into(), Value::Array(assisting));
        }
        Ok(doc)
    }

    pub async fn operations(&mut self, operations: &[Operation]) -> StorageResult<Vec<Value>> {
        let mut out = Vec::with_capacity(operations.len());
        for operation in operations {
            out.push(self.operation(operation).await?);
        }
        Ok(out)
    }

    async fn staff(&mut self, ids: &[String]) -> StorageResult<Vec<Value>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let summary = self.summary(Collection::Users, id, USER_SUMMARY).await?;
            if !summary.is_null() {
                out.push(summary);
            }
        }
        Ok(out)
    }
}

fn pick(doc: &Value, fields: &[&str]) -> Value {
    let mut out = Map::new();
    for field in fields {
        if let Some(value) = doc.get(*field) {
            out.insert((*field).to_string(), value.clone());
        }
    }
    Value::Object(out)
}
