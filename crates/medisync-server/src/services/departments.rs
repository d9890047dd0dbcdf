//! Hospital departments.

use medisync_api::ApiError;
use medisync_core::events::{EntityKind, EventBroadcaster};
use medisync_core::model::{Department, DepartmentDraft, Location, PatientStatus};
use medisync_core::{generate_id, now_utc};
use medisync_storage::{Collection, DynStore, Filter, Query, decode, decode_all, encode};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::{ApiResult, merge_update, today_bounds};

/// Today's patient counts for one department.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentStats {
    pub id: String,
    pub name: String,
    pub code: String,
    pub location: Location,
    pub total_patients_today: usize,
    pub waiting_patients: usize,
    pub completed_patients: usize,
    pub emergency_patients: usize,
}

#[derive(Clone)]
pub struct DepartmentService {
    store: DynStore,
    events: EventBroadcaster,
}

impl DepartmentService {
    pub fn new(store: DynStore, events: EventBroadcaster) -> Self {
        Self { store, events }
    }

    pub async fn list(&self) -> ApiResult<Vec<Department>> {
        let docs = self
            .store
            .find(Collection::Departments, &Query::new().sort_asc("name"))
            .await?;
        Ok(decode_all(docs)?)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Department> {
        Ok(decode(self.store.require(Collection::Departments, id).await?)?)
    }

    pub async fn create(&self, draft: DepartmentDraft) -> ApiResult<Department> {
        let department = draft.into_department(generate_id(), now_utc())?;
        let doc = self
            .store
            .insert(Collection::Departments, encode(&department)?)
            .await?;
        info!(department_id = %department.id, code = %department.code, "department created");
        self.events.publish_created(EntityKind::Department, doc);
        Ok(department)
    }

    pub async fn update(&self, id: &str, patch: Value) -> ApiResult<Department> {
        let current = self.get(id).await?;
        let mut doc = encode(&current)?;
        merge_update(&mut doc, patch, &[])?;
        let draft: DepartmentDraft = serde_json::from_value(doc)
            .map_err(|e| ApiError::bad_request(format!("Invalid department update: {e}")))?;
        let updated = draft.into_department(current.id.clone(), current.created_at)?;

        let doc = self
            .store
            .replace(Collection::Departments, id, encode(&updated)?)
            .await?;
        self.events.publish_updated(EntityKind::Department, doc);
        Ok(updated)
    }

    /// Refuses while any patient still references the department.
    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.store.require(Collection::Departments, id).await?;
        let patients = self
            .store
            .count(
                Collection::Patients,
                &Query::new().filter(Filter::eq("department", id)),
            )
            .await?;
        if patients > 0 {
            return Err(ApiError::conflict(format!(
                "Cannot delete department because it has {patients} patients associated with it"
            )));
        }
        self.store.delete(Collection::Departments, id).await?;
        info!(department_id = %id, "department deleted");
        self.events.publish_deleted(EntityKind::Department, id);
        Ok(())
    }

    pub async fn stats(&self) -> ApiResult<Vec<DepartmentStats>> {
        let (start, end) = today_bounds();
        let mut stats = Vec::new();
        for department in self.list().await? {
            let today = Query::new()
                .filter(Filter::eq("department", department.id.as_str()))
                .filter(Filter::time_range("appointmentDate", start, end));
            stats.push(DepartmentStats {
                total_patients_today: self.count_patients(today.clone()).await?,
                waiting_patients: self.count_patients(
                    today
                        .clone()
                        .filter(Filter::eq("status", PatientStatus::Waiting.as_str())),
                )
                .await?,
                completed_patients: self.count_patients(
                    today
                        .clone()
                        .filter(Filter::eq("status", PatientStatus::Completed.as_str())),
                )
                .await?,
                emergency_patients: self
                    .count_patients(today.filter(Filter::eq("emergency", true)))
                    .await?,
                id: department.id,
                name: department.name,
                code: department.code,
                location: department.location,
            });
        }
        Ok(stats)
    }

    async fn count_patients(&self, query: Query) -> ApiResult<usize> {
        Ok(self.store.count(Collection::Patients, &query).await?)
    }
}
