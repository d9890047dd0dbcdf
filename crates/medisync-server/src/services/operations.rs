//! Operation-theater scheduling.

use std::collections::BTreeMap;

use medisync_api::ApiError;
use medisync_core::events::{EntityKind, EventBroadcaster};
use medisync_core::model::{Operation, OperationDraft, OperationStatus, Priority};
use medisync_core::{generate_id, now_utc, parse_timestamp};
use medisync_storage::{
    Collection, DynStore, Filter, Query, StorageError, decode, decode_all, encode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{ApiResult, date_filter, enum_filter, merge_update, today_bounds};
use crate::populate::Populator;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFilters {
    pub status: Option<String>,
    pub ot_number: Option<String>,
    pub priority: Option<String>,
    pub date: Option<String>,
}

/// Body of `PUT /api/operations/{id}/status`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// One theater's operations for today.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TheaterSchedule {
    pub scheduled: Vec<Value>,
    pub in_progress: Option<Value>,
    pub completed: Vec<Value>,
}

#[derive(Clone)]
pub struct OperationService {
    store: DynStore,
    events: EventBroadcaster,
}

impl OperationService {
    pub fn new(store: DynStore, events: EventBroadcaster) -> Self {
        Self { store, events }
    }

    pub async fn create(&self, draft: OperationDraft) -> ApiResult<Value> {
        let operation = draft.into_operation(generate_id(), now_utc())?;
        self.store
            .require(Collection::Patients, &operation.patient)
            .await?;
        self.store
            .insert(Collection::Operations, encode(&operation)?)
            .await?;
        info!(
            operation_id = %operation.id,
            ot = %operation.ot_number,
            priority = %operation.priority,
            "operation scheduled"
        );

        let populated = self.populate(&operation).await?;
        self.events
            .publish_created(EntityKind::Operation, populated.clone());
        Ok(populated)
    }

    pub async fn list(&self, filters: &OperationFilters) -> ApiResult<Vec<Value>> {
        let query = Query::new()
            .filter_opt(enum_filter::<OperationStatus>("status", filters.status.as_deref())?)
            .filter_opt(
                filters
                    .ot_number
                    .as_deref()
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(|o| Filter::eq("otNumber", o)),
            )
            .filter_opt(enum_filter::<Priority>("priority", filters.priority.as_deref())?)
            .filter_opt(date_filter("scheduledDate", filters.date.as_deref())?)
            .sort_asc("scheduledDate");

        let operations: Vec<Operation> =
            decode_all(self.store.find(Collection::Operations, &query).await?)?;
        Ok(Populator::new(self.store.as_ref())
            .operations(&operations)
            .await?)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Value> {
        let operation = self.load(id).await?;
        self.populate(&operation).await
    }

    /// Merge `patch` and re-validate. A status carried in the patch goes
    /// through the same transition rules as the status endpoint.
    pub async fn update(&self, id: &str, patch: Value) -> ApiResult<Value> {
        let requested = patch
            .get("status")
            .and_then(Value::as_str)
            .map(|s| s.parse::<OperationStatus>().map_err(ApiError::bad_request))
            .transpose()?;

        // Validated against the current snapshot first so field errors keep
        // their detail; the commit below re-applies the patch under the lock.
        let current = self.load(id).await?;
        let candidate = merged(&current, patch.clone())?;
        if candidate.patient != current.patient {
            self.store
                .require(Collection::Patients, &candidate.patient)
                .await?;
        }

        let now = now_utc();
        let doc = self
            .store
            .modify(
                Collection::Operations,
                id,
                Box::new(move |doc: &mut Value| {
                    let stored: Operation = decode(doc.clone())?;
                    let mut updated = merged(&stored, patch)
                        .map_err(|e| StorageError::precondition(e.to_string()))?;
                    if let Some(next) = requested
                        && next != stored.status
                    {
                        updated
                            .transition_to(next, None, None, now)
                            .map_err(|e| StorageError::precondition(e.to_string()))?;
                    }
                    *doc = encode(&updated)?;
                    Ok(())
                }),
            )
            .await?;
        let updated: Operation = decode(doc)?;

        let populated = self.populate(&updated).await?;
        self.events
            .publish_updated(EntityKind::Operation, populated.clone());
        Ok(populated)
    }

    /// Advance the operation's status, stamping start and end times. The
    /// transition is checked against the stored status under the store lock.
    pub async fn update_status(&self, id: &str, change: StatusChange) -> ApiResult<Value> {
        let next = change
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("Please provide status"))?
            .parse::<OperationStatus>()
            .map_err(ApiError::bad_request)?;
        let start_time = optional_time("startTime", change.start_time.as_deref())?;
        let end_time = optional_time("endTime", change.end_time.as_deref())?;

        let now = now_utc();
        let doc = self
            .store
            .modify(
                Collection::Operations,
                id,
                Box::new(move |doc: &mut Value| {
                    let mut operation: Operation = decode(doc.clone())?;
                    operation
                        .transition_to(next, start_time, end_time, now)
                        .map_err(|e| StorageError::precondition(e.to_string()))?;
                    *doc = encode(&operation)?;
                    Ok(())
                }),
            )
            .await?;
        let operation: Operation = decode(doc)?;
        info!(operation_id = %id, status = %next, "operation status changed");

        let populated = self.populate(&operation).await?;
        self.events
            .publish_updated(EntityKind::Operation, populated.clone());
        Ok(populated)
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.store.delete(Collection::Operations, id).await?;
        info!(operation_id = %id, "operation deleted");
        self.events.publish_deleted(EntityKind::Operation, id);
        Ok(())
    }

    /// Today's operations grouped by theater number.
    pub async fn schedule(&self) -> ApiResult<BTreeMap<String, TheaterSchedule>> {
        let (start, end) = today_bounds();
        let query = Query::new()
            .filter(Filter::time_range("scheduledDate", start, end))
            .sort_asc("scheduledDate");
        let operations: Vec<Operation> =
            decode_all(self.store.find(Collection::Operations, &query).await?)?;

        let mut populator = Populator::new(self.store.as_ref());
        let mut schedule: BTreeMap<String, TheaterSchedule> = BTreeMap::new();
        for operation in &operations {
            let doc = populator.operation(operation).await?;
            let theater = schedule.entry(operation.ot_number.clone()).or_default();
            match operation.status {
                OperationStatus::Scheduled => theater.scheduled.push(doc),
                OperationStatus::InProgress => theater.in_progress = Some(doc),
                OperationStatus::Completed => theater.completed.push(doc),
                OperationStatus::Cancelled | OperationStatus::Postponed => {}
            }
        }
        Ok(schedule)
    }

    async fn load(&self, id: &str) -> ApiResult<Operation> {
        Ok(decode(self.store.require(Collection::Operations, id).await?)?)
    }

    async fn populate(&self, operation: &Operation) -> ApiResult<Value> {
        Ok(Populator::new(self.store.as_ref())
            .operation(operation)
            .await?)
    }
}

/// `stored` with `patch` merged over it, re-validated. The status is left to
/// the transition rules.
fn merged(stored: &Operation, patch: Value) -> ApiResult<Operation> {
    let mut doc = encode(stored)?;
    merge_update(&mut doc, patch, &["status"])?;
    let draft: OperationDraft = serde_json::from_value(doc)
        .map_err(|e| ApiError::bad_request(format!("Invalid operation update: {e}")))?;
    Ok(draft.into_operation(stored.id.clone(), stored.created_at)?)
}

fn optional_time(field: &str, value: Option<&str>) -> ApiResult<Option<time::OffsetDateTime>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid {field} '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup() -> OperationService {
        let store = medisync_db_memory::create_store();
        store
            .insert(
                Collection::Patients,
                json!({"id": "p1", "name": "A", "age": 40, "gender": "male", "tokenNumber": "SURG-001"}),
            )
            .await
            .unwrap();
        store
            .insert(Collection::Users, json!({"id": "s1", "name": "Dr. Grey"}))
            .await
            .unwrap();
        OperationService::new(store, EventBroadcaster::new())
    }

    fn draft(ot: &str) -> OperationDraft {
        serde_json::from_value(json!({
            "patient": "p1",
            "otNumber": ot,
            "surgeryType": "Appendectomy",
            "surgeons": ["s1"],
            "scheduledDate": now_utc().date().to_string()
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_populates_references() {
        let service = setup().await;
        let op = service.create(draft("OT-1")).await.unwrap();
        assert_eq!(op["patient"]["tokenNumber"], "SURG-001");
        assert_eq!(op["surgeons"][0], json!({"id": "s1", "name": "Dr. Grey"}));
        assert_eq!(op["status"], "scheduled");
    }

    #[tokio::test]
    async fn status_flow_stamps_times_once() {
        let service = setup().await;
        let op = service.create(draft("OT-1")).await.unwrap();
        let id = op["id"].as_str().unwrap();

        let started = service
            .update_status(
                id,
                StatusChange {
                    status: Some("in-progress".into()),
                    start_time: Some("2024-05-01T08:00:00Z".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(started["startTime"], "2024-05-01T08:00:00Z");

        let done = service
            .update_status(
                id,
                StatusChange {
                    status: Some("completed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(done["startTime"], "2024-05-01T08:00:00Z");
        assert!(done["endTime"].is_string());

        let err = service
            .update_status(
                id,
                StatusChange {
                    status: Some("scheduled".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn generic_update_cannot_skip_states() {
        let service = setup().await;
        let op = service.create(draft("OT-1")).await.unwrap();
        let id = op["id"].as_str().unwrap();

        assert!(service.update(id, json!({"status": "completed"})).await.is_err());
        let moved = service
            .update(id, json!({"status": "in-progress", "preOpNotes": "fasted"}))
            .await
            .unwrap();
        assert_eq!(moved["status"], "in-progress");
        assert_eq!(moved["preOpNotes"], "fasted");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_transitions_have_a_single_winner() {
        let service = setup().await;
        for statuses in [["cancelled", "postponed"], ["in-progress", "in-progress"]] {
            for _ in 0..50 {
                let op = service.create(draft("OT-1")).await.unwrap();
                let id = op["id"].as_str().unwrap().to_string();

                let attempts: Vec<_> = statuses
                    .into_iter()
                    .map(|status| {
                        let service = service.clone();
                        let id = id.clone();
                        tokio::spawn(async move {
                            let change = StatusChange {
                                status: Some(status.into()),
                                ..Default::default()
                            };
                            service.update_status(&id, change).await.map(|_| status)
                        })
                    })
                    .collect();

                let mut winners = Vec::new();
                for attempt in attempts {
                    match attempt.await.unwrap() {
                        Ok(status) => winners.push(status),
                        Err(err) => assert!(matches!(err, ApiError::BadRequest(_))),
                    }
                }
                assert_eq!(winners.len(), 1, "{statuses:?} both applied");
                let stored = service.get(&id).await.unwrap();
                assert_eq!(stored["status"], winners[0]);
            }
        }
    }

    #[tokio::test]
    async fn schedule_groups_by_theater() {
        let service = setup().await;
        let a = service.create(draft("OT-1")).await.unwrap();
        service.create(draft("OT-1")).await.unwrap();
        service.create(draft("OT-2")).await.unwrap();
        service
            .update_status(
                a["id"].as_str().unwrap(),
                StatusChange {
                    status: Some("in-progress".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let schedule = service.schedule().await.unwrap();
        assert_eq!(schedule.len(), 2);
        assert!(schedule["OT-1"].in_progress.is_some());
        assert_eq!(schedule["OT-1"].scheduled.len(), 1);
        assert_eq!(schedule["OT-2"].scheduled.len(), 1);
    }

    #[tokio::test]
    async fn missing_patient_is_not_found() {
        let service = setup().await;
        let mut d = draft("OT-1");
        d.patient = Some("ghost".into());
        assert!(matches!(
            service.create(d).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
