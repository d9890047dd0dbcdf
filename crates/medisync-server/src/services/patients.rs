//! Patient registration, queueing and prescriptions.

use medisync_api::ApiError;
use medisync_core::events::{EntityKind, EventBroadcaster};
use medisync_core::model::{
    Department, Patient, PatientDraft, PatientStatus, Prescription, PrescriptionDraft, User,
};
use medisync_core::token::department_prefix;
use medisync_core::{format_token_number, generate_id, now_utc};
use medisync_storage::{Collection, DynStore, Filter, Query, decode, decode_all, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{ApiResult, bool_param, date_filter, enum_filter, merge_update, today_bounds};
use crate::populate::Populator;

/// Keys a patient update may not touch.
const PROTECTED: &[&str] = &["tokenNumber", "prescriptions"];

/// Query parameters accepted by the patient list.
#[derive(Debug, Default, Deserialize)]
pub struct PatientFilters {
    pub department: Option<String>,
    pub doctor: Option<String>,
    pub status: Option<String>,
    pub emergency: Option<String>,
    pub date: Option<String>,
}

/// Today's patients of one department, grouped by status.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentQueue {
    pub waiting: Vec<Value>,
    pub in_consultation: Vec<Value>,
    pub completed: Vec<Value>,
    pub no_show: Vec<Value>,
    pub rescheduled: Vec<Value>,
}

#[derive(Clone)]
pub struct PatientService {
    store: DynStore,
    events: EventBroadcaster,
}

impl PatientService {
    pub fn new(store: DynStore, events: EventBroadcaster) -> Self {
        Self { store, events }
    }

    /// Validate, draw the department's next token number and persist.
    ///
    /// The sequence is drawn only after validation passes; an insert failing
    /// afterwards leaves a gap, never a duplicate.
    pub async fn create(&self, draft: PatientDraft) -> ApiResult<Value> {
        draft.validate()?;
        let department_id = draft
            .department_id()
            .ok_or_else(|| ApiError::bad_request("Please add a department"))?
            .to_string();
        let department = self.department(&department_id).await?;

        let sequence = self
            .store
            .next_sequence(&token_sequence_key(&department_id))
            .await?;
        let token = format_token_number(
            &department_prefix(&department.code, &department.name),
            sequence,
            draft.is_emergency(),
        );

        let patient = draft.into_patient(generate_id(), token, now_utc())?;
        self.store
            .insert(Collection::Patients, encode(&patient)?)
            .await?;
        info!(
            patient_id = %patient.id,
            department = %department.code,
            token = %patient.token_number,
            emergency = patient.emergency,
            "patient registered"
        );

        let populated = self.populate(&patient).await?;
        self.events
            .publish_created(EntityKind::Patient, populated.clone());
        Ok(populated)
    }

    pub async fn list(&self, filters: &PatientFilters) -> ApiResult<Vec<Value>> {
        let query = Query::new()
            .filter_opt(non_empty(&filters.department).map(|d| Filter::eq("department", d)))
            .filter_opt(non_empty(&filters.doctor).map(|d| Filter::eq("doctor", d)))
            .filter_opt(enum_filter::<PatientStatus>("status", filters.status.as_deref())?)
            .filter_opt(
                bool_param("emergency", filters.emergency.as_deref())?
                    .map(|e| Filter::eq("emergency", e)),
            )
            .filter_opt(date_filter("appointmentDate", filters.date.as_deref())?)
            .sort_asc("appointmentDate");

        let patients: Vec<Patient> =
            decode_all(self.store.find(Collection::Patients, &query).await?)?;
        debug!(count = patients.len(), "patients listed");
        Ok(Populator::new(self.store.as_ref())
            .patients(&patients)
            .await?)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Value> {
        let patient = self.load(id).await?;
        self.populate(&patient).await
    }

    /// Merge `patch` over the stored patient and re-validate. The token number
    /// and creation time are carried over unchanged.
    pub async fn update(&self, id: &str, patch: Value) -> ApiResult<Value> {
        let current = self.load(id).await?;
        let mut doc = encode(&current)?;
        merge_update(&mut doc, patch, PROTECTED)?;

        let draft: PatientDraft = serde_json::from_value(doc)
            .map_err(|e| ApiError::bad_request(format!("Invalid patient update: {e}")))?;
        if let Some(department) = draft.department_id()
            && department != current.department
        {
            self.department(department).await?;
        }
        let updated = draft.into_patient(
            current.id.clone(),
            current.token_number.clone(),
            current.created_at,
        )?;
        self.store
            .replace(Collection::Patients, id, encode(&updated)?)
            .await?;

        let populated = self.populate(&updated).await?;
        self.events
            .publish_updated(EntityKind::Patient, populated.clone());
        Ok(populated)
    }

    pub async fn update_status(&self, id: &str, status: Option<&str>) -> ApiResult<Value> {
        let status = status
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("Please provide status"))?
            .parse::<PatientStatus>()
            .map_err(ApiError::bad_request)?;

        let doc = self
            .store
            .modify(
                Collection::Patients,
                id,
                Box::new(move |doc: &mut Value| {
                    if let Some(obj) = doc.as_object_mut() {
                        obj.insert("status".into(), Value::from(status.as_str()));
                    }
                    Ok(())
                }),
            )
            .await?;
        let patient: Patient = decode(doc)?;
        info!(patient_id = %patient.id, status = %patient.status, "patient status changed");

        let populated = self.populate(&patient).await?;
        self.events
            .publish_updated(EntityKind::Patient, populated.clone());
        Ok(populated)
    }

    /// Delete a patient together with the prescriptions it owns.
    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.store.delete(Collection::Patients, id).await?;
        let removed = self
            .store
            .delete_where(
                Collection::Prescriptions,
                &Query::new().filter(Filter::eq("patient", id)),
            )
            .await?;
        info!(patient_id = %id, prescriptions_removed = removed, "patient deleted");
        self.events.publish_deleted(EntityKind::Patient, id);
        Ok(())
    }

    /// Record a prescription for the patient. Returns the populated patient.
    pub async fn add_prescription(
        &self,
        patient_id: &str,
        draft: PrescriptionDraft,
        author: &User,
    ) -> ApiResult<Value> {
        let patient = self.load(patient_id).await?;
        if let Some(medication_id) = draft.medication_id.as_deref().filter(|m| !m.is_empty()) {
            self.store
                .require(Collection::Medications, medication_id)
                .await?;
        }
        let prescription = draft.into_prescription(
            generate_id(),
            patient.id.clone(),
            Some(author.id.clone()),
            now_utc(),
        )?;
        self.store
            .insert(Collection::Prescriptions, encode(&prescription)?)
            .await?;
        info!(
            patient_id = %patient.id,
            prescription_id = %prescription.id,
            medication = %prescription.medication,
            "prescription added"
        );

        let populated = self.populate(&patient).await?;
        self.events
            .publish_updated(EntityKind::Patient, populated.clone());
        Ok(populated)
    }

    pub async fn prescriptions(&self, patient_id: &str) -> ApiResult<Vec<Prescription>> {
        self.load(patient_id).await?;
        let query = Query::new()
            .filter(Filter::eq("patient", patient_id))
            .sort_asc("prescribed");
        Ok(decode_all(
            self.store.find(Collection::Prescriptions, &query).await?,
        )?)
    }

    pub async fn queue(&self, department_id: &str) -> ApiResult<DepartmentQueue> {
        self.department(department_id).await?;
        let (start, end) = today_bounds();
        let query = Query::new()
            .filter(Filter::eq("department", department_id))
            .filter(Filter::time_range("appointmentDate", start, end))
            .sort_asc("appointmentDate");
        let patients: Vec<Patient> =
            decode_all(self.store.find(Collection::Patients, &query).await?)?;

        let mut populator = Populator::new(self.store.as_ref());
        let mut queue = DepartmentQueue::default();
        for patient in &patients {
            let doc = populator.patient(patient).await?;
            let bucket = match patient.status {
                PatientStatus::Waiting => &mut queue.waiting,
                PatientStatus::InConsultation => &mut queue.in_consultation,
                PatientStatus::Completed => &mut queue.completed,
                PatientStatus::NoShow => &mut queue.no_show,
                PatientStatus::Rescheduled => &mut queue.rescheduled,
            };
            bucket.push(doc);
        }
        Ok(queue)
    }

    async fn load(&self, id: &str) -> ApiResult<Patient> {
        Ok(decode(self.store.require(Collection::Patients, id).await?)?)
    }

    async fn department(&self, id: &str) -> ApiResult<Department> {
        Ok(decode(
            self.store.require(Collection::Departments, id).await?,
        )?)
    }

    async fn populate(&self, patient: &Patient) -> ApiResult<Value> {
        Ok(Populator::new(self.store.as_ref())
            .patient(patient)
            .await?)
    }
}

/// Store counter backing a department's token numbers.
pub fn token_sequence_key(department_id: &str) -> String {
    format!("patient-token/{department_id}")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
