use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::non_blank;
use crate::error::{CoreError, Result};
use crate::validation::{ValidationErrors, Validator};

string_enum! {
    /// Lifecycle of a scheduled surgery.
    pub enum OperationStatus ("operation status") {
        Scheduled => "scheduled",
        InProgress => "in-progress",
        Completed => "completed",
        Cancelled => "cancelled",
        Postponed => "postponed",
    }
}

impl OperationStatus {
    /// Allowed moves: scheduled -> in-progress -> completed, with cancelled and
    /// postponed reachable from scheduled or in-progress. Everything else is
    /// rejected, including moving to the current status.
    pub fn can_transition_to(self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress)
                | (InProgress, Completed)
                | (Scheduled | InProgress, Cancelled | Postponed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Cancelled | OperationStatus::Postponed
        )
    }
}

string_enum! {
    pub enum Priority ("priority") {
        Normal => "normal",
        Urgent => "urgent",
        Emergency => "emergency",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    pub patient: String,
    pub ot_number: String,
    pub surgery_type: String,
    pub surgeons: Vec<String>,
    pub assisting_staff: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub end_time: Option<OffsetDateTime>,
    pub status: OperationStatus,
    pub priority: Priority,
    pub pre_op_notes: Option<String>,
    pub post_op_notes: Option<String>,
    pub complications: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Operation {
    /// Move to `next`, stamping `startTime` on entering in-progress and
    /// `endTime` on completion. A supplied time wins over `now`; an existing
    /// stamp is never overwritten.
    pub fn transition_to(
        &mut self,
        next: OperationStatus,
        start_time: Option<OffsetDateTime>,
        end_time: Option<OffsetDateTime>,
        now: OffsetDateTime,
    ) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::invalid_transition(self.status.as_str(), next.as_str()));
        }
        match next {
            OperationStatus::InProgress => {
                self.start_time.get_or_insert(start_time.unwrap_or(now));
            }
            OperationStatus::Completed => {
                self.end_time.get_or_insert(end_time.unwrap_or(now));
            }
            _ => {}
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDraft {
    pub patient: Option<String>,
    pub ot_number: Option<String>,
    pub surgery_type: Option<String>,
    pub surgeons: Option<Vec<String>>,
    pub assisting_staff: Option<Vec<String>>,
    pub scheduled_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub pre_op_notes: Option<String>,
    pub post_op_notes: Option<String>,
    pub complications: Option<String>,
}

impl OperationDraft {
    pub fn into_operation(
        self,
        id: String,
        created_at: OffsetDateTime,
    ) -> std::result::Result<Operation, ValidationErrors> {
        let mut v = Validator::new();
        let patient = v.required_str("patient", self.patient, "Please add a patient");
        let ot_number = v.required_str(
            "otNumber",
            self.ot_number,
            "Please add an operation theater number",
        );
        let surgery_type = v.required_str("surgeryType", self.surgery_type, "Please add surgery type");
        let surgeons = clean_ids(self.surgeons);
        v.check(!surgeons.is_empty(), "surgeons", "Please add at least one surgeon");
        let scheduled_date = v.required_timestamp(
            "scheduledDate",
            self.scheduled_date,
            "Please add a scheduled date",
        );
        let start_time = v.timestamp("startTime", self.start_time);
        let end_time = v.timestamp("endTime", self.end_time);
        if let (Some(Some(start)), Some(Some(end))) = (start_time, end_time) {
            v.check(end >= start, "endTime", "End time cannot be before start time");
        }
        let status = v.enumerated("status", self.status, Some(OperationStatus::Scheduled));
        let priority = v.enumerated("priority", self.priority, Some(Priority::Normal));

        match (patient, ot_number, surgery_type, scheduled_date, start_time, end_time, status, priority) {
            (
                Some(patient),
                Some(ot_number),
                Some(surgery_type),
                Some(scheduled_date),
                Some(start_time),
                Some(end_time),
                Some(status),
                Some(priority),
            ) if v.is_ok() => Ok(Operation {
                id,
                patient,
                ot_number,
                surgery_type,
                surgeons,
                assisting_staff: clean_ids(self.assisting_staff),
                scheduled_date,
                start_time,
                end_time,
                status,
                priority,
                pre_op_notes: non_blank(self.pre_op_notes),
                post_op_notes: non_blank(self.post_op_notes),
                complications: non_blank(self.complications),
                created_at,
            }),
            _ => Err(v.into_errors()),
        }
    }
}

fn clean_ids(ids: Option<Vec<String>>) -> Vec<String> {
    ids.unwrap_or_default()
        .into_iter()
        .filter_map(|id| non_blank(Some(id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn operation() -> Operation {
        let draft: OperationDraft = serde_json::from_value(json!({
            "patient": "p1",
            "otNumber": "OT-1",
            "surgeryType": "Appendectomy",
            "surgeons": ["u1", " "],
            "scheduledDate": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        draft
            .into_operation("o1".into(), datetime!(2024-04-30 12:00 UTC))
            .unwrap()
    }

    #[test]
    fn defaults_and_cleanup() {
        let op = operation();
        assert_eq!(op.status, OperationStatus::Scheduled);
        assert_eq!(op.priority, Priority::Normal);
        assert_eq!(op.surgeons, vec!["u1".to_string()]);
        assert!(op.assisting_staff.is_empty());
        assert_eq!(op.start_time, None);
    }

    #[test]
    fn requires_a_surgeon() {
        let draft: OperationDraft = serde_json::from_value(json!({
            "patient": "p1",
            "otNumber": "OT-1",
            "surgeryType": "Appendectomy",
            "surgeons": [],
            "scheduledDate": "2024-05-01"
        }))
        .unwrap();
        let errors = draft
            .into_operation("o1".into(), datetime!(2024-04-30 12:00 UTC))
            .unwrap_err();
        assert!(errors.has_field("surgeons"));
    }

    #[test]
    fn stamps_times_once() {
        let mut op = operation();
        let now = datetime!(2024-05-01 10:05 UTC);
        op.transition_to(OperationStatus::InProgress, None, None, now)
            .unwrap();
        assert_eq!(op.start_time, Some(now));

        let end = datetime!(2024-05-01 11:00 UTC);
        op.transition_to(
            OperationStatus::Completed,
            Some(datetime!(2024-05-01 09:00 UTC)),
            Some(end),
            datetime!(2024-05-01 11:30 UTC),
        )
        .unwrap();
        assert_eq!(op.start_time, Some(now));
        assert_eq!(op.end_time, Some(end));
        assert_eq!(op.status, OperationStatus::Completed);
    }

    #[test]
    fn rejects_invalid_transitions() {
        let mut op = operation();
        let now = datetime!(2024-05-01 10:05 UTC);
        let err = op
            .transition_to(OperationStatus::Completed, None, None, now)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(op.status, OperationStatus::Scheduled);

        op.transition_to(OperationStatus::Cancelled, None, None, now)
            .unwrap();
        assert!(op.status.is_terminal());
        assert!(op
            .transition_to(OperationStatus::InProgress, None, None, now)
            .is_err());
    }
}
