//! Realtime event types.
//!
//! Topics are the entity change notifications pushed to connected UI sessions
//! plus the client-relayed emergency alert. On the wire an event is
//! `{"event": "<entity>-<change>", "data": {...}, "timestamp": "..."}`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use time::OffsetDateTime;

/// Entity whose changes are broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Patient,
    Operation,
    Medication,
    Department,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Patient,
        EntityKind::Operation,
        EntityKind::Medication,
        EntityKind::Department,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Patient => "patient",
            EntityKind::Operation => "operation",
            EntityKind::Medication => "medication",
            EntityKind::Department => "department",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown topic '{s}'"))
    }
}

/// Kind of change applied to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// Routing key of a realtime event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Entity(EntityKind, ChangeKind),
    EmergencyAlert,
}

impl Topic {
    pub fn created(kind: EntityKind) -> Self {
        Topic::Entity(kind, ChangeKind::Created)
    }

    pub fn updated(kind: EntityKind) -> Self {
        Topic::Entity(kind, ChangeKind::Updated)
    }

    pub fn deleted(kind: EntityKind) -> Self {
        Topic::Entity(kind, ChangeKind::Deleted)
    }

    /// Event name sent to clients, e.g. `operation-created`.
    pub fn event_name(&self) -> String {
        match self {
            Topic::Entity(kind, change) => format!("{}-{}", kind.as_str(), change.as_str()),
            Topic::EmergencyAlert => "emergency-alert".to_string(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.event_name())
    }
}

/// Which entity topics a session wants. Emergency alerts reach every session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TopicFilter {
    #[default]
    All,
    Entities(Vec<EntityKind>),
}

impl TopicFilter {
    /// Parse a comma separated list such as `patient,operation`.
    /// Empty input and `all` select everything.
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut kinds = Vec::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part.eq_ignore_ascii_case("all") {
                return Ok(TopicFilter::All);
            }
            let kind = part.to_ascii_lowercase().parse::<EntityKind>()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            Ok(TopicFilter::All)
        } else {
            Ok(TopicFilter::Entities(kinds))
        }
    }

    pub fn matches(&self, topic: &Topic) -> bool {
        match (self, topic) {
            (TopicFilter::All, _) | (_, Topic::EmergencyAlert) => true,
            (TopicFilter::Entities(kinds), Topic::Entity(kind, _)) => kinds.contains(kind),
        }
    }
}

/// An event as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    #[serde(skip)]
    pub topic: Topic,
    pub event: String,
    pub data: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl RealtimeEvent {
    pub fn new(topic: Topic, data: serde_json::Value) -> Self {
        Self {
            event: topic.event_name(),
            topic,
            data,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Item yielded by an event stream.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Event(std::sync::Arc<RealtimeEvent>),
    /// The subscriber fell behind and this many events were dropped.
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names() {
        assert_eq!(
            Topic::created(EntityKind::Operation).event_name(),
            "operation-created"
        );
        assert_eq!(
            Topic::deleted(EntityKind::Medication).to_string(),
            "medication-deleted"
        );
        assert_eq!(Topic::EmergencyAlert.event_name(), "emergency-alert");
    }

    #[test]
    fn filter_parsing() {
        assert_eq!(TopicFilter::parse("").unwrap(), TopicFilter::All);
        assert_eq!(TopicFilter::parse("patient, all").unwrap(), TopicFilter::All);
        assert_eq!(
            TopicFilter::parse("Patient,operation,patient").unwrap(),
            TopicFilter::Entities(vec![EntityKind::Patient, EntityKind::Operation])
        );
        assert!(TopicFilter::parse("billing").is_err());
    }

    #[test]
    fn filter_matching() {
        let filter = TopicFilter::Entities(vec![EntityKind::Patient]);
        assert!(filter.matches(&Topic::updated(EntityKind::Patient)));
        assert!(!filter.matches(&Topic::created(EntityKind::Operation)));
        assert!(filter.matches(&Topic::EmergencyAlert));
        assert!(TopicFilter::All.matches(&Topic::created(EntityKind::Department)));
    }

    #[test]
    fn serializes_without_topic() {
        let event = RealtimeEvent::new(
            Topic::created(EntityKind::Patient),
            serde_json::json!({"id": "p1"}),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "patient-created");
        assert_eq!(json["data"]["id"], "p1");
        assert!(json.get("topic").is_none());
        assert!(json["timestamp"].is_string());
    }
}
