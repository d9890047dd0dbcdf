//! Query model for listing documents.
//!
//! A [`Query`] is a conjunction of [`Filter`]s plus an ordered list of sort
//! keys. Field names address top-level document keys; a dotted name such as
//! `location.floor` walks into nested objects.

use std::cmp::Ordering;

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A single predicate over a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the given JSON value.
    Eq { field: String, value: Value },
    /// Any of the string fields contains `needle`, ignoring case.
    ContainsAny { fields: Vec<String>, needle: String },
    /// Timestamp field lies in the half-open range `[start, end)`.
    TimeRange {
        field: String,
        start: OffsetDateTime,
        end: OffsetDateTime,
    },
    /// Timestamp field is strictly before `instant`.
    Before { field: String, instant: OffsetDateTime },
    /// Numeric field is less than or equal to another numeric field.
    FieldLte { field: String, other: String },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains_any<I, S>(fields: I, needle: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ContainsAny {
            fields: fields.into_iter().map(Into::into).collect(),
            needle: needle.into(),
        }
    }

    pub fn time_range(field: impl Into<String>, start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self::TimeRange {
            field: field.into(),
            start,
            end,
        }
    }

    pub fn before(field: impl Into<String>, instant: OffsetDateTime) -> Self {
        Self::Before {
            field: field.into(),
            instant,
        }
    }

    pub fn field_lte(field: impl Into<String>, other: impl Into<String>) -> Self {
        Self::FieldLte {
            field: field.into(),
            other: other.into(),
        }
    }

    /// Evaluate the predicate. Missing fields never match.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq { field, value } => lookup(doc, field) == Some(value),
            Filter::ContainsAny { fields, needle } => {
                let needle = needle.to_lowercase();
                fields.iter().any(|field| {
                    lookup(doc, field)
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
                })
            }
            Filter::TimeRange { field, start, end } => lookup(doc, field)
                .and_then(as_timestamp)
                .is_some_and(|t| t >= *start && t < *end),
            Filter::Before { field, instant } => lookup(doc, field)
                .and_then(as_timestamp)
                .is_some_and(|t| t < *instant),
            Filter::FieldLte { field, other } => {
                match (
                    lookup(doc, field).and_then(Value::as_f64),
                    lookup(doc, other).and_then(Value::as_f64),
                ) {
                    (Some(a), Some(b)) => a <= b,
                    _ => false,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Filters, sort order and an optional limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a filter only when one is given.
    pub fn filter_opt(self, filter: Option<Filter>) -> Self {
        match filter {
            Some(filter) => self.filter(filter),
            None => self,
        }
    }

    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Filter, sort (stable, so insertion order breaks ties) and truncate.
    pub fn apply(&self, docs: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut out: Vec<Value> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if !self.sort.is_empty() {
            out.sort_by(|a, b| self.compare(a, b));
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for key in &self.sort {
            let ord = compare_values(
                lookup(a, &key.field).unwrap_or(&Value::Null),
                lookup(b, &key.field).unwrap_or(&Value::Null),
            );
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Resolve a possibly dotted field path.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, key| value.get(key))
}

fn as_timestamp(value: &Value) -> Option<OffsetDateTime> {
    value
        .as_str()
        .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
}

/// Total order used for sorting: null first, then numbers, then timestamps
/// (compared as instants), then other strings, then everything else.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => {
            match (as_timestamp(a), as_timestamp(b)) {
                (Some(t1), Some(t2)) => t1.cmp(&t2),
                _ => x.cmp(y),
            }
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn docs() -> Vec<Value> {
        vec![
            json!({"id": "1", "name": "Zinc", "genericName": "zinc sulfate", "stock": 5, "reorder": 10,
                   "at": "2024-05-01T10:00:00.500Z", "location": {"floor": "2"}}),
            json!({"id": "2", "name": "aspirin", "genericName": "acetylsalicylic", "stock": 50, "reorder": 10,
                   "at": "2024-05-01T10:00:00Z"}),
            json!({"id": "3", "name": "Ibuprofen", "genericName": "ibuprofen", "stock": 10, "reorder": 10,
                   "at": "2024-05-02T00:00:00Z"}),
        ]
    }

    fn ids(docs: &[Value]) -> Vec<&str> {
        docs.iter().filter_map(|d| d["id"].as_str()).collect()
    }

    #[test]
    fn eq_and_dotted_paths() {
        let out = Query::new()
            .filter(Filter::eq("location.floor", "2"))
            .apply(docs());
        assert_eq!(ids(&out), vec!["1"]);
    }

    #[test]
    fn contains_any_is_case_insensitive() {
        let out = Query::new()
            .filter(Filter::contains_any(["name", "genericName"], "SALIC"))
            .apply(docs());
        assert_eq!(ids(&out), vec!["2"]);
    }

    #[test]
    fn time_range_is_half_open() {
        let out = Query::new()
            .filter(Filter::time_range(
                "at",
                datetime!(2024-05-01 00:00 UTC),
                datetime!(2024-05-02 00:00 UTC),
            ))
            .apply(docs());
        assert_eq!(ids(&out), vec!["1", "2"]);

        let out = Query::new()
            .filter(Filter::before("at", datetime!(2024-05-01 10:00:00.1 UTC)))
            .apply(docs());
        assert_eq!(ids(&out), vec!["2"]);
    }

    #[test]
    fn field_lte_compares_numbers() {
        let out = Query::new()
            .filter(Filter::field_lte("stock", "reorder"))
            .apply(docs());
        assert_eq!(ids(&out), vec!["1", "3"]);
    }

    #[test]
    fn timestamps_sort_as_instants() {
        let out = Query::new().sort_asc("at").apply(docs());
        assert_eq!(ids(&out), vec!["2", "1", "3"]);

        let out = Query::new().sort_desc("stock").limit(2).apply(docs());
        assert_eq!(ids(&out), vec!["2", "3"]);
    }

    #[test]
    fn nulls_sort_first() {
        assert_eq!(compare_values(&Value::Null, &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(2.5), &json!(10)), Ordering::Less);
    }
}
