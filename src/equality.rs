//! Structural equality over JSON snapshots.
//!
//! The cache compares a freshly fetched aggregate with the one it holds to
//! decide whether anything observable changed. Servers bump timestamps and
//! reorder collections on every round trip, so plain `==` is too strict:
//!
//! - strings that both parse as dates compare by UTC instant,
//! - arrays compare as collections keyed by their elements' numeric `id`,
//! - object keys on the ignore list are skipped (key sets must still match).

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// Fields that change on every server round trip.
pub const DEFAULT_IGNORED_FIELDS: &[&str] = &["created_at", "updated_at"];

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse the date representations the backend is known to emit.
///
/// Accepts RFC 3339 (with offset or `Z`), naive date-times (taken as UTC)
/// and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Configurable deep comparator.
#[derive(Debug, Clone)]
pub struct StructuralEq {
    ignored: BTreeSet<String>,
}

impl Default for StructuralEq {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_FIELDS.iter().copied())
    }
}

impl StructuralEq {
    pub fn new<I, S>(ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored: ignored.into_iter().map(Into::into).collect(),
        }
    }

    /// A comparator that ignores nothing.
    pub fn strict() -> Self {
        Self {
            ignored: BTreeSet::new(),
        }
    }

    pub fn ignoring(mut self, field: impl Into<String>) -> Self {
        self.ignored.insert(field.into());
        self
    }

    pub fn ignored_fields(&self) -> impl Iterator<Item = &str> {
        self.ignored.iter().map(String::as_str)
    }

    pub fn equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
            (Value::String(x), Value::String(y)) => {
                x == y
                    || matches!(
                        (parse_instant(x), parse_instant(y)),
                        (Some(dx), Some(dy)) if dx == dy
                    )
            }
            (Value::Array(xs), Value::Array(ys)) => self.arrays_equal(xs, ys),
            (Value::Object(x), Value::Object(y)) => self.objects_equal(x, y),
            _ => false,
        }
    }

    fn arrays_equal(&self, xs: &[Value], ys: &[Value]) -> bool {
        if xs.len() != ys.len() {
            return false;
        }
        let xs = sorted_by_id(xs);
        let ys = sorted_by_id(ys);
        xs.iter().zip(ys.iter()).all(|(x, y)| self.equal(x, y))
    }

    fn objects_equal(&self, x: &Map<String, Value>, y: &Map<String, Value>) -> bool {
        if x.len() != y.len() || !x.keys().all(|k| y.contains_key(k)) {
            return false;
        }
        x.iter()
            .filter(|(key, _)| !self.ignored.contains(key.as_str()))
            .all(|(key, xv)| y.get(key).is_some_and(|yv| self.equal(xv, yv)))
    }
}

fn element_id(value: &Value) -> Option<f64> {
    match value.get("id")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stable ascending sort by numeric `id`; elements without one go last in
/// their original relative order.
fn sorted_by_id(values: &[Value]) -> Vec<&Value> {
    let mut refs: Vec<&Value> = values.iter().collect();
    refs.sort_by(|a, b| match (element_id(a), element_id(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_equals_itself() {
        let eq = StructuralEq::default();
        let samples = [
            json!(null),
            json!(true),
            json!(3.5),
            json!("text"),
            json!([{"id": 2}, {"id": 1, "tags": ["a", "b"]}]),
            json!({"id": 1, "members": [{"id": 9}], "created_at": "2026-01-01"}),
        ];
        for v in &samples {
            assert!(eq.equal(v, v), "{v} should equal itself");
        }
    }

    #[test]
    fn ignored_timestamp_differences_are_equal() {
        let eq = StructuralEq::default();
        assert!(eq.equal(
            &json!({"a": 1, "created_at": "t1"}),
            &json!({"a": 1, "created_at": "t2"})
        ));
    }

    #[test]
    fn ignored_fields_still_require_matching_key_sets() {
        let eq = StructuralEq::default();
        assert!(!eq.equal(&json!({"a": 1, "created_at": "t1"}), &json!({"a": 1})));
    }

    #[test]
    fn non_ignored_field_difference_is_unequal() {
        let eq = StructuralEq::strict();
        assert!(!eq.equal(
            &json!({"a": 1, "created_at": "t1"}),
            &json!({"a": 1, "created_at": "t2"})
        ));
    }

    #[test]
    fn arrays_compare_independent_of_order_by_id() {
        let eq = StructuralEq::default();
        assert!(eq.equal(&json!([{"id": 1}, {"id": 2}]), &json!([{"id": 2}, {"id": 1}])));
        assert!(!eq.equal(&json!([{"id": 1, "v": 1}]), &json!([{"id": 1, "v": 2}])));
    }

    #[test]
    fn ids_sort_numerically_not_lexically() {
        let eq = StructuralEq::default();
        let a = json!([{"id": 10, "v": "x"}, {"id": 9, "v": "y"}]);
        let b = json!([{"id": 9, "v": "y"}, {"id": 10, "v": "x"}]);
        assert!(eq.equal(&a, &b));
    }

    #[test]
    fn arrays_of_different_length_are_unequal() {
        let eq = StructuralEq::default();
        assert!(!eq.equal(&json!([{"id": 1}]), &json!([{"id": 1}, {"id": 2}])));
    }

    #[test]
    fn arrays_without_ids_keep_positional_comparison() {
        let eq = StructuralEq::default();
        assert!(eq.equal(&json!(["a", "b"]), &json!(["a", "b"])));
        assert!(!eq.equal(&json!(["a", "b"]), &json!(["b", "a"])));
    }

    #[test]
    fn dates_compare_by_instant_across_formats() {
        let eq = StructuralEq::strict();
        assert!(eq.equal(
            &json!("2026-03-01T10:00:00Z"),
            &json!("2026-03-01T12:00:00+02:00")
        ));
        assert!(eq.equal(&json!("2026-03-01"), &json!("2026-03-01T00:00:00.000Z")));
        assert!(eq.equal(&json!("2026-03-01 10:00:00"), &json!("2026-03-01T10:00:00Z")));
        assert!(!eq.equal(&json!("2026-03-01"), &json!("2026-03-02")));
    }

    #[test]
    fn numbers_compare_numerically() {
        let eq = StructuralEq::strict();
        assert!(eq.equal(&json!(40), &json!(40.0)));
        assert!(!eq.equal(&json!(40), &json!(41)));
    }

    #[test]
    fn type_mismatches_are_unequal() {
        let eq = StructuralEq::default();
        assert!(!eq.equal(&json!(1), &json!("1")));
        assert!(!eq.equal(&json!(null), &json!(false)));
        assert!(!eq.equal(&json!([]), &json!({})));
    }

    #[test]
    fn nested_aggregate_with_cosmetic_drift_is_equal() {
        let eq = StructuralEq::default();
        let before = json!({
            "id": 1,
            "name": "Launch",
            "updated_at": "2026-01-01T00:00:00Z",
            "tasks": [
                {"id": 2, "status": "pending", "due_date": "2026-02-01", "updated_at": "a"},
                {"id": 1, "status": "completed", "due_date": null, "updated_at": "b"}
            ]
        });
        let after = json!({
            "id": 1,
            "name": "Launch",
            "updated_at": "2026-01-05T00:00:00Z",
            "tasks": [
                {"id": 1, "status": "completed", "due_date": null, "updated_at": "c"},
                {"id": 2, "status": "pending", "due_date": "2026-02-01T00:00:00Z", "updated_at": "d"}
            ]
        });
        assert!(eq.equal(&before, &after));
    }

    #[test]
    fn custom_ignore_list_is_respected() {
        let eq = StructuralEq::strict().ignoring("progress");
        assert!(eq.equal(&json!({"progress": 10}), &json!({"progress": 90})));
        assert_eq!(eq.ignored_fields().collect::<Vec<_>>(), vec!["progress"]);
    }

    #[test]
    fn parse_instant_rejects_non_dates() {
        assert!(parse_instant("hello").is_none());
        assert!(parse_instant("42").is_none());
        assert!(parse_instant("2026-13-01").is_none());
    }
}
