use chrono::{DateTime, Utc};
use serde_json::Value;

/// Parses an RFC3339 timestamp out of a JSON value. MercadoLibre reports timestamps with an explicit offset
/// (e.g. `2024-05-01T12:00:00.000-04:00`); the result is normalized to UTC.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|d| d.with_timezone(&Utc))
}

/// Extracts an entity id from a JSON value. Upstream ids arrive as numbers in some payloads and strings in
/// others, so both are accepted.
pub fn value_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    #[test]
    fn dates_with_offsets_are_normalized_to_utc() {
        let v = json!("2024-05-01T12:00:00.000-04:00");
        let parsed = parse_date(&v).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 16, 0, 0).unwrap());
    }

    #[test]
    fn non_string_dates_are_none() {
        assert!(parse_date(&json!(12345)).is_none());
        assert!(parse_date(&json!(null)).is_none());
        assert!(parse_date(&json!("not a date")).is_none());
    }

    #[test]
    fn ids_parse_from_numbers_and_strings() {
        assert_eq!(value_id(&json!(2000003508419500u64)).as_deref(), Some("2000003508419500"));
        assert_eq!(value_id(&json!("MLB12345")).as_deref(), Some("MLB12345"));
        assert!(value_id(&json!("")).is_none());
        assert!(value_id(&json!(null)).is_none());
        assert!(value_id(&json!({"id": 1})).is_none());
    }
}
