// JSON backup format
//
// A snapshot is a JSON array of rows mirroring the commutes table, with
// isOutbound kept as 0/1. Import is lenient about isOutbound (any JSON value,
// coerced by truthiness) but leaves constraint checks to the database.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotRecord {
    /// Exported for reference; import always assigns fresh ids
    pub id: Option<i64>,
    pub date: Option<String>,
    pub departure_time: Option<String>,
    pub arrival_platform_time: Option<String>,
    pub arrival_bus_time: Option<String>,
    pub arrival_destination_time: Option<String>,
    pub final_arrival_time: Option<String>,
    #[serde(deserialize_with = "truthy_flag")]
    pub is_outbound: i64,
    pub duration: Option<String>,
    pub transport: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub status: Option<String>,
    pub updated_at: Option<String>,
    pub path_id: Option<String>,
}

/// JavaScript-style truthiness: null, false, 0 and "" are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truthy_flag<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(i64::from(is_truthy(&value)))
}

pub fn parse(json: &str) -> serde_json::Result<Vec<SnapshotRecord>> {
    serde_json::from_str(json)
}

pub fn to_json(records: &[SnapshotRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&serde_json::json!(false)));
        assert!(!is_truthy(&serde_json::json!(0)));
        assert!(!is_truthy(&serde_json::json!(0.0)));
        assert!(!is_truthy(&serde_json::json!("")));
        assert!(is_truthy(&serde_json::json!(true)));
        assert!(is_truthy(&serde_json::json!(2)));
        assert!(is_truthy(&serde_json::json!("0")));
        assert!(is_truthy(&serde_json::json!([])));
    }

    #[test]
    fn test_parse_coerces_is_outbound() {
        let json = r#"[
            {"date": "2025-01-15", "isOutbound": true},
            {"date": "2025-01-15", "isOutbound": 0},
            {"date": "2025-01-15", "isOutbound": "yes"},
            {"date": "2025-01-15", "isOutbound": null},
            {"date": "2025-01-15"}
        ]"#;
        let records = parse(json).unwrap();
        let flags: Vec<i64> = records.iter().map(|r| r.is_outbound).collect();
        assert_eq!(flags, vec![1, 0, 1, 0, 0]);
    }

    #[test]
    fn test_parse_keeps_missing_date_as_none() {
        let records = parse(r#"[{"departureTime": "08:00", "isOutbound": 1}]"#).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].date.is_none());
        assert_eq!(records[0].departure_time.as_deref(), Some("08:00"));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse(r#"{"date": "2025-01-15"}"#).is_err());
        assert!(parse("not json").is_err());
    }

    #[test]
    fn test_export_uses_column_names() {
        let record = SnapshotRecord {
            id: Some(7),
            date: Some("2025-01-15".to_string()),
            departure_time: Some("08:00".to_string()),
            is_outbound: 1,
            ..SnapshotRecord::default()
        };
        let json = to_json(&[record]).unwrap();
        assert!(json.contains("\"departureTime\": \"08:00\""));
        assert!(json.contains("\"isOutbound\": 1"));
        assert!(json.contains("\"pathId\": null"));
    }
}
