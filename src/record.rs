// Commute record types

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Completion state of a logged commute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommuteStatus {
    #[default]
    Completed,
    Draft,
}

impl CommuteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommuteStatus::Completed => "completed",
            CommuteStatus::Draft => "draft",
        }
    }

    /// Map a stored column value. Anything other than `draft` (including NULL)
    /// counts as completed.
    pub fn from_column(value: Option<&str>) -> Self {
        match value {
            Some("draft") => CommuteStatus::Draft,
            _ => CommuteStatus::Completed,
        }
    }
}

impl fmt::Display for CommuteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommuteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(CommuteStatus::Completed),
            "draft" => Ok(CommuteStatus::Draft),
            other => Err(format!("unknown commute status: {}", other)),
        }
    }
}

/// Write-side commute: everything the caller supplies on save or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommute {
    pub date: NaiveDate,
    pub departure_time: Option<String>,
    pub arrival_platform_time: Option<String>,
    pub arrival_bus_time: Option<String>,
    pub arrival_destination_time: Option<String>,
    pub final_arrival_time: Option<String>,
    pub is_outbound: bool,
    pub duration: Option<String>,
    pub transport: Option<String>,
    pub notes: Option<String>,
    /// Defaults to completed when the status column exists
    pub status: Option<CommuteStatus>,
    pub path_id: Option<String>,
}

impl NewCommute {
    /// Outbound commute on `date` with every optional field empty
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            departure_time: None,
            arrival_platform_time: None,
            arrival_bus_time: None,
            arrival_destination_time: None,
            final_arrival_time: None,
            is_outbound: true,
            duration: None,
            transport: None,
            notes: None,
            status: None,
            path_id: None,
        }
    }
}

/// A stored commute as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commute {
    pub id: i64,
    pub date: NaiveDate,
    pub departure_time: Option<String>,
    pub arrival_platform_time: Option<String>,
    pub arrival_bus_time: Option<String>,
    pub arrival_destination_time: Option<String>,
    pub final_arrival_time: Option<String>,
    pub is_outbound: bool,
    pub duration: Option<String>,
    pub transport: Option<String>,
    pub notes: Option<String>,
    pub status: CommuteStatus,
    pub path_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    /// None when the database predates the updatedAt column
    pub updated_at: Option<NaiveDateTime>,
}

impl Commute {
    pub fn is_draft(&self) -> bool {
        self.status == CommuteStatus::Draft
    }

    /// The write-side view of this record, for editing and re-saving
    pub fn to_new(&self) -> NewCommute {
        NewCommute {
            date: self.date,
            departure_time: self.departure_time.clone(),
            arrival_platform_time: self.arrival_platform_time.clone(),
            arrival_bus_time: self.arrival_bus_time.clone(),
            arrival_destination_time: self.arrival_destination_time.clone(),
            final_arrival_time: self.final_arrival_time.clone(),
            is_outbound: self.is_outbound,
            duration: self.duration.clone(),
            transport: self.transport.clone(),
            notes: self.notes.clone(),
            status: Some(self.status),
            path_id: self.path_id.clone(),
        }
    }
}

/// Accepts `H:MM` or `HH:MM` on a 24-hour clock
pub fn is_valid_time(value: &str) -> bool {
    let Some((h, m)) = value.split_once(':') else {
        return false;
    };
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return false;
    }
    match (h.parse::<u32>(), m.parse::<u32>()) {
        (Ok(h), Ok(m)) => h < 24 && m < 60,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_column() {
        assert_eq!(CommuteStatus::from_column(Some("draft")), CommuteStatus::Draft);
        assert_eq!(CommuteStatus::from_column(Some("completed")), CommuteStatus::Completed);
        assert_eq!(CommuteStatus::from_column(None), CommuteStatus::Completed);
        assert_eq!(CommuteStatus::from_column(Some("garbage")), CommuteStatus::Completed);
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("Draft".parse::<CommuteStatus>().unwrap(), CommuteStatus::Draft);
        assert_eq!(CommuteStatus::Completed.to_string(), "completed");
        assert!("pending".parse::<CommuteStatus>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&CommuteStatus::Draft).unwrap();
        assert_eq!(json, "\"draft\"");
    }

    #[test]
    fn test_new_commute_defaults() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let commute = NewCommute::new(date);
        assert!(commute.is_outbound);
        assert!(commute.status.is_none());
        assert!(commute.departure_time.is_none());
    }

    #[test]
    fn test_is_valid_time() {
        assert!(is_valid_time("08:30"));
        assert!(is_valid_time("8:30"));
        assert!(is_valid_time("23:59"));
        assert!(!is_valid_time("24:00"));
        assert!(!is_valid_time("08:60"));
        assert!(!is_valid_time("0830"));
        assert!(!is_valid_time("08:3"));
        assert!(!is_valid_time(""));
    }
}
