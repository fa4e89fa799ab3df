// Query shapes for loading commutes

use crate::schema::SchemaCaps;
use chrono::NaiveDate;

/// Which commutes a load should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommuteFilter {
    All,
    Completed,
    Drafts,
    /// Inclusive on both ends
    DateRange { start: NaiveDate, end: NaiveDate },
}

const BY_DATE: &str = "date DESC, departureTime DESC";

impl CommuteFilter {
    /// Full SELECT for this filter against the detected schema.
    ///
    /// Returns None when the schema cannot hold any matching row
    /// (drafts without a status column).
    pub(crate) fn to_sql(self, caps: &SchemaCaps) -> Option<String> {
        let (condition, order) = match self {
            CommuteFilter::All => (None, BY_DATE),
            CommuteFilter::Completed if !caps.status => (None, BY_DATE),
            CommuteFilter::Completed => (Some("(status IS NULL OR status != 'draft')"), BY_DATE),
            CommuteFilter::Drafts if !caps.status => return None,
            CommuteFilter::Drafts => (
                Some("status = 'draft'"),
                if caps.updated_at {
                    "updatedAt DESC"
                } else {
                    "createdAt DESC, date DESC"
                },
            ),
            CommuteFilter::DateRange { .. } => (Some("date BETWEEN ?1 AND ?2"), BY_DATE),
        };

        let mut sql = String::from("SELECT * FROM commutes");
        if let Some(condition) = condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
        Some(sql)
    }

    /// Positional parameters matching `to_sql`
    pub(crate) fn params(self) -> Vec<String> {
        match self {
            CommuteFilter::DateRange { start, end } => vec![
                start.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string(),
            ],
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for CommuteFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommuteFilter::All => write!(f, "all"),
            CommuteFilter::Completed => write!(f, "completed"),
            CommuteFilter::Drafts => write!(f, "drafts"),
            CommuteFilter::DateRange { start, end } => write!(f, "{}..{}", start, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: SchemaCaps = SchemaCaps {
        status: true,
        updated_at: true,
        path_id: true,
    };

    #[test]
    fn test_all_orders_by_date_then_departure() {
        let sql = CommuteFilter::All.to_sql(&FULL).unwrap();
        assert_eq!(sql, "SELECT * FROM commutes ORDER BY date DESC, departureTime DESC");
    }

    #[test]
    fn test_completed_without_status_column_loads_everything() {
        let sql = CommuteFilter::Completed.to_sql(&SchemaCaps::default()).unwrap();
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_drafts_ordering_depends_on_updated_at() {
        let sql = CommuteFilter::Drafts.to_sql(&FULL).unwrap();
        assert!(sql.ends_with("ORDER BY updatedAt DESC"));

        let caps = SchemaCaps {
            status: true,
            ..SchemaCaps::default()
        };
        let sql = CommuteFilter::Drafts.to_sql(&caps).unwrap();
        assert!(sql.ends_with("ORDER BY createdAt DESC, date DESC"));

        assert!(CommuteFilter::Drafts.to_sql(&SchemaCaps::default()).is_none());
    }

    #[test]
    fn test_date_range_params() {
        let filter = CommuteFilter::DateRange {
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        };
        assert!(filter.to_sql(&FULL).unwrap().contains("BETWEEN ?1 AND ?2"));
        assert_eq!(filter.params(), vec!["2025-01-01", "2025-01-31"]);
        assert_eq!(filter.to_string(), "2025-01-01..2025-01-31");
    }
}
