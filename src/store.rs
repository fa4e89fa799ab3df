// Commute store backed by a single SQLite database

use crate::error::{StoreError, StoreResult};
use crate::filter::CommuteFilter;
use crate::period::Period;
use crate::record::{Commute, CommuteStatus, NewCommute};
use crate::schema::{self, MIGRATIONS, SchemaCaps};
use crate::snapshot::{self, SnapshotRecord};
use crate::stats::CommuteStats;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, Value};
use rusqlite::{Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Default database file name inside the data directory
pub const DB_FILE_NAME: &str = "commutes.db";

/// Layout SQLite uses for `CURRENT_TIMESTAMP`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Durable storage for commute records on a single device
///
/// The store owns its connection. Optional columns (`status`, `updatedAt`,
/// `pathId`) are detected once during `initialize()` and the result drives
/// every read and write afterwards.
pub struct CommuteStore {
    db: Connection,
    caps: SchemaCaps,
}

impl CommuteStore {
    /// Open or create the database at `path` and bring its schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        debug!(path = %path.display(), "Opening commute database");
        let db = Connection::open(path).map_err(StoreError::Init)?;
        Self::with_connection(db)
    }

    /// In-memory store, gone when dropped
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Connection::open_in_memory().map_err(StoreError::Init)?;
        Self::with_connection(db)
    }

    /// Wrap an already open connection, e.g. one holding a legacy schema
    pub fn with_connection(db: Connection) -> StoreResult<Self> {
        let mut store = Self {
            db,
            caps: SchemaCaps::default(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Apply pending migrations and refresh the cached schema capabilities.
    ///
    /// Safe to call repeatedly; later calls only re-check the schema.
    pub fn initialize(&mut self) -> StoreResult<()> {
        let applied = schema::run_migrations(&mut self.db, MIGRATIONS)?;
        self.caps = SchemaCaps::detect(&self.db).map_err(StoreError::Init)?;
        info!(applied, caps = ?self.caps, "Commute store initialized");
        Ok(())
    }

    /// Optional columns available on this database
    pub fn schema_caps(&self) -> SchemaCaps {
        self.caps
    }

    /// Highest applied migration version
    pub fn schema_version(&self) -> StoreResult<u32> {
        schema::current_version(&self.db).map_err(StoreError::Init)
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert a new commute and return its id
    pub fn save(&self, commute: &NewCommute) -> StoreResult<i64> {
        let mut columns = WriteColumns::for_commute(commute, &self.caps);
        if self.caps.updated_at {
            columns.raw("updatedAt", "CURRENT_TIMESTAMP");
        }

        self.db.execute(&columns.insert_sql(), columns.params().as_slice())?;
        let id = self.db.last_insert_rowid();
        debug!(id, date = %commute.date, "Saved commute");
        Ok(id)
    }

    /// Replace every field of commute `id` except `id` and `createdAt`.
    ///
    /// The UPDATE runs unconditionally: an unknown id writes nothing and
    /// returns `Ok(false)`.
    pub fn update(&self, id: i64, commute: &NewCommute) -> StoreResult<bool> {
        let mut columns = WriteColumns::for_commute(commute, &self.caps);
        if self.caps.updated_at {
            columns.raw("updatedAt", "CURRENT_TIMESTAMP");
        }
        let sql = columns.update_sql(id);

        let changed = self.db.execute(&sql, columns.params().as_slice())?;
        if changed == 0 {
            debug!(id, "Update matched no commute");
        } else {
            debug!(id, "Updated commute");
        }
        Ok(changed > 0)
    }

    /// Delete commute `id`; unknown ids are ignored
    pub fn delete_by_id(&self, id: i64) -> StoreResult<()> {
        let removed = self.db.execute("DELETE FROM commutes WHERE id = ?1", [id])?;
        debug!(id, removed, "Deleted commute");
        Ok(())
    }

    /// Delete every commute. Returns how many were removed.
    pub fn clear_all(&self) -> StoreResult<usize> {
        let removed = self.db.execute("DELETE FROM commutes", [])?;
        info!(removed, "Cleared all commutes");
        Ok(removed)
    }

    // ========================================================================
    // Reads
    //
    // Read failures are logged and reported as "no data".
    // ========================================================================

    pub fn get_by_id(&self, id: i64) -> Option<Commute> {
        let caps = self.caps;
        let result = self
            .db
            .query_row("SELECT * FROM commutes WHERE id = ?1", [id], |row| {
                row_to_commute(row, &caps)
            })
            .optional();

        match result {
            Ok(commute) => commute,
            Err(e) => {
                warn!(id, error = %e, "Failed to read commute");
                None
            }
        }
    }

    /// Commutes matching `filter`, empty on read failure
    pub fn load(&self, filter: CommuteFilter) -> Vec<Commute> {
        match self.query(filter) {
            Ok(commutes) => commutes,
            Err(e) => {
                warn!(%filter, error = %e, "Failed to load commutes");
                Vec::new()
            }
        }
    }

    /// Every commute, newest date first, then latest departure first
    pub fn load_all(&self) -> Vec<Commute> {
        self.load(CommuteFilter::All)
    }

    /// Commutes not marked as draft
    pub fn load_completed(&self) -> Vec<Commute> {
        self.load(CommuteFilter::Completed)
    }

    /// Drafts, most recently touched first
    pub fn load_drafts(&self) -> Vec<Commute> {
        self.load(CommuteFilter::Drafts)
    }

    /// Commutes dated within `start..=end`
    pub fn load_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<Commute> {
        self.load(CommuteFilter::DateRange { start, end })
    }

    /// Commutes in the period containing `today`
    pub fn load_period(&self, period: Period, today: NaiveDate) -> Vec<Commute> {
        let (start, end) = period.bounds(today);
        self.load_by_date_range(start, end)
    }

    /// Commutes dated today in local time
    pub fn load_today(&self) -> Vec<Commute> {
        self.load_period(Period::Today, chrono::Local::now().date_naive())
    }

    /// Trip counts over the whole log, zeros on read failure
    pub fn stats(&self) -> CommuteStats {
        let result = self.db.query_row(
            "SELECT COUNT(*),
                    COUNT(CASE WHEN isOutbound != 0 AND isOutbound != '' THEN 1 END)
             FROM commutes",
            [],
            |row| {
                let total = row.get::<_, i64>(0)? as u64;
                let outbound = row.get::<_, i64>(1)? as u64;
                Ok(CommuteStats {
                    total,
                    outbound,
                    return_trips: total - outbound,
                })
            },
        );

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to compute commute stats");
            CommuteStats::default()
        })
    }

    fn query(&self, filter: CommuteFilter) -> rusqlite::Result<Vec<Commute>> {
        let Some(sql) = filter.to_sql(&self.caps) else {
            debug!(%filter, "Schema has no status column, nothing to load");
            return Ok(Vec::new());
        };

        let caps = self.caps;
        let mut stmt = self.db.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(filter.params()), |row| {
            row_to_commute(row, &caps)
        })?;
        rows.collect()
    }

    // ========================================================================
    // Backup
    // ========================================================================

    /// Every commute as a pretty-printed JSON array, newest date first.
    ///
    /// Returns None if the table cannot be read or serialized.
    pub fn export_all(&self) -> Option<String> {
        let records = match self.snapshot_records() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to read commutes for export");
                return None;
            }
        };

        match snapshot::to_json(&records) {
            Ok(json) => {
                info!(count = records.len(), "Exported commutes");
                Some(json)
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize export");
                None
            }
        }
    }

    fn snapshot_records(&self) -> rusqlite::Result<Vec<SnapshotRecord>> {
        let caps = self.caps;
        let mut stmt = self
            .db
            .prepare("SELECT * FROM commutes ORDER BY date DESC, departureTime DESC")?;
        let rows = stmt.query_map([], |row| row_to_snapshot(row, &caps))?;
        rows.collect()
    }

    /// Insert every record of a JSON snapshot, all or nothing.
    ///
    /// Records get fresh ids. The first record that fails to insert rolls the
    /// whole batch back. Returns the number of records imported.
    pub fn import_all(&mut self, json: &str) -> StoreResult<usize> {
        let records = snapshot::parse(json)?;
        let caps = self.caps;

        let tx = self.db.transaction()?;
        for (index, record) in records.iter().enumerate() {
            let columns = WriteColumns::for_snapshot(record, &caps)
                .map_err(|source| StoreError::Import { index, source })?;
            tx.execute(&columns.insert_sql(), columns.params().as_slice())
                .map_err(|source| {
                    warn!(index, error = %source, "Import failed, rolling back");
                    StoreError::Import { index, source }
                })?;
        }
        tx.commit()?;

        info!(count = records.len(), "Imported commutes");
        Ok(records.len())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn row_to_commute(row: &Row, caps: &SchemaCaps) -> rusqlite::Result<Commute> {
    let status: Option<String> = if caps.status { row.get("status")? } else { None };

    Ok(Commute {
        id: row.get("id")?,
        date: row.get("date")?,
        departure_time: row.get("departureTime")?,
        arrival_platform_time: row.get("arrivalPlatformTime")?,
        arrival_bus_time: row.get("arrivalBusTime")?,
        arrival_destination_time: row.get("arrivalDestinationTime")?,
        final_arrival_time: row.get("finalArrivalTime")?,
        is_outbound: flag_column(row, "isOutbound")?,
        duration: row.get("duration")?,
        transport: row.get("transport")?,
        notes: row.get("notes")?,
        status: CommuteStatus::from_column(status.as_deref()),
        path_id: if caps.path_id { row.get("pathId")? } else { None },
        created_at: timestamp_column(row, "createdAt")?,
        updated_at: if caps.updated_at {
            timestamp_column(row, "updatedAt")?
        } else {
            None
        },
    })
}

fn row_to_snapshot(row: &Row, caps: &SchemaCaps) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        id: row.get("id")?,
        date: row.get("date")?,
        departure_time: row.get("departureTime")?,
        arrival_platform_time: row.get("arrivalPlatformTime")?,
        arrival_bus_time: row.get("arrivalBusTime")?,
        arrival_destination_time: row.get("arrivalDestinationTime")?,
        final_arrival_time: row.get("finalArrivalTime")?,
        is_outbound: i64::from(flag_column(row, "isOutbound")?),
        duration: row.get("duration")?,
        transport: row.get("transport")?,
        notes: row.get("notes")?,
        created_at: row.get("createdAt")?,
        status: if caps.status { row.get("status")? } else { None },
        updated_at: if caps.updated_at { row.get("updatedAt")? } else { None },
        path_id: if caps.path_id { row.get("pathId")? } else { None },
    })
}

/// Older databases may hold any value in `isOutbound`; read it by truthiness
fn flag_column(row: &Row, name: &str) -> rusqlite::Result<bool> {
    Ok(match row.get::<_, Value>(name)? {
        Value::Null => false,
        Value::Integer(n) => n != 0,
        Value::Real(f) => f != 0.0,
        Value::Text(s) => !s.is_empty(),
        Value::Blob(b) => !b.is_empty(),
    })
}

/// A timestamp that does not parse reads as missing instead of failing the row
fn timestamp_column(row: &Row, name: &str) -> rusqlite::Result<Option<NaiveDateTime>> {
    Ok(match row.get::<_, Value>(name)? {
        Value::Text(s) => {
            let parsed = parse_timestamp(&s).ok();
            if parsed.is_none() {
                debug!(column = name, value = %s, "Ignoring unparseable timestamp");
            }
            parsed
        }
        _ => None,
    })
}

/// Accepts RFC 3339 (converted to UTC) or SQLite's `YYYY-MM-DD HH:MM:SS`
fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
}

fn conversion_failure(err: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(err))
}

// ============================================================================
// Column-set builder
// ============================================================================

/// Columns and bound values for one INSERT or UPDATE
struct WriteColumns {
    names: Vec<&'static str>,
    values: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl WriteColumns {
    fn new() -> Self {
        Self {
            names: Vec::new(),
            values: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Base columns always; optional ones when the schema has them
    fn for_commute(commute: &NewCommute, caps: &SchemaCaps) -> Self {
        let mut columns = Self::new();
        columns.bind("date", commute.date);
        columns.bind("departureTime", commute.departure_time.clone());
        columns.bind("arrivalPlatformTime", commute.arrival_platform_time.clone());
        columns.bind("arrivalBusTime", commute.arrival_bus_time.clone());
        columns.bind("arrivalDestinationTime", commute.arrival_destination_time.clone());
        columns.bind("finalArrivalTime", commute.final_arrival_time.clone());
        columns.bind("isOutbound", i64::from(commute.is_outbound));
        columns.bind("duration", commute.duration.clone());
        columns.bind("transport", commute.transport.clone());
        columns.bind("notes", commute.notes.clone());

        if caps.status {
            columns.bind("status", commute.status.unwrap_or_default().as_str());
        }
        if caps.path_id {
            columns.bind("pathId", commute.path_id.clone());
        }
        columns
    }

    /// Snapshot rows keep their timestamps when present, rewritten in
    /// SQLite's own layout. A date that is not `YYYY-MM-DD` or a timestamp
    /// that does not parse is rejected before it reaches the table.
    fn for_snapshot(record: &SnapshotRecord, caps: &SchemaCaps) -> rusqlite::Result<Self> {
        let date = record
            .date
            .as_deref()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
            .transpose()
            .map_err(conversion_failure)?;
        let created_at = record
            .created_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(conversion_failure)?;
        let updated_at = record
            .updated_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(conversion_failure)?;

        let mut columns = Self::new();
        columns.bind("date", date);
        columns.bind("departureTime", record.departure_time.clone());
        columns.bind("arrivalPlatformTime", record.arrival_platform_time.clone());
        columns.bind("arrivalBusTime", record.arrival_bus_time.clone());
        columns.bind("arrivalDestinationTime", record.arrival_destination_time.clone());
        columns.bind("finalArrivalTime", record.final_arrival_time.clone());
        columns.bind("isOutbound", i64::from(record.is_outbound != 0));
        columns.bind("duration", record.duration.clone());
        columns.bind("transport", record.transport.clone());
        columns.bind("notes", record.notes.clone());
        if let Some(ts) = created_at {
            columns.bind("createdAt", ts.format(TIMESTAMP_FORMAT).to_string());
        }

        if caps.status {
            let status = CommuteStatus::from_column(record.status.as_deref());
            columns.bind("status", status.as_str());
        }
        if caps.updated_at {
            match updated_at.or(created_at) {
                Some(ts) => columns.bind("updatedAt", ts.format(TIMESTAMP_FORMAT).to_string()),
                None => columns.raw("updatedAt", "CURRENT_TIMESTAMP"),
            }
        }
        if caps.path_id {
            columns.bind("pathId", record.path_id.clone());
        }
        Ok(columns)
    }

    fn bind<T: ToSql + 'static>(&mut self, name: &'static str, value: T) {
        self.params.push(Box::new(value));
        self.names.push(name);
        self.values.push(format!("?{}", self.params.len()));
    }

    fn raw(&mut self, name: &'static str, expr: &str) {
        self.names.push(name);
        self.values.push(expr.to_string());
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO commutes ({}) VALUES ({})",
            self.names.join(", "),
            self.values.join(", ")
        )
    }

    /// Binds `id` as the last parameter
    fn update_sql(&mut self, id: i64) -> String {
        let assignments: Vec<String> = self
            .names
            .iter()
            .zip(&self.values)
            .map(|(name, value)| format!("{} = {}", name, value))
            .collect();
        self.params.push(Box::new(id));
        format!(
            "UPDATE commutes SET {} WHERE id = ?{}",
            assignments.join(", "),
            self.params.len()
        )
    }

    fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}
