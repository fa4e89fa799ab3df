// Versioned additive migrations for the commutes table

use crate::error::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension, Transaction};
use tracing::{debug, info, warn};

pub const COMMUTES_TABLE: &str = "commutes";

const CREATE_COMMUTES: &str = r#"
    CREATE TABLE IF NOT EXISTS commutes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        departureTime TEXT,
        arrivalPlatformTime TEXT,
        arrivalBusTime TEXT,
        arrivalDestinationTime TEXT,
        finalArrivalTime TEXT,
        isOutbound INTEGER DEFAULT 1,
        duration TEXT,
        transport TEXT,
        notes TEXT,
        createdAt DATETIME DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// One schema step. Steps probe before altering, so re-running one is harmless.
#[derive(Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    /// A failing required step aborts initialization; others are logged and skipped
    pub required: bool,
    pub apply: fn(&Transaction) -> rusqlite::Result<()>,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .field("required", &self.required)
            .finish()
    }
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_commutes",
        required: true,
        apply: create_commutes,
    },
    Migration {
        version: 2,
        name: "add_status",
        required: false,
        apply: add_status,
    },
    Migration {
        version: 3,
        name: "add_updated_at",
        required: false,
        apply: add_updated_at,
    },
    Migration {
        version: 4,
        name: "add_path_id",
        required: false,
        apply: add_path_id,
    },
];

fn create_commutes(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(CREATE_COMMUTES)
}

fn add_status(tx: &Transaction) -> rusqlite::Result<()> {
    if has_column(tx, COMMUTES_TABLE, "status")? {
        return Ok(());
    }
    tx.execute_batch(
        "ALTER TABLE commutes ADD COLUMN status TEXT DEFAULT 'completed';
         UPDATE commutes SET status = 'completed' WHERE status IS NULL;",
    )
}

// SQLite refuses CURRENT_TIMESTAMP as the default of an added column,
// so existing rows are backfilled from createdAt instead.
fn add_updated_at(tx: &Transaction) -> rusqlite::Result<()> {
    if has_column(tx, COMMUTES_TABLE, "updatedAt")? {
        return Ok(());
    }
    tx.execute_batch(
        "ALTER TABLE commutes ADD COLUMN updatedAt DATETIME;
         UPDATE commutes SET updatedAt = createdAt WHERE updatedAt IS NULL;",
    )
}

fn add_path_id(tx: &Transaction) -> rusqlite::Result<()> {
    if has_column(tx, COMMUTES_TABLE, "pathId")? {
        return Ok(());
    }
    tx.execute_batch("ALTER TABLE commutes ADD COLUMN pathId TEXT;")
}

/// Optional columns detected on the live table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaCaps {
    pub status: bool,
    pub updated_at: bool,
    pub path_id: bool,
}

impl SchemaCaps {
    pub fn detect(conn: &Connection) -> rusqlite::Result<Self> {
        let columns = table_columns(conn, COMMUTES_TABLE)?;
        let has = |name: &str| columns.iter().any(|c| c == name);
        Ok(Self {
            status: has("status"),
            updated_at: has("updatedAt"),
            path_id: has("pathId"),
        })
    }
}

/// Column names of `table`, in declaration order
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info('{}')", table))?;
    let cols = stmt.query_map([], |row| row.get::<_, String>(1))?;
    cols.collect()
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    Ok(table_columns(conn, table)?.iter().any(|c| c == column))
}

fn ensure_migrations_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
}

fn is_applied(conn: &Connection, version: u32) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM schema_migrations WHERE version = ?1",
        [version],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Highest recorded migration version, 0 for an unmanaged database
pub fn current_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
}

fn apply_one(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    (migration.apply)(&tx)?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.name],
    )?;
    tx.commit()
}

/// Apply every pending step in order, each in its own transaction.
///
/// Optional steps that fail are rolled back, logged and left unrecorded so the
/// next run retries them. Returns the number of steps applied.
pub fn run_migrations(conn: &mut Connection, migrations: &[Migration]) -> StoreResult<usize> {
    ensure_migrations_table(conn).map_err(StoreError::Init)?;

    let mut applied = 0;
    for migration in migrations {
        if is_applied(conn, migration.version).map_err(StoreError::Init)? {
            debug!(version = migration.version, name = migration.name, "Migration already applied");
            continue;
        }

        match apply_one(conn, migration) {
            Ok(()) => {
                info!(version = migration.version, name = migration.name, "Applied migration");
                applied += 1;
            }
            Err(e) if migration.required => return Err(StoreError::Init(e)),
            Err(e) => {
                warn!(
                    version = migration.version,
                    name = migration.name,
                    error = %e,
                    "Optional migration failed, continuing without it"
                );
            }
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_COMMUTES).unwrap();
        conn.execute(
            "INSERT INTO commutes (date, departureTime, isOutbound, createdAt)
             VALUES ('2024-12-01', '07:45', 1, '2024-12-01 07:50:00')",
            [],
        )
        .unwrap();
        conn
    }

    fn broken_step(tx: &Transaction) -> rusqlite::Result<()> {
        tx.execute_batch("ALTER TABLE no_such_table ADD COLUMN x TEXT;")
    }

    #[test]
    fn test_fresh_database_gets_all_columns() {
        let mut conn = Connection::open_in_memory().unwrap();
        let applied = run_migrations(&mut conn, MIGRATIONS).unwrap();

        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), 4);
        let caps = SchemaCaps::detect(&conn).unwrap();
        assert_eq!(
            caps,
            SchemaCaps {
                status: true,
                updated_at: true,
                path_id: true
            }
        );
    }

    #[test]
    fn test_rerun_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn, MIGRATIONS).unwrap();
        let before = table_columns(&conn, COMMUTES_TABLE).unwrap();

        let applied = run_migrations(&mut conn, MIGRATIONS).unwrap();
        assert_eq!(applied, 0);
        assert_eq!(table_columns(&conn, COMMUTES_TABLE).unwrap(), before);
    }

    #[test]
    fn test_legacy_table_is_backfilled() {
        let mut conn = legacy_connection();
        assert_eq!(SchemaCaps::detect(&conn).unwrap(), SchemaCaps::default());

        run_migrations(&mut conn, MIGRATIONS).unwrap();

        let (status, updated_at): (String, String) = conn
            .query_row("SELECT status, updatedAt FROM commutes", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(status, "completed");
        assert_eq!(updated_at, "2024-12-01 07:50:00");
    }

    #[test]
    fn test_existing_column_is_adopted_without_alter() {
        let mut conn = legacy_connection();
        conn.execute_batch("ALTER TABLE commutes ADD COLUMN status TEXT DEFAULT 'completed';")
            .unwrap();

        run_migrations(&mut conn, MIGRATIONS).unwrap();

        assert!(is_applied(&conn, 2).unwrap());
        assert!(SchemaCaps::detect(&conn).unwrap().status);
    }

    #[test]
    fn test_failed_optional_step_does_not_block_later_steps() {
        let mut conn = Connection::open_in_memory().unwrap();
        let steps = [
            MIGRATIONS[0],
            Migration {
                version: 2,
                name: "broken",
                required: false,
                apply: broken_step,
            },
            MIGRATIONS[3],
        ];

        let applied = run_migrations(&mut conn, &steps).unwrap();
        assert_eq!(applied, 2);
        assert!(!is_applied(&conn, 2).unwrap());

        let caps = SchemaCaps::detect(&conn).unwrap();
        assert!(!caps.status);
        assert!(caps.path_id);

        // The real step is picked up on the next run
        let applied = run_migrations(&mut conn, MIGRATIONS).unwrap();
        assert_eq!(applied, 2);
        assert!(SchemaCaps::detect(&conn).unwrap().status);
    }

    #[test]
    fn test_failed_required_step_is_init_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        let steps = [Migration {
            version: 1,
            name: "broken",
            required: true,
            apply: broken_step,
        }];

        let err = run_migrations(&mut conn, &steps).unwrap_err();
        assert!(matches!(err, StoreError::Init(_)));
    }
}
