// Append-only JSONL files: latest line per id wins, tombstones delete

use eyre::{Context, Result};
use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Append one record as a JSON line, holding an exclusive lock while writing
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let value = serde_json::to_value(record).context("Failed to serialize record")?;
    append_value(path, &value)
}

/// Append a deletion marker for `id`
pub fn append_tombstone(path: &Path, id: &str) -> Result<()> {
    let tombstone = serde_json::json!({
        "id": id,
        "deleted": true,
        "updatedAt": now_ms(),
    });
    append_value(path, &tombstone)
}

fn append_value(path: &Path, value: &Value) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open JSONL file for appending")?;

    file.lock_exclusive().context("Failed to acquire file lock")?;

    let json = serde_json::to_string(value)?;
    writeln!(file, "{}", json)?;
    file.sync_all()?;

    // Lock is released when file is dropped
    Ok(())
}

/// Read the latest live version of every record in a JSONL file.
///
/// Lines carry `id` and `updatedAt`; for duplicate ids the highest
/// `updatedAt` wins, later lines winning ties. Records whose latest line is a
/// tombstone are dropped. Unreadable or malformed lines are skipped with a
/// warning.
pub fn read_jsonl_latest<T: DeserializeOwned>(path: &Path) -> Result<HashMap<String, T>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let file = File::open(path).context("Failed to open JSONL file")?;
    let reader = BufReader::new(file);
    let mut latest: HashMap<String, (i64, Value)> = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(file = ?path, line = line_num + 1, error = ?e, "Failed to read line, skipping");
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(file = ?path, line = line_num + 1, error = ?e, "Failed to parse JSON, skipping");
                continue;
            }
        };

        let Some(id) = value.get("id").and_then(Value::as_str).map(str::to_string) else {
            warn!(file = ?path, line = line_num + 1, "Line has no id, skipping");
            continue;
        };
        let updated_at = value.get("updatedAt").and_then(Value::as_i64).unwrap_or(0);

        let newer_exists = latest
            .get(&id)
            .is_some_and(|(existing, _)| *existing > updated_at);
        if !newer_exists {
            latest.insert(id, (updated_at, value));
        }
    }

    let mut records = HashMap::new();
    for (id, (_, value)) in latest {
        if value.get("deleted").and_then(Value::as_bool).unwrap_or(false) {
            continue;
        }
        match serde_json::from_value::<T>(value) {
            Ok(record) => {
                records.insert(id, record);
            }
            Err(e) => warn!(file = ?path, id = %id, error = ?e, "Skipping record that doesn't match type"),
        }
    }

    debug!(file = ?path, count = records.len(), "Loaded latest records from JSONL");
    Ok(records)
}
