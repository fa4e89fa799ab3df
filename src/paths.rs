// Path configurations: which waypoints a commute tracks

use crate::jsonl::{self, now_ms};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PATHS_FILE_NAME: &str = "paths.jsonl";

/// One trackable waypoint, tied to the commute field that stores its time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub field: String,
    pub enabled: bool,
}

impl PathStep {
    fn new(id: &str, name: &str, emoji: &str, field: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            emoji: emoji.to_string(),
            field: field.to_string(),
            enabled: true,
        }
    }
}

/// Every waypoint a path can track, all enabled
pub fn available_steps() -> Vec<PathStep> {
    vec![
        PathStep::new("departure", "Departure", "🏠", "departureTime"),
        PathStep::new("platform", "Platform arrival", "🚉", "arrivalPlatformTime"),
        PathStep::new("bus", "Bus arrival", "🚌", "arrivalBusTime"),
        PathStep::new("destination", "Destination arrival", "📍", "arrivalDestinationTime"),
        PathStep::new("final", "Final arrival", "🏢", "finalArrivalTime"),
    ]
}

/// A named set of tracked waypoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommutePath {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub steps: Vec<PathStep>,
    pub is_default: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CommutePath {
    pub fn enabled_steps(&self) -> impl Iterator<Item = &PathStep> {
        self.steps.iter().filter(|s| s.enabled)
    }
}

/// Path configurations kept in an append-only JSONL file
pub struct PathStore {
    file: PathBuf,
}

impl PathStore {
    /// Use the JSONL file at `file`, creating its directory if needed
    pub fn open<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref().to_path_buf();
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { file })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// All paths, default first, then oldest first
    pub fn load_paths(&self) -> Result<Vec<CommutePath>> {
        let mut paths: Vec<CommutePath> = jsonl::read_jsonl_latest(&self.file)?.into_values().collect();
        paths.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(paths)
    }

    pub fn get(&self, id: &str) -> Result<Option<CommutePath>> {
        Ok(self.load_paths()?.into_iter().find(|p| p.id == id))
    }

    pub fn default_path(&self) -> Result<Option<CommutePath>> {
        Ok(self.load_paths()?.into_iter().find(|p| p.is_default))
    }

    /// Create a path. The first path saved becomes the default.
    pub fn save_path(&self, name: &str, emoji: &str, steps: Vec<PathStep>) -> Result<CommutePath> {
        let name = Self::validate_name(name)?;
        let is_default = self.load_paths()?.is_empty();
        let now = now_ms();

        let path = CommutePath {
            id: uuid::Uuid::now_v7().to_string(),
            name,
            emoji: emoji.to_string(),
            steps,
            is_default,
            created_at: now,
            updated_at: now,
        };
        jsonl::append_jsonl(&self.file, &path)?;

        info!(id = %path.id, name = %path.name, is_default, "Saved path");
        Ok(path)
    }

    /// Replace the name, emoji and steps of an existing path
    pub fn update_path(&self, id: &str, name: &str, emoji: &str, steps: Vec<PathStep>) -> Result<CommutePath> {
        let name = Self::validate_name(name)?;
        let mut path = self.get(id)?.ok_or_else(|| eyre!("Path not found: {}", id))?;

        path.name = name;
        path.emoji = emoji.to_string();
        path.steps = steps;
        path.updated_at = now_ms().max(path.updated_at);
        jsonl::append_jsonl(&self.file, &path)?;

        debug!(id, "Updated path");
        Ok(path)
    }

    /// Remove a path. If it was the default, the oldest remaining path takes
    /// over. Returns false when no such path exists.
    pub fn delete_path(&self, id: &str) -> Result<bool> {
        let Some(path) = self.get(id)? else {
            return Ok(false);
        };
        jsonl::append_tombstone(&self.file, id)?;

        if path.is_default {
            if let Some(next) = self.load_paths()?.into_iter().next() {
                self.set_default_path(&next.id)?;
            }
        }

        info!(id, "Deleted path");
        Ok(true)
    }

    /// Make `id` the only default path
    pub fn set_default_path(&self, id: &str) -> Result<()> {
        let paths = self.load_paths()?;
        if !paths.iter().any(|p| p.id == id) {
            return Err(eyre!("Path not found: {}", id));
        }

        for mut path in paths {
            let should_be_default = path.id == id;
            if path.is_default != should_be_default {
                path.is_default = should_be_default;
                path.updated_at = now_ms().max(path.updated_at);
                jsonl::append_jsonl(&self.file, &path)?;
            }
        }

        debug!(id, "Set default path");
        Ok(())
    }

    fn validate_name(name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(eyre!("Path name cannot be empty"));
        }
        if name.len() > 64 {
            return Err(eyre!("Path name too long: {} (max 64 chars)", name));
        }
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> PathStore {
        PathStore::open(temp.path().join(PATHS_FILE_NAME)).unwrap()
    }

    #[test]
    fn test_available_steps_map_commute_fields() {
        let fields: Vec<String> = available_steps().into_iter().map(|s| s.field).collect();
        assert_eq!(
            fields,
            vec![
                "departureTime",
                "arrivalPlatformTime",
                "arrivalBusTime",
                "arrivalDestinationTime",
                "finalArrivalTime"
            ]
        );
    }

    #[test]
    fn test_first_path_becomes_default() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let home = store.save_path("Home to office", "🏠→🏢", available_steps()).unwrap();
        let gym = store.save_path("Gym", "🏋", available_steps()).unwrap();

        assert!(home.is_default);
        assert!(!gym.is_default);
        assert_eq!(store.default_path().unwrap().unwrap().id, home.id);
        assert_eq!(store.load_paths().unwrap().len(), 2);
    }

    #[test]
    fn test_set_default_leaves_one_default() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        store.save_path("A", "", available_steps()).unwrap();
        let b = store.save_path("B", "", available_steps()).unwrap();

        store.set_default_path(&b.id).unwrap();

        let paths = store.load_paths().unwrap();
        let defaults: Vec<&str> = paths.iter().filter(|p| p.is_default).map(|p| p.id.as_str()).collect();
        assert_eq!(defaults, vec![b.id.as_str()]);
        assert_eq!(paths[0].id, b.id);
    }

    #[test]
    fn test_set_default_unknown_path() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(store.set_default_path("missing").is_err());
    }

    #[test]
    fn test_update_path() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let path = store.save_path("Old", "", available_steps()).unwrap();

        let mut steps = available_steps();
        steps[2].enabled = false;
        let updated = store.update_path(&path.id, "New", "🚆", steps).unwrap();

        assert_eq!(updated.created_at, path.created_at);
        let reloaded = store.get(&path.id).unwrap().unwrap();
        assert_eq!(reloaded.name, "New");
        assert_eq!(reloaded.enabled_steps().count(), 4);
        assert!(reloaded.is_default);
    }

    #[test]
    fn test_update_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(store.update_path("missing", "Name", "", available_steps()).is_err());
    }

    #[test]
    fn test_delete_survives_reopen_and_promotes_default() {
        let temp = TempDir::new().unwrap();
        let first = {
            let store = open_store(&temp);
            let first = store.save_path("First", "", available_steps()).unwrap();
            let second = store.save_path("Second", "", available_steps()).unwrap();
            assert!(store.delete_path(&first.id).unwrap());
            assert_eq!(store.default_path().unwrap().unwrap().id, second.id);
            first
        };

        let store = open_store(&temp);
        assert!(store.get(&first.id).unwrap().is_none());
        assert_eq!(store.load_paths().unwrap().len(), 1);
        assert!(!store.delete_path(&first.id).unwrap());
    }

    #[test]
    fn test_empty_name_rejected() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(store.save_path("   ", "", available_steps()).is_err());
        assert!(store.load_paths().unwrap().is_empty());
    }
}
