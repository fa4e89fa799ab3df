// commute-log - personal commute log on an embedded SQLite store

pub mod config;
pub mod error;
pub mod filter;
pub mod jsonl;
pub mod paths;
pub mod period;
pub mod record;
pub mod schema;
pub mod snapshot;
pub mod stats;
pub mod store;

// Re-export main types for convenience
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use filter::CommuteFilter;
pub use jsonl::now_ms;
pub use paths::{CommutePath, PathStep, PathStore, available_steps};
pub use period::Period;
pub use record::{Commute, CommuteStatus, NewCommute};
pub use schema::SchemaCaps;
pub use stats::{CommuteStats, average_duration, compute_duration};
pub use store::CommuteStore;

// Re-export rusqlite for callers that bring their own connection
pub use rusqlite;
