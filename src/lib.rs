// Library crate for match statistics ingestion
// Public API for the surrounding log-ingestion service and integration tests

pub mod config;
pub mod event;
pub mod finalize;
pub mod ingest;
pub mod stats;
pub mod store;
pub mod telemetry;

// Re-export commonly used types for easier access in tests
pub use config::{ConfigError, IngestConfig};
pub use event::{EventKind, MatchEvent, PlayerId, ServerEvent, Team};
pub use finalize::{FinalizeError, MatchFinalizer};
pub use ingest::{FinalizeReport, MatchIngestService};
pub use stats::{ApplyOutcome, FinalizedMatch, Match, MatchError, MatchOptions, MatchState};
pub use store::{InMemoryMatchStore, MatchStore, PersistStep, StoreError};
