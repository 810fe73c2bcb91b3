mod service;

pub use service::{FinalizeReport, MatchIngestService};
