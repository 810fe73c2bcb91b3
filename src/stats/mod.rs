//! In-memory match aggregation: the round state machine gating gameplay
//! events and the player, team, healer and round aggregates they feed.

mod aggregator;
mod errors;
mod finalized;
mod handlers;
mod healer;
pub mod models;
mod state;

pub use aggregator::{ApplyOutcome, Match, MatchOptions};
pub use errors::MatchError;
pub use finalized::{FinalizedMatch, HealerSummary};
pub use models::*;
pub use state::MatchState;
