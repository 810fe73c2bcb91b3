pub mod builders;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use builders::{player, six_player_match, MatchScript, HEALER, MAP};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};
