use serde::Serialize;
use strum_macros::{Display, EnumIter};
use thiserror::Error;

/// The write a unit of work was performing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum PersistStep {
    Begin,
    Match,
    Player,
    Weapon,
    PlayerClass,
    Killstreak,
    Healer,
    Commit,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Injected failure at {0}")]
    Injected(PersistStep),
}
