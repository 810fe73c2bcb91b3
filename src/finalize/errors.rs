use std::time::Duration;

use thiserror::Error;

use crate::store::{PersistStep, StoreError};

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("incomplete match: start time and map name are required")]
    IncompleteMatch,

    #[error("insufficient players: found {found}, need at least {required}")]
    InsufficientPlayers { found: usize, required: usize },

    #[error("persisting match failed at {step}: {source}")]
    Persistence {
        step: PersistStep,
        #[source]
        source: StoreError,
    },

    #[error("finalize did not complete within {0:?}")]
    Timeout(Duration),

    #[error("person store failed: {0}")]
    Person(#[source] StoreError),
}

impl FinalizeError {
    pub(crate) fn at(step: PersistStep) -> impl FnOnce(StoreError) -> FinalizeError {
        move |source| FinalizeError::Persistence { step, source }
    }

    /// The match was refused before any write was attempted
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            FinalizeError::IncompleteMatch | FinalizeError::InsufficientPlayers { .. }
        )
    }

    pub fn failed_step(&self) -> Option<PersistStep> {
        match self {
            FinalizeError::Persistence { step, .. } => Some(*step),
            _ => None,
        }
    }
}
