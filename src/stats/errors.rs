use thiserror::Error;

use crate::event::EventKind;

/// Errors raised while applying a single event to a match
///
/// None of these abort the stream; the caller counts them and moves on.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("{kind} event is missing required field `{key}`")]
    MissingMetadata { kind: EventKind, key: &'static str },

    #[error("{kind} event has invalid `{key}` value: {value}")]
    InvalidMetadata {
        kind: EventKind,
        key: &'static str,
        value: String,
    },
}
