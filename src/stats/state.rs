use serde::Serialize;
use strum_macros::Display;

use crate::event::EventKind;

/// Round/game lifecycle of one match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
pub enum MatchState {
    /// Warmup: nothing has started yet
    #[default]
    Idle,
    InRound,
    OutOfRound,
    /// Terminal
    Ended,
}

impl MatchState {
    /// Transition table for lifecycle events.
    ///
    /// Returns `None` for kinds that are not lifecycle events and for any
    /// lifecycle event arriving after the match has ended.
    pub fn next(self, kind: EventKind) -> Option<MatchState> {
        use MatchState::*;

        match (self, kind) {
            (Ended, EventKind::MapLoad) => Some(Ended),
            (Ended, _) => None,
            (state, EventKind::MapLoad) => Some(state),
            (_, EventKind::RoundStart | EventKind::MiniRoundStart) => Some(InRound),
            (_, EventKind::RoundWin) => Some(OutOfRound),
            (_, EventKind::GameOver) => Some(Ended),
            _ => None,
        }
    }

    /// Only live rounds let gameplay events touch the aggregates
    pub fn accepts_gameplay(self) -> bool {
        self == MatchState::InRound
    }

    /// A round has been seen and the game has not ended
    pub fn in_progress(self) -> bool {
        matches!(self, MatchState::InRound | MatchState::OutOfRound)
    }
}
