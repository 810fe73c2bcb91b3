// Typed match event vocabulary
//
// The log parser upstream produces these; everything downstream of this
// module works only with typed events.

// Public API - what other modules can use
pub use events::{EventCategory, EventKind, MatchEvent, ServerEvent};
pub use types::{
    ChargeType, CustomKill, PickupItem, PlayerClass, PlayerId, PlayerRef, Team, STEAM_ID64_BASE,
};

// Internal modules
mod events;
mod types;
