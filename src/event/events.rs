use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::types::{PlayerId, PlayerRef, Team};

/// Kinds of typed match events produced by the upstream log parser
///
/// Events represent facts about things that already happened on a game
/// server. The engine only consumes them; it never parses raw log text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    // Markers
    /// Line the parser recognised and chose to drop
    Ignored,
    /// Line the parser could not classify
    Unhandled,

    // Lifecycle
    MapLoad,
    RoundStart,
    MiniRoundStart,
    RoundWin,
    GameOver,

    // World metadata, processed in any state
    TeamScore,
    TeamFinalScore,
    RoundLength,
    RoundOvertime,
    LogStop,

    // Live gameplay
    Kill,
    KillAssist,
    CustomKill,
    Suicide,
    Damage,
    Heal,
    Domination,
    Revenge,
    Pickup,
    ChangeClass,
    SpawnedAs,
    ShotFired,
    ShotHit,
    Extinguish,
    BuiltObject,
    KilledObject,
    CarryObject,
    DropObject,
    DetonatedObject,
    PointCaptured,
    CaptureBlocked,
    ChargeDeployed,
    ChargeEnded,
    MedicDeath,
    MedicDeathEx,
    LostUberAdv,
    FirstHealAfterSpawn,
}

/// How the match state machine treats an event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Marker,
    Lifecycle,
    World,
    Gameplay,
}

impl EventKind {
    pub fn category(self) -> EventCategory {
        match self {
            EventKind::Ignored | EventKind::Unhandled => EventCategory::Marker,
            EventKind::MapLoad
            | EventKind::RoundStart
            | EventKind::MiniRoundStart
            | EventKind::RoundWin
            | EventKind::GameOver => EventCategory::Lifecycle,
            EventKind::TeamScore
            | EventKind::TeamFinalScore
            | EventKind::RoundLength
            | EventKind::RoundOvertime
            | EventKind::LogStop => EventCategory::World,
            _ => EventCategory::Gameplay,
        }
    }
}

/// One typed event for a single match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEvent {
    pub kind: EventKind,
    pub created_on: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<PlayerRef>,
    #[serde(default)]
    pub target: Option<PlayerRef>,
    /// Weapon key as emitted by the game (e.g. "tf_projectile_rocket")
    #[serde(default)]
    pub weapon: Option<String>,
    /// Event specific fields: charge type, percentages, seconds, map name...
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub damage: i64,
    #[serde(default)]
    pub real_damage: i64,
    #[serde(default)]
    pub healing: i64,
}

impl MatchEvent {
    pub fn new(kind: EventKind, created_on: DateTime<Utc>) -> Self {
        Self {
            kind,
            created_on,
            source: None,
            target: None,
            weapon: None,
            metadata: HashMap::new(),
            damage: 0,
            real_damage: 0,
            healing: 0,
        }
    }

    pub fn with_source(mut self, id: impl Into<PlayerId>, team: Team) -> Self {
        self.source = Some(PlayerRef::new(id, team));
        self
    }

    pub fn with_target(mut self, id: impl Into<PlayerId>, team: Team) -> Self {
        self.target = Some(PlayerRef::new(id, team));
        self
    }

    pub fn with_weapon(mut self, weapon: impl Into<String>) -> Self {
        self.weapon = Some(weapon.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    pub fn with_damage(mut self, damage: i64, real_damage: i64) -> Self {
        self.damage = damage;
        self.real_damage = real_damage;
        self
    }

    pub fn with_healing(mut self, healing: i64) -> Self {
        self.healing = healing;
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// "1"/"true" flags as emitted by the parser
    pub fn meta_flag(&self, key: &str) -> bool {
        matches!(self.meta(key), Some("1") | Some("true"))
    }
}

/// An event tagged with the game server that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEvent {
    pub server_id: i32,
    pub server_name: String,
    pub event: MatchEvent,
}

impl ServerEvent {
    /// Decode one JSON line from the parser feed
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
