use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Lowest 64-bit community id for an individual account. Anything at or
/// below it is a placeholder (recording host, unauthenticated bot).
pub const STEAM_ID64_BASE: u64 = 76_561_197_960_265_728;

/// Unique identifier of a player within the event feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(u64);

impl PlayerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Database representation (BIGINT). Community ids fit comfortably in i63.
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    pub fn from_i64(raw: i64) -> Self {
        Self(raw as u64)
    }

    /// Whether this id resolves to a real account
    pub fn is_valid(&self) -> bool {
        self.0 > STEAM_ID64_BASE
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Team {
    #[default]
    #[strum(to_string = "UNASSIGNED")]
    Unassigned,
    #[strum(to_string = "SPEC", serialize = "Spectator")]
    Spectator,
    #[strum(to_string = "RED")]
    Red,
    #[strum(to_string = "BLU", serialize = "Blue")]
    Blu,
}

impl Team {
    /// The other playable team. Non-playable teams map to Spectator.
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blu,
            Team::Blu => Team::Red,
            Team::Unassigned | Team::Spectator => Team::Spectator,
        }
    }

    pub fn is_playable(self) -> bool {
        matches!(self, Team::Red | Team::Blu)
    }

    pub fn code(self) -> i16 {
        match self {
            Team::Unassigned => 0,
            Team::Spectator => 1,
            Team::Red => 2,
            Team::Blu => 3,
        }
    }

    pub fn from_code(code: i16) -> Team {
        match code {
            1 => Team::Spectator,
            2 => Team::Red,
            3 => Team::Blu,
            _ => Team::Unassigned,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PlayerClass {
    Spectator,
    Scout,
    Soldier,
    Pyro,
    #[strum(to_string = "demo", serialize = "demoman")]
    Demo,
    #[strum(to_string = "heavy", serialize = "heavyweapons")]
    Heavy,
    Engineer,
    Medic,
    Sniper,
    Spy,
}

impl PlayerClass {
    /// The support class that heals teammates and builds charge
    pub fn is_healer(self) -> bool {
        self == PlayerClass::Medic
    }

    pub fn code(self) -> i16 {
        match self {
            PlayerClass::Spectator => 0,
            PlayerClass::Scout => 1,
            PlayerClass::Soldier => 2,
            PlayerClass::Pyro => 3,
            PlayerClass::Demo => 4,
            PlayerClass::Heavy => 5,
            PlayerClass::Engineer => 6,
            PlayerClass::Medic => 7,
            PlayerClass::Sniper => 8,
            PlayerClass::Spy => 9,
        }
    }

    pub fn from_code(code: i16) -> Option<PlayerClass> {
        let class = match code {
            0 => PlayerClass::Spectator,
            1 => PlayerClass::Scout,
            2 => PlayerClass::Soldier,
            3 => PlayerClass::Pyro,
            4 => PlayerClass::Demo,
            5 => PlayerClass::Heavy,
            6 => PlayerClass::Engineer,
            7 => PlayerClass::Medic,
            8 => PlayerClass::Sniper,
            9 => PlayerClass::Spy,
            _ => return None,
        };
        Some(class)
    }
}

/// Charge variants a healer can deploy, keyed by the medigun that built it
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum ChargeType {
    #[strum(to_string = "uber", serialize = "medigun")]
    Uber,
    #[strum(to_string = "kritzkrieg", serialize = "kritz")]
    Kritzkrieg,
    #[strum(to_string = "vaccinator", serialize = "vacc")]
    Vaccinator,
    #[strum(serialize = "quickfix")]
    QuickFix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum PickupItem {
    #[strum(serialize = "medkit_small")]
    HealthSmall,
    #[strum(serialize = "medkit_medium")]
    HealthMedium,
    #[strum(serialize = "medkit_large")]
    HealthLarge,
    #[strum(serialize = "ammopack_small")]
    AmmoSmall,
    #[strum(serialize = "ammopack_medium")]
    AmmoMedium,
    #[strum(serialize = "ammopack_large")]
    AmmoLarge,
}

impl PickupItem {
    pub fn is_health_pack(self) -> bool {
        matches!(
            self,
            PickupItem::HealthSmall | PickupItem::HealthMedium | PickupItem::HealthLarge
        )
    }
}

/// Finishing-move subtypes carried on custom kill events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CustomKill {
    Backstab,
    Headshot,
    Airshot,
    FeignDeath,
}

/// A player as referenced by a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub id: PlayerId,
    #[serde(default)]
    pub team: Team,
}

impl PlayerRef {
    pub fn new(id: impl Into<PlayerId>, team: Team) -> Self {
        Self {
            id: id.into(),
            team,
        }
    }
}
