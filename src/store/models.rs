use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::event::{ChargeType, PlayerClass, PlayerId, Team};
use crate::stats::{ClassStats, HealerSummary, Killstreak, PlayerAggregate, WeaponStats};

/// `match` row as written; the id is generated by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMatch {
    pub correlation_id: Uuid,
    pub server_id: i32,
    pub map_name: String,
    pub title: String,
    pub score_red: i32,
    pub score_blu: i32,
    pub winner: Team,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMatchPlayer {
    pub match_id: i64,
    pub player_id: PlayerId,
    pub team: Team,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    pub kills: i32,
    pub assists: i32,
    pub deaths: i32,
    pub suicides: i32,
    pub damage: i64,
    pub damage_taken: i64,
    pub healing: i64,
    pub healing_taken: i64,
    pub health_packs: i32,
    pub extinguishes: i32,
    pub structures_built: i32,
}

impl NewMatchPlayer {
    /// Missing session times fall back to the match bounds
    pub fn from_aggregate(
        match_id: i64,
        player: &PlayerAggregate,
        match_start: DateTime<Utc>,
        match_end: DateTime<Utc>,
    ) -> Self {
        Self {
            match_id,
            player_id: player.player_id,
            team: player.team,
            time_start: player.time_start.unwrap_or(match_start),
            time_end: player.time_end.unwrap_or(match_end),
            kills: player.kills,
            assists: player.assists,
            deaths: player.deaths,
            suicides: player.suicides,
            damage: player.damage,
            damage_taken: player.damage_taken,
            healing: player.healing,
            healing_taken: player.healing_taken,
            health_packs: player.health_packs,
            extinguishes: player.extinguishes,
            structures_built: player.structures_built,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchWeaponRow {
    pub match_player_id: i64,
    pub weapon_id: i32,
    pub kills: i32,
    pub damage: i64,
    pub shots: i32,
    pub hits: i32,
    pub backstabs: i32,
    pub headshots: i32,
    pub airshots: i32,
}

impl MatchWeaponRow {
    pub fn new(match_player_id: i64, weapon_id: i32, stats: &WeaponStats) -> Self {
        Self {
            match_player_id,
            weapon_id,
            kills: stats.kills,
            damage: stats.damage,
            shots: stats.shots,
            hits: stats.hits,
            backstabs: stats.backstabs,
            headshots: stats.headshots,
            airshots: stats.airshots,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPlayerClassRow {
    pub match_player_id: i64,
    pub class: PlayerClass,
    pub kills: i32,
    pub assists: i32,
    pub deaths: i32,
    pub playtime_secs: i64,
    pub dominations: i32,
    pub dominated: i32,
    pub revenges: i32,
    pub damage: i64,
    pub damage_taken: i64,
    pub healing_taken: i64,
    pub captures: i32,
    pub captures_blocked: i32,
    pub structures_destroyed: i32,
}

impl MatchPlayerClassRow {
    pub fn new(match_player_id: i64, class: PlayerClass, stats: &ClassStats) -> Self {
        Self {
            match_player_id,
            class,
            kills: stats.kills,
            assists: stats.assists,
            deaths: stats.deaths,
            playtime_secs: stats.playtime_secs,
            dominations: stats.dominations,
            dominated: stats.dominated,
            revenges: stats.revenges,
            damage: stats.damage,
            damage_taken: stats.damage_taken,
            healing_taken: stats.healing_taken,
            captures: stats.captures,
            captures_blocked: stats.captures_blocked,
            structures_destroyed: stats.structures_destroyed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchKillstreakRow {
    pub match_player_id: i64,
    pub class: PlayerClass,
    pub kills: i32,
    pub duration_secs: i64,
}

impl MatchKillstreakRow {
    pub fn new(match_player_id: i64, streak: &Killstreak) -> Self {
        Self {
            match_player_id,
            class: streak.class,
            kills: streak.kills,
            duration_secs: streak.duration_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchMedicRow {
    pub match_player_id: i64,
    pub healing: i64,
    pub drops: i32,
    pub near_full_charge_deaths: i32,
    pub avg_charge_length: f64,
    pub major_advantage_lost: i32,
    pub biggest_advantage_lost: i32,
    pub charges_uber: i32,
    pub charges_kritzkrieg: i32,
    pub charges_vaccinator: i32,
    pub charges_quickfix: i32,
}

impl MatchMedicRow {
    pub fn new(match_player_id: i64, summary: &HealerSummary) -> Self {
        let healer = &summary.healer;
        Self {
            match_player_id,
            healing: healer.healing,
            drops: healer.drops,
            near_full_charge_deaths: healer.near_full_charge_deaths,
            avg_charge_length: summary.average_charge_length,
            major_advantage_lost: healer.major_advantage_lost,
            biggest_advantage_lost: healer.biggest_advantage_lost,
            charges_uber: healer.charge_count(ChargeType::Uber),
            charges_kritzkrieg: healer.charge_count(ChargeType::Kritzkrieg),
            charges_vaccinator: healer.charge_count(ChargeType::Vaccinator),
            charges_quickfix: healer.charge_count(ChargeType::QuickFix),
        }
    }
}

/// Identity record referenced by `match_player`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    pub player_id: PlayerId,
    pub created_on: DateTime<Utc>,
}

/// A player row read back with every child row that references it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPlayer {
    pub match_player_id: i64,
    pub row: NewMatchPlayer,
    pub weapons: Vec<MatchWeaponRow>,
    pub classes: Vec<MatchPlayerClassRow>,
    pub killstreaks: Vec<MatchKillstreakRow>,
    pub medic: Option<MatchMedicRow>,
}

/// A persisted match graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMatch {
    pub match_id: i64,
    pub header: NewMatch,
    pub players: Vec<StoredPlayer>,
}

impl StoredMatch {
    pub fn player(&self, player_id: PlayerId) -> Option<&StoredPlayer> {
        self.players.iter().find(|p| p.row.player_id == player_id)
    }
}

/// Row totals across every match table, for assertions and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub matches: usize,
    pub players: usize,
    pub weapons: usize,
    pub classes: usize,
    pub killstreaks: usize,
    pub medics: usize,
}

impl RowCounts {
    pub fn total(&self) -> usize {
        self.matches + self.players + self.weapons + self.classes + self.killstreaks + self.medics
    }
}
