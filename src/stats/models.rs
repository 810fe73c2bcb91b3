use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::event::{ChargeType, PlayerClass, PlayerId, Team};

/// Advantage lost beyond this many seconds counts as a major loss
pub const MAJOR_ADVANTAGE_SECS: i32 = 30;

/// Charge percentage window `[low, high)` that counts as a near-full death
pub const NEAR_FULL_CHARGE_PCT: std::ops::Range<i32> = 95..100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeaponStats {
    pub kills: i32,
    pub damage: i64,
    pub shots: i32,
    pub hits: i32,
    pub backstabs: i32,
    pub headshots: i32,
    pub airshots: i32,
}

impl WeaponStats {
    pub fn has_activity(&self) -> bool {
        self.kills > 0
            || self.damage > 0
            || self.shots > 0
            || self.hits > 0
            || self.backstabs > 0
            || self.headshots > 0
            || self.airshots > 0
    }
}

/// Counters credited to whichever class the player was on at the time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassStats {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Killstreak {
    pub class: PlayerClass,
    pub kills: i32,
    pub duration_secs: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct ActiveStreak {
    class: PlayerClass,
    kills: i32,
    started_at: DateTime<Utc>,
    last_kill_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerAggregate {
    pub player_id: PlayerId,
    pub team: Team,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
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
    pub structures_destroyed: i32,
    pub structures_carried: i32,
    /// Carried buildings lost before being placed again
    pub structures_dropped: i32,
    pub structures_detonated: i32,
    pub captures: i32,
    pub captures_blocked: i32,
    pub dominations: i32,
    pub dominated: i32,
    pub revenges: i32,
    pub shots: i32,
    pub hits: i32,
    pub backstabs: i32,
    pub headshots: i32,
    pub airshots: i32,
    /// Classes in the order they were first played
    pub classes: Vec<PlayerClass>,
    pub weapons: BTreeMap<String, WeaponStats>,
    pub class_stats: BTreeMap<PlayerClass, ClassStats>,
    pub killstreaks: BTreeMap<PlayerClass, Killstreak>,
    #[serde(skip)]
    pub(crate) current_class: Option<PlayerClass>,
    #[serde(skip)]
    pub(crate) class_since: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) streak: Option<ActiveStreak>,
}

impl PlayerAggregate {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            team: Team::Unassigned,
            time_start: None,
            time_end: None,
            kills: 0,
            assists: 0,
            deaths: 0,
            suicides: 0,
            damage: 0,
            damage_taken: 0,
            healing: 0,
            healing_taken: 0,
            health_packs: 0,
            extinguishes: 0,
            structures_built: 0,
            structures_destroyed: 0,
            structures_carried: 0,
            structures_dropped: 0,
            structures_detonated: 0,
            captures: 0,
            captures_blocked: 0,
            dominations: 0,
            dominated: 0,
            revenges: 0,
            shots: 0,
            hits: 0,
            backstabs: 0,
            headshots: 0,
            airshots: 0,
            classes: Vec::new(),
            weapons: BTreeMap::new(),
            class_stats: BTreeMap::new(),
            killstreaks: BTreeMap::new(),
            current_class: None,
            class_since: None,
            streak: None,
        }
    }

    /// Stamps the session start if it has not been seen yet
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if self.time_start.is_none() {
            self.time_start = Some(at);
        }
    }

    pub fn current_class(&self) -> Option<PlayerClass> {
        self.current_class
    }

    pub fn has_played(&self, class: PlayerClass) -> bool {
        self.classes.contains(&class)
    }

    /// Adds a class to the played set. Returns true when it was not there yet.
    pub(crate) fn add_class(&mut self, class: PlayerClass) -> bool {
        if self.has_played(class) {
            return false;
        }
        self.classes.push(class);
        true
    }

    /// Class counters for the class currently being played, if known
    pub(crate) fn on_class(&mut self) -> Option<&mut ClassStats> {
        let class = self.current_class?;
        Some(self.class_stats.entry(class).or_default())
    }

    pub(crate) fn weapon(&mut self, key: Option<&str>) -> Option<&mut WeaponStats> {
        let key = key?;
        Some(self.weapons.entry(key.to_string()).or_default())
    }

    /// Moves the player onto `class`, closing the clock and streak of the
    /// previous one. Returns true when the class is new to the played set.
    pub(crate) fn switch_class(
        &mut self,
        class: PlayerClass,
        at: DateTime<Utc>,
        min_streak: i32,
    ) -> bool {
        let added = self.add_class(class);
        if self.current_class != Some(class) {
            self.stop_class_clock(at);
            self.end_streak(min_streak);
            self.current_class = Some(class);
            self.class_stats.entry(class).or_default();
        }
        if self.class_since.is_none() {
            self.class_since = Some(at);
        }
        added
    }

    pub(crate) fn start_class_clock(&mut self, at: DateTime<Utc>) {
        if self.current_class.is_some() {
            self.class_since = Some(at);
        }
    }

    pub(crate) fn stop_class_clock(&mut self, at: DateTime<Utc>) {
        if let (Some(class), Some(since)) = (self.current_class, self.class_since.take()) {
            let secs = (at - since).num_seconds().max(0);
            self.class_stats.entry(class).or_default().playtime_secs += secs;
        }
    }

    pub(crate) fn extend_streak(&mut self, at: DateTime<Utc>, min_streak: i32) {
        let Some(class) = self.current_class else {
            return;
        };
        match self.streak.as_mut() {
            Some(streak) if streak.class == class => {
                streak.kills += 1;
                streak.last_kill_at = at;
            }
            _ => {
                self.end_streak(min_streak);
                self.streak = Some(ActiveStreak {
                    class,
                    kills: 1,
                    started_at: at,
                    last_kill_at: at,
                });
            }
        }
    }

    /// Closes the running streak, keeping it if it is the best for its class
    pub(crate) fn end_streak(&mut self, min_streak: i32) {
        let Some(streak) = self.streak.take() else {
            return;
        };
        if streak.kills < min_streak {
            return;
        }
        let candidate = Killstreak {
            class: streak.class,
            kills: streak.kills,
            duration_secs: (streak.last_kill_at - streak.started_at).num_seconds(),
        };
        let best = self.killstreaks.entry(streak.class).or_insert(candidate);
        if candidate.kills > best.kills {
            *best = candidate;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealerAggregate {
    pub player_id: PlayerId,
    pub healing: i64,
    pub charges: HashMap<ChargeType, i32>,
    pub drops: i32,
    pub near_full_charge_deaths: i32,
    pub major_advantage_lost: i32,
    pub biggest_advantage_lost: i32,
    pub charge_durations: Vec<f64>,
    /// Seconds from each respawn to the first heal
    pub first_heals: Vec<f64>,
}

impl HealerAggregate {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            healing: 0,
            charges: ChargeType::iter().map(|c| (c, 0)).collect(),
            drops: 0,
            near_full_charge_deaths: 0,
            major_advantage_lost: 0,
            biggest_advantage_lost: 0,
            charge_durations: Vec::new(),
            first_heals: Vec::new(),
        }
    }

    pub fn charge_count(&self, charge: ChargeType) -> i32 {
        self.charges.get(&charge).copied().unwrap_or_default()
    }

    pub fn total_charges(&self) -> i32 {
        self.charges.values().sum()
    }

    pub(crate) fn record_charge(&mut self, charge: ChargeType) {
        *self.charges.entry(charge).or_default() += 1;
    }

    pub(crate) fn record_death_charge(&mut self, pct: i32) {
        if NEAR_FULL_CHARGE_PCT.contains(&pct) {
            self.near_full_charge_deaths += 1;
        }
    }

    pub(crate) fn record_advantage_lost(&mut self, secs: i32) {
        if secs > MAJOR_ADVANTAGE_SECS {
            self.major_advantage_lost += 1;
        }
        if secs > self.biggest_advantage_lost {
            self.biggest_advantage_lost = secs;
        }
    }

    /// Mean length in seconds of the charges seen ending; 0 with no samples
    pub fn average_charge_length(&self) -> f64 {
        if self.charge_durations.is_empty() {
            return 0.0;
        }
        self.charge_durations.iter().sum::<f64>() / self.charge_durations.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamAggregate {
    pub team: Team,
    pub kills: i32,
    pub damage: i64,
    pub charges: i32,
    pub drops: i32,
    pub captures: i32,
    pub mid_fights: i32,
}

impl TeamAggregate {
    pub fn new(team: Team) -> Self {
        Self {
            team,
            kills: 0,
            damage: 0,
            charges: 0,
            drops: 0,
            captures: 0,
            mid_fights: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeamScores {
    pub red: i32,
    pub blu: i32,
}

impl TeamScores {
    pub fn set(&mut self, team: Team, score: i32) {
        match team {
            Team::Red => self.red = score,
            Team::Blu => self.blu = score,
            Team::Unassigned | Team::Spectator => {}
        }
    }

    /// Team with the higher score; Unassigned on a tie
    pub fn winner(&self) -> Team {
        match self.red.cmp(&self.blu) {
            std::cmp::Ordering::Greater => Team::Red,
            std::cmp::Ordering::Less => Team::Blu,
            std::cmp::Ordering::Equal => Team::Unassigned,
        }
    }
}

/// Per-team pair of counters used by the round ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeamTally {
    pub red: i64,
    pub blu: i64,
}

impl TeamTally {
    pub fn add(&mut self, team: Team, amount: i64) {
        match team {
            Team::Red => self.red += amount,
            Team::Blu => self.blu += amount,
            Team::Unassigned | Team::Spectator => {}
        }
    }

    pub fn total(&self) -> i64 {
        self.red + self.blu
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub started_at: DateTime<Utc>,
    pub length_secs: f64,
    pub score: TeamScores,
    pub kills: TeamTally,
    pub damage: TeamTally,
    pub charges: TeamTally,
    pub mid_fight: Option<Team>,
    pub overtime: bool,
}

impl RoundRecord {
    pub fn new(started_at: DateTime<Utc>, score: TeamScores) -> Self {
        Self {
            started_at,
            length_secs: 0.0,
            score,
            kills: TeamTally::default(),
            damage: TeamTally::default(),
            charges: TeamTally::default(),
            mid_fight: None,
            overtime: false,
        }
    }
}

/// Running counts of how events were treated, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    pub applied: u64,
    pub discarded: u64,
    pub ignored: u64,
    pub unhandled: u64,
    pub skipped: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn player() -> PlayerAggregate {
        PlayerAggregate::new(PlayerId::new(76_561_198_000_000_001))
    }

    #[test]
    fn touch_only_stamps_once() {
        let mut p = player();
        p.touch(at(5));
        p.touch(at(10));
        assert_eq!(p.time_start, Some(at(5)));
    }

    #[test]
    fn class_set_is_idempotent() {
        let mut p = player();
        assert!(p.switch_class(PlayerClass::Scout, at(0), 3));
        assert!(!p.switch_class(PlayerClass::Scout, at(1), 3));
        assert!(p.switch_class(PlayerClass::Medic, at(2), 3));
        assert_eq!(p.classes, vec![PlayerClass::Scout, PlayerClass::Medic]);
    }

    #[test]
    fn playtime_accumulates_per_class() {
        let mut p = player();
        p.switch_class(PlayerClass::Scout, at(0), 3);
        p.switch_class(PlayerClass::Soldier, at(60), 3);
        p.stop_class_clock(at(100));

        assert_eq!(p.class_stats[&PlayerClass::Scout].playtime_secs, 60);
        assert_eq!(p.class_stats[&PlayerClass::Soldier].playtime_secs, 40);
    }

    #[test]
    fn streak_below_minimum_is_not_recorded() {
        let mut p = player();
        p.switch_class(PlayerClass::Scout, at(0), 3);
        p.extend_streak(at(1), 3);
        p.extend_streak(at(2), 3);
        p.end_streak(3);
        assert!(p.killstreaks.is_empty());
    }

    #[test]
    fn best_streak_per_class_is_kept() {
        let mut p = player();
        p.switch_class(PlayerClass::Scout, at(0), 3);
        for s in [10, 12, 15, 20] {
            p.extend_streak(at(s), 3);
        }
        p.end_streak(3);
        for s in [30, 31, 32] {
            p.extend_streak(at(s), 3);
        }
        p.end_streak(3);

        let best = p.killstreaks[&PlayerClass::Scout];
        assert_eq!(best.kills, 4);
        assert_eq!(best.duration_secs, 10);
    }

    #[test]
    fn switching_class_breaks_the_streak() {
        let mut p = player();
        p.switch_class(PlayerClass::Soldier, at(0), 2);
        p.extend_streak(at(1), 2);
        p.extend_streak(at(2), 2);
        p.switch_class(PlayerClass::Demo, at(3), 2);
        p.extend_streak(at(4), 2);
        p.end_streak(2);

        assert_eq!(p.killstreaks[&PlayerClass::Soldier].kills, 2);
        assert!(!p.killstreaks.contains_key(&PlayerClass::Demo));
    }

    #[test]
    fn biggest_advantage_lost_never_decreases() {
        let mut healer = HealerAggregate::new(PlayerId::new(1));
        for secs in [12, 45, 20, 31, 44] {
            healer.record_advantage_lost(secs);
        }
        assert_eq!(healer.biggest_advantage_lost, 45);
        assert_eq!(healer.major_advantage_lost, 3);
    }

    #[test]
    fn average_charge_length_handles_empty() {
        let mut healer = HealerAggregate::new(PlayerId::new(1));
        assert_eq!(healer.average_charge_length(), 0.0);
        healer.charge_durations.extend([6.0, 8.0]);
        assert_eq!(healer.average_charge_length(), 7.0);
    }

    #[test]
    fn scores_pick_winner() {
        let mut scores = TeamScores::default();
        assert_eq!(scores.winner(), Team::Unassigned);
        scores.set(Team::Blu, 2);
        scores.set(Team::Red, 1);
        assert_eq!(scores.winner(), Team::Blu);
    }

    #[test]
    fn weapon_activity_requires_a_nonzero_counter() {
        let mut weapon = WeaponStats::default();
        assert!(!weapon.has_activity());
        weapon.shots = 1;
        assert!(weapon.has_activity());
    }
}
