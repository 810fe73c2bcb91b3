#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use matchstats::{
    event::{MatchEvent, ServerEvent},
    EventKind, Match, MatchOptions, Team,
};

pub const MAP: &str = "pl_upward";

/// Community id of the `n`th test player
pub fn player(n: u64) -> u64 {
    76_561_198_000_000_000 + n
}

/// The red medic in [`six_player_match`]
pub const HEALER: u64 = 76_561_198_000_000_001;

// ============================================================================
// Event Script Builder
// ============================================================================

/// Ordered events with a clock that advances one second per event
#[derive(Clone)]
pub struct MatchScript {
    events: Vec<MatchEvent>,
    clock: DateTime<Utc>,
}

impl MatchScript {
    pub fn new() -> Self {
        Self {
            events: vec![],
            clock: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    fn stamp(&mut self) -> DateTime<Utc> {
        self.clock += Duration::seconds(1);
        self.clock
    }

    pub fn wait(mut self, secs: i64) -> Self {
        self.clock += Duration::seconds(secs);
        self
    }

    /// Appends an event built against the script clock
    pub fn with(mut self, build: impl FnOnce(DateTime<Utc>) -> MatchEvent) -> Self {
        let at = self.stamp();
        self.events.push(build(at));
        self
    }

    fn simple(self, kind: EventKind) -> Self {
        self.with(|at| MatchEvent::new(kind, at))
    }

    pub fn map(self, name: &str) -> Self {
        self.with(|at| MatchEvent::new(EventKind::MapLoad, at).with_meta("map", name))
    }

    pub fn round_start(self) -> Self {
        self.simple(EventKind::RoundStart)
    }

    pub fn round_win(self, team: Team) -> Self {
        self.with(|at| MatchEvent::new(EventKind::RoundWin, at).with_meta("team", team))
    }

    pub fn game_over(self) -> Self {
        self.simple(EventKind::GameOver)
    }

    pub fn log_stop(self) -> Self {
        self.simple(EventKind::LogStop)
    }

    pub fn final_score(self, team: Team, score: i32) -> Self {
        self.with(|at| {
            MatchEvent::new(EventKind::TeamFinalScore, at)
                .with_meta("team", team)
                .with_meta("score", score)
        })
    }

    pub fn spawn(self, who: u64, team: Team, class: &str) -> Self {
        self.with(|at| {
            MatchEvent::new(EventKind::SpawnedAs, at)
                .with_source(who, team)
                .with_meta("class", class)
        })
    }

    pub fn kill(self, killer: u64, team: Team, victim: u64, weapon: &str) -> Self {
        self.with(|at| {
            MatchEvent::new(EventKind::Kill, at)
                .with_source(killer, team)
                .with_target(victim, team.opponent())
                .with_weapon(weapon)
        })
    }

    pub fn damage(self, attacker: u64, team: Team, victim: u64, weapon: &str, amount: i64) -> Self {
        self.with(|at| {
            MatchEvent::new(EventKind::Damage, at)
                .with_source(attacker, team)
                .with_target(victim, team.opponent())
                .with_weapon(weapon)
                .with_damage(amount, amount)
        })
    }

    pub fn heal(self, healer: u64, team: Team, patient: u64, amount: i64) -> Self {
        self.with(|at| {
            MatchEvent::new(EventKind::Heal, at)
                .with_source(healer, team)
                .with_target(patient, team)
                .with_healing(amount)
        })
    }

    pub fn events(&self) -> &[MatchEvent] {
        &self.events
    }

    pub fn server_events(&self, server_id: i32, server_name: &str) -> Vec<ServerEvent> {
        self.events
            .iter()
            .cloned()
            .map(|event| ServerEvent {
                server_id,
                server_name: server_name.to_string(),
                event,
            })
            .collect()
    }

    pub fn apply_to(&self, game: &mut Match) {
        for event in &self.events {
            let _ = game.apply(event);
        }
    }

    pub fn build_match(&self) -> Match {
        let mut game = Match::new(1, "test server", MatchOptions::default());
        self.apply_to(&mut game);
        game
    }
}

// ============================================================================
// Canned Scenarios
// ============================================================================

/// Six players, three per team. Player 1 is the red medic and heals player 2
/// for `healing`; player 2 runs a three kill streak with rockets. Ends the way
/// a server log does: game over, then one final score per team.
pub fn six_player_match(healing: i64) -> MatchScript {
    MatchScript::new()
        .map(MAP)
        .round_start()
        .spawn(player(1), Team::Red, "medic")
        .spawn(player(2), Team::Red, "soldier")
        .spawn(player(3), Team::Red, "scout")
        .spawn(player(4), Team::Blu, "medic")
        .spawn(player(5), Team::Blu, "soldier")
        .spawn(player(6), Team::Blu, "demoman")
        .heal(player(1), Team::Red, player(2), healing)
        .damage(player(2), Team::Red, player(5), "tf_projectile_rocket", 110)
        .kill(player(2), Team::Red, player(5), "tf_projectile_rocket")
        .kill(player(2), Team::Red, player(6), "tf_projectile_rocket")
        .kill(player(2), Team::Red, player(4), "tf_projectile_rocket")
        .damage(player(3), Team::Red, player(6), "scattergun", 60)
        .kill(player(6), Team::Blu, player(3), "tf_projectile_pipe")
        .wait(120)
        .round_win(Team::Red)
        .game_over()
        .final_score(Team::Red, 1)
        .final_score(Team::Blu, 0)
}
