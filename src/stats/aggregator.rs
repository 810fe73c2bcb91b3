use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::event::{EventCategory, EventKind, MatchEvent, PlayerClass, PlayerId, PlayerRef, Team};

use super::{
    errors::MatchError,
    handlers,
    models::{
        ApplyStats, HealerAggregate, PlayerAggregate, RoundRecord, TeamAggregate, TeamScores,
    },
    state::MatchState,
};

/// Per-match settings fixed at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Use overkill-capped damage instead of the raw value
    pub use_real_damage: bool,
    /// Shortest run of kills kept as a killstreak
    pub min_killstreak: i32,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            use_real_damage: false,
            min_killstreak: 3,
        }
    }
}

impl From<&IngestConfig> for MatchOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            use_real_damage: config.use_real_damage,
            min_killstreak: config.min_killstreak,
        }
    }
}

/// What happened to an event handed to [`Match::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Gameplay outside a live round (warmup, between rounds, after game over)
    Discarded,
    Ignored,
    Unhandled,
    /// A player the rule needs was absent from the event
    Skipped,
}

/// Stateful reducer for one match
///
/// Single writer: events for one match must be applied sequentially by one
/// caller. Independent matches share nothing and can run in parallel.
#[derive(Debug, Clone)]
pub struct Match {
    pub(super) correlation_id: Uuid,
    pub(super) server_id: i32,
    pub(super) title: String,
    pub(super) map_name: Option<String>,
    pub(super) time_start: Option<DateTime<Utc>>,
    pub(super) time_end: Option<DateTime<Utc>>,
    pub(super) last_event_at: Option<DateTime<Utc>>,
    pub(super) scores: TeamScores,
    pub(super) state: MatchState,
    pub(super) options: MatchOptions,
    pub(super) rounds: Vec<RoundRecord>,
    pub(super) players: BTreeMap<PlayerId, PlayerAggregate>,
    pub(super) healers: BTreeMap<PlayerId, HealerAggregate>,
    pub(super) teams: BTreeMap<Team, TeamAggregate>,
    pub(super) stats: ApplyStats,
}

impl Match {
    pub fn new(server_id: i32, title: impl Into<String>, options: MatchOptions) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            server_id,
            title: title.into(),
            map_name: None,
            time_start: None,
            time_end: None,
            last_event_at: None,
            scores: TeamScores::default(),
            state: MatchState::Idle,
            options,
            rounds: Vec::new(),
            players: BTreeMap::new(),
            healers: BTreeMap::new(),
            teams: BTreeMap::new(),
            stats: ApplyStats::default(),
        }
    }

    /// Applies one event, returning how it was treated
    pub fn apply(&mut self, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
        self.last_event_at = Some(event.created_on);

        let result = match event.kind.category() {
            EventCategory::Marker => Ok(match event.kind {
                EventKind::Ignored => ApplyOutcome::Ignored,
                _ => ApplyOutcome::Unhandled,
            }),
            EventCategory::Lifecycle => Ok(self.apply_lifecycle(event)),
            EventCategory::World => self.apply_world(event),
            EventCategory::Gameplay if !self.state.accepts_gameplay() => {
                Ok(ApplyOutcome::Discarded)
            }
            EventCategory::Gameplay => match handlers::handler_for(event.kind) {
                Some(handler) => handler(self, event),
                None => Ok(ApplyOutcome::Unhandled),
            },
        };

        match &result {
            Ok(outcome) => {
                if *outcome != ApplyOutcome::Applied {
                    debug!(
                        server_id = self.server_id,
                        event_type = %event.kind,
                        outcome = ?outcome,
                        state = %self.state,
                        "Event not applied to aggregates"
                    );
                }
                self.record(*outcome);
            }
            Err(err) => {
                warn!(server_id = self.server_id, error = %err, "Rejected match event");
                self.stats.errors += 1;
            }
        }

        result
    }

    fn record(&mut self, outcome: ApplyOutcome) {
        let counter = match outcome {
            ApplyOutcome::Applied => &mut self.stats.applied,
            ApplyOutcome::Discarded => &mut self.stats.discarded,
            ApplyOutcome::Ignored => &mut self.stats.ignored,
            ApplyOutcome::Unhandled => &mut self.stats.unhandled,
            ApplyOutcome::Skipped => &mut self.stats.skipped,
        };
        *counter += 1;
    }

    fn apply_lifecycle(&mut self, event: &MatchEvent) -> ApplyOutcome {
        let Some(next) = self.state.next(event.kind) else {
            return ApplyOutcome::Discarded;
        };
        let at = event.created_on;

        match event.kind {
            EventKind::MapLoad => {
                if let Some(map) = event.meta("map") {
                    self.map_name = Some(map.to_string());
                }
            }
            EventKind::RoundStart | EventKind::MiniRoundStart => {
                self.time_start.get_or_insert(at);
                self.rounds.push(RoundRecord::new(at, self.scores));
                for player in self.players.values_mut() {
                    player.touch(at);
                    player.start_class_clock(at);
                }
            }
            EventKind::RoundWin => self.close_round(at),
            EventKind::GameOver => {
                if self.state == MatchState::InRound {
                    self.close_round(at);
                }
                self.time_end = Some(at);
            }
            _ => {}
        }

        if next != self.state {
            debug!(
                server_id = self.server_id,
                from = %self.state,
                to = %next,
                "Match state transition"
            );
        }
        self.state = next;
        ApplyOutcome::Applied
    }

    fn close_round(&mut self, at: DateTime<Utc>) {
        let min_streak = self.options.min_killstreak;
        for player in self.players.values_mut() {
            player.stop_class_clock(at);
            player.end_streak(min_streak);
        }
    }

    fn apply_world(&mut self, event: &MatchEvent) -> Result<ApplyOutcome, MatchError> {
        match event.kind {
            EventKind::TeamScore | EventKind::TeamFinalScore => {
                let team: Team = handlers::required_meta(event, "team")?;
                let score: i32 = handlers::required_meta(event, "score")?;
                self.scores.set(team, score);
                let scores = self.scores;
                if let Some(round) = self.rounds.last_mut() {
                    round.score = scores;
                }
            }
            EventKind::RoundOvertime => {
                if let Some(round) = self.rounds.last_mut() {
                    round.overtime = true;
                }
            }
            EventKind::RoundLength => {
                let length: f64 = handlers::required_meta(event, "length")?;
                if let Some(round) = self.rounds.last_mut() {
                    round.length_secs = length;
                }
            }
            _ => {}
        }
        Ok(ApplyOutcome::Applied)
    }

    /// Returns the aggregate for `player_id`, creating it on first reference.
    /// Created mid-round, its session start is stamped at `at`.
    pub fn get_or_create_player(
        &mut self,
        player_id: PlayerId,
        at: DateTime<Utc>,
    ) -> &mut PlayerAggregate {
        let in_round = self.state == MatchState::InRound;
        self.players.entry(player_id).or_insert_with(|| {
            let mut player = PlayerAggregate::new(player_id);
            if in_round {
                player.touch(at);
            }
            player
        })
    }

    /// Player lookup that also records the team the event placed them on
    pub(super) fn player_for(&mut self, player: &PlayerRef, at: DateTime<Utc>) -> &mut PlayerAggregate {
        let aggregate = self.get_or_create_player(player.id, at);
        if player.team.is_playable() {
            aggregate.team = player.team;
        }
        aggregate
    }

    pub(super) fn team_for(&mut self, team: Team) -> Option<&mut TeamAggregate> {
        if !team.is_playable() {
            return None;
        }
        Some(
            self.teams
                .entry(team)
                .or_insert_with(|| TeamAggregate::new(team)),
        )
    }

    pub(super) fn current_round(&mut self) -> Option<&mut RoundRecord> {
        self.rounds.last_mut()
    }

    /// Moves a player onto `class`. The first time the class set gains the
    /// healer class a healer aggregate is allocated.
    pub(super) fn assign_class(&mut self, player: &PlayerRef, class: PlayerClass, at: DateTime<Utc>) {
        let min_streak = self.options.min_killstreak;
        let added = self.player_for(player, at).switch_class(class, at, min_streak);
        if added && class.is_healer() {
            self.allocate_healer(player.id);
        }
    }

    /// Healer aggregate for a player. Charge and death events do not touch the
    /// played class set; only spawns and class changes do.
    pub(super) fn healer_for(&mut self, player: &PlayerRef, at: DateTime<Utc>) -> &mut HealerAggregate {
        self.player_for(player, at);
        self.allocate_healer(player.id)
    }

    /// Healing done before the aggregate existed is carried over, so the
    /// healer total never trails the player total.
    fn allocate_healer(&mut self, player_id: PlayerId) -> &mut HealerAggregate {
        let server_id = self.server_id;
        let healed = self.players.get(&player_id).map_or(0, |p| p.healing);
        self.healers.entry(player_id).or_insert_with(|| {
            debug!(server_id, player_id = %player_id, healed, "Allocating healer aggregate");
            let mut healer = HealerAggregate::new(player_id);
            healer.healing = healed;
            healer
        })
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn server_id(&self) -> i32 {
        self.server_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn map_name(&self) -> Option<&str> {
        self.map_name.as_deref()
    }

    pub fn time_start(&self) -> Option<DateTime<Utc>> {
        self.time_start
    }

    pub fn time_end(&self) -> Option<DateTime<Utc>> {
        self.time_end
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    pub fn scores(&self) -> TeamScores {
        self.scores
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerAggregate> {
        self.players.get(&player_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerAggregate> {
        self.players.values()
    }

    pub fn healer(&self, player_id: PlayerId) -> Option<&HealerAggregate> {
        self.healers.get(&player_id)
    }

    pub fn healers(&self) -> impl Iterator<Item = &HealerAggregate> {
        self.healers.values()
    }

    pub fn team(&self, team: Team) -> Option<&TeamAggregate> {
        self.teams.get(&team)
    }

    pub fn stats(&self) -> ApplyStats {
        self.stats
    }
}
