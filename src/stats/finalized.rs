use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::event::{PlayerId, Team};

use super::{
    models::{ApplyStats, HealerAggregate, PlayerAggregate, RoundRecord, TeamAggregate, TeamScores},
    Match,
};

/// Healer aggregate with the values derived once at seal time
#[derive(Debug, Clone, Serialize)]
pub struct HealerSummary {
    #[serde(flatten)]
    pub healer: HealerAggregate,
    pub average_charge_length: f64,
}

/// Immutable snapshot of a match, ready to be persisted
#[derive(Debug, Clone, Serialize)]
pub struct FinalizedMatch {
    pub correlation_id: Uuid,
    pub server_id: i32,
    pub title: String,
    pub map_name: Option<String>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub scores: TeamScores,
    pub winner: Team,
    pub rounds: Vec<RoundRecord>,
    pub players: BTreeMap<PlayerId, PlayerAggregate>,
    pub healers: BTreeMap<PlayerId, HealerSummary>,
    pub teams: BTreeMap<Team, TeamAggregate>,
    pub stats: ApplyStats,
}

impl FinalizedMatch {
    /// Distinct players with a real account id
    pub fn valid_player_count(&self) -> usize {
        self.players.keys().filter(|id| id.is_valid()).count()
    }

    pub fn valid_players(&self) -> impl Iterator<Item = &PlayerAggregate> {
        self.players.values().filter(|p| p.player_id.is_valid())
    }

    pub fn healer(&self, player_id: PlayerId) -> Option<&HealerSummary> {
        self.healers.get(&player_id)
    }

    pub fn total_kills(&self) -> i64 {
        self.players.values().map(|p| i64::from(p.kills)).sum()
    }
}

impl Match {
    /// Consumes the aggregator. Open class clocks and killstreaks are closed
    /// at the match end, or at the last event seen when the game never ended.
    pub fn seal(self) -> FinalizedMatch {
        let time_end = self.time_end.or(self.last_event_at);
        let min_streak = self.options.min_killstreak;

        let mut players = self.players;
        for player in players.values_mut() {
            if let Some(end) = time_end {
                player.stop_class_clock(end);
            }
            player.end_streak(min_streak);
        }

        let healers = self
            .healers
            .into_iter()
            .map(|(id, healer)| {
                let average_charge_length = healer.average_charge_length();
                (
                    id,
                    HealerSummary {
                        healer,
                        average_charge_length,
                    },
                )
            })
            .collect();

        FinalizedMatch {
            correlation_id: self.correlation_id,
            server_id: self.server_id,
            title: self.title,
            map_name: self.map_name,
            time_start: self.time_start,
            time_end,
            winner: self.scores.winner(),
            scores: self.scores,
            rounds: self.rounds,
            players,
            healers,
            teams: self.teams,
            stats: self.stats,
        }
    }
}
