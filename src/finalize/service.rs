use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::config::IngestConfig;
use crate::stats::{FinalizedMatch, PlayerAggregate};
use crate::store::{
    InMemoryPersonStore, MatchKillstreakRow, MatchMedicRow, MatchPlayerClassRow, MatchStore,
    MatchUnitOfWork, MatchWeaponRow, NewMatch, NewMatchPlayer, PersistStep, PersonStore,
    StaticWeaponRegistry, WeaponRegistry,
};

use super::errors::FinalizeError;

/// Validates a sealed match and writes its whole graph in one unit of work.
///
/// Not idempotent: every successful call creates a new match row.
pub struct MatchFinalizer {
    store: Arc<dyn MatchStore>,
    people: Arc<dyn PersonStore>,
    weapons: Arc<dyn WeaponRegistry>,
    config: IngestConfig,
}

impl MatchFinalizer {
    pub fn builder(store: Arc<dyn MatchStore>) -> MatchFinalizerBuilder {
        MatchFinalizerBuilder::new(store)
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Persists `game` and returns the generated match id.
    ///
    /// The write is bounded by the configured deadline; on expiry the open
    /// unit of work is dropped, which rolls it back.
    #[instrument(skip(self, game), fields(correlation_id = %game.correlation_id, server_id = game.server_id))]
    pub async fn finalize(&self, game: &FinalizedMatch) -> Result<i64, FinalizeError> {
        let header = match self.validate(game) {
            Ok(header) => header,
            Err(err) => {
                warn!(error = %err, "Rejected match at finalize");
                return Err(err);
            }
        };

        let deadline = self.config.finalize_timeout;
        let result = match tokio::time::timeout(deadline, self.persist(game, &header)).await {
            Ok(result) => result,
            Err(_) => Err(FinalizeError::Timeout(deadline)),
        };

        match &result {
            Ok(match_id) => info!(
                match_id,
                map = %header.map_name,
                players = game.valid_player_count(),
                "Match persisted"
            ),
            Err(err) => error!(
                error = %err,
                step = ?err.failed_step(),
                "Failed to persist match"
            ),
        }
        result
    }

    /// Checks the preconditions and builds the match row. Performs no I/O.
    pub fn validate(&self, game: &FinalizedMatch) -> Result<NewMatch, FinalizeError> {
        let (Some(time_start), Some(map_name)) = (game.time_start, game.map_name.as_ref()) else {
            return Err(FinalizeError::IncompleteMatch);
        };

        let found = game.valid_player_count();
        if found < self.config.min_players {
            return Err(FinalizeError::InsufficientPlayers {
                found,
                required: self.config.min_players,
            });
        }

        Ok(NewMatch {
            correlation_id: game.correlation_id,
            server_id: game.server_id,
            map_name: map_name.clone(),
            title: game.title.clone(),
            score_red: game.scores.red,
            score_blu: game.scores.blu,
            winner: game.winner,
            time_start,
            time_end: game.time_end.unwrap_or(time_start),
        })
    }

    async fn persist(&self, game: &FinalizedMatch, header: &NewMatch) -> Result<i64, FinalizeError> {
        let mut uow = self
            .store
            .begin()
            .await
            .map_err(FinalizeError::at(PersistStep::Begin))?;

        match self.write_all(uow.as_mut(), game, header).await {
            Ok(match_id) => {
                uow.commit()
                    .await
                    .map_err(FinalizeError::at(PersistStep::Commit))?;
                Ok(match_id)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back match unit of work");
                }
                Err(err)
            }
        }
    }

    async fn write_all(
        &self,
        uow: &mut dyn MatchUnitOfWork,
        game: &FinalizedMatch,
        header: &NewMatch,
    ) -> Result<i64, FinalizeError> {
        let match_id = uow
            .insert_match(header)
            .await
            .map_err(FinalizeError::at(PersistStep::Match))?;

        for player in game.valid_players() {
            self.people
                .get_or_create_person(player.player_id)
                .await
                .map_err(FinalizeError::Person)?;

            let row = NewMatchPlayer::from_aggregate(
                match_id,
                player,
                header.time_start,
                header.time_end,
            );
            let match_player_id = uow
                .insert_player(&row)
                .await
                .map_err(FinalizeError::at(PersistStep::Player))?;

            self.write_player_children(uow, game, player, match_player_id)
                .await?;
        }

        debug!(match_id, "Match graph written");
        Ok(match_id)
    }

    async fn write_player_children(
        &self,
        uow: &mut dyn MatchUnitOfWork,
        game: &FinalizedMatch,
        player: &PlayerAggregate,
        match_player_id: i64,
    ) -> Result<(), FinalizeError> {
        for (key, stats) in player.weapons.iter().filter(|(_, s)| s.has_activity()) {
            let Some(weapon_id) = self.weapons.weapon_id(key) else {
                debug!(weapon = %key, player_id = %player.player_id, "Skipping unregistered weapon");
                continue;
            };
            uow.insert_weapon(&MatchWeaponRow::new(match_player_id, weapon_id, stats))
                .await
                .map_err(FinalizeError::at(PersistStep::Weapon))?;
        }

        for class in &player.classes {
            let stats = player.class_stats.get(class).cloned().unwrap_or_default();
            uow.insert_player_class(&MatchPlayerClassRow::new(match_player_id, *class, &stats))
                .await
                .map_err(FinalizeError::at(PersistStep::PlayerClass))?;
        }

        for streak in player.killstreaks.values() {
            uow.insert_killstreak(&MatchKillstreakRow::new(match_player_id, streak))
                .await
                .map_err(FinalizeError::at(PersistStep::Killstreak))?;
        }

        // a healer aggregate is the record of the healer role
        match game.healer(player.player_id) {
            Some(summary) if summary.healer.healing >= self.config.min_healer_healing => {
                uow.insert_healer(&MatchMedicRow::new(match_player_id, summary))
                    .await
                    .map_err(FinalizeError::at(PersistStep::Healer))?;
            }
            Some(summary) => debug!(
                player_id = %player.player_id,
                healing = summary.healer.healing,
                "Healer below persistence threshold"
            ),
            None => {}
        }
        Ok(())
    }
}

pub struct MatchFinalizerBuilder {
    store: Arc<dyn MatchStore>,
    people: Arc<dyn PersonStore>,
    weapons: Arc<dyn WeaponRegistry>,
    config: IngestConfig,
}

impl MatchFinalizerBuilder {
    fn new(store: Arc<dyn MatchStore>) -> Self {
        Self {
            store,
            people: Arc::new(InMemoryPersonStore::new()),
            weapons: Arc::new(StaticWeaponRegistry::new()),
            config: IngestConfig::default(),
        }
    }

    pub fn with_people(mut self, people: Arc<dyn PersonStore>) -> Self {
        self.people = people;
        self
    }

    pub fn with_weapons(mut self, weapons: Arc<dyn WeaponRegistry>) -> Self {
        self.weapons = weapons;
        self
    }

    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> MatchFinalizer {
        MatchFinalizer {
            store: self.store,
            people: self.people,
            weapons: self.weapons,
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, MatchEvent, Team};
    use crate::stats::{Match, MatchOptions};
    use crate::store::InMemoryMatchStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn sealed(players: u64, map: Option<&str>, round: bool) -> FinalizedMatch {
        let mut game = Match::new(1, "validate", MatchOptions::default());
        if let Some(map) = map {
            game.apply(&MatchEvent::new(EventKind::MapLoad, at(0)).with_meta("map", map))
                .unwrap();
        }
        if round {
            game.apply(&MatchEvent::new(EventKind::RoundStart, at(1)))
                .unwrap();
        }
        for n in 0..players {
            game.get_or_create_player((76_561_198_000_000_100 + n).into(), at(2));
        }
        game.seal()
    }

    fn finalizer() -> MatchFinalizer {
        MatchFinalizer::builder(Arc::new(InMemoryMatchStore::new())).build()
    }

    #[test]
    fn missing_map_is_incomplete() {
        let err = finalizer().validate(&sealed(6, None, true)).unwrap_err();
        assert!(matches!(err, FinalizeError::IncompleteMatch));
        assert!(err.is_rejection());
    }

    #[test]
    fn missing_start_is_incomplete() {
        let err = finalizer()
            .validate(&sealed(6, Some("koth_product"), false))
            .unwrap_err();
        assert!(matches!(err, FinalizeError::IncompleteMatch));
    }

    #[test]
    fn five_players_are_not_enough() {
        let err = finalizer()
            .validate(&sealed(5, Some("koth_product"), true))
            .unwrap_err();
        assert!(matches!(
            err,
            FinalizeError::InsufficientPlayers {
                found: 5,
                required: 6
            }
        ));
    }

    #[test]
    fn valid_match_builds_header() {
        let header = finalizer()
            .validate(&sealed(6, Some("koth_product"), true))
            .unwrap();
        assert_eq!(header.map_name, "koth_product");
        assert_eq!(header.time_start, at(1));
        assert_eq!(header.winner, Team::Unassigned);
    }
}
