use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::errors::{PersistStep, StoreError};
use super::models::{
    MatchKillstreakRow, MatchMedicRow, MatchPlayerClassRow, MatchWeaponRow, NewMatch,
    NewMatchPlayer, RowCounts, StoredMatch, StoredPlayer,
};

/// Entry point for persisting match graphs
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Opens a unit of work. Nothing it writes is visible until commit.
    async fn begin(&self) -> Result<Box<dyn MatchUnitOfWork>, StoreError>;
    async fn load_match(&self, match_id: i64) -> Result<Option<StoredMatch>, StoreError>;
}

/// One transaction threaded through every insert of a match graph.
/// Dropping it without calling [`commit`](MatchUnitOfWork::commit) rolls back.
#[async_trait]
pub trait MatchUnitOfWork: Send {
    async fn insert_match(&mut self, row: &NewMatch) -> Result<i64, StoreError>;
    async fn insert_player(&mut self, row: &NewMatchPlayer) -> Result<i64, StoreError>;
    async fn insert_weapon(&mut self, row: &MatchWeaponRow) -> Result<(), StoreError>;
    async fn insert_player_class(&mut self, row: &MatchPlayerClassRow)
        -> Result<(), StoreError>;
    async fn insert_killstreak(&mut self, row: &MatchKillstreakRow) -> Result<(), StoreError>;
    async fn insert_healer(&mut self, row: &MatchMedicRow) -> Result<(), StoreError>;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
struct Tables {
    matches: BTreeMap<i64, NewMatch>,
    players: BTreeMap<i64, NewMatchPlayer>,
    weapons: Vec<MatchWeaponRow>,
    classes: Vec<MatchPlayerClassRow>,
    killstreaks: Vec<MatchKillstreakRow>,
    medics: Vec<MatchMedicRow>,
}

impl Tables {
    fn merge(&mut self, staged: Tables) {
        self.matches.extend(staged.matches);
        self.players.extend(staged.players);
        self.weapons.extend(staged.weapons);
        self.classes.extend(staged.classes);
        self.killstreaks.extend(staged.killstreaks);
        self.medics.extend(staged.medics);
    }

    fn counts(&self) -> RowCounts {
        RowCounts {
            matches: self.matches.len(),
            players: self.players.len(),
            weapons: self.weapons.len(),
            classes: self.classes.len(),
            killstreaks: self.killstreaks.len(),
            medics: self.medics.len(),
        }
    }

    fn load(&self, match_id: i64) -> Option<StoredMatch> {
        let header = self.matches.get(&match_id)?.clone();
        let players = self
            .players
            .iter()
            .filter(|(_, row)| row.match_id == match_id)
            .map(|(&id, row)| StoredPlayer {
                match_player_id: id,
                row: row.clone(),
                weapons: self
                    .weapons
                    .iter()
                    .filter(|w| w.match_player_id == id)
                    .cloned()
                    .collect(),
                classes: self
                    .classes
                    .iter()
                    .filter(|c| c.match_player_id == id)
                    .cloned()
                    .collect(),
                killstreaks: self
                    .killstreaks
                    .iter()
                    .filter(|k| k.match_player_id == id)
                    .cloned()
                    .collect(),
                medic: self
                    .medics
                    .iter()
                    .find(|m| m.match_player_id == id)
                    .cloned(),
            })
            .collect();

        Some(StoredMatch {
            match_id,
            header,
            players,
        })
    }
}

/// In-memory match store for development and testing
///
/// Rows written through a unit of work are staged privately and only merged
/// into the shared tables on commit. A failure can be injected at any step,
/// and every write can be slowed down to exercise deadlines.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMatchStore {
    tables: Arc<RwLock<Tables>>,
    next_match_id: Arc<AtomicI64>,
    next_player_id: Arc<AtomicI64>,
    fail_at: Arc<RwLock<Option<PersistStep>>>,
    latency: Option<Duration>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write sleeps this long before completing
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Units of work opened after this call fail when they reach `step`
    pub async fn fail_at(&self, step: PersistStep) {
        *self.fail_at.write().await = Some(step);
    }

    pub async fn clear_failure(&self) {
        *self.fail_at.write().await = None;
    }

    pub async fn row_counts(&self) -> RowCounts {
        self.tables.read().await.counts()
    }

    pub async fn match_ids(&self) -> Vec<i64> {
        self.tables.read().await.matches.keys().copied().collect()
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn MatchUnitOfWork>, StoreError> {
        let fail_at = *self.fail_at.read().await;
        if fail_at == Some(PersistStep::Begin) {
            warn!("Injected failure opening unit of work");
            return Err(StoreError::Injected(PersistStep::Begin));
        }

        debug!("Opening in-memory unit of work");
        Ok(Box::new(InMemoryUnitOfWork {
            tables: Arc::clone(&self.tables),
            next_match_id: Arc::clone(&self.next_match_id),
            next_player_id: Arc::clone(&self.next_player_id),
            staged: Tables::default(),
            fail_at,
            latency: self.latency,
        }))
    }

    #[instrument(skip(self))]
    async fn load_match(&self, match_id: i64) -> Result<Option<StoredMatch>, StoreError> {
        let stored = self.tables.read().await.load(match_id);
        match &stored {
            Some(m) => debug!(match_id, players = m.players.len(), "Match found in memory"),
            None => debug!(match_id, "Match not found in memory"),
        }
        Ok(stored)
    }
}

struct InMemoryUnitOfWork {
    tables: Arc<RwLock<Tables>>,
    next_match_id: Arc<AtomicI64>,
    next_player_id: Arc<AtomicI64>,
    staged: Tables,
    fail_at: Option<PersistStep>,
    latency: Option<Duration>,
}

impl InMemoryUnitOfWork {
    async fn step(&self, step: PersistStep) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_at == Some(step) {
            warn!(step = %step, "Injected failure in unit of work");
            return Err(StoreError::Injected(step));
        }
        Ok(())
    }
}

#[async_trait]
impl MatchUnitOfWork for InMemoryUnitOfWork {
    async fn insert_match(&mut self, row: &NewMatch) -> Result<i64, StoreError> {
        self.step(PersistStep::Match).await?;
        let id = self.next_match_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.staged.matches.insert(id, row.clone());
        Ok(id)
    }

    async fn insert_player(&mut self, row: &NewMatchPlayer) -> Result<i64, StoreError> {
        self.step(PersistStep::Player).await?;
        if !self.staged.matches.contains_key(&row.match_id) {
            return Err(StoreError::NotFound(format!("match {}", row.match_id)));
        }
        let id = self.next_player_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.staged.players.insert(id, row.clone());
        Ok(id)
    }

    async fn insert_weapon(&mut self, row: &MatchWeaponRow) -> Result<(), StoreError> {
        self.step(PersistStep::Weapon).await?;
        self.staged.weapons.push(row.clone());
        Ok(())
    }

    async fn insert_player_class(
        &mut self,
        row: &MatchPlayerClassRow,
    ) -> Result<(), StoreError> {
        self.step(PersistStep::PlayerClass).await?;
        self.staged.classes.push(row.clone());
        Ok(())
    }

    async fn insert_killstreak(&mut self, row: &MatchKillstreakRow) -> Result<(), StoreError> {
        self.step(PersistStep::Killstreak).await?;
        self.staged.killstreaks.push(row.clone());
        Ok(())
    }

    async fn insert_healer(&mut self, row: &MatchMedicRow) -> Result<(), StoreError> {
        self.step(PersistStep::Healer).await?;
        self.staged.medics.push(row.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.step(PersistStep::Commit).await?;
        let this = *self;
        let rows = this.staged.counts().total();
        this.tables.write().await.merge(this.staged);
        debug!(rows, "Committed in-memory unit of work");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!(
            rows = self.staged.counts().total(),
            "Discarding in-memory unit of work"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{PlayerId, Team};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn new_match() -> NewMatch {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        NewMatch {
            correlation_id: Uuid::new_v4(),
            server_id: 1,
            map_name: "cp_process_final".into(),
            title: "test".into(),
            score_red: 3,
            score_blu: 1,
            winner: Team::Red,
            time_start: start,
            time_end: start + chrono::Duration::minutes(30),
        }
    }

    fn new_player(match_id: i64, template: &NewMatch) -> NewMatchPlayer {
        NewMatchPlayer {
            match_id,
            player_id: PlayerId::new(76_561_198_000_000_001),
            team: Team::Red,
            time_start: template.time_start,
            time_end: template.time_end,
            kills: 4,
            assists: 0,
            deaths: 2,
            suicides: 0,
            damage: 900,
            damage_taken: 400,
            healing: 0,
            healing_taken: 150,
            health_packs: 1,
            extinguishes: 0,
            structures_built: 0,
        }
    }

    #[tokio::test]
    async fn commit_makes_rows_visible() {
        let store = InMemoryMatchStore::new();
        let header = new_match();

        let mut uow = store.begin().await.unwrap();
        let match_id = uow.insert_match(&header).await.unwrap();
        let player_id = uow.insert_player(&new_player(match_id, &header)).await.unwrap();
        assert_eq!(store.row_counts().await.total(), 0);
        uow.commit().await.unwrap();

        let stored = store.load_match(match_id).await.unwrap().unwrap();
        assert_eq!(stored.header, header);
        assert_eq!(stored.players.len(), 1);
        assert_eq!(stored.players[0].match_player_id, player_id);
    }

    #[tokio::test]
    async fn dropping_without_commit_discards_rows() {
        let store = InMemoryMatchStore::new();
        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_match(&new_match()).await.unwrap();
        }
        let mut uow = store.begin().await.unwrap();
        uow.insert_match(&new_match()).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(store.row_counts().await, RowCounts::default());
    }

    #[tokio::test]
    async fn injected_failure_is_reported_with_its_step() {
        let store = InMemoryMatchStore::new();
        store.fail_at(PersistStep::Player).await;
        let header = new_match();

        let mut uow = store.begin().await.unwrap();
        let match_id = uow.insert_match(&header).await.unwrap();
        let err = uow
            .insert_player(&new_player(match_id, &header))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Injected(PersistStep::Player)));
    }

    #[tokio::test]
    async fn player_requires_its_match_in_the_same_unit() {
        let store = InMemoryMatchStore::new();
        let header = new_match();
        let mut uow = store.begin().await.unwrap();

        let err = uow.insert_player(&new_player(42, &header)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn generated_ids_are_distinct_across_units() {
        let store = InMemoryMatchStore::new();
        let mut ids = Vec::new();
        for _ in 0..2 {
            let mut uow = store.begin().await.unwrap();
            ids.push(uow.insert_match(&new_match()).await.unwrap());
            uow.commit().await.unwrap();
        }
        assert_ne!(ids[0], ids[1]);
        assert_eq!(store.match_ids().await, ids);
    }
}
