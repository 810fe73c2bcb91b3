use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument, warn};

use super::errors::StoreError;
use super::models::{
    MatchKillstreakRow, MatchMedicRow, MatchPlayerClassRow, MatchWeaponRow, NewMatch,
    NewMatchPlayer, StoredMatch, StoredPlayer,
};
use super::repository::{MatchStore, MatchUnitOfWork};
use crate::event::{PlayerClass, PlayerId, Team};

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        warn!(error = %e, "{}", context);
        StoreError::Database(e.to_string())
    }
}

fn class_from_row(row: &PgRow) -> Result<PlayerClass, StoreError> {
    let code: i16 = row.get("class_id");
    PlayerClass::from_code(code)
        .ok_or_else(|| StoreError::Database(format!("unknown class id {code}")))
}

/// PostgreSQL implementation of the match store
pub struct PostgresMatchStore {
    pool: PgPool,
}

impl PostgresMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchStore for PostgresMatchStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn MatchUnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to open match transaction"))?;
        debug!("Opened match transaction");
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }

    #[instrument(skip(self))]
    async fn load_match(&self, match_id: i64) -> Result<Option<StoredMatch>, StoreError> {
        debug!(match_id, "Fetching match from database");

        let row = sqlx::query(
            "SELECT correlation_id, server_id, map, title, score_red, score_blu, winner, time_start, time_end \
             FROM match WHERE match_id = $1",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch match from database"))?;

        let Some(row) = row else {
            debug!(match_id, "Match not found in database");
            return Ok(None);
        };

        let header = NewMatch {
            correlation_id: row.get("correlation_id"),
            server_id: row.get("server_id"),
            map_name: row.get("map"),
            title: row.get("title"),
            score_red: row.get("score_red"),
            score_blu: row.get("score_blu"),
            winner: Team::from_code(row.get("winner")),
            time_start: row.get("time_start"),
            time_end: row.get("time_end"),
        };

        let player_rows = sqlx::query(
            "SELECT match_player_id, steam_id, team, time_start, time_end, kills, assists, deaths, suicides, \
             damage, damage_taken, healing, healing_taken, health_packs, extinguishes, buildings \
             FROM match_player WHERE match_id = $1 ORDER BY match_player_id",
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch match players from database"))?;

        let mut players = Vec::with_capacity(player_rows.len());
        for row in player_rows {
            let match_player_id: i64 = row.get("match_player_id");
            players.push(StoredPlayer {
                match_player_id,
                row: NewMatchPlayer {
                    match_id,
                    player_id: PlayerId::from_i64(row.get("steam_id")),
                    team: Team::from_code(row.get("team")),
                    time_start: row.get("time_start"),
                    time_end: row.get("time_end"),
                    kills: row.get("kills"),
                    assists: row.get("assists"),
                    deaths: row.get("deaths"),
                    suicides: row.get("suicides"),
                    damage: row.get("damage"),
                    damage_taken: row.get("damage_taken"),
                    healing: row.get("healing"),
                    healing_taken: row.get("healing_taken"),
                    health_packs: row.get("health_packs"),
                    extinguishes: row.get("extinguishes"),
                    structures_built: row.get("buildings"),
                },
                weapons: self.load_weapons(match_player_id).await?,
                classes: self.load_classes(match_player_id).await?,
                killstreaks: self.load_killstreaks(match_player_id).await?,
                medic: self.load_medic(match_player_id).await?,
            });
        }

        debug!(match_id, players = players.len(), "Match found in database");
        Ok(Some(StoredMatch {
            match_id,
            header,
            players,
        }))
    }
}

impl PostgresMatchStore {
    async fn load_weapons(&self, match_player_id: i64) -> Result<Vec<MatchWeaponRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT weapon_id, kills, damage, shots, hits, backstabs, headshots, airshots \
             FROM match_weapon WHERE match_player_id = $1 ORDER BY weapon_id",
        )
        .bind(match_player_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch weapon rows"))?;

        Ok(rows
            .iter()
            .map(|row| MatchWeaponRow {
                match_player_id,
                weapon_id: row.get("weapon_id"),
                kills: row.get("kills"),
                damage: row.get("damage"),
                shots: row.get("shots"),
                hits: row.get("hits"),
                backstabs: row.get("backstabs"),
                headshots: row.get("headshots"),
                airshots: row.get("airshots"),
            })
            .collect())
    }

    async fn load_classes(
        &self,
        match_player_id: i64,
    ) -> Result<Vec<MatchPlayerClassRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT class_id, kills, assists, deaths, playtime, dominations, dominated, revenges, damage, \
             damage_taken, healing_taken, captures, captures_blocked, buildings_destroyed \
             FROM match_player_class WHERE match_player_id = $1 ORDER BY class_id",
        )
        .bind(match_player_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch class rows"))?;

        rows.iter()
            .map(|row| {
                Ok(MatchPlayerClassRow {
                    match_player_id,
                    class: class_from_row(row)?,
                    kills: row.get("kills"),
                    assists: row.get("assists"),
                    deaths: row.get("deaths"),
                    playtime_secs: row.get("playtime"),
                    dominations: row.get("dominations"),
                    dominated: row.get("dominated"),
                    revenges: row.get("revenges"),
                    damage: row.get("damage"),
                    damage_taken: row.get("damage_taken"),
                    healing_taken: row.get("healing_taken"),
                    captures: row.get("captures"),
                    captures_blocked: row.get("captures_blocked"),
                    structures_destroyed: row.get("buildings_destroyed"),
                })
            })
            .collect()
    }

    async fn load_killstreaks(
        &self,
        match_player_id: i64,
    ) -> Result<Vec<MatchKillstreakRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT class_id, killstreak, duration FROM match_player_killstreak \
             WHERE match_player_id = $1 ORDER BY class_id",
        )
        .bind(match_player_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch killstreak rows"))?;

        rows.iter()
            .map(|row| {
                Ok(MatchKillstreakRow {
                    match_player_id,
                    class: class_from_row(row)?,
                    kills: row.get("killstreak"),
                    duration_secs: row.get("duration"),
                })
            })
            .collect()
    }

    async fn load_medic(&self, match_player_id: i64) -> Result<Option<MatchMedicRow>, StoreError> {
        let row = sqlx::query(
            "SELECT healing, drops, near_full_charge_death, avg_uber_length, major_adv_lost, biggest_adv_lost, \
             charges_uber, charges_kritz, charges_vacc, charges_quickfix \
             FROM match_medic WHERE match_player_id = $1",
        )
        .bind(match_player_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch medic row"))?;

        Ok(row.map(|row| MatchMedicRow {
            match_player_id,
            healing: row.get("healing"),
            drops: row.get("drops"),
            near_full_charge_deaths: row.get("near_full_charge_death"),
            avg_charge_length: row.get("avg_uber_length"),
            major_advantage_lost: row.get("major_adv_lost"),
            biggest_advantage_lost: row.get("biggest_adv_lost"),
            charges_uber: row.get("charges_uber"),
            charges_kritzkrieg: row.get("charges_kritz"),
            charges_vaccinator: row.get("charges_vacc"),
            charges_quickfix: row.get("charges_quickfix"),
        }))
    }
}

/// Dropping the transaction without commit rolls it back
struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MatchUnitOfWork for PostgresUnitOfWork {
    async fn insert_match(&mut self, row: &NewMatch) -> Result<i64, StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO match (correlation_id, server_id, map, title, score_red, score_blu, winner, time_start, time_end) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING match_id",
        )
        .bind(row.correlation_id)
        .bind(row.server_id)
        .bind(&row.map_name)
        .bind(&row.title)
        .bind(row.score_red)
        .bind(row.score_blu)
        .bind(row.winner.code())
        .bind(row.time_start)
        .bind(row.time_end)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error("Failed to insert match"))?;

        let match_id: i64 = inserted.get("match_id");
        debug!(match_id, "Inserted match row");
        Ok(match_id)
    }

    async fn insert_player(&mut self, row: &NewMatchPlayer) -> Result<i64, StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO match_player (match_id, steam_id, team, time_start, time_end, kills, assists, deaths, \
             suicides, damage, damage_taken, healing, healing_taken, health_packs, extinguishes, buildings) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING match_player_id",
        )
        .bind(row.match_id)
        .bind(row.player_id.as_i64())
        .bind(row.team.code())
        .bind(row.time_start)
        .bind(row.time_end)
        .bind(row.kills)
        .bind(row.assists)
        .bind(row.deaths)
        .bind(row.suicides)
        .bind(row.damage)
        .bind(row.damage_taken)
        .bind(row.healing)
        .bind(row.healing_taken)
        .bind(row.health_packs)
        .bind(row.extinguishes)
        .bind(row.structures_built)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error("Failed to insert match player"))?;

        Ok(inserted.get("match_player_id"))
    }

    async fn insert_weapon(&mut self, row: &MatchWeaponRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO match_weapon (match_player_id, weapon_id, kills, damage, shots, hits, backstabs, headshots, airshots) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(row.match_player_id)
        .bind(row.weapon_id)
        .bind(row.kills)
        .bind(row.damage)
        .bind(row.shots)
        .bind(row.hits)
        .bind(row.backstabs)
        .bind(row.headshots)
        .bind(row.airshots)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to insert weapon row"))?;
        Ok(())
    }

    async fn insert_player_class(
        &mut self,
        row: &MatchPlayerClassRow,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO match_player_class (match_player_id, class_id, kills, assists, deaths, playtime, dominations, \
             dominated, revenges, damage, damage_taken, healing_taken, captures, captures_blocked, buildings_destroyed) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(row.match_player_id)
        .bind(row.class.code())
        .bind(row.kills)
        .bind(row.assists)
        .bind(row.deaths)
        .bind(row.playtime_secs)
        .bind(row.dominations)
        .bind(row.dominated)
        .bind(row.revenges)
        .bind(row.damage)
        .bind(row.damage_taken)
        .bind(row.healing_taken)
        .bind(row.captures)
        .bind(row.captures_blocked)
        .bind(row.structures_destroyed)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to insert class row"))?;
        Ok(())
    }

    async fn insert_killstreak(&mut self, row: &MatchKillstreakRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO match_player_killstreak (match_player_id, class_id, killstreak, duration) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(row.match_player_id)
        .bind(row.class.code())
        .bind(row.kills)
        .bind(row.duration_secs)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to insert killstreak row"))?;
        Ok(())
    }

    async fn insert_healer(&mut self, row: &MatchMedicRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO match_medic (match_player_id, healing, drops, near_full_charge_death, avg_uber_length, \
             major_adv_lost, biggest_adv_lost, charges_uber, charges_kritz, charges_vacc, charges_quickfix) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(row.match_player_id)
        .bind(row.healing)
        .bind(row.drops)
        .bind(row.near_full_charge_deaths)
        .bind(row.avg_charge_length)
        .bind(row.major_advantage_lost)
        .bind(row.biggest_advantage_lost)
        .bind(row.charges_uber)
        .bind(row.charges_kritzkrieg)
        .bind(row.charges_vaccinator)
        .bind(row.charges_quickfix)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to insert medic row"))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(db_error("Failed to commit match transaction"))?;
        debug!("Committed match transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(db_error("Failed to roll back match transaction"))?;
        debug!("Rolled back match transaction");
        Ok(())
    }
}
