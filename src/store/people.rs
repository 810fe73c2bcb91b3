use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::errors::StoreError;
use super::models::Person;
use crate::event::PlayerId;

/// Identity collaborator consulted only while persisting a match
#[async_trait]
pub trait PersonStore: Send + Sync {
    async fn get_or_create_person(&self, player_id: PlayerId) -> Result<Person, StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPersonStore {
    people: Arc<RwLock<HashMap<PlayerId, Person>>>,
    rejected: Arc<RwLock<HashSet<PlayerId>>>,
}

impl InMemoryPersonStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookups for `player_id` fail from now on
    pub async fn reject(&self, player_id: PlayerId) {
        self.rejected.write().await.insert(player_id);
    }

    pub async fn person_count(&self) -> usize {
        self.people.read().await.len()
    }
}

#[async_trait]
impl PersonStore for InMemoryPersonStore {
    #[instrument(skip(self))]
    async fn get_or_create_person(&self, player_id: PlayerId) -> Result<Person, StoreError> {
        if self.rejected.read().await.contains(&player_id) {
            warn!(player_id = %player_id, "Person lookup rejected");
            return Err(StoreError::Database(format!(
                "person {player_id} is unavailable"
            )));
        }

        let mut people = self.people.write().await;
        let person = people.entry(player_id).or_insert_with(|| {
            debug!(player_id = %player_id, "Creating person in memory");
            Person {
                player_id,
                created_on: Utc::now(),
            }
        });
        Ok(person.clone())
    }
}

/// PostgreSQL implementation of the person store
pub struct PostgresPersonStore {
    pool: PgPool,
}

impl PostgresPersonStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonStore for PostgresPersonStore {
    #[instrument(skip(self))]
    async fn get_or_create_person(&self, player_id: PlayerId) -> Result<Person, StoreError> {
        sqlx::query(
            "INSERT INTO person (steam_id, created_on) VALUES ($1, $2) ON CONFLICT (steam_id) DO NOTHING",
        )
        .bind(player_id.as_i64())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, player_id = %player_id, "Failed to create person");
            StoreError::Database(e.to_string())
        })?;

        let row = sqlx::query("SELECT created_on FROM person WHERE steam_id = $1")
            .bind(player_id.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, player_id = %player_id, "Failed to fetch person");
                StoreError::Database(e.to_string())
            })?;

        Ok(Person {
            player_id,
            created_on: row.get("created_on"),
        })
    }
}
