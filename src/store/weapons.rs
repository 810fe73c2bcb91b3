use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::errors::StoreError;

/// Maps a weapon key as logged by the game to its stable id
pub trait WeaponRegistry: Send + Sync {
    fn weapon_id(&self, key: &str) -> Option<i32>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticWeaponRegistry {
    ids: HashMap<String, i32>,
}

impl StaticWeaponRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weapons<I, K>(weapons: I) -> Self
    where
        I: IntoIterator<Item = (K, i32)>,
        K: Into<String>,
    {
        Self {
            ids: weapons.into_iter().map(|(k, id)| (k.into(), id)).collect(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, weapon_id: i32) {
        self.ids.insert(key.into(), weapon_id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Snapshot of the `weapon` table
    pub async fn load(pool: &PgPool) -> Result<Self, StoreError> {
        let rows = sqlx::query("SELECT weapon_id, key FROM weapon")
            .fetch_all(pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to load weapon registry");
                StoreError::Database(e.to_string())
            })?;

        let registry = Self::with_weapons(
            rows.iter()
                .map(|row| (row.get::<String, _>("key"), row.get::<i32, _>("weapon_id"))),
        );
        debug!(weapons = registry.len(), "Loaded weapon registry");
        Ok(registry)
    }
}

impl WeaponRegistry for StaticWeaponRegistry {
    fn weapon_id(&self, key: &str) -> Option<i32> {
        self.ids.get(key).copied()
    }
}
