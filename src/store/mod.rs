//! Persistence seams for finalized matches: a transactional match store, the
//! identity store and the weapon registry, each with in-memory and
//! PostgreSQL implementations.

mod errors;
pub mod models;
mod people;
mod postgres;
mod repository;
mod weapons;

pub use errors::{PersistStep, StoreError};
pub use models::*;
pub use people::{InMemoryPersonStore, PersonStore, PostgresPersonStore};
pub use postgres::PostgresMatchStore;
pub use repository::{InMemoryMatchStore, MatchStore, MatchUnitOfWork};
pub use weapons::{StaticWeaponRegistry, WeaponRegistry};
