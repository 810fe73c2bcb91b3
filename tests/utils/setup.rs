#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use matchstats::{
    store::{InMemoryMatchStore, InMemoryPersonStore, StaticWeaponRegistry},
    telemetry, IngestConfig, MatchFinalizer,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub store: Arc<InMemoryMatchStore>,
    pub people: Arc<InMemoryPersonStore>,
    pub finalizer: Arc<MatchFinalizer>,
}

pub struct TestSetupBuilder {
    config: IngestConfig,
    weapons: StaticWeaponRegistry,
    latency: Option<Duration>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: IngestConfig::default(),
            weapons: StaticWeaponRegistry::with_weapons([
                ("scattergun", 1),
                ("tf_projectile_rocket", 2),
                ("tf_projectile_pipe", 3),
            ]),
            latency: None,
        }
    }

    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_weapons(mut self, weapons: StaticWeaponRegistry) -> Self {
        self.weapons = weapons;
        self
    }

    /// Slows every store write down by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn build(self) -> TestSetup {
        // RUST_LOG=matchstats=debug to see the pipeline while a test runs
        telemetry::init_tracing("matchstats=warn");

        let mut store = InMemoryMatchStore::new();
        if let Some(latency) = self.latency {
            store = store.with_latency(latency);
        }
        let store = Arc::new(store);
        let people = Arc::new(InMemoryPersonStore::new());

        let finalizer = MatchFinalizer::builder(store.clone())
            .with_people(people.clone())
            .with_weapons(Arc::new(self.weapons))
            .with_config(self.config)
            .build();

        TestSetup {
            store,
            people,
            finalizer: Arc::new(finalizer),
        }
    }
}
