//! Engine context: every collaborator one orchestrator needs.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use wxloop_media::{MediaFactory, StreamOptimizer};
use wxloop_storage::KeyValueStore;

use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::draw::CardDrawEngine;
use crate::random::{SampleSource, ThreadRngSource};
use crate::trigger_gate::TriggerGate;

pub struct EngineContext {
    pub config: EngineConfig,
    pub catalog: Arc<Catalog>,
    pub draw: Mutex<CardDrawEngine>,
    pub gate: TriggerGate,
    pub optimizer: StreamOptimizer,
    pub media: Arc<dyn MediaFactory>,
    pub store: Arc<dyn KeyValueStore>,
}

impl EngineContext {
    pub fn builder(store: Arc<dyn KeyValueStore>, media: Arc<dyn MediaFactory>) -> EngineContextBuilder {
        EngineContextBuilder {
            store,
            media,
            config: EngineConfig::default(),
            catalog: None,
            clock: None,
            rng: None,
        }
    }

    /// Start the optimizer's background reclamation sweep.
    pub fn start_sweeper(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.optimizer.start_sweeper(shutdown)
    }
}

pub struct EngineContextBuilder {
    store: Arc<dyn KeyValueStore>,
    media: Arc<dyn MediaFactory>,
    config: EngineConfig,
    catalog: Option<Catalog>,
    clock: Option<Arc<dyn Clock>>,
    rng: Option<Box<dyn SampleSource>>,
}

impl EngineContextBuilder {
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to the built-in static table.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn SampleSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn build(self) -> Arc<EngineContext> {
        let catalog = Arc::new(self.catalog.unwrap_or_else(Catalog::static_table));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let rng = self.rng.unwrap_or_else(|| Box::new(ThreadRngSource));

        let draw = CardDrawEngine::from_config(Arc::clone(&catalog), rng, &self.config);
        let gate = TriggerGate::new(Arc::clone(&self.store), clock, &self.config);
        let optimizer = StreamOptimizer::new(self.config.pool.clone());

        info!(
            weather_types = catalog.len(),
            store = self.store.name(),
            "Engine context ready"
        );

        Arc::new(EngineContext {
            config: self.config,
            catalog,
            draw: Mutex::new(draw),
            gate,
            optimizer,
            media: self.media,
            store: self.store,
        })
    }
}
