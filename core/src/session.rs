use crate::cancel::CancelToken;
use crate::client::Translate;
use crate::config::OverlayConfig;
use crate::events::EventBus;
use crate::host::CollectionHost;
use crate::model::ItemId;
use crate::run_log::RunLogger;
use crate::scheduler::Scheduler;
use crate::store::{SharedStore, TranslationStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Everything that lives exactly as long as one collection view.
pub(crate) struct Session {
    pub config: OverlayConfig,
    pub backend: Arc<dyn Translate>,
    pub host: Arc<dyn CollectionHost>,
    pub store: SharedStore,
    pub locks: ItemLocks,
    pub events: EventBus,
    pub scheduler: Arc<dyn Scheduler>,
    pub run_log: RunLogger,
    /// Cancelled on teardown; aborts manual requests still in flight.
    pub lifetime: CancelToken,
}

impl Session {
    pub fn new(
        config: OverlayConfig,
        backend: Arc<dyn Translate>,
        host: Arc<dyn CollectionHost>,
        scheduler: Arc<dyn Scheduler>,
        run_log: RunLogger,
    ) -> Self {
        Self {
            config,
            backend,
            host,
            store: Arc::new(Mutex::new(TranslationStore::new())),
            locks: ItemLocks::default(),
            events: EventBus::new(),
            scheduler,
            run_log,
            lifetime: CancelToken::new(),
        }
    }
}

/// Per-entry async locks serializing cache writes between the bulk run and
/// manual toggles.
#[derive(Default)]
pub(crate) struct ItemLocks {
    items: Mutex<HashMap<ItemId, Arc<tokio::sync::Mutex<()>>>>,
    title: Arc<tokio::sync::Mutex<()>>,
}

impl ItemLocks {
    pub fn item(&self, id: &ItemId) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(guard.entry(id.clone()).or_default())
    }

    pub fn title(&self) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.title)
    }
}

pub(crate) fn error_indicator_key(id: &ItemId) -> String {
    format!("error:item:{id}")
}

pub(crate) const TITLE_ERROR_KEY: &str = "error:title";
