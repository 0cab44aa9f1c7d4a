//! Translation overlay engine.
//!
//! Keeps a per-item cache of translated content for a virtualized, ordered
//! collection, reapplies it when items remount, and drives a cancellable,
//! sequential bulk pass over the whole collection.

pub mod cancel;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod host;
pub mod item;
pub mod language;
pub mod model;
pub mod orchestrator;
pub mod run_log;
pub mod scheduler;
mod session;
pub mod store;
pub mod surface;
mod title;
pub mod watcher;

#[cfg(test)]
mod test_support;

pub use cancel::CancelToken;
pub use client::{
    Translate, TranslateFuture, TranslationClient, TranslationRequest, TranslationResponse,
};
pub use config::{default_config_path, ConfigError, OverlayConfig};
pub use controller::{BulkAction, OverlayController};
pub use error::{EngineError, TranslationError};
pub use events::{DisplayStatus, EventBus, OverlayEvent};
pub use host::{CollectionHost, MountEvent};
pub use item::{ItemToggle, StepOutcome};
pub use language::{normalize_language_code, LanguageOption, SUPPORTED_LANGUAGES};
pub use model::{ContentFormat, ItemId, Phase, Progress, TitleMount};
pub use orchestrator::{RunOutcome, RunState, RunSummary};
pub use run_log::{default_run_log_path, RunLogEntry, RunLogger, RunMetrics};
pub use scheduler::{ScheduledTask, Scheduler, TokioScheduler};
pub use store::{CacheEntry, TitleEntry, TranslationSlot, TranslationStore};
pub use surface::{spawn_adapter, BulkLabel, ControlAdapter, ItemLabel, SurfaceState};
pub use watcher::{ReconciliationWatcher, WatcherHandle};
