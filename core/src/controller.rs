//! One controller per collection-view lifetime.
//!
//! [`OverlayController::init`] builds a fresh context (store, run state,
//! scheduler, event bus) and [`OverlayController::teardown`] dismantles it.
//! Navigation to another collection is teardown followed by a new `init`.

use crate::client::Translate;
use crate::config::OverlayConfig;
use crate::error::EngineError;
use crate::events::OverlayEvent;
use crate::host::{CollectionHost, MountEvent};
use crate::item::{self, ItemToggle};
use crate::language::normalize_language_code;
use crate::model::{ItemId, Phase, Progress};
use crate::orchestrator::{BulkOrchestrator, RunState, RunSummary};
use crate::run_log::{RunLogger, RunMetrics};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::session::Session;
use crate::store::lock_store;
use crate::surface::{BulkLabel, SurfaceState};
use crate::title;
use crate::watcher::{ReconciliationWatcher, WatcherHandle};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

/// Result of [`OverlayController::toggle_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Started(Uuid),
    Reverted(usize),
}

#[derive(Clone)]
pub struct OverlayController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    session: Arc<Session>,
    orchestrator: BulkOrchestrator,
    watcher: Mutex<Option<WatcherHandle>>,
    language: Mutex<String>,
    torn_down: AtomicBool,
}

impl OverlayController {
    pub fn init(
        config: OverlayConfig,
        backend: Arc<dyn Translate>,
        host: Arc<dyn CollectionHost>,
    ) -> Result<Self, EngineError> {
        Self::init_with(
            config,
            backend,
            host,
            Arc::new(TokioScheduler::new()),
            RunLogger::new(),
        )
    }

    pub fn init_with(
        config: OverlayConfig,
        backend: Arc<dyn Translate>,
        host: Arc<dyn CollectionHost>,
        scheduler: Arc<dyn Scheduler>,
        run_log: RunLogger,
    ) -> Result<Self, EngineError> {
        let language = normalize_language_code(&config.default_language)?;
        let session = Arc::new(Session::new(config, backend, host, scheduler, run_log));
        info!(
            "overlay controller initialised ({} backend, target {language})",
            session.backend.name()
        );

        Ok(Self {
            inner: Arc::new(ControllerInner {
                orchestrator: BulkOrchestrator::new(Arc::clone(&session)),
                session,
                watcher: Mutex::new(None),
                language: Mutex::new(language),
                torn_down: AtomicBool::new(false),
            }),
        })
    }

    /// Starts reconciling remounted views from `mounts`. Replaces a previously
    /// attached watcher.
    pub fn attach_watcher(&self, mounts: mpsc::Receiver<MountEvent>) -> Result<(), EngineError> {
        self.ensure_alive()?;
        let handle = self.watcher().attach(mounts);
        if let Some(previous) = lock(&self.inner.watcher).replace(handle) {
            previous.detach();
        }
        Ok(())
    }

    /// Direct access for hosts that report mounts synchronously.
    pub fn watcher(&self) -> ReconciliationWatcher {
        ReconciliationWatcher::new(Arc::clone(&self.inner.session))
    }

    pub async fn toggle_item(&self, id: &ItemId) -> Result<ItemToggle, EngineError> {
        self.ensure_alive()?;
        let language = self.language();
        Ok(item::toggle_item(&self.inner.session, id, &language).await?)
    }

    pub async fn toggle_title(&self) -> Result<ItemToggle, EngineError> {
        self.ensure_alive()?;
        let language = self.language();
        Ok(title::toggle_title(&self.inner.session, &language).await?)
    }

    /// Starts a bulk run, or reverts a completed one. Rejected while a run is
    /// active.
    pub async fn toggle_all(&self) -> Result<BulkAction, EngineError> {
        self.ensure_alive()?;
        match self.phase() {
            Phase::Running => Err(EngineError::RunActive),
            Phase::Completed => {
                let reverted = self.inner.orchestrator.revert().await?;
                Ok(BulkAction::Reverted(reverted))
            }
            Phase::Idle | Phase::Cancelled => {
                let language = self.language();
                let run_id = self.inner.orchestrator.start(&language)?;
                Ok(BulkAction::Started(run_id))
            }
        }
    }

    /// Changes the target language for subsequent actions. A completed run
    /// is reverted first so nothing stays on screen in the old language.
    pub async fn select_language(&self, code: &str) -> Result<(), EngineError> {
        self.ensure_alive()?;
        let language = normalize_language_code(code)?;
        if self.language() == language {
            return Ok(());
        }
        match self.phase() {
            Phase::Running => return Err(EngineError::RunActive),
            Phase::Completed => {
                self.inner.orchestrator.revert().await?;
            }
            Phase::Idle | Phase::Cancelled => {}
        }

        *lock(&self.inner.language) = language.clone();
        info!("target language set to {language}");
        self.inner
            .session
            .events
            .emit(OverlayEvent::LanguageChanged { language });
        Ok(())
    }

    pub fn cancel_run(&self) -> bool {
        self.inner.orchestrator.cancel()
    }

    /// Waits for the current bulk run to finish.
    pub async fn join_run(&self) -> Option<RunSummary> {
        self.inner.orchestrator.join().await
    }

    pub fn language(&self) -> String {
        lock(&self.inner.language).clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.orchestrator.state().phase
    }

    pub fn progress(&self) -> Progress {
        self.inner.orchestrator.state().progress
    }

    pub fn run_state(&self) -> RunState {
        self.inner.orchestrator.state()
    }

    pub fn label(&self) -> BulkLabel {
        let state = self.inner.orchestrator.state();
        BulkLabel::for_state(state.phase, state.progress)
    }

    /// Snapshot to seed a [`ControlAdapter`](crate::surface::ControlAdapter).
    pub fn surface_state(&self) -> SurfaceState {
        let state = self.inner.orchestrator.state();
        let mut surface = SurfaceState::new(self.language());
        surface.apply(&OverlayEvent::PhaseChanged { phase: state.phase });
        surface.apply(&OverlayEvent::progress(state.progress));
        surface
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OverlayEvent> {
        self.inner.session.events.subscribe()
    }

    pub fn metrics(&self) -> RunMetrics {
        self.inner.session.run_log.metrics()
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    /// Cancels any active run, clears the store, detaches the watcher and
    /// drops pending timers, in that order. Idempotent.
    pub async fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let session = &self.inner.session;
        self.inner.orchestrator.cancel();
        session.lifetime.cancel();
        lock_store(&session.store).clear_all();
        if let Some(watcher) = lock(&self.inner.watcher).take() {
            watcher.detach();
        }
        session.scheduler.cancel_all();

        self.inner.orchestrator.join().await;
        info!("overlay controller torn down");
    }

    fn ensure_alive(&self) -> Result<(), EngineError> {
        if self.is_torn_down() {
            Err(EngineError::TornDown)
        } else {
            Ok(())
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
