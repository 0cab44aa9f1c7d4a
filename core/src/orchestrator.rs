//! Bulk run state machine.
//!
//! Idle -> Running -> {Completed, Cancelled}; Completed -> Idle on revert.
//! A run walks the title and then every item of the authoritative collection
//! order, one request at a time, and never rolls back what it already applied.

use crate::cancel::CancelToken;
use crate::error::{EngineError, TranslationError};
use crate::events::OverlayEvent;
use crate::item::{self, StepOutcome};
use crate::model::{ItemId, Phase, Progress};
use crate::session::Session;
use crate::store::lock_store;
use crate::title;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub phase: Phase,
    pub progress: Progress,
    pub current_language: Option<String>,
    pub succeeded: u32,
    pub skipped: u32,
    pub run_id: Option<Uuid>,
    #[serde(skip)]
    cancel: Option<CancelToken>,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// Every step was skipped.
    NoProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub language: String,
    pub outcome: RunOutcome,
    pub progress: Progress,
    pub succeeded: u32,
    pub skipped: u32,
    pub cache_hits: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Title,
    Item(ItemId),
}

pub(crate) struct BulkOrchestrator {
    session: Arc<Session>,
    state: Arc<Mutex<RunState>>,
    handle: Mutex<Option<JoinHandle<RunSummary>>>,
}

impl BulkOrchestrator {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            state: Arc::new(Mutex::new(RunState::default())),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RunState {
        lock_state(&self.state).clone()
    }

    /// Snapshots the collection order and spawns the run. Rejected while
    /// another run is active.
    pub fn start(&self, language: &str) -> Result<Uuid, EngineError> {
        let mut state = lock_state(&self.state);
        if state.is_running() {
            return Err(EngineError::RunActive);
        }

        let mut steps = vec![Step::Title];
        steps.extend(
            self.session
                .host
                .ordered_item_ids()
                .into_iter()
                .map(Step::Item),
        );

        let run_id = Uuid::new_v4();
        let token = CancelToken::new();
        let total = steps.len() as u32;
        *state = RunState {
            phase: Phase::Running,
            progress: Progress::new(0, total),
            current_language: Some(language.to_string()),
            succeeded: 0,
            skipped: 0,
            run_id: Some(run_id),
            cancel: Some(token.clone()),
        };
        drop(state);

        info!("bulk run {run_id} started: {total} steps into {language}");
        self.session.run_log.record_start();
        self.session.events.emit(OverlayEvent::PhaseChanged {
            phase: Phase::Running,
        });
        self.session
            .events
            .emit(OverlayEvent::progress(Progress::new(0, total)));

        let handle = tokio::spawn(run(
            Arc::clone(&self.session),
            Arc::clone(&self.state),
            steps,
            language.to_string(),
            token,
            run_id,
        ));
        *self.lock_handle() = Some(handle);
        Ok(run_id)
    }

    /// Signals the active run. Returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        let state = lock_state(&self.state);
        match (&state.phase, &state.cancel) {
            (Phase::Running, Some(token)) => {
                token.cancel();
                info!("bulk run cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Waits for the spawned run, if any, and returns its summary.
    pub async fn join(&self) -> Option<RunSummary> {
        let handle = self.lock_handle().take()?;
        match handle.await {
            Ok(summary) => Some(summary),
            Err(error) => {
                warn!("bulk run task ended abnormally: {error}");
                None
            }
        }
    }

    /// Restores the title and every translated item to original and returns
    /// to Idle. No network traffic.
    pub async fn revert(&self) -> Result<usize, EngineError> {
        if lock_state(&self.state).is_running() {
            return Err(EngineError::RunActive);
        }

        let ids = lock_store(&self.session.store).translated_ids();
        let mut reverted = 0;
        if title::revert_title(&self.session).await {
            reverted += 1;
        }
        for id in &ids {
            if item::revert_item(&self.session, id).await {
                reverted += 1;
            }
        }

        {
            let mut state = lock_state(&self.state);
            state.phase = Phase::Idle;
            state.progress = Progress::default();
            state.current_language = None;
            state.succeeded = 0;
            state.skipped = 0;
            state.cancel = None;
        }
        info!("reverted {reverted} translated entries to original");
        self.session.events.emit(OverlayEvent::PhaseChanged { phase: Phase::Idle });
        self.session
            .events
            .emit(OverlayEvent::progress(Progress::default()));
        Ok(reverted)
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<JoinHandle<RunSummary>>> {
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn lock_state(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run(
    session: Arc<Session>,
    state: Arc<Mutex<RunState>>,
    steps: Vec<Step>,
    language: String,
    token: CancelToken,
    run_id: Uuid,
) -> RunSummary {
    let started_at = Utc::now();
    let total = steps.len() as u32;
    let mut current: u32 = 0;
    let mut succeeded: u32 = 0;
    let mut skipped: u32 = 0;
    let mut cache_hits: u32 = 0;
    let mut cancelled = false;

    for step in &steps {
        if token.is_cancelled() {
            cancelled = true;
            break;
        }

        let result = match step {
            Step::Title => title::translate_title(&session, &language, &token).await,
            Step::Item(id) => item::translate_item(&session, id, &language, &token).await,
        };

        match result {
            Ok(outcome) => {
                succeeded += 1;
                if outcome == StepOutcome::CacheHit {
                    cache_hits += 1;
                }
                session.run_log.record_step(outcome == StepOutcome::CacheHit);
            }
            Err(TranslationError::Cancelled) => {
                cancelled = true;
                break;
            }
            Err(error) => {
                skipped += 1;
                warn!("bulk run {run_id}: skipping {}: {error}", describe(step));
                session.run_log.record_skip(&error);
            }
        }

        current += 1;
        {
            let mut state = lock_state(&state);
            state.progress = Progress::new(current, total);
            state.succeeded = succeeded;
            state.skipped = skipped;
        }
        session
            .events
            .emit(OverlayEvent::progress(Progress::new(current, total)));
    }

    let outcome = if cancelled {
        RunOutcome::Cancelled
    } else if succeeded > 0 {
        RunOutcome::Completed
    } else {
        RunOutcome::NoProgress
    };
    let phase = match outcome {
        RunOutcome::Completed => Phase::Completed,
        RunOutcome::Cancelled => Phase::Cancelled,
        RunOutcome::NoProgress => Phase::Idle,
    };

    {
        let mut state = lock_state(&state);
        state.phase = phase;
        state.cancel = None;
        if outcome == RunOutcome::NoProgress {
            state.current_language = None;
        }
    }

    let summary = RunSummary {
        run_id,
        language,
        outcome,
        progress: Progress::new(current, total),
        succeeded,
        skipped,
        cache_hits,
        started_at,
        finished_at: Utc::now(),
    };

    match outcome {
        RunOutcome::Completed => info!(
            "bulk run {run_id} completed: {succeeded}/{total} translated, {skipped} skipped"
        ),
        RunOutcome::Cancelled => info!("bulk run {run_id} cancelled at {current}/{total}"),
        RunOutcome::NoProgress => warn!("bulk run {run_id} made no progress: every step failed"),
    }

    session.run_log.log_finished(&summary);
    session.events.emit(OverlayEvent::PhaseChanged { phase });
    session.events.emit(OverlayEvent::RunFinished {
        summary: summary.clone(),
    });
    summary
}

fn describe(step: &Step) -> String {
    match step {
        Step::Title => "title".to_string(),
        Step::Item(id) => format!("item {id}"),
    }
}
