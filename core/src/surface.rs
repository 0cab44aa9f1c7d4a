//! Render-side projection of engine events.
//!
//! However a host attaches its controls (tree insertion, menu registration,
//! value transforms), it implements [`ControlAdapter`] and receives a
//! [`SurfaceState`] built purely from [`OverlayEvent`]s.

use crate::events::{DisplayStatus, OverlayEvent};
use crate::model::{ItemId, Phase, Progress};
use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Label of the bulk toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BulkLabel {
    Translate,
    Progress { current: u32, total: u32 },
    ShowOriginal,
}

impl BulkLabel {
    pub fn for_state(phase: Phase, progress: Progress) -> Self {
        match phase {
            Phase::Idle | Phase::Cancelled => BulkLabel::Translate,
            Phase::Running => BulkLabel::Progress {
                current: progress.current,
                total: progress.total,
            },
            Phase::Completed => BulkLabel::ShowOriginal,
        }
    }
}

impl fmt::Display for BulkLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkLabel::Translate => f.write_str("Translate all"),
            BulkLabel::Progress { current, total } => write!(f, "{current}/{total}"),
            BulkLabel::ShowOriginal => f.write_str("Show original"),
        }
    }
}

/// Label of a per-item (or title) toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemLabel {
    Translate,
    Translating,
    ShowOriginal,
    Failed { code: String },
}

impl ItemLabel {
    fn from_status(status: &DisplayStatus) -> Self {
        match status {
            DisplayStatus::Original => ItemLabel::Translate,
            DisplayStatus::Loading => ItemLabel::Translating,
            DisplayStatus::Translated => ItemLabel::ShowOriginal,
            DisplayStatus::Error { code } => ItemLabel::Failed { code: code.clone() },
        }
    }
}

impl fmt::Display for ItemLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemLabel::Translate => f.write_str("Translate"),
            ItemLabel::Translating => f.write_str("Translating…"),
            ItemLabel::ShowOriginal => f.write_str("Show original"),
            ItemLabel::Failed { .. } => f.write_str("Translation failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceState {
    pub phase: Phase,
    pub progress: Progress,
    pub language: String,
    pub bulk_label: BulkLabel,
    /// The bulk toggle is disabled while a run is active.
    pub bulk_enabled: bool,
    pub cancel_visible: bool,
    pub title: ItemLabel,
    items: HashMap<ItemId, ItemLabel>,
}

impl SurfaceState {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            phase: Phase::Idle,
            progress: Progress::default(),
            language: language.into(),
            bulk_label: BulkLabel::Translate,
            bulk_enabled: true,
            cancel_visible: false,
            title: ItemLabel::Translate,
            items: HashMap::new(),
        }
    }

    pub fn item_label(&self, id: &ItemId) -> ItemLabel {
        self.items.get(id).cloned().unwrap_or(ItemLabel::Translate)
    }

    /// Folds one event into the projection.
    pub fn apply(&mut self, event: &OverlayEvent) {
        match event {
            OverlayEvent::ProgressChanged { current, total } => {
                self.progress = Progress::new(*current, *total);
            }
            OverlayEvent::PhaseChanged { phase } => {
                self.phase = *phase;
                self.bulk_enabled = *phase != Phase::Running;
                self.cancel_visible = *phase == Phase::Running;
            }
            OverlayEvent::LanguageChanged { language } => {
                self.language = language.clone();
            }
            OverlayEvent::ItemChanged { item_id, status } => {
                self.items
                    .insert(item_id.clone(), ItemLabel::from_status(status));
            }
            OverlayEvent::TitleChanged { status } => {
                self.title = ItemLabel::from_status(status);
            }
            OverlayEvent::RunFinished { summary } => {
                self.progress = summary.progress;
            }
        }
        self.bulk_label = BulkLabel::for_state(self.phase, self.progress);
    }
}

/// Pluggable attachment of the controls to a concrete view.
pub trait ControlAdapter: Send + 'static {
    fn render(&mut self, state: &SurfaceState);
}

/// Feeds every event into `state` and re-renders `adapter`. Ends when the
/// event stream closes.
pub fn spawn_adapter<A: ControlAdapter>(
    mut events: broadcast::Receiver<OverlayEvent>,
    mut adapter: A,
    mut state: SurfaceState,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        adapter.render(&state);
        loop {
            match events.recv().await {
                Ok(event) => {
                    state.apply(&event);
                    adapter.render(&state);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("control surface lagged {skipped} overlay events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
