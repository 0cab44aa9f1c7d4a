use crate::model::{ItemId, Phase, Progress};
use crate::orchestrator::RunSummary;
use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Display state of one item or of the title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DisplayStatus {
    Original,
    Loading,
    Translated,
    Error { code: String },
}

/// Events the engine emits. Controls subscribe and re-render; the engine
/// never calls into rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OverlayEvent {
    #[serde(rename_all = "camelCase")]
    ProgressChanged { current: u32, total: u32 },
    #[serde(rename_all = "camelCase")]
    PhaseChanged { phase: Phase },
    #[serde(rename_all = "camelCase")]
    LanguageChanged { language: String },
    #[serde(rename_all = "camelCase")]
    ItemChanged {
        item_id: ItemId,
        status: DisplayStatus,
    },
    #[serde(rename_all = "camelCase")]
    TitleChanged { status: DisplayStatus },
    #[serde(rename_all = "camelCase")]
    RunFinished { summary: RunSummary },
}

impl OverlayEvent {
    pub fn progress(progress: Progress) -> Self {
        OverlayEvent::ProgressChanged {
            current: progress.current,
            total: progress.total,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OverlayEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OverlayEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: OverlayEvent) {
        if self.sender.send(event).is_err() {
            debug!("overlay event dropped: no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
