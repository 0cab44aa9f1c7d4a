//! In-memory host and scripted backend shared by the unit tests.

use crate::cancel::CancelToken;
use crate::client::{Translate, TranslateFuture, TranslationRequest, TranslationResponse};
use crate::config::OverlayConfig;
use crate::controller::OverlayController;
use crate::error::TranslationError;
use crate::host::CollectionHost;
use crate::model::{ItemId, TitleMount};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Collection with an authoritative model and a mutable mounted window.
pub(crate) struct MemoryHost {
    order: Mutex<Vec<ItemId>>,
    originals: Mutex<HashMap<ItemId, String>>,
    mounted: Mutex<HashMap<ItemId, String>>,
    title_original: Option<String>,
    title_mounts: Mutex<HashMap<TitleMount, String>>,
}

impl MemoryHost {
    pub fn new(title: &str, items: &[(&str, &str)]) -> Arc<Self> {
        let order = items.iter().map(|(id, _)| ItemId::from(*id)).collect();
        let originals: HashMap<ItemId, String> = items
            .iter()
            .map(|(id, content)| (ItemId::from(*id), content.to_string()))
            .collect();
        let mut title_mounts = HashMap::new();
        title_mounts.insert(TitleMount::Primary, title.to_string());

        Arc::new(Self {
            order: Mutex::new(order),
            mounted: Mutex::new(originals.clone()),
            originals: Mutex::new(originals),
            title_original: Some(title.to_string()).filter(|title| !title.is_empty()),
            title_mounts: Mutex::new(title_mounts),
        })
    }

    pub fn displayed(&self, id: &str) -> Option<String> {
        self.mounted.lock().unwrap().get(&ItemId::from(id)).cloned()
    }

    pub fn title_displayed(&self, mount: TitleMount) -> Option<String> {
        self.title_mounts.lock().unwrap().get(&mount).cloned()
    }

    pub fn unmount(&self, id: &str) {
        self.mounted.lock().unwrap().remove(&ItemId::from(id));
    }

    /// A fresh mount renders the original content.
    pub fn remount(&self, id: &str) {
        let id = ItemId::from(id);
        let original = self.originals.lock().unwrap().get(&id).cloned();
        if let Some(original) = original {
            self.mounted.lock().unwrap().insert(id, original);
        }
    }

    pub fn mount_title(&self, mount: TitleMount) {
        let original = self.title_original.clone().unwrap_or_default();
        self.title_mounts.lock().unwrap().insert(mount, original);
    }

    pub fn append(&self, id: &str, content: &str) {
        let id = ItemId::from(id);
        self.order.lock().unwrap().push(id.clone());
        self.originals
            .lock()
            .unwrap()
            .insert(id.clone(), content.to_string());
        self.mounted.lock().unwrap().insert(id, content.to_string());
    }

    pub fn forget_original(&self, id: &str) {
        self.originals.lock().unwrap().remove(&ItemId::from(id));
    }
}

impl CollectionHost for MemoryHost {
    fn ordered_item_ids(&self) -> Vec<ItemId> {
        self.order.lock().unwrap().clone()
    }

    fn original_content(&self, id: &ItemId) -> Option<String> {
        self.originals.lock().unwrap().get(id).cloned()
    }

    fn apply_item(&self, id: &ItemId, content: &str) {
        if let Some(slot) = self.mounted.lock().unwrap().get_mut(id) {
            *slot = content.to_string();
        }
    }

    fn restore_item(&self, id: &ItemId, original: &str) {
        self.apply_item(id, original);
    }

    fn title_original(&self) -> Option<String> {
        self.title_original.clone()
    }

    fn title_mounts(&self) -> Vec<TitleMount> {
        let mut mounts: Vec<TitleMount> =
            self.title_mounts.lock().unwrap().keys().copied().collect();
        mounts.sort_by_key(|mount| matches!(mount, TitleMount::Compact));
        mounts
    }

    fn apply_title(&self, mount: TitleMount, text: &str) {
        if let Some(slot) = self.title_mounts.lock().unwrap().get_mut(&mount) {
            *slot = text.to_string();
        }
    }

    fn restore_title(&self, mount: TitleMount, original: &str) {
        self.apply_title(mount, original);
    }
}

/// Backend answering `[lang] content`, with per-content failures and hangs.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    calls: Mutex<Vec<TranslationRequest>>,
    failures: Mutex<HashMap<String, TranslationError>>,
    hangs: Mutex<HashSet<String>>,
    gated: Mutex<HashSet<String>>,
    gate: Notify,
    pub entered: Notify,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, content: &str, error: TranslationError) {
        self.failures
            .lock()
            .unwrap()
            .insert(content.to_string(), error);
    }

    /// Requests for `content` block until cancelled.
    pub fn hang_on(&self, content: &str) {
        self.hangs.lock().unwrap().insert(content.to_string());
    }

    pub fn stop_hanging(&self) {
        self.hangs.lock().unwrap().clear();
    }

    /// Requests for `content` wait for [`ScriptedBackend::open_gate`] and
    /// ignore cancellation.
    pub fn gate_on(&self, content: &str) {
        self.gated.lock().unwrap().insert(content.to_string());
    }

    pub fn open_gate(&self) {
        self.gate.notify_one();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<TranslationRequest> {
        self.calls.lock().unwrap().clone()
    }
}

pub(crate) fn translated(language: &str, content: &str) -> String {
    format!("[{language}] {content}")
}

impl Translate for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn translate<'a>(
        &'a self,
        request: &'a TranslationRequest,
        cancel: &'a CancelToken,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.clone());
            let hang = self.hangs.lock().unwrap().contains(&request.content);
            if hang {
                self.entered.notify_one();
                cancel.cancelled().await;
                return Err(TranslationError::Cancelled);
            }
            let gated = self.gated.lock().unwrap().contains(&request.content);
            if gated {
                self.entered.notify_one();
                self.gate.notified().await;
            }
            let failure = self.failures.lock().unwrap().get(&request.content).cloned();
            if let Some(error) = failure {
                return Err(error);
            }
            Ok(TranslationResponse {
                translated_content: translated(&request.target_language, &request.content),
                provider: Some("scripted".into()),
                quality: None,
            })
        })
    }
}

pub(crate) fn test_config() -> OverlayConfig {
    OverlayConfig {
        error_indicator_ms: 3_000,
        remount_debounce_ms: 50,
        ..OverlayConfig::with_endpoint("http://127.0.0.1:9/translate")
    }
}

pub(crate) fn controller(
    host: &Arc<MemoryHost>,
    backend: &Arc<ScriptedBackend>,
) -> OverlayController {
    OverlayController::init(
        test_config(),
        Arc::clone(backend) as Arc<dyn Translate>,
        Arc::clone(host) as Arc<dyn CollectionHost>,
    )
    .expect("controller init")
}

/// Three items plus a title.
pub(crate) fn sample_host() -> Arc<MemoryHost> {
    MemoryHost::new(
        "Weekly sync",
        &[
            ("m1", "<p>Hello</p>"),
            ("m2", "<p>How are you?</p>"),
            ("m3", "<p>See you soon</p>"),
        ],
    )
}
