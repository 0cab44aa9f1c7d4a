//! Per-collection cache of original and translated content.
//!
//! Pure data: nothing in here touches the network or the view. Writers that
//! await a network response capture [`TranslationStore::generation`] first and
//! re-check it with [`TranslationStore::is_current`] before writing, so a
//! response that lands after `clear_all` is dropped instead of leaking into the
//! next collection.

use crate::model::ItemId;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// The single cached translation held per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationSlot {
    pub language: String,
    pub content: String,
}

/// Cache entry shared by items and the title singleton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub is_translated: bool,
    slot: Option<TranslationSlot>,
    original: Option<String>,
}

impl CacheEntry {
    pub fn slot(&self) -> Option<&TranslationSlot> {
        self.slot.as_ref()
    }

    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    /// Cached content for `language`, if the slot was produced for it.
    pub fn cached_for(&self, language: &str) -> Option<&str> {
        self.slot
            .as_ref()
            .filter(|slot| slot.language == language)
            .map(|slot| slot.content.as_str())
    }

    /// Translated content to show when the entry is toggled on.
    pub fn displayed_translation(&self) -> Option<&str> {
        if self.is_translated {
            self.slot.as_ref().map(|slot| slot.content.as_str())
        } else {
            None
        }
    }

    fn capture_original(&mut self, content: String) -> &str {
        self.original.get_or_insert(content)
    }

    fn set_slot(&mut self, content: String, language: &str) {
        self.slot = Some(TranslationSlot {
            language: language.to_string(),
            content,
        });
    }
}

pub type TitleEntry = CacheEntry;

#[derive(Debug, Default)]
pub struct TranslationStore {
    items: BTreeMap<ItemId, CacheEntry>,
    title: Option<TitleEntry>,
    generation: u64,
}

impl TranslationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ItemId) -> Option<&CacheEntry> {
        self.items.get(id)
    }

    pub fn get_or_create(&mut self, id: &ItemId) -> &mut CacheEntry {
        self.items.entry(id.clone()).or_default()
    }

    /// Records the original content for `id`. Only the first capture sticks;
    /// the stored original is returned either way.
    pub fn capture_original(&mut self, id: &ItemId, content: String) -> String {
        self.get_or_create(id).capture_original(content).to_string()
    }

    /// Replaces the translation slot. A slot for another language is
    /// overwritten, never kept alongside.
    pub fn set_translation(&mut self, id: &ItemId, content: String, language: &str) {
        self.get_or_create(id).set_slot(content, language);
    }

    /// Flips `is_translated` keeping the slot. Returns the new state, or
    /// `None` when the item was never cached.
    pub fn toggle(&mut self, id: &ItemId) -> Option<bool> {
        let entry = self.items.get_mut(id)?;
        entry.is_translated = !entry.is_translated;
        Some(entry.is_translated)
    }

    pub fn set_displayed(&mut self, id: &ItemId, translated: bool) {
        self.get_or_create(id).is_translated = translated;
    }

    pub fn title(&self) -> Option<&TitleEntry> {
        self.title.as_ref()
    }

    pub fn title_or_create(&mut self) -> &mut TitleEntry {
        self.title.get_or_insert_with(TitleEntry::default)
    }

    pub fn capture_title_original(&mut self, content: String) -> String {
        self.title_or_create().capture_original(content).to_string()
    }

    pub fn set_title_translation(&mut self, content: String, language: &str) {
        self.title_or_create().set_slot(content, language);
    }

    pub fn toggle_title(&mut self) -> Option<bool> {
        let title = self.title.as_mut()?;
        title.is_translated = !title.is_translated;
        Some(title.is_translated)
    }

    pub fn set_title_displayed(&mut self, translated: bool) {
        self.title_or_create().is_translated = translated;
    }

    /// Items currently showing their translation, in identifier order.
    pub fn translated_ids(&self) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|(_, entry)| entry.is_translated)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.title.is_none()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Drops every item and the title entry and starts a new generation.
    pub fn clear_all(&mut self) {
        self.items.clear();
        self.title = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

pub(crate) type SharedStore = Arc<Mutex<TranslationStore>>;

pub(crate) fn lock_store(store: &SharedStore) -> MutexGuard<'_, TranslationStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
