//! Per-item translate / revert / toggle.
//!
//! Every path takes the item's lock from [`ItemLocks`](crate::session::ItemLocks)
//! first, so the bulk run and a manual toggle on the same item never interleave
//! their cache writes.

use crate::cancel::CancelToken;
use crate::client::TranslationRequest;
use crate::error::TranslationError;
use crate::events::{DisplayStatus, OverlayEvent};
use crate::model::{ContentFormat, ItemId};
use crate::session::{error_indicator_key, Session};
use crate::store::lock_store;
use log::{debug, warn};
use serde::Serialize;

/// How a translate step was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    CacheHit,
    Fetched,
}

/// What a manual toggle left on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemToggle {
    ShowingTranslation,
    ShowingOriginal,
}

pub(crate) async fn translate_item(
    session: &Session,
    id: &ItemId,
    language: &str,
    cancel: &CancelToken,
) -> Result<StepOutcome, TranslationError> {
    let lock = session.locks.item(id);
    let _guard = lock.lock().await;
    translate_item_locked(session, id, language, cancel, false).await
}

pub(crate) async fn toggle_item(
    session: &Session,
    id: &ItemId,
    language: &str,
) -> Result<ItemToggle, TranslationError> {
    let lock = session.locks.item(id);
    let _guard = lock.lock().await;
    session.scheduler.cancel(&error_indicator_key(id));

    // A translation in another language is replaced, not reverted.
    let showing_translation = lock_store(&session.store)
        .get(id)
        .map(|entry| entry.is_translated && entry.cached_for(language).is_some())
        .unwrap_or(false);
    if showing_translation {
        revert_item_locked(session, id);
        return Ok(ItemToggle::ShowingOriginal);
    }

    match translate_item_locked(session, id, language, &session.lifetime, true).await {
        Ok(_) => Ok(ItemToggle::ShowingTranslation),
        Err(error) => {
            revert_item_locked(session, id);
            report_failure(session, id, &error);
            Err(error)
        }
    }
}

/// Puts the item back to its captured original. Returns false when the item
/// was not showing a translation.
pub(crate) async fn revert_item(session: &Session, id: &ItemId) -> bool {
    let lock = session.locks.item(id);
    let _guard = lock.lock().await;
    revert_item_locked(session, id)
}

async fn translate_item_locked(
    session: &Session,
    id: &ItemId,
    language: &str,
    cancel: &CancelToken,
    announce: bool,
) -> Result<StepOutcome, TranslationError> {
    let (generation, captured) = {
        let mut store = lock_store(&session.store);
        let cached = store
            .get(id)
            .and_then(|entry| entry.cached_for(language))
            .map(str::to_string);
        if let Some(cached) = cached {
            store.set_displayed(id, true);
            drop(store);
            session.host.apply_item(id, &cached);
            emit_status(session, id, DisplayStatus::Translated);
            return Ok(StepOutcome::CacheHit);
        }
        let captured = store
            .get(id)
            .and_then(|entry| entry.original())
            .map(str::to_string);
        (store.generation(), captured)
    };

    let original = match captured {
        Some(original) => original,
        None => {
            let fetched = session
                .host
                .original_content(id)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| TranslationError::content_not_found(id.as_str()))?;
            let mut store = lock_store(&session.store);
            if !store.is_current(generation) {
                return Err(TranslationError::Cancelled);
            }
            store.capture_original(id, fetched)
        }
    };

    let request = TranslationRequest::new(original, language, ContentFormat::Html)?;
    if announce {
        emit_status(session, id, DisplayStatus::Loading);
    }
    let response = session.backend.translate(&request, cancel).await?;

    {
        let mut store = lock_store(&session.store);
        if !store.is_current(generation) {
            warn!("dropping translation for {id}: collection changed while in flight");
            return Err(TranslationError::Cancelled);
        }
        store.set_translation(id, response.translated_content.clone(), language);
        store.set_displayed(id, true);
    }

    session.host.apply_item(id, &response.translated_content);
    emit_status(session, id, DisplayStatus::Translated);
    debug!("translated {id} into {language} via {}", session.backend.name());
    Ok(StepOutcome::Fetched)
}

fn revert_item_locked(session: &Session, id: &ItemId) -> bool {
    let original = {
        let mut store = lock_store(&session.store);
        let Some(entry) = store.get(id) else {
            return false;
        };
        if !entry.is_translated {
            return false;
        }
        let original = entry.original().map(str::to_string);
        store.toggle(id);
        original
    };

    if let Some(original) = original {
        session.host.restore_item(id, &original);
    }
    emit_status(session, id, DisplayStatus::Original);
    true
}

fn report_failure(session: &Session, id: &ItemId, error: &TranslationError) {
    if error.is_cancelled() {
        emit_status(session, id, DisplayStatus::Original);
        return;
    }

    warn!("translation of {id} failed: {error}");
    emit_status(
        session,
        id,
        DisplayStatus::Error {
            code: error.code().to_string(),
        },
    );

    let events = session.events.clone();
    let item_id = id.clone();
    session.scheduler.schedule_after(
        &error_indicator_key(id),
        session.config.error_indicator_delay(),
        Box::new(move || {
            events.emit(OverlayEvent::ItemChanged {
                item_id,
                status: DisplayStatus::Original,
            });
        }),
    );
}

fn emit_status(session: &Session, id: &ItemId, status: DisplayStatus) {
    session.events.emit(OverlayEvent::ItemChanged {
        item_id: id.clone(),
        status,
    });
}
