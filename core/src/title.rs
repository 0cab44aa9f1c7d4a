//! The title singleton: one cache entry, up to two mounts (primary and
//! compact) that are written together.

use crate::cancel::CancelToken;
use crate::client::TranslationRequest;
use crate::error::TranslationError;
use crate::events::{DisplayStatus, OverlayEvent};
use crate::item::{ItemToggle, StepOutcome};
use crate::model::ContentFormat;
use crate::session::{Session, TITLE_ERROR_KEY};
use crate::store::lock_store;
use log::warn;

pub(crate) async fn translate_title(
    session: &Session,
    language: &str,
    cancel: &CancelToken,
) -> Result<StepOutcome, TranslationError> {
    let lock = session.locks.title();
    let _guard = lock.lock().await;
    translate_title_locked(session, language, cancel, false).await
}

pub(crate) async fn toggle_title(
    session: &Session,
    language: &str,
) -> Result<ItemToggle, TranslationError> {
    let lock = session.locks.title();
    let _guard = lock.lock().await;
    session.scheduler.cancel(TITLE_ERROR_KEY);

    let showing_translation = lock_store(&session.store)
        .title()
        .map(|title| title.is_translated && title.cached_for(language).is_some())
        .unwrap_or(false);
    if showing_translation {
        revert_title_locked(session);
        return Ok(ItemToggle::ShowingOriginal);
    }

    match translate_title_locked(session, language, &session.lifetime, true).await {
        Ok(_) => Ok(ItemToggle::ShowingTranslation),
        Err(error) => {
            revert_title_locked(session);
            report_failure(session, &error);
            Err(error)
        }
    }
}

pub(crate) async fn revert_title(session: &Session) -> bool {
    let lock = session.locks.title();
    let _guard = lock.lock().await;
    revert_title_locked(session)
}

async fn translate_title_locked(
    session: &Session,
    language: &str,
    cancel: &CancelToken,
    announce: bool,
) -> Result<StepOutcome, TranslationError> {
    let (generation, captured) = {
        let mut store = lock_store(&session.store);
        let cached = store
            .title()
            .and_then(|title| title.cached_for(language))
            .map(str::to_string);
        if let Some(cached) = cached {
            store.set_title_displayed(true);
            drop(store);
            apply_everywhere(session, &cached);
            emit_status(session, DisplayStatus::Translated);
            return Ok(StepOutcome::CacheHit);
        }
        let captured = store
            .title()
            .and_then(|title| title.original())
            .map(str::to_string);
        (store.generation(), captured)
    };

    let original = match captured {
        Some(original) => original,
        None => {
            let fetched = session
                .host
                .title_original()
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| TranslationError::content_not_found("title"))?;
            let mut store = lock_store(&session.store);
            if !store.is_current(generation) {
                return Err(TranslationError::Cancelled);
            }
            store.capture_title_original(fetched)
        }
    };

    let request = TranslationRequest::new(original, language, ContentFormat::Text)?;
    if announce {
        emit_status(session, DisplayStatus::Loading);
    }
    let response = session.backend.translate(&request, cancel).await?;

    {
        let mut store = lock_store(&session.store);
        if !store.is_current(generation) {
            warn!("dropping title translation: collection changed while in flight");
            return Err(TranslationError::Cancelled);
        }
        store.set_title_translation(response.translated_content.clone(), language);
        store.set_title_displayed(true);
    }

    apply_everywhere(session, &response.translated_content);
    emit_status(session, DisplayStatus::Translated);
    Ok(StepOutcome::Fetched)
}

fn revert_title_locked(session: &Session) -> bool {
    let original = {
        let mut store = lock_store(&session.store);
        let Some(title) = store.title() else {
            return false;
        };
        if !title.is_translated {
            return false;
        }
        let original = title.original().map(str::to_string);
        store.toggle_title();
        original
    };

    if let Some(original) = original {
        for mount in session.host.title_mounts() {
            session.host.restore_title(mount, &original);
        }
    }
    emit_status(session, DisplayStatus::Original);
    true
}

fn apply_everywhere(session: &Session, text: &str) {
    for mount in session.host.title_mounts() {
        session.host.apply_title(mount, text);
    }
}

fn report_failure(session: &Session, error: &TranslationError) {
    if error.is_cancelled() {
        emit_status(session, DisplayStatus::Original);
        return;
    }

    warn!("title translation failed: {error}");
    emit_status(
        session,
        DisplayStatus::Error {
            code: error.code().to_string(),
        },
    );

    let events = session.events.clone();
    session.scheduler.schedule_after(
        TITLE_ERROR_KEY,
        session.config.error_indicator_delay(),
        Box::new(move || {
            events.emit(OverlayEvent::TitleChanged {
                status: DisplayStatus::Original,
            });
        }),
    );
}

fn emit_status(session: &Session, status: DisplayStatus) {
    session.events.emit(OverlayEvent::TitleChanged { status });
}
