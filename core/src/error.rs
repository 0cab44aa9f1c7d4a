use thiserror::Error;

/// Failure of a single translation attempt.
///
/// Every variant except [`TranslationError::Cancelled`] is recoverable at the
/// item level: a bulk run counts the item as skipped and keeps going.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranslationError {
    #[error("original content is unavailable for {subject}")]
    ContentNotFound { subject: String },
    #[error("translation request exceeded the {timeout_ms}ms deadline")]
    Timeout { timeout_ms: u64 },
    #[error("translation request failed: {message}")]
    Network { message: String },
    #[error(
        "translation service answered HTTP {status}: {}",
        .message.as_deref().unwrap_or("no details")
    )]
    Http {
        status: u16,
        message: Option<String>,
        code: Option<String>,
    },
    #[error("translation service returned an unusable payload: {0}")]
    MalformedResponse(String),
    #[error("translation request was cancelled")]
    Cancelled,
}

impl TranslationError {
    pub fn content_not_found(subject: impl Into<String>) -> Self {
        TranslationError::ContentNotFound {
            subject: subject.into(),
        }
    }

    /// Stable machine-readable code used in events and run logs.
    pub fn code(&self) -> &'static str {
        match self {
            TranslationError::ContentNotFound { .. } => "CONTENT_NOT_FOUND",
            TranslationError::Timeout { .. } => "TIMEOUT",
            TranslationError::Network { .. } => "NETWORK_ERROR",
            TranslationError::Http { .. } => "HTTP_ERROR",
            TranslationError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            TranslationError::Cancelled => "CANCELLED",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TranslationError::Cancelled)
    }
}

/// Rejections raised by the control surface before any work is started.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a bulk translation run is already active")]
    RunActive,
    #[error("unsupported target language: {0}")]
    UnsupportedLanguage(String),
    #[error("overlay controller has been torn down")]
    TornDown,
    #[error(transparent)]
    Translation(#[from] TranslationError),
}
