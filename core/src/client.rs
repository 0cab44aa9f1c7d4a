use crate::cancel::CancelToken;
use crate::config::{ConfigError, OverlayConfig};
use crate::error::TranslationError;
use crate::model::ContentFormat;
use log::debug;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const SOURCE_LANGUAGE_AUTO: &str = "auto";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub content: String,
    pub source_language: String,
    pub target_language: String,
    pub format: ContentFormat,
}

impl TranslationRequest {
    /// Builds a request with automatic source detection. Blank content is
    /// rejected before anything goes out.
    pub fn new(
        content: impl Into<String>,
        target_language: &str,
        format: ContentFormat,
    ) -> Result<Self, TranslationError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(TranslationError::content_not_found("request"));
        }
        Ok(Self {
            content,
            source_language: SOURCE_LANGUAGE_AUTO.to_string(),
            target_language: target_language.to_string(),
            format,
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResponse {
    pub translated_content: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub quality: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

pub type TranslateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TranslationResponse, TranslationError>> + Send + 'a>>;

/// Boundary to whatever performs the actual translation. The engine only
/// ever holds one of these behind an `Arc<dyn Translate>`.
pub trait Translate: Send + Sync {
    fn name(&self) -> &'static str;

    /// Performs one request. Implementations must resolve with
    /// [`TranslationError::Cancelled`] once `cancel` fires.
    fn translate<'a>(
        &'a self,
        request: &'a TranslationRequest,
        cancel: &'a CancelToken,
    ) -> TranslateFuture<'a>;
}

/// HTTP client for the translation service.
#[derive(Debug, Clone)]
pub struct TranslationClient {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl TranslationClient {
    pub fn new(config: &OverlayConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Self::with_http(http, config)
    }

    pub fn with_http(http: Client, config: &OverlayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            http,
            endpoint: config.endpoint_url()?,
            api_key: config.api_key().map(str::to_string),
            timeout: config.timeout(),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `request`, racing it against the deadline and `cancel`.
    pub async fn send(
        &self,
        request: &TranslationRequest,
        cancel: &CancelToken,
    ) -> Result<TranslationResponse, TranslationError> {
        if cancel.is_cancelled() {
            return Err(TranslationError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("translation request to {} cancelled in flight", self.endpoint);
                Err(TranslationError::Cancelled)
            }
            outcome = tokio::time::timeout(self.timeout, self.execute(request)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(self.timeout_error()),
            },
        }
    }

    async fn execute(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, TranslationError> {
        let mut builder = self.http.post(self.endpoint.clone()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| self.transport_error(error))?;

        if !status.is_success() {
            return Err(http_error(status, &body));
        }

        parse_success(&body)
    }

    fn timeout_error(&self) -> TranslationError {
        TranslationError::Timeout {
            timeout_ms: self.timeout.as_millis().min(u64::MAX as u128) as u64,
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> TranslationError {
        if error.is_timeout() {
            return self.timeout_error();
        }
        TranslationError::Network {
            message: error.to_string(),
        }
    }
}

impl Translate for TranslationClient {
    fn name(&self) -> &'static str {
        "http"
    }

    fn translate<'a>(
        &'a self,
        request: &'a TranslationRequest,
        cancel: &'a CancelToken,
    ) -> TranslateFuture<'a> {
        Box::pin(self.send(request, cancel))
    }
}

fn http_error(status: StatusCode, body: &str) -> TranslationError {
    let (message, code) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error: Some(error) }) => {
            let code = error.code.map(|value| match value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            });
            (error.message, code)
        }
        _ => {
            let trimmed = body.trim();
            let message = if trimmed.is_empty() {
                status.canonical_reason().map(str::to_string)
            } else {
                Some(trimmed.chars().take(200).collect())
            };
            (message, None)
        }
    };

    TranslationError::Http {
        status: status.as_u16(),
        message,
        code,
    }
}

fn parse_success(body: &str) -> Result<TranslationResponse, TranslationError> {
    let response: TranslationResponse = serde_json::from_str(body)
        .map_err(|error| TranslationError::MalformedResponse(error.to_string()))?;
    if response.translated_content.trim().is_empty() {
        return Err(TranslationError::MalformedResponse(
            "translatedContent is empty".into(),
        ));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_rejected_before_sending() {
        let error = TranslationRequest::new("   ", "ko", ContentFormat::Text).unwrap_err();
        assert_eq!(error.code(), "CONTENT_NOT_FOUND");
    }

    #[test]
    fn request_serializes_with_auto_source() {
        let request = TranslationRequest::new("<p>Hi</p>", "ko", ContentFormat::Html).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["sourceLanguage"], "auto");
        assert_eq!(json["targetLanguage"], "ko");
        assert_eq!(json["format"], "html");
        assert_eq!(json["content"], "<p>Hi</p>");
    }

    #[test]
    fn http_error_reads_structured_body() {
        let error = http_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"kind":"quota","message":"slow down","code":429}}"#,
        );
        assert_eq!(
            error,
            TranslationError::Http {
                status: 429,
                message: Some("slow down".into()),
                code: Some("429".into()),
            }
        );
    }

    #[test]
    fn http_error_falls_back_to_reason_phrase() {
        let error = http_error(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(
            error,
            TranslationError::Http {
                status: 500,
                message: Some("Internal Server Error".into()),
                code: None,
            }
        );
    }

    #[test]
    fn empty_translation_is_malformed() {
        assert!(matches!(
            parse_success(r#"{"translatedContent":"  "}"#),
            Err(TranslationError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_success("not json"),
            Err(TranslationError::MalformedResponse(_))
        ));
        let ok = parse_success(r#"{"translatedContent":"안녕","provider":"mock"}"#).unwrap();
        assert_eq!(ok.provider.as_deref(), Some("mock"));
    }
}
