//! Backend API: typed requests, the `ReportBackend` trait and its HTTP
//! implementation.

use async_trait::async_trait;
use futures::Stream;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

use astromind_chart::{Aspect, ChartResult, Locale};
use astromind_config::ApiSettings;

use crate::export::DocumentPayload;
use crate::request::InterpretRequest;
use crate::stream::{decode_sse, StreamEvent};

lazy_static::lazy_static! {
    static ref ERROR_PREFIX: Regex =
        Regex::new(r"(?i)^(Неочаквана грешка:\s*)?\d+:\s*").expect("error prefix pattern is valid");
}

/// Remove a leading generic error-code prefix such as "Неочаквана грешка: 400: ".
pub fn strip_error_prefix(message: &str) -> String {
    ERROR_PREFIX.replace(message, "").trim().to_string()
}

/// Failures talking to the backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("backend unreachable at {0}")]
    Unreachable(String),
    #[error("backend returned {status}: {detail}")]
    Status { status: u16, detail: String },
    /// 401 or 403: the session is no longer valid
    #[error("not authorized ({0})")]
    Unauthorized(u16),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success response. `body` is the raw response text.
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 401 || status == 403 {
            return ApiError::Unauthorized(status);
        }
        ApiError::Status {
            status,
            detail: extract_detail(body).unwrap_or_default(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// Localized message for the user, with generic code prefixes removed.
    pub fn user_message(&self, locale: Locale) -> String {
        let message = match (locale, self) {
            (Locale::Bg, ApiError::Timeout) => {
                "Времето за изчакване изтече. Моля опитайте отново.".to_string()
            }
            (Locale::En, ApiError::Timeout) => "The request timed out. Please try again.".to_string(),
            (Locale::Bg, ApiError::Unreachable(url)) => format!(
                "Грешка при свързване със сървъра. Проверете дали backend сървърът работи на {}",
                url
            ),
            (Locale::En, ApiError::Unreachable(url)) => {
                format!("Could not connect to the server. Check that the backend is running at {}", url)
            }
            (_, ApiError::Status { status, detail }) if detail.trim().is_empty() => match locale {
                Locale::Bg => format!("Грешка: {}", status),
                Locale::En => format!("Error: {}", status),
            },
            (_, ApiError::Status { detail, .. }) => detail.clone(),
            (Locale::Bg, ApiError::Unauthorized(_)) => "Сесията е изтекла. Моля влезте отново.".to_string(),
            (Locale::En, ApiError::Unauthorized(_)) => "Your session has expired. Please log in again.".to_string(),
            (_, ApiError::Stream(message)) => message.clone(),
            (Locale::Bg, ApiError::Decode(_)) => "Невалиден отговор от сървъра".to_string(),
            (Locale::En, ApiError::Decode(_)) => "Invalid response from the server".to_string(),
        };
        strip_error_prefix(&message)
    }
}

/// FastAPI-style `{"detail": ...}` or `{"message": ...}` bodies, else the raw text.
fn extract_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => ["detail", "message"]
            .iter()
            .find_map(|key| match value.get(*key) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .or_else(|| Some(body.to_string())),
        Err(_) => Some(body.to_string()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Account record returned by `/login` and `/me`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: User,
}

/// Result of a single-shot `/interpret` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpretResponse {
    #[serde(default)]
    pub natal_chart: Option<ChartResult>,
    #[serde(default)]
    pub natal_aspects: Option<Vec<Aspect>>,
    #[serde(default)]
    pub partner_chart: Option<ChartResult>,
    #[serde(default)]
    pub partner_natal_aspects: Option<Vec<Aspect>>,
    #[serde(default)]
    pub transit_chart: Option<ChartResult>,
    #[serde(default)]
    pub interpretation: Option<String>,
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ApiError>> + Send>>;

/// Operations the AstroMind backend offers
#[async_trait]
pub trait ReportBackend: Send + Sync {
    async fn interpret(&self, request: &InterpretRequest) -> Result<InterpretResponse, ApiError>;

    /// Multi-month forecast as an ordered event stream.
    async fn interpret_stream(&self, request: &InterpretRequest) -> Result<EventStream, ApiError>;

    /// Build a DOCX report and return its bytes.
    async fn generate_docx(
        &self,
        payload: &DocumentPayload,
        token: Option<&str>,
    ) -> Result<Vec<u8>, ApiError>;

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    async fn register(&self, registration: &Registration) -> Result<(), ApiError>;

    async fn me(&self, token: &str) -> Result<User, ApiError>;
}

/// `ReportBackend` over HTTP
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    interpret_timeout: Duration,
    session_timeout: Duration,
    document_timeout: Duration,
}

impl HttpBackend {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.session_timeout)
            .build()
            .map_err(|e| ApiError::Unreachable(format!("{}: {e}", settings.base_url)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            interpret_timeout: settings.interpret_timeout,
            session_timeout: settings.session_timeout,
            document_timeout: settings.document_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            log::debug!("transport error: {err}");
            ApiError::Unreachable(self.base_url.clone())
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        log::error!("backend error status={} body={}", status.as_u16(), body);
        Err(ApiError::from_status(status.as_u16(), &body))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ReportBackend for HttpBackend {
    async fn interpret(&self, request: &InterpretRequest) -> Result<InterpretResponse, ApiError> {
        log::info!("POST /interpret report_type={}", request.report_type);
        let response = self
            .send(
                self.client
                    .post(self.url("/interpret"))
                    .timeout(self.interpret_timeout)
                    .json(request),
            )
            .await?;
        self.read_json(response).await
    }

    async fn interpret_stream(&self, request: &InterpretRequest) -> Result<EventStream, ApiError> {
        log::info!("POST /interpret-stream report_type={}", request.report_type);
        // No overall timeout: the stream stays open for the whole forecast
        let response = self
            .send(
                self.client
                    .post(self.url("/interpret-stream"))
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .json(request),
            )
            .await?;
        Ok(Box::pin(decode_sse(Box::pin(response.bytes_stream()))))
    }

    async fn generate_docx(
        &self,
        payload: &DocumentPayload,
        token: Option<&str>,
    ) -> Result<Vec<u8>, ApiError> {
        log::info!(
            "POST /generate-docx monthly_results={}",
            payload.monthly_results.len()
        );
        let mut request = self
            .client
            .post(self.url("/generate-docx"))
            .timeout(self.document_timeout)
            .json(payload);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let response = self
            .send(
                self.client
                    .post(self.url("/login"))
                    .timeout(self.interpret_timeout)
                    .json(credentials),
            )
            .await?;
        self.read_json(response).await
    }

    async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        self.send(
            self.client
                .post(self.url("/register"))
                .timeout(self.interpret_timeout)
                .json(registration),
        )
        .await?;
        Ok(())
    }

    async fn me(&self, token: &str) -> Result<User, ApiError> {
        let response = self
            .send(
                self.client
                    .get(self.url("/me"))
                    .timeout(self.session_timeout)
                    .bearer_auth(token),
            )
            .await?;
        self.read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_error_prefix() {
        assert_eq!(strip_error_prefix("Неочаквана грешка: 400: Bad date"), "Bad date");
        assert_eq!(strip_error_prefix("500:   boom "), "boom");
        assert_eq!(strip_error_prefix("Invalid date 400: x"), "Invalid date 400: x");
    }

    #[test]
    fn test_from_status_classifies_auth_failures() {
        assert_eq!(ApiError::from_status(401, ""), ApiError::Unauthorized(401));
        assert_eq!(ApiError::from_status(403, "{}"), ApiError::Unauthorized(403));
        assert!(!ApiError::from_status(500, "").is_unauthorized());
    }

    #[test]
    fn test_detail_extraction() {
        let err = ApiError::from_status(422, r#"{"detail": "Неочаквана грешка: 422: Невалидна дата"}"#);
        assert_eq!(err.user_message(Locale::Bg), "Невалидна дата");

        let err = ApiError::from_status(400, r#"{"message": "bad"}"#);
        assert_eq!(err.user_message(Locale::En), "bad");

        let err = ApiError::from_status(502, "upstream down");
        assert_eq!(err.user_message(Locale::En), "upstream down");

        let err = ApiError::from_status(500, "");
        assert_eq!(err.user_message(Locale::Bg), "Грешка: 500");
    }

    #[test]
    fn test_transport_messages() {
        assert!(ApiError::Timeout
            .user_message(Locale::Bg)
            .starts_with("Времето за изчакване"));
        let msg = ApiError::Unreachable("http://localhost:8000".to_string()).user_message(Locale::En);
        assert!(msg.ends_with("http://localhost:8000"));
    }

    #[test]
    fn test_interpret_response_tolerates_missing_fields() {
        let response: InterpretResponse =
            serde_json::from_str(r#"{"interpretation": "text", "natal_chart": {"planets": {}}}"#).unwrap();
        assert_eq!(response.interpretation.as_deref(), Some("text"));
        assert!(response.natal_chart.unwrap().houses.is_none());
        assert!(response.transit_chart.is_none());
    }

    #[test]
    fn test_user_keeps_unknown_fields() {
        let user: User = serde_json::from_str(r#"{"email": "a@b.c", "coins": 12}"#).unwrap();
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
        assert_eq!(user.extra["coins"], 12);
    }
}
