#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use astromind_chart::{ChartResult, PlanetPosition};
use astromind_client::{
    ApiError, AuthResponse, Credentials, DocumentPayload, EventStream, InterpretRequest,
    InterpretResponse, Registration, ReportBackend, StreamEvent, User,
};

/// Scripted backend that counts every call
pub struct FakeBackend {
    pub docx_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub docx_result: Mutex<Result<Vec<u8>, ApiError>>,
    pub me_result: Mutex<Result<User, ApiError>>,
    pub login_result: Mutex<Result<AuthResponse, ApiError>>,
    pub stream_result: Mutex<Result<Vec<Result<StreamEvent, ApiError>>, ApiError>>,
    pub last_payload: Mutex<Option<DocumentPayload>>,
    pub last_token: Mutex<Option<String>>,
    /// When set, `generate_docx` waits for a permit before answering
    pub docx_gate: Option<Arc<Notify>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            docx_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            docx_result: Mutex::new(Ok(b"PK docx".to_vec())),
            me_result: Mutex::new(Ok(user("fresh@example.com"))),
            login_result: Mutex::new(Ok(AuthResponse {
                access_token: "token-1".to_string(),
                user: user("a@example.com"),
            })),
            stream_result: Mutex::new(Ok(Vec::new())),
            last_payload: Mutex::new(None),
            last_token: Mutex::new(None),
            docx_gate: None,
        }
    }
}

impl FakeBackend {
    pub fn with_docx_result(result: Result<Vec<u8>, ApiError>) -> Self {
        let backend = Self::default();
        *backend.docx_result.lock().unwrap() = result;
        backend
    }

    pub fn with_me_result(result: Result<User, ApiError>) -> Self {
        let backend = Self::default();
        *backend.me_result.lock().unwrap() = result;
        backend
    }

    pub fn with_events(events: Vec<Result<StreamEvent, ApiError>>) -> Self {
        let backend = Self::default();
        *backend.stream_result.lock().unwrap() = Ok(events);
        backend
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            docx_gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn docx_calls(&self) -> usize {
        self.docx_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportBackend for FakeBackend {
    async fn interpret(&self, _request: &InterpretRequest) -> Result<InterpretResponse, ApiError> {
        Ok(InterpretResponse {
            natal_chart: Some(chart()),
            interpretation: Some("Тълкуване".to_string()),
            ..InterpretResponse::default()
        })
    }

    async fn interpret_stream(&self, _request: &InterpretRequest) -> Result<EventStream, ApiError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let events = self.stream_result.lock().unwrap().clone()?;
        Ok(Box::pin(futures::stream::iter(events)))
    }

    async fn generate_docx(
        &self,
        payload: &DocumentPayload,
        token: Option<&str>,
    ) -> Result<Vec<u8>, ApiError> {
        self.docx_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock().unwrap() = Some(payload.clone());
        *self.last_token.lock().unwrap() = token.map(str::to_string);
        if let Some(gate) = &self.docx_gate {
            gate.notified().await;
        }
        self.docx_result.lock().unwrap().clone()
    }

    async fn login(&self, _credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.login_result.lock().unwrap().clone()
    }

    async fn register(&self, _registration: &Registration) -> Result<(), ApiError> {
        Ok(())
    }

    async fn me(&self, _token: &str) -> Result<User, ApiError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.me_result.lock().unwrap().clone()
    }
}

pub fn user(email: &str) -> User {
    User {
        email: Some(email.to_string()),
        full_name: Some("Иван Петров".to_string()),
        ..User::default()
    }
}

pub fn chart() -> ChartResult {
    let mut chart = ChartResult::default();
    let mut planets = std::collections::BTreeMap::new();
    planets.insert("Sun".to_string(), PlanetPosition::at(56.3));
    chart.planets = Some(planets);
    chart
}

pub fn credentials() -> Credentials {
    Credentials {
        email: "a@example.com".to_string(),
        password: "secret".to_string(),
    }
}
