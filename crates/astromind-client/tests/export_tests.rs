mod common;

use std::sync::Arc;
use tokio::sync::Notify;

use astromind_chart::{Aspect, Locale, MonthlyResult};
use astromind_client::{
    ApiError, DocumentPayload, ExportError, ExportOutcome, MemorySessionStore, ReportExporter, ReportMetadata,
    ReportRequest, Session, SessionService, SessionStore,
};
use common::{chart, user, FakeBackend};

fn logged_in() -> (Arc<MemorySessionStore>, SessionService) {
    let store = Arc::new(MemorySessionStore::with_session(Session {
        token: "token-1".to_string(),
        user: user("a@example.com"),
    }));
    let service = SessionService::new(store.clone());
    (store, service)
}

fn request() -> ReportRequest {
    ReportRequest::new(
        ReportMetadata {
            user_name: "Иван".to_string(),
            birth_date: "1990-05-17".to_string(),
            birth_time: "14:30".to_string(),
            birth_city: "София".to_string(),
            report_type: "Астрологичен Анализ".to_string(),
        },
        chart(),
    )
    .with_aspects(vec![Aspect {
        planet1: "Sun".to_string(),
        planet2: "Moon".to_string(),
        aspect: "trine".to_string(),
        orb: Some(1.5),
    }])
    .with_monthly_results(vec![MonthlyResult {
        month: "Януари 2025".to_string(),
        text: "Добър месец".to_string(),
    }])
}

#[tokio::test]
async fn test_export_writes_docx() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let (_store, session) = logged_in();
    let exporter = ReportExporter::new(backend.clone(), session, dir.path(), Locale::Bg);

    let outcome = exporter.export(&request()).await.unwrap();

    let expected = dir.path().join("Astrology_Report.docx");
    assert_eq!(outcome, ExportOutcome::Saved(expected.clone()));
    assert_eq!(std::fs::read(&expected).unwrap(), b"PK docx");
    assert!(!exporter.is_generating());

    let payload = backend.last_payload.lock().unwrap().clone().unwrap();
    assert_eq!(payload.user_name, "Иван");
    assert_eq!(payload.birth_city, "София");
    assert_eq!(payload.natal_aspects.len(), 1);
    assert_eq!(payload.monthly_results[0].month, "Януари 2025");
    assert_eq!(backend.last_token.lock().unwrap().as_deref(), Some("token-1"));
}

#[tokio::test]
async fn test_static_interpretation_becomes_single_entry() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let (_store, session) = logged_in();
    let exporter = ReportExporter::new(backend.clone(), session, dir.path(), Locale::Bg);

    let request = request()
        .with_monthly_results(Vec::new())
        .with_static_interpretation("Общ анализ")
        .with_file_name("Моят_доклад.pdf");
    let outcome = exporter.export(&request).await.unwrap();
    assert_eq!(
        outcome,
        ExportOutcome::Saved(dir.path().join("Моят_доклад.docx"))
    );

    let payload = backend.last_payload.lock().unwrap().clone().unwrap();
    assert_eq!(
        payload.monthly_results,
        vec![MonthlyResult {
            month: "Анализ".to_string(),
            text: "Общ анализ".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_blank_metadata_gets_localized_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let (_store, session) = logged_in();
    let exporter = ReportExporter::new(backend.clone(), session, dir.path(), Locale::Bg);

    let mut request = request();
    request.metadata.user_name = "  ".to_string();
    request.metadata.report_type = String::new();
    exporter.export(&request).await.unwrap();

    let payload = backend.last_payload.lock().unwrap().clone().unwrap();
    assert_eq!(payload.user_name, "Неизвестен");
    assert_eq!(payload.report_type, "Астрологичен Анализ");

    request.metadata.report_type = "Синастрия".to_string();
    let payload = DocumentPayload::build(&request, Locale::En);
    assert_eq!(payload.user_name, "Unknown");
    assert_eq!(payload.report_type, "Синастрия");
}

#[tokio::test]
async fn test_second_export_while_busy_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(FakeBackend::gated(gate.clone()));
    let (_store, session) = logged_in();
    let exporter = ReportExporter::new(backend.clone(), session, dir.path(), Locale::Bg);
    let request = request();

    let (first, second, _) = tokio::join!(exporter.export(&request), exporter.export(&request), async {
        tokio::task::yield_now().await;
        assert!(exporter.is_generating());
        gate.notify_one();
    });

    assert!(matches!(first.unwrap(), ExportOutcome::Saved(_)));
    assert_eq!(second.unwrap(), ExportOutcome::Busy);
    assert_eq!(backend.docx_calls(), 1);
    assert!(!exporter.is_generating());
}

#[tokio::test]
async fn test_unauthorized_clears_session_and_redirects() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::with_docx_result(Err(ApiError::Unauthorized(401))));
    let (store, session) = logged_in();
    let exporter = ReportExporter::new(backend, session, dir.path(), Locale::Bg);

    let outcome = exporter.export(&request()).await.unwrap();

    assert_eq!(outcome, ExportOutcome::SessionExpired { redirect: "/" });
    assert_eq!(store.load().unwrap(), None);
    assert!(!dir.path().join("Astrology_Report.docx").exists());
    assert!(!exporter.is_generating());
}

#[tokio::test]
async fn test_forbidden_is_treated_as_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::with_docx_result(Err(ApiError::from_status(403, ""))));
    let (store, session) = logged_in();
    let exporter = ReportExporter::new(backend, session, dir.path(), Locale::Bg);

    let outcome = exporter.export(&request()).await.unwrap();
    assert!(matches!(outcome, ExportOutcome::SessionExpired { .. }));
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_backend_error_keeps_session() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::with_docx_result(Err(ApiError::from_status(
        500,
        r#"{"detail": "Неочаквана грешка: 500: шаблонът липсва"}"#,
    ))));
    let (store, session) = logged_in();
    let exporter = ReportExporter::new(backend, session, dir.path(), Locale::Bg);

    let err = exporter.export(&request()).await.unwrap_err();

    assert!(matches!(err, ExportError::Backend(_)));
    assert_eq!(
        err.user_message(Locale::Bg),
        "Грешка при генериране на DOCX: шаблонът липсва"
    );
    assert!(store.load().unwrap().is_some());
    assert!(!exporter.is_generating());
}

#[tokio::test]
async fn test_export_without_session_sends_no_token() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let session = SessionService::new(Arc::new(MemorySessionStore::new()));
    let exporter = ReportExporter::new(backend.clone(), session, dir.path(), Locale::Bg);

    exporter.export(&request()).await.unwrap();
    assert_eq!(*backend.last_token.lock().unwrap(), None);
}
