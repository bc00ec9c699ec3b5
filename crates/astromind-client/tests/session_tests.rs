mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use astromind_client::{
    ApiError, FileSessionStore, MemorySessionStore, Session, SessionService, SessionStatus,
    SessionStore,
};
use common::{credentials, user, FakeBackend};

fn cached() -> Session {
    Session {
        token: "token-1".to_string(),
        user: user("cached@example.com"),
    }
}

#[tokio::test]
async fn test_verify_refreshes_user() {
    let store = Arc::new(MemorySessionStore::with_session(cached()));
    let service = SessionService::new(store.clone());
    let backend = FakeBackend::default();

    let status = service.verify(&backend).await;

    assert_eq!(status, SessionStatus::Active(user("fresh@example.com")));
    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.token, "token-1");
    assert_eq!(stored.user, user("fresh@example.com"));
}

#[tokio::test]
async fn test_verify_rejected_token_expires() {
    let store = Arc::new(MemorySessionStore::with_session(cached()));
    let service = SessionService::new(store.clone());
    let backend = FakeBackend::with_me_result(Err(ApiError::Unauthorized(401)));

    let status = service.verify(&backend).await;

    assert_eq!(status, SessionStatus::Expired { redirect: "/" });
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_verify_offline_keeps_cached_user() {
    let store = Arc::new(MemorySessionStore::with_session(cached()));
    let service = SessionService::new(store.clone());
    let backend = FakeBackend::with_me_result(Err(ApiError::Unreachable(
        "http://localhost:8000".to_string(),
    )));

    let status = service.verify(&backend).await;

    assert_eq!(status, SessionStatus::Offline(user("cached@example.com")));
    assert_eq!(store.load().unwrap(), Some(cached()));
}

#[tokio::test]
async fn test_verify_without_session_skips_backend() {
    let service = SessionService::new(Arc::new(MemorySessionStore::new()));
    let backend = FakeBackend::default();

    let status = service.verify(&backend).await;

    assert_eq!(status, SessionStatus::Expired { redirect: "/" });
    assert_eq!(backend.me_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_login_persists_session_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let service = SessionService::new(Arc::new(FileSessionStore::in_dir(dir.path())));
    let backend = FakeBackend::default();

    let logged_in = service.login(&backend, &credentials()).await.unwrap();
    assert_eq!(logged_in, user("a@example.com"));

    // A fresh service over the same directory sees the session
    let reopened = SessionService::new(Arc::new(FileSessionStore::in_dir(dir.path())));
    assert_eq!(reopened.token().as_deref(), Some("token-1"));

    reopened.clear_session();
    assert_eq!(service.get_session(), None);
}

#[tokio::test]
async fn test_failed_login_stores_nothing() {
    let store = Arc::new(MemorySessionStore::new());
    let service = SessionService::new(store.clone());
    let backend = FakeBackend::default();
    *backend.login_result.lock().unwrap() = Err(ApiError::from_status(
        400,
        r#"{"detail": "Грешен имейл или парола"}"#,
    ));

    let err = service.login(&backend, &credentials()).await.unwrap_err();
    assert_eq!(
        err.user_message(astromind_chart::Locale::Bg),
        "Грешен имейл или парола"
    );
    assert_eq!(store.load().unwrap(), None);
}
