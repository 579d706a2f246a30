//! Integration tests for session persistence across restarts.

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use tempfile::TempDir;
use tower::ServiceExt;

use sessum::{SessionManager, SessionOptions};

mod common;

use common::{body_string, session_app, sid_from};

fn manager_in(dir: &TempDir) -> SessionManager {
    let mut options = SessionOptions::new();
    options.set_ttl(60);
    SessionManager::new(dir.path(), options).unwrap()
}

#[tokio::test]
async fn test_restart_recovers_stored_session() {
    let dir = TempDir::new().unwrap();

    // First process lifetime: store a value under a rotated SID.
    let first = manager_in(&dir);
    let response = session_app(&first)
        .oneshot(Request::get("/set").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let sid = sid_from(&body_string(response).await).unwrap();

    // Let the fire-and-forget write land, then "restart".
    tokio::time::sleep(Duration::from_millis(150)).await;
    first.shutdown().await;

    let second = manager_in(&dir);
    let response = session_app(&second)
        .oneshot(
            Request::get(format!("/get?SID={sid}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "x=Some(42);len=1");
}

#[tokio::test]
async fn test_get_session_reads_middleware_state() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    let response = session_app(&manager)
        .oneshot(Request::get("/set").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let sid = sid_from(&body_string(response).await).unwrap();

    // The public helper resolves the same session from a bare request.
    let request = Request::get(format!("/?SID={sid}")).body(()).unwrap();
    let session = manager.get_session(&request).await;
    assert_eq!(session.id(), sid);
    assert_eq!(session.get_int("x").await, Some(42));
}

#[tokio::test]
async fn test_fresh_directory_starts_empty() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    let request = Request::get("/").body(()).unwrap();
    let session = manager.get_session(&request).await;
    assert_eq!(session.len().await, 0);
    assert_eq!(session.get("anything").await, None);
}
