//! The session handle.
//!
//! `Session` is a thin facade carrying a session ID and the monitor's
//! request sender; every method is one request and one awaited reply.
//! Handle methods never return errors: a missing key, a type mismatch,
//! or a monitor that has gone away all read as absence.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::actor::SessionRequest;
use crate::value::SessionValue;

/// A handle on one session.
///
/// Cheap to clone; obtained from the request extensions on managed
/// requests (the handle doubles as an axum extractor) or from
/// [`SessionManager::get_session`](crate::manager::SessionManager::get_session).
#[derive(Clone)]
pub struct Session {
    tx: mpsc::Sender<SessionRequest>,
    sid: String,
}

impl Session {
    pub(crate) fn new(tx: mpsc::Sender<SessionRequest>, sid: String) -> Self {
        Self { tx, sid }
    }

    /// The session's ID. Empty after [`destroy`](Self::destroy).
    pub fn id(&self) -> &str {
        &self.sid
    }

    /// Number of keys currently in the session.
    pub async fn len(&self) -> usize {
        self.request(|reply| SessionRequest::Len {
            sid: self.sid.clone(),
            reply,
        })
        .await
        .unwrap_or(0)
    }

    /// Whether the session holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The value stored under `key`, if any.
    pub async fn get(&self, key: &str) -> Option<SessionValue> {
        self.request(|reply| SessionRequest::GetKey {
            sid: self.sid.clone(),
            key: key.to_owned(),
            reply,
        })
        .await
        .flatten()
    }

    /// The boolean under `key`, or `None` on absence or type mismatch.
    pub async fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).await.and_then(|v| v.as_bool())
    }

    /// The integer under `key`, or `None` on absence or type mismatch.
    pub async fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).await.and_then(|v| v.as_int())
    }

    /// The float under `key`, or `None` on absence or type mismatch.
    /// Stored integers widen to `f64`.
    pub async fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).await.and_then(|v| v.as_float())
    }

    /// The string under `key`, or `None` on absence or type mismatch.
    pub async fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .await
            .and_then(|v| v.as_str().map(ToOwned::to_owned))
    }

    /// The timestamp under `key`, or `None` on absence or type mismatch.
    pub async fn get_time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key).await.and_then(|v| v.as_time())
    }

    /// Add or update `key`. Returns the handle for chained updates.
    pub async fn set(&self, key: impl Into<String>, value: impl Into<SessionValue>) -> &Self {
        self.request(|reply| SessionRequest::SetKey {
            sid: self.sid.clone(),
            key: key.into(),
            value: value.into(),
            reply,
        })
        .await;
        self
    }

    /// Remove `key`. Returns the handle for chained updates.
    pub async fn delete(&self, key: &str) -> &Self {
        self.request(|reply| SessionRequest::DeleteKey {
            sid: self.sid.clone(),
            key: key.to_owned(),
            reply,
        })
        .await;
        self
    }

    /// Destroy the session: the table entry and the session file are
    /// removed, and the handle's ID is cleared. Repeating is a no-op.
    pub async fn destroy(&mut self) {
        self.request(|reply| SessionRequest::Destroy {
            sid: self.sid.clone(),
            reply,
        })
        .await;
        self.sid.clear();
    }

    /// Prime the monitor's table with this session.
    pub(crate) async fn load(&self) {
        self.request(|reply| SessionRequest::Load {
            sid: self.sid.clone(),
            reply,
        })
        .await;
    }

    /// Persist the session (or evict it when empty).
    pub(crate) async fn store(&self) {
        self.request(|reply| SessionRequest::Store {
            sid: self.sid.clone(),
            reply,
        })
        .await;
    }

    /// Rotate: move the session's data under a fresh ID and adopt it.
    pub(crate) async fn change_id(&mut self) {
        let sid = (!self.sid.is_empty()).then(|| self.sid.clone());
        if let Some(fresh) = self
            .request(|reply| SessionRequest::Change { sid, reply })
            .await
        {
            self.sid = fresh;
        }
    }

    /// One monitor round-trip: send the request, await its reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionRequest,
    ) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(build(reply_tx)).await.is_err() {
            return None;
        }
        reply_rx.await.ok()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("sid", &self.sid).finish()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    /// Clone the handle the session middleware stored in the request
    /// extensions. Rejects with 500 when the middleware did not run.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::actor::SessionMonitor;
    use crate::config::SessionOptions;

    fn session(dir: &TempDir, sid: &str) -> Session {
        let options = Arc::new(SessionOptions::new());
        let (tx, _task) = SessionMonitor::spawn(dir.path().to_path_buf(), options);
        Session::new(tx, sid.to_owned())
    }

    #[tokio::test]
    async fn set_and_typed_getters() {
        let dir = TempDir::new().unwrap();
        let s = session(&dir, "s1");

        let stamp = Utc::now();
        s.set("flag", true)
            .await
            .set("count", 42i64)
            .await
            .set("ratio", 0.5f64)
            .await
            .set("name", "alice")
            .await
            .set("seen", stamp)
            .await;

        assert_eq!(s.get_bool("flag").await, Some(true));
        assert_eq!(s.get_int("count").await, Some(42));
        assert_eq!(s.get_float("ratio").await, Some(0.5));
        assert_eq!(s.get_string("name").await, Some("alice".to_owned()));
        assert_eq!(s.get_time("seen").await, Some(stamp));
        assert_eq!(s.len().await, 5);
    }

    #[tokio::test]
    async fn type_mismatch_reads_as_absence() {
        let dir = TempDir::new().unwrap();
        let s = session(&dir, "s1");

        s.set("name", "alice").await;
        assert_eq!(s.get_int("name").await, None);
        assert_eq!(s.get_bool("name").await, None);
        assert_eq!(s.get_time("name").await, None);
        assert_eq!(s.get("missing").await, None);
    }

    #[tokio::test]
    async fn ints_widen_to_float() {
        let dir = TempDir::new().unwrap();
        let s = session(&dir, "s1");

        s.set("count", 42i64).await;
        assert_eq!(s.get_float("count").await, Some(42.0));
    }

    #[tokio::test]
    async fn delete_removes_a_key() {
        let dir = TempDir::new().unwrap();
        let s = session(&dir, "s1");

        s.set("a", 1i64).await.set("b", 2i64).await;
        s.delete("a").await;
        assert_eq!(s.get_int("a").await, None);
        assert_eq!(s.len().await, 1);
    }

    #[tokio::test]
    async fn destroy_clears_the_id() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, "s1");

        s.set("a", 1i64).await;
        s.destroy().await;
        assert_eq!(s.id(), "");

        // Idempotent.
        s.destroy().await;
        assert_eq!(s.id(), "");
    }

    #[tokio::test]
    async fn change_id_adopts_the_fresh_sid() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, "s1");

        s.set("a", 1i64).await;
        s.change_id().await;
        assert_ne!(s.id(), "s1");
        assert_eq!(s.id().len(), 32);
        assert_eq!(s.get_int("a").await, Some(1));
    }

    #[tokio::test]
    async fn dead_monitor_reads_as_absence() {
        let dir = TempDir::new().unwrap();
        let options = Arc::new(SessionOptions::new());
        let (tx, task) = SessionMonitor::spawn(dir.path().to_path_buf(), options);
        let s = Session::new(tx.clone(), "s1".to_owned());

        drop(tx);
        task.abort();
        let _ = task.await;

        assert_eq!(s.get_int("x").await, None);
        assert_eq!(s.len().await, 0);
    }
}
