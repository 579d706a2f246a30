//! Per-request session orchestration.
//!
//! For managed requests (`GET` and `POST` on non-excluded paths) the
//! middleware loads the session named by the request, rotates its ID,
//! exposes the handle through the request extensions, rewrites local
//! anchors in the response body to carry the fresh ID, and stores the
//! session afterwards. Panics in the downstream handler are recovered:
//! they turn into a 500 and the store step still runs.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use tracing::warn;

use crate::handle::Session;
use crate::manager::SessionManager;
use crate::rewrite;

/// The session middleware.
///
/// Install with [`SessionManager::wrap`] or directly via
/// `axum::middleware::from_fn_with_state(manager, middleware::manage)`.
pub async fn manage(
    State(manager): State<SessionManager>,
    request: Request,
    next: Next,
) -> Response {
    let managed = request.method() == Method::GET || request.method() == Method::POST;
    if !managed || manager.options().is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let sid_name = manager.options().sid_name().to_owned();
    let (mut request, sid) = extract_sid(request, &sid_name).await;

    // Any placeholder works here: rotation replaces it before the
    // downstream handler can observe it.
    let sid = sid.unwrap_or_else(|| sid_name.clone());

    let mut session = manager.session(sid);
    session.load().await;
    session.change_id().await;

    request.extensions_mut().insert(session.clone());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    let response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => rewrite_response(response, &manager, &session).await,
        Err(panic) => {
            warn!(?peer, reason = panic_message(&panic), "caught handler panic");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    // Persist whatever the handler left behind, panic or not.
    session.store().await;

    response
}

/// Pull the SID out of the request's form values.
///
/// The query string wins; for urlencoded POST bodies the body is read
/// and reinstated. Empty values count as absent.
async fn extract_sid(request: Request, sid_name: &str) -> (Request, Option<String>) {
    if let Some(sid) = request
        .uri()
        .query()
        .and_then(|query| form_value(query.as_bytes(), sid_name))
    {
        return (request, Some(sid));
    }

    if request.method() == Method::POST && is_urlencoded_form(&request) {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .unwrap_or_default();
        let sid = form_value(&bytes, sid_name);
        let request = Request::from_parts(parts, Body::from(bytes));
        return (request, sid);
    }

    (request, None)
}

fn is_urlencoded_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

/// First non-empty value for `name` in an urlencoded byte string.
pub(crate) fn form_value(raw: &[u8], name: &str) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw)
        .ok()?
        .into_iter()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Append the session ID to eligible anchors in the response body.
///
/// The session length is queried once per response; an empty session
/// suppresses every rewrite and leaves the response untouched.
async fn rewrite_response(
    response: Response,
    manager: &SessionManager,
    session: &Session,
) -> Response {
    if session.len().await == 0 {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(%error, "failed to read response body for link rewriting");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let options = manager.options();
    match rewrite::append_sid(&bytes, options.sid_name(), session.id(), options.exclude()) {
        Cow::Borrowed(_) => Response::from_parts(parts, Body::from(bytes)),
        Cow::Owned(rewritten) => {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
            Response::from_parts(parts, Body::from(rewritten))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
