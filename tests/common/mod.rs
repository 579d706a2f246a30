//! Common test utilities.

use axum::Router;
use axum::body::Body;
use axum::http::Response;
use axum::routing::get;
use http_body_util::BodyExt;

use sessum::{Session, SessionManager};

/// Build a session-wrapped app with the routes the tests drive.
pub fn session_app(manager: &SessionManager) -> Router {
    let router = Router::new()
        .route("/set", get(set_value).post(set_value))
        .route("/get", get(report_value).post(report_value))
        .route("/links", get(links))
        .route("/links-empty", get(links_empty))
        .route("/destroy", get(destroy))
        .route("/panic", get(blow_up))
        .route("/static/app.css", get(report_bypass).put(report_bypass));
    manager.wrap(router)
}

/// Store a value and hand back one local anchor; the rewriter will tag
/// it with the rotated session ID.
async fn set_value(session: Session) -> String {
    session.set("x", 42i64).await;
    r#"<a href="page1.html">x</a>"#.to_string()
}

/// Report the session's contents without touching them.
async fn report_value(session: Session) -> String {
    format!(
        "x={:?};len={}",
        session.get_int("x").await,
        session.len().await
    )
}

/// A non-empty session rendering the three-anchor rewrite fixture.
async fn links(session: Session) -> String {
    session.set("seen", true).await;
    link_fixture()
}

/// The same fixture with an untouched (empty) session.
async fn links_empty() -> String {
    link_fixture()
}

pub fn link_fixture() -> String {
    concat!(
        r#"<a href="page1.html">x</a>"#,
        r#"<a href="http://ext/">y</a>"#,
        r#"<a href="p2.html?k=v">z</a>"#,
    )
    .to_string()
}

/// Destroy the session twice; the second call must be a no-op.
async fn destroy(mut session: Session) -> String {
    session.set("gone", true).await;
    session.destroy().await;
    session.destroy().await;
    format!("id={:?}", session.id())
}

/// Store a value, then die.
async fn blow_up(session: Session) -> String {
    session.set("p", 1i64).await;
    panic!("handler exploded");
}

/// On excluded paths the middleware must not have installed a handle.
async fn report_bypass(request: axum::extract::Request) -> String {
    if request.extensions().get::<Session>().is_none() {
        "bypassed".to_string()
    } else {
        "managed".to_string()
    }
}

/// Collect a response body into a string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Pull the first rewritten session ID out of a response body.
pub fn sid_from(body: &str) -> Option<String> {
    let start = body.find("SID=")? + 4;
    let sid: String = body[start..].chars().take(32).collect();
    (sid.len() == 32).then_some(sid)
}
