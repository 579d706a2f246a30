//! Session manager: directory bootstrap and monitor ownership.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use tokio::sync::mpsc;

use crate::actor::{SessionMonitor, SessionRequest};
use crate::config::SessionOptions;
use crate::error::SessionDirError;
use crate::handle::Session;
use crate::middleware;
use crate::sid;

/// Owner of the session monitor.
///
/// Construction prepares the session directory and starts the monitor
/// exactly once; clones share the running monitor's channel, so create
/// one manager per process and clone it into routers and tasks.
#[derive(Clone)]
pub struct SessionManager {
    tx: mpsc::Sender<SessionRequest>,
    options: Arc<SessionOptions>,
    dir: Arc<PathBuf>,
}

impl SessionManager {
    /// Bootstrap `dir` and spawn the session monitor.
    ///
    /// The directory is resolved to an absolute path and created when
    /// missing (mode `0775` on unix). A path that exists but is not a
    /// directory is fatal. Must be called within a tokio runtime.
    pub fn new(
        dir: impl AsRef<Path>,
        options: SessionOptions,
    ) -> Result<Self, SessionDirError> {
        let dir = prepare_session_dir(dir.as_ref())?;
        let options = Arc::new(options);
        let (tx, _task) = SessionMonitor::spawn(dir.clone(), Arc::clone(&options));

        Ok(Self {
            tx,
            options,
            dir: Arc::new(dir),
        })
    }

    /// The configuration captured at construction.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The resolved session directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Apply the session middleware to `router`.
    pub fn wrap(&self, router: Router) -> Router {
        router.layer(axum::middleware::from_fn_with_state(
            self.clone(),
            middleware::manage,
        ))
    }

    /// The session handle for `request`.
    ///
    /// The ID comes from the request's query value named by the
    /// configured SID name, else from the handle the middleware stored
    /// in the request extensions; without either, a fresh ID is minted.
    /// The session is loaded into the monitor's table before the handle
    /// is returned.
    pub async fn get_session<B>(&self, request: &axum::http::Request<B>) -> Session {
        let sid = request
            .uri()
            .query()
            .and_then(|query| middleware::form_value(query.as_bytes(), self.options.sid_name()))
            .or_else(|| {
                request
                    .extensions()
                    .get::<Session>()
                    .map(|session| session.id().to_owned())
                    .filter(|sid| !sid.is_empty())
            })
            .unwrap_or_else(sid::generate);

        let session = self.session(sid);
        session.load().await;
        session
    }

    /// A handle bound to `sid`, without touching the monitor.
    pub(crate) fn session(&self, sid: impl Into<String>) -> Session {
        Session::new(self.tx.clone(), sid.into())
    }

    /// Stop the monitor task. Further handle operations read as absence.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        if self
            .tx
            .send(SessionRequest::Terminate { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("dir", &self.dir)
            .field("options", &self.options)
            .finish()
    }
}

/// Resolve `path`, creating it when missing.
fn prepare_session_dir(path: &Path) -> Result<PathBuf, SessionDirError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(SessionDirError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            create_session_dir(path).map_err(|source| SessionDirError::io(path, source))?;
        }
        Err(source) => return Err(SessionDirError::io(path, source)),
    }

    path.canonicalize()
        .map_err(|source| SessionDirError::io(path, source))
}

fn create_session_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o775);
    }
    builder.create(path)
}
