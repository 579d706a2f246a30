//! The session monitor actor.
//!
//! A single long-running task owns the in-memory session table and
//! serializes every mutation via message passing (no locks). Loads from
//! disk happen inline in the actor; writes and file removals are
//! dispatched as fire-and-forget background tasks so the actor stays
//! responsive. A periodic timer sweeps expired session files.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::SessionOptions;
use crate::record::{self, SessionData};
use crate::sid;
use crate::value::SessionValue;

/// Channel capacity for monitor requests. Senders block when full,
/// giving implicit backpressure.
const CHANNEL_CAPACITY: usize = 32;

// ============================================================================
// Request Protocol
// ============================================================================

/// Requests handled by the session monitor.
///
/// Every variant carries a one-shot reply channel and produces exactly
/// one reply.
pub enum SessionRequest {
    /// Move the session's data under a freshly generated SID; without an
    /// existing SID, create an empty session under a fresh one. The old
    /// SID's file is removed asynchronously.
    Change {
        sid: Option<String>,
        reply: oneshot::Sender<String>,
    },
    /// Remove one key from the session, if loaded.
    DeleteKey {
        sid: String,
        key: String,
        reply: oneshot::Sender<()>,
    },
    /// Drop the session from the table and remove its file.
    Destroy {
        sid: String,
        reply: oneshot::Sender<()>,
    },
    /// Look up one key, loading the session from disk on a table miss.
    GetKey {
        sid: String,
        key: String,
        reply: oneshot::Sender<Option<SessionValue>>,
    },
    /// Ensure the session is present in the table, loading on a miss.
    Load {
        sid: String,
        reply: oneshot::Sender<()>,
    },
    /// Number of keys in the session; 0 when not loaded.
    Len {
        sid: String,
        reply: oneshot::Sender<usize>,
    },
    /// Assign one key, loading the session from disk on a table miss.
    SetKey {
        sid: String,
        key: String,
        value: SessionValue,
        reply: oneshot::Sender<()>,
    },
    /// Persist the session to disk; an empty session is evicted from the
    /// table instead to bound resident memory.
    Store {
        sid: String,
        reply: oneshot::Sender<()>,
    },
    /// Stop the monitor task.
    Terminate { reply: oneshot::Sender<()> },
}

// ============================================================================
// Session Monitor
// ============================================================================

/// The actor owning the session table.
pub(crate) struct SessionMonitor {
    dir: PathBuf,
    options: Arc<SessionOptions>,
    table: HashMap<String, SessionData>,
    request_rx: mpsc::Receiver<SessionRequest>,
    // Weak so the garbage collector does not keep the channel alive;
    // the monitor still exits when every handle is dropped.
    gc_tx: mpsc::WeakSender<SessionRequest>,
}

impl SessionMonitor {
    /// Spawn the monitor task for `dir`.
    ///
    /// Returns the request sender and the task handle.
    pub(crate) fn spawn(
        dir: PathBuf,
        options: Arc<SessionOptions>,
    ) -> (mpsc::Sender<SessionRequest>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let monitor = Self {
            dir,
            options,
            table: HashMap::new(),
            request_rx: rx,
            gc_tx: tx.downgrade(),
        };
        let task = tokio::spawn(monitor.run());
        (tx, task)
    }

    /// Main loop: requests interleaved with the garbage-collection timer.
    ///
    /// The first timer tick fires immediately, sweeping files left over
    /// from a previous run.
    async fn run(mut self) {
        debug!(dir = %self.dir.display(), "session monitor started");

        let period = Duration::from_secs(self.options.ttl() * 2 + 1);
        let mut gc_timer = tokio::time::interval(period);

        loop {
            tokio::select! {
                request = self.request_rx.recv() => match request {
                    Some(SessionRequest::Terminate { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
                _ = gc_timer.tick() => self.spawn_sweep(),
            }
        }

        debug!("session monitor stopped");
    }

    async fn handle_request(&mut self, request: SessionRequest) {
        match request {
            SessionRequest::Change { sid, reply } => {
                let fresh = sid::generate();
                match sid.as_ref().and_then(|old| self.table.remove(old)) {
                    Some(data) => {
                        self.table.insert(fresh.clone(), data);
                    }
                    None => {
                        self.table.insert(fresh.clone(), SessionData::new());
                    }
                }
                if let Some(old) = sid {
                    let dir = self.dir.clone();
                    tokio::spawn(async move { record::remove(&dir, &old).await });
                }
                let _ = reply.send(fresh);
            }

            SessionRequest::DeleteKey { sid, key, reply } => {
                if let Some(data) = self.table.get_mut(&sid) {
                    data.remove(&key);
                }
                let _ = reply.send(());
            }

            SessionRequest::Destroy { sid, reply } => {
                self.table.remove(&sid);
                let dir = self.dir.clone();
                tokio::spawn(async move { record::remove(&dir, &sid).await });
                let _ = reply.send(());
            }

            SessionRequest::GetKey { sid, key, reply } => {
                let data = self.entry(&sid).await;
                let _ = reply.send(data.get(&key).cloned());
            }

            SessionRequest::Load { sid, reply } => {
                self.entry(&sid).await;
                let _ = reply.send(());
            }

            SessionRequest::Len { sid, reply } => {
                let _ = reply.send(self.table.get(&sid).map_or(0, |data| data.len()));
            }

            SessionRequest::SetKey {
                sid,
                key,
                value,
                reply,
            } => {
                self.entry(&sid).await.insert(key, value);
                let _ = reply.send(());
            }

            SessionRequest::Store { sid, reply } => {
                if let Some(data) = self.table.get(&sid) {
                    if data.is_empty() {
                        // Free unused memory; the next access reloads
                        // from disk.
                        self.table.remove(&sid);
                    } else {
                        let dir = self.dir.clone();
                        let ttl = self.options.ttl() as i64;
                        let data = data.clone();
                        tokio::spawn(async move {
                            if let Err(error) = record::store(&dir, &sid, &data, ttl).await {
                                debug!(%sid, %error, "session write failed");
                            }
                        });
                    }
                }
                let _ = reply.send(());
            }

            // Handled in the select loop.
            SessionRequest::Terminate { reply } => {
                let _ = reply.send(());
            }
        }
    }

    /// Table entry for `sid`, loading it from disk on a miss.
    async fn entry(&mut self, sid: &str) -> &mut SessionData {
        let loaded = if self.table.contains_key(sid) {
            None
        } else {
            Some(record::load(&self.dir, sid).await)
        };
        let slot = self.table.entry(sid.to_owned());
        match loaded {
            Some(data) => slot.or_insert(data),
            None => slot.or_default(),
        }
    }

    fn spawn_sweep(&self) {
        let dir = self.dir.clone();
        let cutoff = SystemTime::now() - Duration::from_secs(self.options.ttl());
        let tx = self.gc_tx.clone();
        tokio::spawn(sweep_expired(dir, cutoff, tx));
    }
}

// ============================================================================
// Garbage Collection
// ============================================================================

/// Destroy every session whose file was last modified before `cutoff`.
///
/// Runs off-actor; removals are routed back through the request channel
/// so table and file go away atomically with respect to other monitor
/// work.
pub(crate) async fn sweep_expired(
    dir: PathBuf,
    cutoff: SystemTime,
    tx: mpsc::WeakSender<SessionRequest>,
) {
    let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
        return;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(OsStr::to_str) != Some(record::FILE_EXTENSION) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if modified >= cutoff {
            continue;
        }
        let Some(name) = path.file_stem().and_then(OsStr::to_str) else {
            continue;
        };

        let Some(tx) = tx.upgrade() else {
            return;
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        let destroy = SessionRequest::Destroy {
            sid: name.to_owned(),
            reply: reply_tx,
        };
        if tx.send(destroy).await.is_err() {
            return;
        }
        let _ = reply_rx.await;
    }
}
