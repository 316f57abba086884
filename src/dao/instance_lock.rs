//! Cooperative single-instance lock backed by a JSON lock file.
//!
//! The lock is best effort: a live owner rewrites the file every
//! [`HEARTBEAT_INTERVAL`], and a newcomer treats a file older than
//! [`STALE_LOCK_AGE`] as abandoned and takes it over.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    fs,
    sync::oneshot,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

use crate::{
    dao::{
        models::LockRecord,
        storage::{StorageResult, read_json, write_json_atomic},
    },
    state::karaoke::now_millis,
};

/// A lock whose heartbeat is older than this is considered abandoned.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(30);
/// How often a held lock is refreshed.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Lock file guard for one process instance.
pub struct InstanceLock {
    path: PathBuf,
    instance_id: String,
    heartbeat_interval: Duration,
    heartbeat: Mutex<Option<Heartbeat>>,
}

/// Running refresh task and the channel that stops it.
struct Heartbeat {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl InstanceLock {
    /// Lock guarding `path`, owned by `instance_id`. Nothing is written until [`acquire`](Self::acquire).
    pub fn new(path: impl Into<PathBuf>, instance_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            instance_id: instance_id.into(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat: Mutex::new(None),
        }
    }

    /// Override the heartbeat period.
    pub fn with_heartbeat_interval(mut self, period: Duration) -> Self {
        self.heartbeat_interval = period;
        self
    }

    /// Try to become the single running instance.
    ///
    /// Returns `false` when another instance refreshed the lock within
    /// [`STALE_LOCK_AGE`] or when the lock file cannot be written.
    pub async fn acquire(&self) -> bool {
        match read_json::<LockRecord>(&self.path).await {
            Ok(Some(record)) if record.instance_id == self.instance_id => {
                debug!("lock file already owned by this instance");
            }
            Ok(Some(record)) => {
                let age = now_millis().saturating_sub(record.timestamp);
                if age > STALE_LOCK_AGE.as_millis() as u64 {
                    warn!(
                        owner = %record.instance_id,
                        age_ms = age,
                        "stale instance lock detected; taking it over"
                    );
                    if let Err(err) = fs::remove_file(&self.path).await {
                        debug!(error = %err, "failed to remove stale lock file");
                    }
                } else {
                    error!(
                        owner = %record.instance_id,
                        pid = record.pid,
                        "another instance is already running"
                    );
                    return false;
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, path = %self.path.display(), "unreadable lock file; replacing it");
            }
        }

        if let Err(err) = write_record(&self.path, &self.instance_id).await {
            error!(error = %err, "failed to create lock file");
            return false;
        }

        info!(path = %self.path.display(), "single instance lock acquired");
        self.stop_heartbeat().await;
        self.start_heartbeat();
        true
    }

    /// Stop the heartbeat and delete the lock file. Safe to call repeatedly.
    ///
    /// Waits for an in-flight refresh to finish first, so the file cannot be
    /// rewritten after it is removed.
    pub async fn release(&self) {
        self.stop_heartbeat().await;

        match fs::remove_file(&self.path).await {
            Ok(()) => info!("instance lock released"),
            Err(err) if err.kind() == ErrorKind::NotFound => debug!("instance lock already gone"),
            Err(err) => warn!(error = %err, "failed to release instance lock"),
        }
    }

    /// Stop the refresh task and wait until it has exited.
    async fn stop_heartbeat(&self) {
        let heartbeat = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Heartbeat { stop, handle }) = heartbeat {
            let _ = stop.send(());
            if let Err(err) = handle.await {
                warn!(error = %err, "instance lock heartbeat task failed");
            }
        }
    }

    fn start_heartbeat(&self) {
        let path = self.path.clone();
        let instance_id = self.instance_id.clone();
        let period = self.heartbeat_interval;
        let (stop, mut stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the file was just written.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    // Fires on an explicit stop and when the sender is dropped.
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {}
                }
                if let Err(err) = write_record(&path, &instance_id).await {
                    warn!(error = %err, "failed to refresh instance lock");
                }
            }
            debug!("instance lock heartbeat stopped");
        });

        *self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Heartbeat { stop, handle });
    }
}

async fn write_record(path: &Path, instance_id: &str) -> StorageResult<()> {
    let record = LockRecord {
        instance_id: instance_id.to_owned(),
        timestamp: now_millis(),
        pid: std::process::id(),
    };
    write_json_atomic(path, &record).await
}
