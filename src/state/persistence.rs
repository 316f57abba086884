//! Debounced writer owning the state file.
//!
//! A single task receives persistence requests, so writes never overlap: a
//! request that arrives during a write is simply handled after it.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, sleep_until},
};
use tracing::{debug, warn};

use crate::{
    dao::{models::PersistedState, state_store::StateStore},
    state::karaoke::{InstanceIdentity, KaraokeSession, now_millis},
};

/// Quiet period after the last mutation before the state file is rewritten.
pub const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

enum PersistRequest {
    Schedule,
    Flush(oneshot::Sender<()>),
}

/// Cheap handle used to talk to the writer task.
#[derive(Clone)]
pub struct PersistenceHandle {
    requests: mpsc::UnboundedSender<PersistRequest>,
}

impl PersistenceHandle {
    /// Start the writer task. It saves whatever `view` holds at write time.
    pub fn spawn(
        store: Arc<dyn StateStore>,
        view: watch::Receiver<Arc<KaraokeSession>>,
        identity: InstanceIdentity,
        debounce: Duration,
    ) -> Self {
        let (requests, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(receiver, store, view, identity, debounce));
        Self { requests }
    }

    /// Request a write after the debounce window; later requests push it back.
    pub fn schedule(&self) {
        if self.requests.send(PersistRequest::Schedule).is_err() {
            warn!("state writer stopped; persist request dropped");
        }
    }

    /// Cancel the pending timer and write now. Resolves once the write finished.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.requests.send(PersistRequest::Flush(done)).is_err() {
            warn!("state writer stopped; flush skipped");
            return;
        }
        let _ = wait.await;
    }
}

async fn run_writer(
    mut requests: mpsc::UnboundedReceiver<PersistRequest>,
    store: Arc<dyn StateStore>,
    view: watch::Receiver<Arc<KaraokeSession>>,
    identity: InstanceIdentity,
    debounce: Duration,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let request = match deadline {
            Some(at) => tokio::select! {
                request = requests.recv() => request,
                _ = sleep_until(at) => {
                    deadline = None;
                    write_snapshot(store.as_ref(), &view, &identity).await;
                    continue;
                }
            },
            None => requests.recv().await,
        };

        match request {
            Some(PersistRequest::Schedule) => {
                deadline = Some(Instant::now() + debounce);
            }
            Some(PersistRequest::Flush(done)) => {
                deadline = None;
                write_snapshot(store.as_ref(), &view, &identity).await;
                let _ = done.send(());
            }
            None => {
                if deadline.is_some() {
                    write_snapshot(store.as_ref(), &view, &identity).await;
                }
                debug!("state writer stopped");
                break;
            }
        }
    }
}

async fn write_snapshot(
    store: &dyn StateStore,
    view: &watch::Receiver<Arc<KaraokeSession>>,
    identity: &InstanceIdentity,
) {
    let session = view.borrow().clone();
    let snapshot = PersistedState::capture(&session, identity, now_millis());
    match store.save(snapshot).await {
        Ok(()) => debug!(queued = session.queue.len(), "state saved"),
        Err(err) => warn!(error = %err, "failed to save state"),
    }
}
