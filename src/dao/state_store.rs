//! Backends for the persisted karaoke session.

use std::path::PathBuf;

use futures::{FutureExt, future::BoxFuture};

use crate::dao::{
    models::PersistedState,
    storage::{StorageResult, read_json, write_json_atomic},
};

/// Abstraction over where the session snapshot lives.
pub trait StateStore: Send + Sync {
    /// Read the last snapshot, `None` when nothing was ever written.
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<PersistedState>>>;
    /// Replace the stored snapshot.
    fn save(&self, state: PersistedState) -> BoxFuture<'static, StorageResult<()>>;
}

/// Snapshot stored as a JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<PersistedState>>> {
        let path = self.path.clone();
        async move { read_json(&path).await }.boxed()
    }

    fn save(&self, state: PersistedState) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        async move { write_json_atomic(&path, &state).await }.boxed()
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory store used by the serializer and persistence tests.

    use std::sync::{Arc, Mutex};

    use super::*;

    /// Records every save so tests can count disk writes.
    #[derive(Default, Clone)]
    pub struct MemoryStore {
        initial: Arc<Mutex<Option<PersistedState>>>,
        saved: Arc<Mutex<Vec<PersistedState>>>,
    }

    impl MemoryStore {
        pub fn with_initial(state: PersistedState) -> Self {
            let store = Self::default();
            *store.initial.lock().unwrap() = Some(state);
            store
        }

        pub fn save_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }

        pub fn last_saved(&self) -> Option<PersistedState> {
            self.saved.lock().unwrap().last().cloned()
        }
    }

    impl StateStore for MemoryStore {
        fn load(&self) -> BoxFuture<'static, StorageResult<Option<PersistedState>>> {
            let initial = self.initial.lock().unwrap().clone();
            async move { Ok(initial) }.boxed()
        }

        fn save(&self, state: PersistedState) -> BoxFuture<'static, StorageResult<()>> {
            self.saved.lock().unwrap().push(state);
            async { Ok(()) }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("app_state").join("karaoke-state.json"));

        assert!(store.load().await.unwrap().is_none());

        let state = PersistedState {
            code_queue: vec!["000001".into(), "000002".into()],
            last_update: 99,
            instance_id: "1-abcdef".into(),
            ..PersistedState::default()
        };
        store.save(state.clone()).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(state));
    }
}
