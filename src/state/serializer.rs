//! `KaraokeState`: the operation serializer in front of the karaoke session.
//!
//! Every mutation is sent to one drain task that owns the session. The task
//! applies commands strictly in submission order, publishes an immutable copy
//! of the session after each one, and asks the writer for a debounced save once
//! it has drained its queue.

use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::{
    dao::{instance_lock::InstanceLock, models::PersistedState, state_store::StateStore},
    state::{
        commands::{Operation, Reply, apply},
        karaoke::{
            HistoryEntry, IdleMode, InstanceIdentity, KaraokeSession, Song, ViewMode, WindowSize,
            now_millis,
        },
        persistence::{PERSIST_DEBOUNCE, PersistenceHandle},
        state_machine::PlaybackState,
    },
};

/// A saved snapshot written by another instance this recently is not trusted.
pub const FOREIGN_STATE_WINDOW: Duration = Duration::from_secs(60);

struct Command {
    operation: Operation,
    reply: Reply,
}

/// Serialized access to the karaoke session plus its persistence and lock.
pub struct KaraokeState {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<Arc<KaraokeSession>>,
    identity: InstanceIdentity,
    persistence: PersistenceHandle,
    store: Arc<dyn StateStore>,
    lock: InstanceLock,
}

impl KaraokeState {
    /// Spawn the drain and writer tasks. Must be called inside a Tokio runtime.
    pub fn spawn(identity: InstanceIdentity, store: Arc<dyn StateStore>, lock: InstanceLock) -> Self {
        let (view_tx, view) = watch::channel(Arc::new(KaraokeSession::default()));
        let persistence =
            PersistenceHandle::spawn(store.clone(), view.clone(), identity.clone(), PERSIST_DEBOUNCE);
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(drain(receiver, view_tx, persistence.clone()));

        Self {
            commands,
            view,
            identity,
            persistence,
            store,
            lock,
        }
    }

    async fn submit<T: Default>(
        &self,
        operation: Operation,
        reply: fn(oneshot::Sender<T>) -> Reply,
    ) -> T {
        let name = operation.name();
        let (tx, rx) = oneshot::channel();
        let command = Command {
            operation,
            reply: reply(tx),
        };
        if self.commands.send(command).is_err() {
            warn!(operation = name, "operation serializer stopped; command dropped");
            return T::default();
        }
        rx.await.unwrap_or_else(|_| {
            warn!(operation = name, "command finished without a result");
            T::default()
        })
    }

    // Queue

    /// Append `code` to the queue unless it is empty or equals the tail.
    pub async fn queue_code(&self, code: impl Into<String>) {
        self.submit(Operation::AddToQueue(code.into()), Reply::Unit).await
    }

    /// Remove the first queued occurrence of `code`; no-op when absent.
    pub async fn remove_from_queue(&self, code: impl Into<String>) {
        self.submit(Operation::RemoveFromQueue(code.into()), Reply::Unit).await
    }

    /// Empty the queue.
    pub async fn clear_queue(&self) {
        self.submit(Operation::ClearQueue, Reply::Unit).await
    }

    /// Pop the head of the queue.
    pub async fn shift_next_code(&self) -> Option<String> {
        self.submit(Operation::ShiftQueue, Reply::Code).await
    }

    /// Pop the code played before the current song from the history.
    pub async fn take_previous_code(&self) -> Option<String> {
        self.submit(Operation::TakePreviousCode, Reply::Code).await
    }

    // Typed code

    /// Replace the typed code; invalid codes are ignored.
    pub async fn set_current_code(&self, code: impl Into<String>) {
        self.submit(Operation::SetCurrentCode(code.into()), Reply::Unit).await
    }

    /// Append one digit. Returns the resulting code, or `None` when the digit
    /// was rejected (not a digit, or the code is already full).
    pub async fn append_digit(&self, digit: char) -> Option<String> {
        self.submit(Operation::AppendDigit(digit), Reply::Code).await
    }

    /// Drop the last digit and return the resulting code.
    pub async fn delete_digit(&self) -> String {
        self.submit(Operation::DeleteDigit, Reply::Code)
            .await
            .unwrap_or_default()
    }

    // Playback

    /// Stop playback and show the idle screen. No-op when already idle.
    pub async fn enter_idle(&self) {
        self.submit(Operation::EnterIdle, Reply::Unit).await
    }

    /// Start playing `song` under `code` and record it in the history.
    pub async fn enter_karaoke(&self, code: impl Into<String>, song: Song) {
        let operation = Operation::EnterKaraoke {
            code: code.into(),
            song,
        };
        self.submit(operation, Reply::Unit).await
    }

    /// Clear the typed code, the queue and the current song.
    pub async fn reset(&self) {
        self.submit(Operation::Reset, Reply::Unit).await
    }

    /// Claim the karaoke display; `true` only if nobody held it.
    pub async fn acquire_viewer(&self) -> bool {
        self.submit(Operation::AcquireViewer, Reply::Flag).await
    }

    /// Give the karaoke display back.
    pub async fn release_viewer(&self) {
        self.submit(Operation::ReleaseViewer, Reply::Unit).await
    }

    // Configuration

    /// Set the idle background image.
    pub async fn set_idle_background_path(&self, path: impl Into<String>) {
        self.submit(Operation::SetIdleBackgroundPath(path.into()), Reply::Unit)
            .await
    }

    /// Switch between image and video backgrounds.
    pub async fn set_idle_mode(&self, mode: IdleMode) {
        self.submit(Operation::SetIdleMode(mode), Reply::Unit).await
    }

    /// Set the videos looped in video mode.
    pub async fn set_idle_video_files(&self, files: Vec<String>) {
        self.submit(Operation::SetIdleVideoFiles(files), Reply::Unit).await
    }

    /// Toggle idle music.
    pub async fn set_looping_music_enabled(&self, enabled: bool) {
        self.submit(Operation::SetLoopingMusicEnabled(enabled), Reply::Unit)
            .await
    }

    /// Set the idle music tracks.
    pub async fn set_looping_music_files(&self, files: Vec<String>) {
        self.submit(Operation::SetLoopingMusicFiles(files), Reply::Unit).await
    }

    /// Set the display font.
    pub async fn set_custom_font_path(&self, path: impl Into<String>) {
        self.submit(Operation::SetCustomFontPath(path.into()), Reply::Unit)
            .await
    }

    /// Toggle digit announcements on the display.
    pub async fn set_announce_keys(&self, enabled: bool) {
        self.submit(Operation::SetAnnounceKeys(enabled), Reply::Unit).await
    }

    /// Set the display window style.
    pub async fn set_view_mode(&self, mode: ViewMode) {
        self.submit(Operation::SetViewMode(mode), Reply::Unit).await
    }

    /// Set the windowed-mode size.
    pub async fn set_window_size(&self, size: WindowSize) {
        self.submit(Operation::SetWindowSize(size), Reply::Unit).await
    }

    /// Record the karaoke server port.
    pub async fn set_karaoke_port(&self, port: u16) {
        self.submit(Operation::SetKaraokePort(port), Reply::Unit).await
    }

    /// Record the remote server port.
    pub async fn set_remote_port(&self, port: u16) {
        self.submit(Operation::SetRemotePort(port), Reply::Unit).await
    }

    /// Set the folder scanned for songs.
    pub async fn set_search_path(&self, path: impl Into<String>) {
        self.submit(Operation::SetSearchPath(path.into()), Reply::Unit).await
    }

    // Read-only snapshot API. Every getter returns an owned copy.

    /// Immutable snapshot of the whole session.
    pub fn snapshot(&self) -> Arc<KaraokeSession> {
        self.view.borrow().clone()
    }

    /// Digits typed so far.
    pub fn current_code(&self) -> String {
        self.view.borrow().current_code.clone()
    }

    /// Queued codes in playback order.
    pub fn code_queue(&self) -> Vec<String> {
        self.view.borrow().queue.to_vec()
    }

    /// Played songs, oldest first.
    pub fn queue_history(&self) -> Vec<HistoryEntry> {
        self.view.borrow().history.to_vec()
    }

    /// Idle or karaoke.
    pub fn playback_state(&self) -> PlaybackState {
        self.view.borrow().playback.state()
    }

    /// Song on the display, if any.
    pub fn current_song(&self) -> Option<Song> {
        self.view.borrow().playback.current_song().cloned()
    }

    /// Idle background image.
    pub fn idle_background_path(&self) -> String {
        self.view.borrow().idle.background_path.clone()
    }

    /// Idle background kind.
    pub fn idle_mode(&self) -> IdleMode {
        self.view.borrow().idle.mode
    }

    /// Configured idle video files.
    pub fn idle_video_files(&self) -> Vec<String> {
        self.view.borrow().idle.video_files.clone()
    }

    /// Whether idle music is on.
    pub fn looping_music_enabled(&self) -> bool {
        self.view.borrow().idle.looping_music_enabled
    }

    /// Configured looping music files.
    pub fn looping_music_files(&self) -> Vec<String> {
        self.view.borrow().idle.looping_music_files.clone()
    }

    /// Configured custom font path.
    pub fn custom_font_path(&self) -> String {
        self.view.borrow().idle.custom_font_path.clone()
    }

    /// Whether typed digits are announced.
    pub fn announce_keys(&self) -> bool {
        self.view.borrow().idle.announce_keys
    }

    /// Configured view mode.
    pub fn view_mode(&self) -> ViewMode {
        self.view.borrow().presentation.view_mode
    }

    /// Configured window size.
    pub fn window_size(&self) -> WindowSize {
        self.view.borrow().presentation.window_size
    }

    /// Configured karaoke port.
    pub fn karaoke_port(&self) -> u16 {
        self.view.borrow().network.karaoke_port
    }

    /// Configured remote port.
    pub fn remote_port(&self) -> u16 {
        self.view.borrow().network.remote_port
    }

    /// Configured search path.
    pub fn search_path(&self) -> String {
        self.view.borrow().network.search_path.clone()
    }

    /// Whether a karaoke display is connected.
    pub fn viewer_lock_held(&self) -> bool {
        self.view.borrow().viewer_lock_held
    }

    /// Identifier of this process.
    pub fn instance_id(&self) -> &str {
        &self.identity.instance_id
    }

    /// Pairing signature served on `/sig`.
    pub fn signature(&self) -> &str {
        &self.identity.signature
    }

    // Lifecycle

    /// Try to take the single-instance lock.
    pub async fn check_single_instance(&self) -> bool {
        self.lock.acquire().await
    }

    /// Stop the lock heartbeat and delete the lock file.
    pub async fn release_lock(&self) {
        self.lock.release().await
    }

    /// Hydrate the session from the state file.
    ///
    /// Missing or unreadable files leave the defaults in place, as does a file
    /// written very recently by a different instance.
    pub async fn load_state(&self) {
        let persisted = match self.store.load().await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                info!("no saved state; starting with defaults");
                return;
            }
            Err(err) => {
                warn!(error = %err, "failed to load saved state; starting with defaults");
                return;
            }
        };

        if is_foreign_and_recent(&persisted, &self.identity.instance_id, now_millis()) {
            warn!(
                owner = %persisted.instance_id,
                "saved state belongs to another recently active instance; starting with defaults"
            );
            return;
        }

        let queued = persisted.code_queue.len();
        let history = persisted.queue_history.len();
        self.submit(Operation::Hydrate(Box::new(persisted)), Reply::Unit)
            .await;
        info!(queued, history, "restored saved state");
    }

    /// Write the state file now, bypassing the debounce.
    pub async fn force_save(&self) {
        self.persistence.flush().await
    }

    /// Flush the state and release the instance lock.
    pub async fn shutdown(&self) {
        self.force_save().await;
        self.release_lock().await;
        info!("karaoke state shut down");
    }
}

fn is_foreign_and_recent(persisted: &PersistedState, own_instance: &str, now: u64) -> bool {
    !persisted.instance_id.is_empty()
        && persisted.instance_id != own_instance
        && now.saturating_sub(persisted.last_update) < FOREIGN_STATE_WINDOW.as_millis() as u64
}

async fn drain(
    mut commands: mpsc::UnboundedReceiver<Command>,
    view: watch::Sender<Arc<KaraokeSession>>,
    persistence: PersistenceHandle,
) {
    let mut session = KaraokeSession::clone(&view.borrow());

    while let Some(command) = commands.recv().await {
        let mut next = Some(command);
        while let Some(Command { operation, reply }) = next.take() {
            let name = operation.name();
            let outcome = apply(&mut session, operation, now_millis());
            view.send_replace(Arc::new(session.clone()));
            reply.complete(name, outcome);

            tokio::task::yield_now().await;
            next = commands.try_recv().ok();
        }
        persistence.schedule();
    }

    debug!("operation serializer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::state_store::testing::MemoryStore;

    fn song(id: &str) -> Song {
        Song {
            id: id.into(),
            title: format!("Song {id}"),
            artist: "Artist".into(),
            path: format!("/songs/{id}.mp4"),
        }
    }

    fn state_with(store: MemoryStore, dir: &tempfile::TempDir) -> KaraokeState {
        let identity = InstanceIdentity::generate();
        let lock = InstanceLock::new(dir.path().join("karaoke.lock"), identity.instance_id.clone());
        KaraokeState::spawn(identity, Arc::new(store), lock)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn interleaved_callers_lose_nothing_and_keep_their_own_order() {
        const CALLERS: usize = 8;
        const PER_CALLER: usize = 25;

        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(state_with(MemoryStore::default(), &dir));

        let handles: Vec<_> = (0..CALLERS)
            .map(|caller| {
                let state = state.clone();
                tokio::spawn(async move {
                    for seq in 0..PER_CALLER {
                        let code = format!("{caller}{seq:05}");
                        state.queue_code(code.clone()).await;
                        // Completion means the command is already applied.
                        assert!(state.code_queue().contains(&code));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let queue = state.code_queue();
        assert_eq!(queue.len(), CALLERS * PER_CALLER);

        // Replaying the observed order on a fresh session gives the same state,
        // and each caller's codes appear in the order it submitted them.
        let mut replay = KaraokeSession::default();
        for code in &queue {
            apply(&mut replay, Operation::AddToQueue(code.clone()), 0);
        }
        assert_eq!(replay.queue.to_vec(), queue);
        for caller in 0..CALLERS {
            let prefix = caller.to_string();
            let own: Vec<_> = queue.iter().filter(|code| code.starts_with(&prefix)).cloned().collect();
            let expected: Vec<_> = (0..PER_CALLER).map(|seq| format!("{caller}{seq:05}")).collect();
            assert_eq!(own, expected);
        }
    }

    #[tokio::test]
    async fn history_is_capped_through_the_serializer() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(MemoryStore::default(), &dir);

        for i in 0..150 {
            let code = format!("{i:06}");
            state.enter_karaoke(code.clone(), song(&code)).await;
        }

        let history = state.queue_history();
        assert_eq!(history.len(), 100);
        assert_eq!(history.first().unwrap().code, "000050");
        assert_eq!(history.last().unwrap().code, "000149");
        assert_eq!(state.current_song().unwrap().id, "000149");
    }

    #[tokio::test]
    async fn queue_removal_and_clear_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(MemoryStore::default(), &dir);

        for code in ["000001", "000002", "000001", "000003"] {
            state.queue_code(code).await;
        }
        state.remove_from_queue("000001").await;
        assert_eq!(state.code_queue(), vec!["000002", "000001", "000003"]);

        state.remove_from_queue("000099").await;
        assert_eq!(state.code_queue().len(), 3);

        state.clear_queue().await;
        assert!(state.code_queue().is_empty());
    }

    #[tokio::test]
    async fn reset_clears_code_queue_and_playback_but_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(MemoryStore::default(), &dir);

        state.set_current_code("12").await;
        state.queue_code("000002").await;
        state.enter_karaoke("000001", song("000001")).await;
        state.set_search_path("/music").await;

        state.reset().await;

        assert!(state.current_code().is_empty());
        assert!(state.code_queue().is_empty());
        assert_eq!(state.playback_state(), PlaybackState::Idle);
        assert!(state.current_song().is_none());
        assert_eq!(state.queue_history().len(), 1);
        assert_eq!(state.search_path(), "/music");
    }

    #[tokio::test]
    async fn mutation_is_visible_once_awaited() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(MemoryStore::default(), &dir);

        state.enter_karaoke("000001", song("000001")).await;
        assert_eq!(state.playback_state(), PlaybackState::Karaoke);
        assert_eq!(state.current_song().unwrap().id, "000001");

        state.enter_idle().await;
        assert_eq!(state.playback_state(), PlaybackState::Idle);
        assert!(state.current_song().is_none());
    }

    #[tokio::test]
    async fn only_one_concurrent_viewer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(state_with(MemoryStore::default(), &dir));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { state.acquire_viewer().await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(state.viewer_lock_held());
    }

    #[tokio::test]
    async fn snapshot_is_not_affected_by_later_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(MemoryStore::default(), &dir);

        state.queue_code("000001").await;
        let before = state.code_queue();
        state.queue_code("000002").await;

        assert_eq!(before, vec!["000001"]);
        assert_eq!(state.code_queue(), vec!["000001", "000002"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_mutations_are_saved_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let state = state_with(store.clone(), &dir);

        for i in 0..10 {
            state.queue_code(format!("{i:06}")).await;
        }
        assert_eq!(store.save_count(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.last_saved().unwrap().code_queue.len(), 10);
    }

    #[tokio::test]
    async fn recent_foreign_state_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let persisted = PersistedState {
            code_queue: vec!["000007".into()],
            instance_id: "other-instance".into(),
            last_update: now_millis() - 10_000,
            ..PersistedState::default()
        };
        let state = state_with(MemoryStore::with_initial(persisted), &dir);

        state.load_state().await;
        assert!(state.code_queue().is_empty());
    }

    #[tokio::test]
    async fn old_foreign_state_is_restored_idle() {
        let dir = tempfile::tempdir().unwrap();
        let persisted = PersistedState {
            current_code: "12".into(),
            code_queue: vec!["000007".into(), "000008".into()],
            state: PlaybackState::Karaoke,
            current_song: Some(song("000006")),
            search_path: "/music".into(),
            instance_id: "other-instance".into(),
            last_update: now_millis() - 120_000,
            ..PersistedState::default()
        };
        let state = state_with(MemoryStore::with_initial(persisted), &dir);

        state.load_state().await;
        assert_eq!(state.code_queue(), vec!["000007", "000008"]);
        assert_eq!(state.search_path(), "/music");
        assert_eq!(state.playback_state(), PlaybackState::Idle);
        assert!(state.current_code().is_empty());
    }

    #[tokio::test]
    async fn shutdown_flushes_and_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let state = state_with(store.clone(), &dir);

        assert!(state.check_single_instance().await);
        state.queue_code("000005").await;
        state.shutdown().await;

        let saved = store.last_saved().unwrap();
        assert_eq!(saved.code_queue, vec!["000005"]);
        assert_eq!(saved.instance_id, state.instance_id());
        assert!(!dir.path().join("karaoke.lock").exists());
    }

    #[test]
    fn foreign_window_boundaries() {
        let persisted = PersistedState {
            instance_id: "other".into(),
            last_update: 100_000,
            ..PersistedState::default()
        };
        assert!(is_foreign_and_recent(&persisted, "me", 159_999));
        assert!(!is_foreign_and_recent(&persisted, "me", 160_000));
        assert!(!is_foreign_and_recent(&persisted, "other", 101_000));

        let legacy = PersistedState {
            last_update: 100_000,
            ..PersistedState::default()
        };
        assert!(!is_foreign_and_recent(&legacy, "me", 101_000));
    }
}
