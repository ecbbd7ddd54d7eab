//! The editing session: the single facade the UI layer talks to.
//!
//! A session owns the store, the autosave scheduler, the connectivity
//! monitor and the sync orchestrator, and wires them together: edits flow
//! through debounced autosave into the store, an explicit save can trigger
//! an immediate pass, and a reconnect automatically triggers one for
//! whatever went dirty while offline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{
    AuthStore, AutosaveScheduler, Config, ConnectivityMonitor, EditorState, Note, NoteStore,
    NsError, RemoteSync, Result, SyncOrchestrator, SyncReport, SyncState,
};

pub struct NoteSession<R: RemoteSync + Send + Sync + 'static> {
    store: Arc<NoteStore>,
    connectivity: Arc<ConnectivityMonitor>,
    orchestrator: Arc<SyncOrchestrator<R>>,
    autosave: AutosaveScheduler,
    auth: AuthStore,

    /// Whether an explicit save also kicks off a sync pass while online.
    sync_on_save: bool,

    /// The note id the editor is currently bound to; shared with the
    /// autosave scheduler, which fills it in when a flush creates a note.
    bound: Arc<Mutex<Option<String>>>,

    /// The most recent completed sync report, for the status surface.
    last_report: Arc<Mutex<Option<SyncReport>>>,

    reconnect_watcher: JoinHandle<()>,
}

impl<R: RemoteSync + Send + Sync + 'static> NoteSession<R> {
    pub fn new(config: &Config, store: Arc<NoteStore>, remote: R) -> Self {
        let connectivity = Arc::new(ConnectivityMonitor::new(true));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&store),
            remote,
            Arc::clone(&connectivity),
        ));
        let bound = Arc::new(Mutex::new(None));
        let autosave = AutosaveScheduler::new(
            Arc::clone(&store),
            Duration::from_millis(config.autosave_delay_ms),
            Arc::clone(&bound),
        );

        let last_report = Arc::new(Mutex::new(None));
        let reconnect_watcher = spawn_reconnect_watcher(
            Arc::clone(&connectivity),
            Arc::clone(&orchestrator),
            Arc::clone(&last_report),
        );

        Self {
            store,
            connectivity,
            orchestrator,
            autosave,
            auth: AuthStore::new(config),
            sync_on_save: config.sync_on_save,
            bound,
            last_report,
            reconnect_watcher,
        }
    }

    /// Every note, most recently modified first.
    pub fn notes(&self) -> Result<Vec<Note>> {
        self.store.all_sorted()
    }

    /// The notes still awaiting a confirmed push, most recent first.
    pub fn unsynced_notes(&self) -> Result<Vec<Note>> {
        self.store.dirty_notes()
    }

    /// The id of the note the editor is bound to.
    pub fn current_note_id(&self) -> Option<String> {
        self.bound.lock().ok().and_then(|slot| slot.clone())
    }

    /// Records an editor change; the write lands after the autosave delay.
    pub fn record_edit(&self, state: EditorState) {
        self.autosave.schedule(state);
    }

    /// Persists the given editor state immediately (explicit save). With
    /// `sync_on_save` configured and connectivity up, the save also kicks
    /// off a background sync pass for the freshly dirty note.
    pub fn flush_now(&self, state: EditorState) -> Result<Option<String>> {
        let flushed = self.autosave.flush_now(state)?;
        if flushed.is_some() && self.sync_on_save && self.is_online() {
            self.spawn_background_pass();
        }
        Ok(flushed)
    }

    /// Binds the editor to an existing note. Any pending autosave flush for
    /// the previous note is cancelled first so its text cannot land under
    /// the new binding.
    pub fn select_note(&self, note_id: &str) -> Result<Note> {
        self.autosave.cancel();
        let note = self.store.get(note_id)?.ok_or_else(|| NsError::NoteNotFound {
            id: note_id.to_string(),
        })?;

        if let Ok(mut slot) = self.bound.lock() {
            *slot = Some(note.id.clone());
        }
        Ok(note)
    }

    /// Unbinds the editor so the next non-blank flush creates a fresh note.
    pub fn new_note(&self) {
        self.autosave.cancel();
        if let Ok(mut slot) = self.bound.lock() {
            *slot = None;
        }
    }

    /// Deletes a note. Deleting the bound note also unbinds the editor and
    /// drops any pending flush that would resurrect it.
    pub fn delete_note(&self, note_id: &str) -> Result<()> {
        if self.current_note_id().as_deref() == Some(note_id) {
            self.new_note();
        }
        self.store.remove(note_id)
    }

    /// Runs a sync pass now and records its report.
    pub async fn sync_now(&self) -> SyncReport {
        let report = self.orchestrator.sync_pass().await;
        if report.ran {
            if let Ok(mut slot) = self.last_report.lock() {
                *slot = Some(report.clone());
            }
        }
        report
    }

    /// The note's sync state as the UI should render it: the persistent
    /// dirty/clean states from the note itself, overridden by the transient
    /// in-flight state while the orchestrator has this note's push running.
    pub fn sync_state_of(&self, note: &Note) -> SyncState {
        if self.orchestrator.syncing_note_id().as_deref() == Some(note.id.as_str()) {
            SyncState::Syncing
        } else {
            note.sync_state()
        }
    }

    /// The first failure of the most recent completed pass, if any.
    pub fn last_error(&self) -> Option<String> {
        let slot = self.last_report.lock().ok()?;
        let report = slot.as_ref()?;
        if report.auth_expired {
            return Some("Notion credentials expired".to_string());
        }
        report.failures.first().map(|(_, message)| message.clone())
    }

    /// Tears the session down to its logged-out state: pending flushes are
    /// dropped and the stored credentials discarded. Notes stay local.
    pub fn logout(&self) -> Result<()> {
        self.autosave.cancel();
        self.auth.clear()
    }

    /// Feeds a connectivity report into the session. An offline-to-online
    /// transition wakes the reconnect watcher, which runs a sync pass in
    /// the background.
    pub fn set_online(&self, online: bool) {
        self.connectivity.set_online(online);
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn is_syncing(&self) -> bool {
        self.orchestrator.is_syncing()
    }

    fn spawn_background_pass(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let last_report = Arc::clone(&self.last_report);
        tokio::spawn(async move {
            let report = orchestrator.sync_pass().await;
            if report.ran {
                if let Ok(mut slot) = last_report.lock() {
                    *slot = Some(report);
                }
            }
        });
    }
}

impl<R: RemoteSync + Send + Sync + 'static> Drop for NoteSession<R> {
    fn drop(&mut self) {
        self.reconnect_watcher.abort();
    }
}

/// Background task: every offline-to-online transition triggers one sync
/// pass, flushing the backlog accumulated while offline.
fn spawn_reconnect_watcher<R: RemoteSync + Send + Sync + 'static>(
    connectivity: Arc<ConnectivityMonitor>,
    orchestrator: Arc<SyncOrchestrator<R>>,
    last_report: Arc<Mutex<Option<SyncReport>>>,
) -> JoinHandle<()> {
    let mut rx = connectivity.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if *rx.borrow_and_update() {
                let report = orchestrator.sync_pass().await;
                if report.ran {
                    if let Ok(mut slot) = last_report.lock() {
                        *slot = Some(report);
                    }
                }
            }
        }
    })
}
