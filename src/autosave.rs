//! Debounced autosave: turns a stream of keystroke-level editor states into
//! a single durable write per pause in typing.
//!
//! The scheduler owns exactly one pending flush timer. Each new editor state
//! cancels the armed timer and arms a fresh one (cancel-and-replace), so only
//! the most recent state ever reaches the store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time;

use crate::{EditorState, Note, NoteStore, NsError, Result};

pub struct AutosaveScheduler {
    /// The note storage backend
    store: Arc<NoteStore>,

    /// Quiet interval between the last keystroke and the flush
    delay: Duration,

    /// Single-slot pending flush timer; reschedule = abort-then-arm
    pending: Mutex<Option<JoinHandle<()>>>,

    /// The note id the editor is bound to; set by the first flush that
    /// creates a note, shared with the session
    bound: Arc<Mutex<Option<String>>>,
}

impl AutosaveScheduler {
    pub fn new(store: Arc<NoteStore>, delay: Duration, bound: Arc<Mutex<Option<String>>>) -> Self {
        Self {
            store,
            delay,
            pending: Mutex::new(None),
            bound,
        }
    }

    /// Records a new editor state: cancels any pending flush and arms a new
    /// one after the quiet interval. Intermediate states are coalesced.
    pub fn schedule(&self, state: EditorState) {
        self.cancel();

        let store = Arc::clone(&self.store);
        let bound = Arc::clone(&self.bound);
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            match flush_editor_state(&store, &state) {
                Ok(Some(id)) => {
                    if let Ok(mut slot) = bound.lock() {
                        *slot = Some(id);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Autosave flush failed: {}", e),
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(handle);
        }
    }

    /// Flushes an editor state immediately, bypassing the quiet interval.
    /// Any pending timer is cancelled first so it cannot fire afterwards
    /// with stale state.
    pub fn flush_now(&self, state: EditorState) -> Result<Option<String>> {
        self.cancel();
        let flushed = flush_editor_state(&self.store, &state)?;
        if let Some(id) = &flushed {
            if let Ok(mut slot) = self.bound.lock() {
                *slot = Some(id.clone());
            }
        }
        Ok(flushed)
    }

    /// Drops the pending flush timer, if any. Called when the bound note
    /// switches and on teardown, so a stale flush can never leak one note's
    /// text into another.
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
                debug!("Cancelled pending autosave flush");
            }
        }
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The flush itself: idempotent, never creates empty notes.
///
/// Returns the id the editor should stay bound to, or None when there was
/// nothing to persist.
pub fn flush_editor_state(store: &NoteStore, state: &EditorState) -> Result<Option<String>> {
    if state.is_blank() {
        debug!("Skipping autosave flush of blank editor state");
        return Ok(None);
    }

    match &state.note_id {
        None => {
            let note = Note::new(
                state.title.clone(),
                state.content.clone(),
                state.tags.clone(),
                state.category.clone(),
            );
            let id = note.id.clone();
            store.upsert(note)?;
            debug!("Autosave created note {}", id);
            Ok(Some(id))
        }
        Some(id) => {
            let mut note = store.get(id)?.ok_or_else(|| NsError::NoteNotFound {
                id: id.clone(),
            })?;

            let changed = note.apply_edit(
                state.title.clone(),
                state.content.clone(),
                state.tags.clone(),
                state.category.clone(),
            );

            if changed {
                store.upsert(note)?;
                debug!("Autosave updated note {}", id);
            } else {
                debug!("Autosave flush for {} was a no-op", id);
            }
            Ok(Some(id.clone()))
        }
    }
}
