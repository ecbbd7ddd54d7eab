//! The sync pass: pushes every dirty note to the remote, one at a time.
//!
//! Invariants the orchestrator enforces:
//! - at most one pass is in flight per orchestrator, later requests no-op
//! - notes are pushed most recently modified first
//! - each success is persisted immediately, so a crash mid-pass never
//!   forgets confirmed work
//! - one note's failure never blocks the others, except an expired
//!   credential which invalidates the whole pass

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

use crate::{ConnectivityMonitor, Note, NoteStore, RemoteSync, SyncReport};

pub struct SyncOrchestrator<R: RemoteSync> {
    store: Arc<NoteStore>,
    remote: R,
    connectivity: Arc<ConnectivityMonitor>,
    in_flight: AtomicBool,

    /// Id of the note whose push is currently in flight.
    syncing_note: Mutex<Option<String>>,
}

/// Clears the in-flight flag when the pass ends, even on early return.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<R: RemoteSync> SyncOrchestrator<R> {
    pub fn new(store: Arc<NoteStore>, remote: R, connectivity: Arc<ConnectivityMonitor>) -> Self {
        Self {
            store,
            remote,
            connectivity,
            in_flight: AtomicBool::new(false),
            syncing_note: Mutex::new(None),
        }
    }

    /// The remote client this orchestrator pushes through.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Whether a pass is currently running.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// The id of the note whose push is in flight right now, if any.
    pub fn syncing_note_id(&self) -> Option<String> {
        self.syncing_note.lock().ok().and_then(|slot| slot.clone())
    }

    /// Runs one sync pass. Offline, or with a pass already in flight, this
    /// is a cheap no-op reported via `SyncReport::ran`. No failure escapes:
    /// push and persistence errors are absorbed into the report.
    pub async fn sync_pass(&self) -> SyncReport {
        if !self.connectivity.is_online() {
            debug!("Skipping sync pass: offline");
            return SyncReport::skipped();
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Skipping sync pass: another pass is in flight");
            return SyncReport::skipped();
        }
        let _guard = FlightGuard(&self.in_flight);

        let dirty = match self.store.dirty_notes() {
            Ok(dirty) => dirty,
            Err(e) => {
                error!("Sync pass could not read the note store: {}", e);
                return SyncReport::skipped();
            }
        };
        let mut report = SyncReport {
            attempted: dirty.len(),
            ran: true,
            ..SyncReport::default()
        };

        if dirty.is_empty() {
            debug!("Sync pass found nothing dirty");
            return report;
        }
        info!("Sync pass starting: {} dirty note(s)", dirty.len());

        for mut note in dirty {
            let note_id = note.id.clone();
            self.set_syncing(Some(note_id.clone()));

            match self.remote.push(&note).await {
                Ok(remote_id) => {
                    note.mark_synced(remote_id);
                    // persist each acknowledgment before touching the next
                    // note, so an interrupted pass never re-pushes work the
                    // remote already confirmed
                    self.persist(note, &mut report);
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("Push of note {} failed: {}", note_id, e);
                    let global = e.is_global();
                    report.failed += 1;
                    report.failures.push((note_id, e.to_string()));
                    note.record_sync_error(e.to_string());
                    self.persist(note, &mut report);

                    if global {
                        // the credential is bad for every remaining note too
                        report.auth_expired = true;
                        break;
                    }
                }
            }
        }
        self.set_syncing(None);

        info!(
            "Sync pass finished: {} succeeded, {} failed{}",
            report.succeeded,
            report.failed,
            if report.auth_expired {
                ", aborted on expired credentials"
            } else {
                ""
            }
        );
        report
    }

    /// Writes one push outcome through the store. A persistence failure is
    /// logged and counted but never aborts the pass; the cache still holds
    /// the outcome, so the remote is not re-pushed within this process.
    fn persist(&self, note: Note, report: &mut SyncReport) {
        let note_id = note.id.clone();
        if let Err(e) = self.store.upsert(note) {
            error!("Could not persist sync outcome for {}: {}", note_id, e);
            report
                .failures
                .push((note_id, format!("local persistence failed: {}", e)));
        }
    }

    fn set_syncing(&self, note_id: Option<String>) {
        if let Ok(mut slot) = self.syncing_note.lock() {
            *slot = note_id;
        }
    }
}
