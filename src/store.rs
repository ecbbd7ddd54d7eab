//! Durable persistence for the note collection.
//!
//! The whole collection lives in a single versioned JSON record
//! (`<namespace>_v<version>.json`) so that an incompatible schema change can
//! bump the version and detect old data without crashing. Writes are atomic
//! whole-collection replacements; reads tolerate absent or corrupt data.

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::{Config, Note, NsError, Result};

/// Manages the storage and retrieval of notes.
pub struct NoteStore {
    /// Application configuration
    config: Config,

    /// In-memory cache of notes, indexed by note ID
    notes_cache: Arc<Mutex<HashMap<String, Note>>>,

    /// Fails the next record write once, to exercise the recovery path
    #[cfg(test)]
    fail_next_write: std::sync::atomic::AtomicBool,
}

impl NoteStore {
    /// Creates a store over the configured data directory and loads any
    /// existing collection into the cache. Corrupt or unreadable data yields
    /// an empty collection plus a logged warning, never a startup failure.
    pub fn open(config: Config) -> Result<Self> {
        config.ensure_data_dir()?;

        let store = Self {
            config,
            notes_cache: Arc::new(Mutex::new(HashMap::new())),
            #[cfg(test)]
            fail_next_write: std::sync::atomic::AtomicBool::new(false),
        };

        let notes = store.read_record();
        let count = notes.len();
        {
            let mut cache = store.lock_cache()?;
            cache.extend(notes.into_iter().map(|n| (n.id.clone(), n)));
        }
        info!("Loaded {} notes from {}", count, store.record_path().display());

        Ok(store)
    }

    /// Path of the current versioned store record.
    pub fn record_path(&self) -> PathBuf {
        self.config.data_dir.join(format!(
            "{}_v{}.json",
            self.config.store_namespace, self.config.store_version
        ))
    }

    /// Returns every stored note, most recently modified first.
    pub fn all_sorted(&self) -> Result<Vec<Note>> {
        let mut notes: Vec<Note> = {
            let cache = self.lock_cache()?;
            cache.values().cloned().collect()
        };
        sort_recent_first(&mut notes);
        Ok(notes)
    }

    /// Returns all dirty notes, most recently modified first, so repeated
    /// passes make visible forward progress under partial connectivity.
    pub fn dirty_notes(&self) -> Result<Vec<Note>> {
        let mut notes: Vec<Note> = {
            let cache = self.lock_cache()?;
            cache
                .values()
                .filter(|n| n.sync_state().is_dirty())
                .cloned()
                .collect()
        };
        sort_recent_first(&mut notes);
        Ok(notes)
    }

    /// Retrieves a note by its ID.
    pub fn get(&self, note_id: &str) -> Result<Option<Note>> {
        let cache = self.lock_cache()?;
        Ok(cache.get(note_id).cloned())
    }

    /// Inserts or replaces one note and persists the full collection.
    pub fn upsert(&self, note: Note) -> Result<()> {
        {
            let mut cache = self.lock_cache()?;
            cache.insert(note.id.clone(), note);
        }
        self.persist()
    }

    /// Removes a note and persists the full collection.
    pub fn remove(&self, note_id: &str) -> Result<()> {
        let removed = {
            let mut cache = self.lock_cache()?;
            cache.remove(note_id)
        };

        if removed.is_none() {
            return Err(NsError::NoteNotFound {
                id: note_id.to_string(),
            });
        }
        self.persist()
    }

    /// Atomic replace of the entire collection: cache and durable record.
    pub fn save_all(&self, notes: &[Note]) -> Result<()> {
        {
            let mut cache = self.lock_cache()?;
            cache.clear();
            cache.extend(notes.iter().map(|n| (n.id.clone(), n.clone())));
        }
        self.persist()
    }

    /// Writes the cached collection to the versioned record.
    ///
    /// A first write failure is treated as possible storage exhaustion:
    /// stale versioned records are evicted and the write retried once. If
    /// the retry also fails the mutation is dropped from disk (the cache
    /// keeps it) and surfaced as a non-fatal `StorageWriteFailure`.
    pub fn persist(&self) -> Result<()> {
        let notes: Vec<Note> = {
            let cache = self.lock_cache()?;
            let mut notes: Vec<Note> = cache.values().cloned().collect();
            sort_recent_first(&mut notes);
            notes
        };

        match self.write_record(&notes) {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(
                    "Write to {} failed ({}); evicting stale store versions and retrying",
                    self.record_path().display(),
                    first
                );
                let evicted = self.evict_stale_versions();
                debug!("Evicted {} stale store record(s)", evicted);

                self.write_record(&notes).map_err(|second| {
                    NsError::StorageWriteFailure {
                        path: self.record_path(),
                        message: second.to_string(),
                    }
                })
            }
        }
    }

    /// Deletes records of older store versions in the same namespace,
    /// leaving the current record and anything newer (a downgraded binary
    /// must not destroy newer-schema data). Returns the number of files
    /// removed.
    pub fn evict_stale_versions(&self) -> usize {
        let prefix = format!("{}_v", self.config.store_namespace);
        let mut removed = 0;

        let entries = match fs::read_dir(&self.config.data_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to scan {} for stale records: {}", self.config.data_dir.display(), e);
                return 0;
            }
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().to_string();
            let version = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|v| v.parse::<u32>().ok());

            // unparseable suffixes are left alone
            if version.is_some_and(|v| v < self.config.store_version) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => {
                        debug!("Evicted stale store record {}", name);
                        removed += 1;
                    }
                    Err(e) => warn!("Failed to evict {}: {}", name, e),
                }
            }
        }

        removed
    }

    fn write_record(&self, notes: &[Note]) -> std::result::Result<(), std::io::Error> {
        #[cfg(test)]
        if self
            .fail_next_write
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(std::io::Error::other("injected write failure"));
        }

        let dir = &self.config.data_dir;
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_string_pretty(notes)
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        // Temp file in the same directory so persist() is an atomic rename
        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(json.as_bytes())?;
        temp_file.flush()?;
        temp_file.persist(self.record_path()).map_err(|e| e.error)?;

        debug!("Persisted {} notes to {}", notes.len(), self.record_path().display());
        Ok(())
    }

    /// Reads the versioned record, tolerating absence and corruption.
    fn read_record(&self) -> Vec<Note> {
        let path = self.record_path();
        if !path.exists() {
            debug!("No store record at {}", path.display());
            return Vec::new();
        }

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read note store {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(notes) => notes,
            Err(e) => {
                warn!(
                    "Note store {} is malformed, starting with an empty collection: {}",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Note>>> {
        self.notes_cache
            .lock()
            .map_err(|_| NsError::LockAcquisitionFailed {
                message: "Failed to acquire lock on notes cache".to_string(),
            })
    }
}

/// Stable, deterministic ordering: most recently modified first, id as the
/// tiebreak.
fn sort_recent_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tag;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    fn note(title: &str) -> Note {
        Note::new(title.to_string(), format!("{} body", title), vec![Tag::new("Work")], None)
    }

    #[test]
    fn round_trip_is_a_fixed_point() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::open(test_config(dir.path())).unwrap();

        let mut a = note("alpha");
        a.mark_synced("page-a".into());
        let b = note("beta");
        store.save_all(&[a.clone(), b.clone()]).unwrap();

        let reloaded = NoteStore::open(test_config(dir.path())).unwrap();
        let mut expected = vec![a, b];
        sort_recent_first(&mut expected);
        assert_eq!(reloaded.all_sorted().unwrap(), expected);
    }

    #[test]
    fn absent_record_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::open(test_config(dir.path())).unwrap();
        assert!(store.all_sorted().unwrap().is_empty());
    }

    #[test]
    fn malformed_record_loads_empty_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        fs::create_dir_all(&config.data_dir).unwrap();
        fs::write(
            dir.path().join(format!("notes_v{}.json", config.store_version)),
            "{definitely not json",
        )
        .unwrap();

        let store = NoteStore::open(config).unwrap();
        assert!(store.all_sorted().unwrap().is_empty());
    }

    #[test]
    fn dirty_selection_is_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::open(test_config(dir.path())).unwrap();

        let mut clean = note("clean");
        clean.mark_synced("page-c".into());
        let older = note("older");
        let mut newer = note("newer");
        newer.updated_at = newer.updated_at + chrono::Duration::seconds(5);

        store.save_all(&[clean, older.clone(), newer.clone()]).unwrap();

        let dirty = store.dirty_notes().unwrap();
        assert_eq!(dirty.len(), 2);
        assert_eq!(dirty[0].id, newer.id);
        assert_eq!(dirty[1].id, older.id);
    }

    #[test]
    fn eviction_removes_only_older_versions() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = NoteStore::open(config.clone()).unwrap();
        store.save_all(&[note("current")]).unwrap();

        fs::write(dir.path().join("notes_v1.json"), "[]").unwrap();
        // a record newer than the running version must survive a downgrade
        fs::write(dir.path().join("notes_v3.json"), "[]").unwrap();
        fs::write(dir.path().join("notes_vx.json"), "[]").unwrap();
        fs::write(dir.path().join("unrelated.json"), "[]").unwrap();

        assert_eq!(store.evict_stale_versions(), 1);
        assert!(!dir.path().join("notes_v1.json").exists());
        assert!(dir.path().join("notes_v3.json").exists());
        assert!(dir.path().join("notes_vx.json").exists());
        assert!(dir.path().join("unrelated.json").exists());
        assert!(store.record_path().exists());
    }

    #[test]
    fn write_failure_recovers_after_evicting_stale_versions() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::open(test_config(dir.path())).unwrap();
        fs::write(dir.path().join("notes_v1.json"), "[]").unwrap();

        store
            .fail_next_write
            .store(true, std::sync::atomic::Ordering::SeqCst);
        store.save_all(&[note("survivor")]).unwrap();

        // the first attempt failed, eviction ran, the retry landed
        assert!(!dir.path().join("notes_v1.json").exists());
        let reloaded = NoteStore::open(test_config(dir.path())).unwrap();
        assert_eq!(reloaded.all_sorted().unwrap().len(), 1);
        assert_eq!(reloaded.all_sorted().unwrap()[0].title, "survivor");
    }

    #[test]
    fn unwritable_store_surfaces_non_fatal_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::open(test_config(dir.path())).unwrap();

        // Replace the data dir with a plain file so every write attempt fails
        drop(fs::remove_dir_all(dir.path()));
        fs::write(dir.path(), "blocker").ok();

        let result = store.save_all(&[note("doomed")]);
        if dir.path().exists() && dir.path().is_file() {
            assert!(matches!(result, Err(NsError::StorageWriteFailure { .. })));
        }
        // The cache still holds the mutation either way
        assert_eq!(store.all_sorted().unwrap().len(), 1);
    }

    #[test]
    fn upsert_replaces_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::open(test_config(dir.path())).unwrap();

        let mut n = note("gamma");
        store.upsert(n.clone()).unwrap();
        n.apply_edit("gamma".into(), "new body".into(), n.tags.clone(), None);
        store.upsert(n.clone()).unwrap();

        let all = store.all_sorted().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "new body");
    }
}
