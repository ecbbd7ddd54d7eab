//! The Note entity and its sync-state transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SyncState, Tag};

/// A user-authored text record with Markdown content, tags, a single
/// category label and sync metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    /// Opaque stable identifier, assigned at first save, never reassigned
    pub id: String,
    /// Note title
    pub title: String,
    /// Note content in Markdown format
    pub content: String,
    /// Tags for organization
    pub tags: Vec<Tag>,
    /// Optional single classification label
    #[serde(default)]
    pub category: Option<String>,
    /// When the note was first persisted; immutable thereafter
    pub created_at: DateTime<Utc>,
    /// Last persisted mutation; monotonically non-decreasing
    pub updated_at: DateTime<Utc>,
    /// false: has local changes not yet confirmed present remotely
    #[serde(default)]
    pub synced: bool,
    /// Remote page id, assigned after the first successful push and reused
    /// for subsequent updates
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Last push error, cleared by the next successful sync attempt
    #[serde(default)]
    pub sync_error: Option<String>,
}

impl Note {
    /// Creates a new unsynced note with the given fields.
    pub fn new(
        title: String,
        content: String,
        tags: Vec<Tag>,
        category: Option<String>,
    ) -> Self {
        let now = Utc::now();
        // Generate a unique ID using timestamp and title
        let id = format!(
            "{}-{}",
            now.timestamp_millis(),
            title.to_lowercase().replace(' ', "-")
        );

        Note {
            id,
            title,
            content,
            tags,
            category,
            created_at: now,
            updated_at: now,
            synced: false,
            remote_id: None,
            sync_error: None,
        }
    }

    /// Applies an edit to the mutable fields.
    ///
    /// Returns false when nothing actually changed, in which case neither
    /// `updated_at` nor `synced` is touched; this is what makes a repeated
    /// autosave flush idempotent. On a real change `updated_at` is bumped
    /// (never backwards) and the note is forced dirty.
    pub fn apply_edit(
        &mut self,
        title: String,
        content: String,
        tags: Vec<Tag>,
        category: Option<String>,
    ) -> bool {
        if self.title == title
            && self.content == content
            && self.tags == tags
            && self.category == category
        {
            return false;
        }

        self.title = title;
        self.content = content;
        self.tags = tags;
        self.category = category;
        self.updated_at = Utc::now().max(self.updated_at);
        self.synced = false;
        true
    }

    /// Records a confirmed remote acknowledgment: the only transition that
    /// flips `synced` back to true.
    pub fn mark_synced(&mut self, remote_id: String) {
        self.synced = true;
        self.remote_id = Some(remote_id);
        self.sync_error = None;
    }

    /// Records a failed push attempt. The note stays dirty and eligible for
    /// retry; the error is advisory only.
    pub fn record_sync_error(&mut self, message: impl Into<String>) {
        self.synced = false;
        self.sync_error = Some(message.into());
    }

    /// True when the note has neither title nor content. Such notes are
    /// never persisted.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }

    /// Derives the persistent sync state from the flag pair.
    pub fn sync_state(&self) -> SyncState {
        match (self.synced, self.sync_error.is_some()) {
            (true, _) => SyncState::Clean,
            (false, true) => SyncState::DirtyWithError,
            (false, false) => SyncState::Dirty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Note {
        Note::new(
            "Groceries".to_string(),
            "milk, eggs".to_string(),
            vec![Tag::new("Personal")],
            None,
        )
    }

    #[test]
    fn new_note_is_dirty() {
        let note = sample();
        assert!(!note.synced);
        assert_eq!(note.sync_state(), SyncState::Dirty);
        assert_eq!(note.created_at, note.updated_at);
        assert!(note.id.ends_with("-groceries"));
    }

    #[test]
    fn identical_edit_is_a_no_op() {
        let mut note = sample();
        note.mark_synced("page-1".into());
        let before = note.updated_at;

        let changed = note.apply_edit(
            note.title.clone(),
            note.content.clone(),
            note.tags.clone(),
            note.category.clone(),
        );

        assert!(!changed);
        assert_eq!(note.updated_at, before);
        assert!(note.synced, "no-op edit must not dirty the note");
    }

    #[test]
    fn any_mutation_forces_dirty() {
        let mut note = sample();
        note.mark_synced("page-1".into());
        assert_eq!(note.sync_state(), SyncState::Clean);

        let changed = note.apply_edit(
            note.title.clone(),
            "milk, eggs, bread".to_string(),
            note.tags.clone(),
            note.category.clone(),
        );

        assert!(changed);
        assert!(!note.synced);
        assert!(note.updated_at >= note.created_at);
        // remote_id survives the edit so the next push updates, not creates
        assert_eq!(note.remote_id.as_deref(), Some("page-1"));
    }

    #[test]
    fn sync_success_clears_the_recorded_error() {
        let mut note = sample();
        note.record_sync_error("HTTP 503");
        assert_eq!(note.sync_state(), SyncState::DirtyWithError);

        note.mark_synced("page-2".into());
        assert_eq!(note.sync_state(), SyncState::Clean);
        assert!(note.sync_error.is_none());
    }
}
