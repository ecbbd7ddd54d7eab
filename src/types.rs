//! Core data structures shared across the notesync application.

use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::NsError;

/// A specialized Result type for notesync operations.
pub type Result<T> = std::result::Result<T, NsError>;

/// A tag reference: name plus a display color category.
///
/// Insertion order is irrelevant for storage; the UI keeps the order the
/// user picked them in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Tag name as shown in the editor and mapped to Notion's multi_select
    pub name: String,
    /// Display color label (e.g. "blue"); not sent to the remote
    #[serde(default)]
    pub color: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: String::new(),
        }
    }
}

/// Per-note sync state, derived from `synced` and `sync_error`.
///
/// `Syncing` is transient and only ever observed while the orchestrator has
/// the note in flight; it is never persisted. `DirtyWithError` is
/// functionally `Dirty`: the error is advisory metadata and never blocks a
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Local state matches the last confirmed remote state
    Clean,
    /// Has local changes not yet confirmed present remotely
    Dirty,
    /// Dirty, and the last push attempt recorded an error
    DirtyWithError,
    /// A push for this note is currently in flight
    Syncing,
}

impl SyncState {
    /// Dirty notes (with or without a recorded error) are eligible for push.
    pub fn is_dirty(&self) -> bool {
        matches!(self, SyncState::Dirty | SyncState::DirtyWithError)
    }
}

/// The editor's in-memory state, sampled on every keystroke and handed to
/// the autosave scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    /// Bound note id, or None when editing a not-yet-created note
    pub note_id: Option<String>,
    pub title: String,
    pub content: String,
    pub tags: Vec<Tag>,
    pub category: Option<String>,
}

impl EditorState {
    /// True when flushing this state must not create a note.
    pub fn is_blank(&self) -> bool {
        self.note_id.is_none() && self.title.is_empty() && self.content.is_empty()
    }
}

/// Aggregate outcome of one sync pass, reported to the UI for observability.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Number of dirty notes selected for this pass
    pub attempted: usize,
    /// Notes confirmed clean by the remote
    pub succeeded: usize,
    /// Notes left dirty with a recorded error
    pub failed: usize,
    /// The pass was aborted early because the credential expired
    pub auth_expired: bool,
    /// Whether the pass ran at all (false: offline, unauthenticated, or
    /// another pass was already in flight)
    pub ran: bool,
    /// Per-note error detail: (note id, error message)
    pub failures: Vec<(String, String)>,
}

impl SyncReport {
    /// A pass that was guarded into a no-op.
    pub fn skipped() -> Self {
        Self::default()
    }
}

/// Available subcommands for the notesync CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note and save it locally
    New {
        /// Title of the note
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// Content of the note, can be markdown formatted
        #[clap(short, long)]
        content: Option<String>,

        /// Tags to associate with the note (comma-separated)
        #[clap(short, long)]
        tags: Option<String>,

        /// Category label (e.g. "Meeting Notes")
        #[clap(short = 'C', long)]
        category: Option<String>,

        /// Name of a template to pre-fill title and content from
        #[clap(long)]
        template: Option<String>,

        /// Push the note to Notion immediately after saving
        #[clap(short, long)]
        sync: bool,
    },

    /// List notes (unsynced only by default)
    List {
        /// Include notes already synced to Notion
        #[clap(short, long)]
        all: bool,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// View a note by ID
    View {
        /// ID of the note to view
        id: String,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Edit an existing note
    Edit {
        /// ID of the note to edit
        id: String,

        /// New title for the note
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// New content for the note
        #[clap(short, long)]
        content: Option<String>,

        /// Replacement tags (comma-separated)
        #[clap(short, long)]
        tags: Option<String>,

        /// New category label
        #[clap(short = 'C', long)]
        category: Option<String>,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note to delete
        id: String,
    },

    /// Push all unsynced notes to Notion
    Sync,

    /// Show connectivity, authentication and sync status
    Status,

    /// Store a Notion access token for syncing
    Login {
        /// Notion integration or OAuth access token
        #[clap(long)]
        token: String,

        /// Workspace name, for display only
        #[clap(long)]
        workspace: Option<String>,
    },

    /// Discard the stored Notion credentials
    Logout,

    /// List available note templates
    Templates,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_editor_state_requires_unbound_id() {
        let mut state = EditorState {
            note_id: None,
            title: String::new(),
            content: String::new(),
            tags: vec![],
            category: None,
        };
        assert!(state.is_blank());

        state.note_id = Some("123".into());
        assert!(!state.is_blank());
    }

    #[test]
    fn dirty_with_error_is_still_dirty() {
        assert!(SyncState::Dirty.is_dirty());
        assert!(SyncState::DirtyWithError.is_dirty());
        assert!(!SyncState::Clean.is_dirty());
        assert!(!SyncState::Syncing.is_dirty());
    }
}
