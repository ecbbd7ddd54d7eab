//! CLI module for the notesync application
//!
//! This module handles the command-line interface for interacting with the
//! local note store and the Notion sync pipeline.
use std::sync::Arc;

use log::info;

use crate::{
    parse_tags, truncate_for_display, AuthStore, Commands, Config, ConnectivityMonitor, Note,
    NoteStore, NotionAuth, NotionClient, NsError, Result, SyncOrchestrator, SyncReport, SyncState,
    TemplateStore,
};

/// CLI Application handler - processes CLI commands and interfaces with the
/// note store and the sync orchestrator
pub struct App {
    /// The note storage backend
    store: Arc<NoteStore>,

    /// Application configuration
    config: Config,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Create a new CLI application with the given storage backend and config
    pub fn new(store: Arc<NoteStore>, config: Config, verbose: bool) -> Self {
        Self {
            store,
            config,
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::New {
                title,
                content,
                tags,
                category,
                template,
                sync,
            } => {
                self.create_note(title, content, tags, category, template, sync)
                    .await?
            }

            Commands::List { all, json } => self.list_notes(all, json)?,

            Commands::View { id, json } => self.view_note(&id, json)?,

            Commands::Edit {
                id,
                title,
                content,
                tags,
                category,
            } => self.edit_note(&id, title, content, tags, category)?,

            Commands::Delete { id } => {
                self.store.remove(&id)?;
                println!("Deleted note {}", id);
            }

            Commands::Sync => {
                let report = self.run_sync_pass().await?;
                print_report(&report);
            }

            Commands::Status => self.show_status()?,

            Commands::Login { token, workspace } => {
                let auth = NotionAuth::new(token, workspace);
                AuthStore::new(&self.config).save(&auth)?;
                println!("Logged in. Notes will sync to Notion on the next pass.");
            }

            Commands::Logout => {
                AuthStore::new(&self.config).clear()?;
                println!("Logged out. Notes stay local until you log in again.");
            }

            Commands::Templates => self.list_templates(),
        }

        Ok(())
    }

    async fn create_note(
        &self,
        title: Option<String>,
        content: Option<String>,
        tags: Option<String>,
        category: Option<String>,
        template: Option<String>,
        sync: bool,
    ) -> Result<()> {
        // A template fills in whatever the flags left unset
        let (template_title, template_content, template_category) = match template {
            Some(name) => {
                let template = TemplateStore::new(&self.config).find(&name).ok_or_else(|| {
                    NsError::app(format!("No template named '{}'", name))
                })?;
                let (t, c) = template.instantiate();
                (Some(t), Some(c), template.category)
            }
            None => (None, None, None),
        };

        let title = title.or(template_title).unwrap_or_default();
        let content = content.or(template_content).unwrap_or_default();
        let category = category.or(template_category);

        let note = Note::new(title, content, parse_tags(tags), category);
        if note.is_empty() {
            return Err(NsError::app(
                "Refusing to create an empty note; give it a title or content",
            ));
        }

        let id = note.id.clone();
        self.store.upsert(note)?;
        println!("Note created with ID: {}", id);

        if sync {
            let report = self.run_sync_pass().await?;
            print_report(&report);
        }
        Ok(())
    }

    fn list_notes(&self, all: bool, json: bool) -> Result<()> {
        let notes = if all {
            self.store.all_sorted()?
        } else {
            self.store.dirty_notes()?
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&notes)?);
            return Ok(());
        }

        if notes.is_empty() {
            println!(
                "{}",
                if all {
                    "No notes yet."
                } else {
                    "Everything is synced."
                }
            );
            return Ok(());
        }

        for note in &notes {
            println!(
                "{} {}  {}  [{}]",
                state_marker(note),
                note.id,
                truncate_for_display(&note.title, 40),
                note.updated_at.format("%Y-%m-%d %H:%M"),
            );
            if self.verbose {
                let tags: Vec<&str> = note.tags.iter().map(|t| t.name.as_str()).collect();
                println!("    tags: {:?}  category: {:?}", tags, note.category);
                if let Some(error) = &note.sync_error {
                    println!("    last sync error: {}", error);
                }
            }
        }
        Ok(())
    }

    fn view_note(&self, id: &str, json: bool) -> Result<()> {
        let note = self.store.get(id)?.ok_or_else(|| NsError::NoteNotFound {
            id: id.to_string(),
        })?;

        if json {
            println!("{}", serde_json::to_string_pretty(&note)?);
            return Ok(());
        }

        println!("# {}", note.title);
        println!();
        println!("{}", note.content);
        println!();
        println!("id:       {}", note.id);
        println!("updated:  {}", note.updated_at.format("%Y-%m-%d %H:%M:%S"));
        println!("sync:     {:?}", note.sync_state());
        if let Some(remote_id) = &note.remote_id {
            println!("notion:   {}", remote_id);
        }
        Ok(())
    }

    fn edit_note(
        &self,
        id: &str,
        title: Option<String>,
        content: Option<String>,
        tags: Option<String>,
        category: Option<String>,
    ) -> Result<()> {
        let mut note = self.store.get(id)?.ok_or_else(|| NsError::NoteNotFound {
            id: id.to_string(),
        })?;

        let changed = note.apply_edit(
            title.unwrap_or_else(|| note.title.clone()),
            content.unwrap_or_else(|| note.content.clone()),
            match tags {
                Some(t) => parse_tags(Some(t)),
                None => note.tags.clone(),
            },
            category.or_else(|| note.category.clone()),
        );

        if changed {
            self.store.upsert(note)?;
            println!("Note {} updated; it will sync on the next pass.", id);
        } else {
            println!("Note {} unchanged.", id);
        }
        Ok(())
    }

    /// One full sync pass against Notion. Requires stored credentials.
    async fn run_sync_pass(&self) -> Result<SyncReport> {
        let auth = AuthStore::new(&self.config)
            .load()
            .ok_or(NsError::NotAuthenticated)?;

        let client = NotionClient::new(&self.config, &auth)?;
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&self.store),
            client,
            Arc::new(ConnectivityMonitor::new(true)),
        );

        info!("Starting manual sync pass");
        Ok(orchestrator.sync_pass().await)
    }

    fn show_status(&self) -> Result<()> {
        let all = self.store.all_sorted()?;
        let dirty = self.store.dirty_notes()?;
        let auth = AuthStore::new(&self.config).load();

        println!("store:   {}", self.store.record_path().display());
        println!("notes:   {} total, {} awaiting sync", all.len(), dirty.len());
        match auth {
            Some(auth) => println!(
                "notion:  logged in ({})",
                auth.workspace_name.as_deref().unwrap_or("unnamed workspace")
            ),
            None => println!("notion:  not logged in"),
        }

        for note in dirty.iter().filter(|n| n.sync_error.is_some()) {
            println!(
                "  ! {} {}: {}",
                note.id,
                truncate_for_display(&note.title, 30),
                note.sync_error.as_deref().unwrap_or_default()
            );
        }
        Ok(())
    }

    fn list_templates(&self) {
        for template in TemplateStore::new(&self.config).all() {
            println!(
                "{}  (title: {:?}, category: {:?})",
                template.name, template.title_pattern, template.category
            );
        }
    }
}

fn state_marker(note: &Note) -> &'static str {
    match note.sync_state() {
        SyncState::Clean => " ",
        SyncState::Dirty => "*",
        SyncState::DirtyWithError => "!",
        SyncState::Syncing => "~",
    }
}

fn print_report(report: &SyncReport) {
    if !report.ran {
        println!("Sync skipped (offline or already running).");
        return;
    }
    println!(
        "Synced {} of {} note(s){}",
        report.succeeded,
        report.attempted,
        if report.auth_expired {
            "; stopped early: Notion credentials expired, run `login` again"
        } else {
            ""
        }
    );
    for (id, error) in &report.failures {
        println!("  failed {}: {}", id, error);
    }
}
