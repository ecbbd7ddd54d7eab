//! Note templates.
//!
//! A template pre-fills the editor with a title and content skeleton.
//! `{date}` and `{time}` placeholders expand at instantiation time. The
//! built-in set is always available; user templates stored next to the note
//! data extend or override it by name.

use std::fs;
use std::path::PathBuf;

use chrono::Local;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{Config, Result};

const TEMPLATES_FILE: &str = "templates.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    /// Name the template is selected by
    pub name: String,
    /// Title skeleton; supports {date} and {time}
    pub title_pattern: String,
    /// Content skeleton; supports {date} and {time}
    pub content_pattern: String,
    /// Default category applied to notes created from this template
    #[serde(default)]
    pub category: Option<String>,
}

impl Template {
    /// Expands the placeholders against the local clock and returns the
    /// (title, content) pair for a fresh note.
    pub fn instantiate(&self) -> (String, String) {
        let now = Local::now();
        let date = now.format("%Y-%m-%d").to_string();
        let time = now.format("%H:%M").to_string();

        let expand = |pattern: &str| {
            pattern
                .replace("{date}", &date)
                .replace("{time}", &time)
        };

        (expand(&self.title_pattern), expand(&self.content_pattern))
    }
}

fn builtin_templates() -> Vec<Template> {
    vec![
        Template {
            name: "Quick Note".to_string(),
            title_pattern: "Quick Note {date}".to_string(),
            content_pattern: String::new(),
            category: None,
        },
        Template {
            name: "Meeting Notes".to_string(),
            title_pattern: "Meeting {date}".to_string(),
            content_pattern: "## Attendees\n\n## Agenda\n\n## Action Items\n".to_string(),
            category: Some("Meeting Notes".to_string()),
        },
        Template {
            name: "Project Idea".to_string(),
            title_pattern: "Idea: ".to_string(),
            content_pattern: "## Problem\n\n## Proposal\n\n## Next Steps\n".to_string(),
            category: Some("Ideas".to_string()),
        },
        Template {
            name: "Task".to_string(),
            title_pattern: "Task {date}".to_string(),
            content_pattern: "- [ ] \n".to_string(),
            category: Some("Tasks".to_string()),
        },
    ]
}

/// Loads templates from the data directory.
pub struct TemplateStore {
    path: PathBuf,
}

impl TemplateStore {
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.data_dir.join(TEMPLATES_FILE),
        }
    }

    /// Returns the built-in templates merged with any user-defined ones.
    /// A user template with a built-in's name replaces it. A malformed
    /// templates file is ignored with a warning; the built-ins still work.
    pub fn all(&self) -> Vec<Template> {
        let mut templates = builtin_templates();

        for user in self.load_user_templates() {
            match templates.iter_mut().find(|t| t.name == user.name) {
                Some(slot) => *slot = user,
                None => templates.push(user),
            }
        }

        templates
    }

    /// Finds a template by name, case-insensitively.
    pub fn find(&self, name: &str) -> Option<Template> {
        self.all()
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Persists the user templates file.
    pub fn save_user_templates(&self, templates: &[Template]) -> Result<()> {
        let json = serde_json::to_string_pretty(templates)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn load_user_templates(&self) -> Vec<Template> {
        if !self.path.exists() {
            return Vec::new();
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read templates file {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(templates) => templates,
            Err(e) => {
                warn!("Templates file {} is malformed: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }
}
