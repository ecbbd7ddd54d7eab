//! Offline-first note-taking library with Notion synchronization
//!
//! This library provides functionality for creating, editing and organizing
//! notes with tags and Markdown content, persisting them locally first and
//! mirroring them into a Notion database whenever connectivity allows.

mod auth;
mod autosave;
mod blocks;
mod cli;
mod config;
mod connectivity;
mod errors;
mod helper;
mod note;
mod notion;
mod orchestrator;
mod remote;
mod session;
mod store;
mod templates;
mod types;

// Re-export key components
pub use auth::*;
pub use autosave::*;
pub use blocks::*;
pub use cli::*;
pub use config::*;
pub use connectivity::*;
pub use errors::*;
pub use helper::*;
pub use note::*;
pub use notion::*;
pub use orchestrator::*;
pub use remote::*;
pub use session::*;
pub use store::*;
pub use templates::*;
pub use types::*;
