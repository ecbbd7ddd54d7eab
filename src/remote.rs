//! The contract between the sync core and the remote document store.

use std::future::Future;

use crate::{Note, RemoteError};

/// Outcome of one push: the remote page id on success.
pub type RemoteResult = std::result::Result<String, RemoteError>;

/// A client able to mirror one note into the remote document store.
///
/// `push` must be idempotent at the semantic level: pushing the same note
/// twice (e.g. a retry after an ambiguous network failure) must not create a
/// duplicate remote entity. Implementations achieve this by looking up an
/// existing entity first, by stored remote id or by a stable natural key
/// derived from the note id.
pub trait RemoteSync {
    /// Creates or updates the note's remote counterpart and returns the
    /// remote identifier.
    fn push(&self, note: &Note) -> impl Future<Output = RemoteResult> + Send;
}
