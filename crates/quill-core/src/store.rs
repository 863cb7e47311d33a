//! Note collection store: the sole owner and mutator of the user's notes.
//!
//! Every mutation waits for remote acknowledgment before touching local
//! state, so server-assigned ids and timestamps stay authoritative. Nothing
//! here is optimistic.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::models::{Note, NoteId, NotePatch, UserIdentity};
use crate::remote::RemoteService;

/// Observable collection state, display-ordered most recently updated first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesSnapshot {
    pub notes: Vec<Note>,
    pub loading: bool,
}

impl NotesSnapshot {
    #[must_use]
    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: NoteId) -> bool {
        self.get(id).is_some()
    }
}

/// Store for the authenticated user's notes.
#[derive(Clone)]
pub struct NoteStore {
    remote: Arc<dyn RemoteService>,
    owner: UserIdentity,
    tx: watch::Sender<NotesSnapshot>,
}

impl NoteStore {
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteService>, owner: UserIdentity) -> Self {
        let (tx, _) = watch::channel(NotesSnapshot {
            notes: Vec::new(),
            loading: false,
        });
        Self { remote, owner, tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NotesSnapshot> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> NotesSnapshot {
        self.tx.borrow().clone()
    }

    /// The user this store is scoped to.
    #[must_use]
    pub const fn owner(&self) -> &UserIdentity {
        &self.owner
    }

    /// Fetch the full collection. The loading flag is observable for the
    /// whole round trip and cleared on success and failure alike.
    pub async fn load(&self) -> Result<Vec<Note>> {
        self.tx.send_modify(|state| state.loading = true);

        match self.remote.list_notes(&self.owner.id).await {
            Ok(notes) => {
                self.tx.send_modify(|state| {
                    state.notes = notes.clone();
                    state.loading = false;
                });
                Ok(notes)
            }
            Err(error) => {
                self.tx.send_modify(|state| state.loading = false);
                Err(error.into())
            }
        }
    }

    /// Create a note. The collection is unchanged when the remote insert
    /// fails.
    pub async fn create(&self, title: &str, content: Option<&str>) -> Result<Note> {
        let note = self
            .remote
            .insert_note(&self.owner.id, title, content)
            .await?;

        self.tx.send_modify(|state| {
            // Freshly created means most recently updated.
            state.notes.insert(0, note.clone());
        });
        tracing::debug!("Created note: {}", note.id);
        Ok(note)
    }

    /// Apply a partial update, replacing the collection entry with the
    /// server's row so `updated_at` stays authoritative.
    pub async fn update(&self, id: NoteId, patch: NotePatch) -> Result<Note> {
        if !self.snapshot().contains(id) {
            return Err(Error::NotFound(id.to_string()));
        }

        let updated = self.remote.update_note(id, &patch).await?;

        self.tx.send_modify(|state| {
            if let Some(entry) = state.notes.iter_mut().find(|note| note.id == id) {
                *entry = updated.clone();
            } else {
                // Deleted while the update was in flight; the delete wins.
                tracing::warn!("Updated note {} is no longer in the collection", id);
            }
        });
        Ok(updated)
    }

    /// Delete a note. Idempotent: an id absent from the collection is a
    /// no-op and no remote call is made.
    pub async fn delete(&self, id: NoteId) -> Result<()> {
        if !self.snapshot().contains(id) {
            return Ok(());
        }

        self.remote.delete_note(id).await?;

        self.tx
            .send_modify(|state| state.notes.retain(|note| note.id != id));
        tracing::debug!("Deleted note: {}", id);
        Ok(())
    }

    /// Case-insensitive title/content filter over the current collection.
    #[must_use]
    pub fn filter(&self, query: &str) -> Vec<Note> {
        self.snapshot()
            .notes
            .into_iter()
            .filter(|note| note.matches_query(query))
            .collect()
    }
}
