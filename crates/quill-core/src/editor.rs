//! Note edit session: draft shadowing and debounced auto-save.
//!
//! One note is bound at a time. Edits land in the draft synchronously;
//! persistence happens in the background through [`NoteStore::update`],
//! debounced behind an idle window. Stale timers and stale save results are
//! neutralized with a version/epoch guard instead of cancellable handles:
//! every edit bumps the version, every rebind bumps the epoch, and each
//! sleeper re-checks both before acting. Checking a dead guard twice is
//! harmless, which makes cancellation unconditional and idempotent.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::error::Result;
use crate::models::{Note, NoteId, NotePatch};
use crate::store::NoteStore;

/// Idle save delay - save after 2 seconds of no typing
pub const AUTO_SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

/// The in-memory, possibly-unsaved edit state of the bound note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub note_id: NoteId,
    pub title: String,
    pub content: Option<String>,
}

/// Observable edit session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSnapshot {
    pub draft: Option<EditDraft>,
    pub dirty: bool,
    pub saving: bool,
}

struct Binding {
    note_id: NoteId,
    title: String,
    content: Option<String>,
    synced_title: String,
    synced_content: Option<String>,
    saving: bool,
    edit_version: u64,
}

impl Binding {
    fn from_note(note: &Note) -> Self {
        Self {
            note_id: note.id,
            title: note.title.clone(),
            content: note.content.clone(),
            synced_title: note.title.clone(),
            synced_content: note.content.clone(),
            saving: false,
            edit_version: 0,
        }
    }

    /// Explicit equality against the last-synced values. An absent body and
    /// an empty body compare equal, matching how the editor presents them.
    fn dirty(&self) -> bool {
        self.title != self.synced_title
            || self.content.as_deref().unwrap_or("") != self.synced_content.as_deref().unwrap_or("")
    }

    fn draft(&self) -> EditDraft {
        EditDraft {
            note_id: self.note_id,
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

struct Inner {
    // Bumped on every bind/unbind; sleepers and in-flight saves armed under
    // an older epoch become no-ops.
    epoch: u64,
    binding: Option<Binding>,
}

/// Per-selected-note edit controller.
#[derive(Clone)]
pub struct EditSession {
    store: NoteStore,
    inner: Arc<Mutex<Inner>>,
    tx: watch::Sender<EditSnapshot>,
    debounce: Duration,
}

impl EditSession {
    #[must_use]
    pub fn new(store: NoteStore) -> Self {
        Self::with_debounce(store, AUTO_SAVE_DEBOUNCE)
    }

    /// Session with a custom idle window, primarily for tests.
    #[must_use]
    pub fn with_debounce(store: NoteStore, debounce: Duration) -> Self {
        let (tx, _) = watch::channel(EditSnapshot {
            draft: None,
            dirty: false,
            saving: false,
        });
        Self {
            store,
            inner: Arc::new(Mutex::new(Inner {
                epoch: 0,
                binding: None,
            })),
            tx,
            debounce,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EditSnapshot> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> EditSnapshot {
        self.tx.borrow().clone()
    }

    /// Bind a note, resetting the draft from its current state. Any pending
    /// debounce for the previous binding is invalidated.
    pub fn bind(&self, note: &Note) {
        let snapshot = {
            let mut inner = self.lock();
            inner.epoch += 1;
            inner.binding = Some(Binding::from_note(note));
            snapshot_of(&inner)
        };
        self.tx.send_replace(snapshot);
    }

    /// Drop the binding. An in-flight save may still complete; its result is
    /// discarded.
    pub fn unbind(&self) {
        let snapshot = {
            let mut inner = self.lock();
            inner.epoch += 1;
            inner.binding = None;
            snapshot_of(&inner)
        };
        self.tx.send_replace(snapshot);
    }

    /// Unbind only when `id` is the bound note, e.g. after it was deleted
    /// elsewhere.
    pub fn unbind_if(&self, id: NoteId) {
        let snapshot = {
            let mut inner = self.lock();
            if inner
                .binding
                .as_ref()
                .is_none_or(|binding| binding.note_id != id)
            {
                return;
            }
            inner.epoch += 1;
            inner.binding = None;
            snapshot_of(&inner)
        };
        self.tx.send_replace(snapshot);
    }

    /// Update the draft title immediately and restart the idle window.
    pub fn set_title(&self, title: impl Into<String>) {
        self.apply_edit(|binding| binding.title = title.into());
    }

    /// Update the draft content immediately and restart the idle window.
    pub fn set_content(&self, content: impl Into<String>) {
        self.apply_edit(|binding| binding.content = Some(content.into()));
    }

    fn apply_edit(&self, edit: impl FnOnce(&mut Binding)) {
        let armed = {
            let mut inner = self.lock();
            let epoch = inner.epoch;
            let Some(binding) = inner.binding.as_mut() else {
                return;
            };
            edit(binding);
            binding.edit_version += 1;
            let version = binding.edit_version;
            let snapshot = snapshot_of(&inner);
            (epoch, version, snapshot)
        };
        let (epoch, version, snapshot) = armed;
        self.tx.send_replace(snapshot);
        self.arm_debounce(epoch, version);
    }

    /// Trailing-edge debounce: sleep the idle window, then save only when no
    /// newer edit, rebind, or in-flight save superseded this arming.
    fn arm_debounce(&self, epoch: u64, version: u64) {
        let session = self.clone();
        let delay = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let inner = session.lock();
                if inner.epoch != epoch {
                    return;
                }
                let Some(binding) = inner.binding.as_ref() else {
                    return;
                };
                if binding.edit_version != version || binding.saving || !binding.dirty() {
                    return;
                }
            }

            if let Err(error) = session.save().await {
                tracing::error!("Failed to auto-save note: {}", error);
            }
        });
    }

    /// Persist the draft now, bypassing the idle window. No-op when the
    /// draft is clean or a save is already in flight (the in-flight
    /// discipline re-arms for edits that landed meanwhile).
    pub async fn save(&self) -> Result<()> {
        let (epoch, note_id, patch) = {
            let mut inner = self.lock();
            let epoch = inner.epoch;
            let Some(binding) = inner.binding.as_mut() else {
                return Ok(());
            };
            if binding.saving || !binding.dirty() {
                return Ok(());
            }
            binding.saving = true;
            let patch = NotePatch {
                title: Some(binding.title.clone()),
                content: binding.content.clone(),
            };
            (epoch, binding.note_id, patch)
        };
        self.tx.send_replace(self.locked_snapshot());

        let result = self.store.update(note_id, patch).await;

        let followup = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                // Rebound or unbound while the save was in flight; the
                // result no longer applies to anything.
                tracing::debug!("Discarding save result for unbound note {}", note_id);
                return Ok(());
            }
            let Some(binding) = inner.binding.as_mut() else {
                return Ok(());
            };
            binding.saving = false;
            match result {
                Ok(saved) => {
                    // Dirtiness keeps being measured against the values that
                    // were actually saved, so edits made during the flight
                    // stay dirty.
                    binding.synced_title = saved.title;
                    binding.synced_content = saved.content;
                    tracing::debug!("Saved note: {}", note_id);
                    let rearm = binding
                        .dirty()
                        .then_some((epoch, binding.edit_version));
                    Ok(rearm)
                }
                // Draft and dirtiness are preserved; retry happens on the
                // next edit or an explicit save, never on a timer.
                Err(error) => Err(error),
            }
        };

        match followup {
            Ok(rearm) => {
                self.tx.send_replace(self.locked_snapshot());
                if let Some((epoch, version)) = rearm {
                    self.arm_debounce(epoch, version);
                }
                Ok(())
            }
            Err(error) => {
                self.tx.send_replace(self.locked_snapshot());
                Err(error)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn locked_snapshot(&self) -> EditSnapshot {
        snapshot_of(&self.lock())
    }
}

fn snapshot_of(inner: &Inner) -> EditSnapshot {
    inner.binding.as_ref().map_or(
        EditSnapshot {
            draft: None,
            dirty: false,
            saving: false,
        },
        |binding| EditSnapshot {
            draft: Some(binding.draft()),
            dirty: binding.dirty(),
            saving: binding.saving,
        },
    )
}
