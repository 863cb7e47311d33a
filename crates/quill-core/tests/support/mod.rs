//! In-memory remote service for integration tests, with failure injection
//! and call counting.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use quill_core::models::{Note, NoteId, NotePatch, UserIdentity};
use quill_core::remote::{
    AuthError, AuthEvent, AuthResult, OAuthProvider, PersistenceError, PersistenceResult,
    RemoteService, SignUpOutcome,
};

/// What the backend reports for the next OTP verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpOutcome {
    Success,
    Expired,
    Invalid,
}

pub struct MockRemote {
    initial_user: Mutex<Option<UserIdentity>>,
    notes: Mutex<Vec<Note>>,
    events: broadcast::Sender<AuthEvent>,
    otp_outcome: Mutex<OtpOutcome>,
    update_delay: Mutex<Option<Duration>>,
    fail_next_insert: AtomicBool,
    fail_next_update: AtomicBool,
    fail_sign_out: AtomicBool,
    pub oauth_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub verify_otp_calls: AtomicUsize,
    pub otp_requests: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            initial_user: Mutex::new(None),
            notes: Mutex::new(Vec::new()),
            events,
            otp_outcome: Mutex::new(OtpOutcome::Success),
            update_delay: Mutex::new(None),
            fail_next_insert: AtomicBool::new(false),
            fail_next_update: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            oauth_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            verify_otp_calls: AtomicUsize::new(0),
            otp_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_user(self, user: UserIdentity) -> Self {
        *self.initial_user.lock().unwrap() = Some(user);
        self
    }

    pub fn user(email: &str) -> UserIdentity {
        UserIdentity {
            id: format!("user-{email}"),
            email: Some(email.to_string()),
        }
    }

    pub fn seed_note(&self, owner: &str, title: &str, content: Option<&str>) -> Note {
        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4().to_string().parse().unwrap(),
            owner: owner.to_string(),
            title: title.to_string(),
            content: content.map(ToString::to_string),
            created_at: now,
            updated_at: now,
        };
        self.notes.lock().unwrap().push(note.clone());
        note
    }

    pub fn stored_note(&self, id: NoteId) -> Option<Note> {
        self.notes
            .lock()
            .unwrap()
            .iter()
            .find(|note| note.id == id)
            .cloned()
    }

    pub fn set_otp_outcome(&self, outcome: OtpOutcome) {
        *self.otp_outcome.lock().unwrap() = outcome;
    }

    /// Make each `update_note` call take this long in (virtual) time.
    pub fn set_update_delay(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }

    pub fn fail_sign_out(&self) {
        self.fail_sign_out.store(true, Ordering::SeqCst);
    }

    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn verify_otp_call_count(&self) -> usize {
        self.verify_otp_calls.load(Ordering::SeqCst)
    }

    pub fn oauth_call_count(&self) -> usize {
        self.oauth_calls.load(Ordering::SeqCst)
    }

    /// Deliver a session that materialized outside a direct call, the way
    /// an OAuth redirect completing in the browser would.
    pub fn complete_oauth_sign_in(&self, email: &str) {
        self.emit(AuthEvent::SignedIn(Self::user(email)));
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn verify_session(&self) -> AuthResult<Option<UserIdentity>> {
        Ok(self.initial_user.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, _password: &str) -> AuthResult<()> {
        self.emit(AuthEvent::SignedIn(Self::user(email)));
        Ok(())
    }

    async fn sign_up(&self, email: &str, _password: &str) -> AuthResult<SignUpOutcome> {
        let user = Self::user(email);
        self.emit(AuthEvent::SignedIn(user.clone()));
        Ok(SignUpOutcome::SignedIn(user))
    }

    async fn sign_in_with_oauth(&self, _provider: OAuthProvider) -> AuthResult<()> {
        self.oauth_calls.fetch_add(1, Ordering::SeqCst);
        // Redirect leaves the process; completion would arrive via `emit`.
        Ok(())
    }

    async fn request_otp(&self, email: &str) -> AuthResult<()> {
        self.otp_requests.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn verify_otp(&self, email: &str, _code: &str) -> AuthResult<()> {
        self.verify_otp_calls.fetch_add(1, Ordering::SeqCst);
        match *self.otp_outcome.lock().unwrap() {
            OtpOutcome::Success => {
                self.emit(AuthEvent::SignedIn(Self::user(email)));
                Ok(())
            }
            OtpOutcome::Expired => Err(AuthError::OtpExpired),
            OtpOutcome::Invalid => Err(AuthError::OtpInvalid),
        }
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.emit(AuthEvent::SignedOut);
        if self.fail_sign_out.swap(false, Ordering::SeqCst) {
            return Err(AuthError::Api("logout unreachable (503)".to_string()));
        }
        Ok(())
    }

    async fn list_notes(&self, owner: &str) -> PersistenceResult<Vec<Note>> {
        let mut notes: Vec<Note> = self
            .notes
            .lock()
            .unwrap()
            .iter()
            .filter(|note| note.owner == owner)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notes)
    }

    async fn insert_note(
        &self,
        owner: &str,
        title: &str,
        content: Option<&str>,
    ) -> PersistenceResult<Note> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(PersistenceError::Api("insert failed (503)".to_string()));
        }
        Ok(self.seed_note(owner, title, content))
    }

    async fn update_note(&self, id: NoteId, patch: &NotePatch) -> PersistenceResult<Note> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.update_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(PersistenceError::Api("update failed (503)".to_string()));
        }

        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| PersistenceError::Api(format!("No note row matched id {id}")))?;
        if let Some(title) = &patch.title {
            note.title = title.clone();
        }
        if let Some(content) = &patch.content {
            note.content = Some(content.clone());
        }
        note.updated_at = Utc::now();
        Ok(note.clone())
    }

    async fn delete_note(&self, id: NoteId) -> PersistenceResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.notes.lock().unwrap().retain(|note| note.id != id);
        Ok(())
    }
}
