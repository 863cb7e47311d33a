//! Remote service facade: authentication and note persistence.
//!
//! The engine never talks to the backend directly; everything goes through
//! the [`RemoteService`] trait so shells and tests can substitute their own
//! implementation. The production implementation is [`SupabaseRemote`].

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::{Note, NoteId, NotePatch, UserIdentity};

mod supabase;

pub use supabase::{normalize_service_url, SupabaseRemote};

const EXPIRY_SKEW_SECONDS: i64 = 60;

/// A session-change notification delivered on every auth transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(UserIdentity),
    SignedOut,
}

impl AuthEvent {
    /// The user this event resolves to, absent on sign-out.
    #[must_use]
    pub fn user(&self) -> Option<&UserIdentity> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::SignedOut => None,
        }
    }
}

/// Supported OAuth providers for redirect-based sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

/// Outcome of a sign-up attempt. The backend may require the address to be
/// confirmed before issuing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(UserIdentity),
    ConfirmationRequired,
}

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Remote auth is not configured.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("The code has expired. Please request a new one.")]
    OtpExpired,
    #[error("Invalid code. Please check it and try again.")]
    OtpInvalid,
    #[error("Please check your email and password.")]
    InvalidCredentials,
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Note CRUD failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Notes API error: {0}")]
    Api(String),
    #[error("No active session")]
    NotSignedIn,
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// An authenticated session as issued by the backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: UserIdentity,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now().timestamp() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Pluggable storage for the active session between process runs.
///
/// Shells decide where a session lives (keychain, nothing at all); the
/// facade only calls through this trait.
pub trait SessionPersistence: Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Session persistence that keeps nothing. Every process start begins
/// signed out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

impl SessionPersistence for NoPersistence {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(None)
    }

    fn save_session(&self, _session: &AuthSession) -> AuthResult<()> {
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        Ok(())
    }
}

/// The opaque backend boundary for authentication and note persistence.
///
/// Auth state transitions are delivered through [`RemoteService::subscribe`]
/// in the order they happen; the return values of the sign-in operations
/// deliberately carry no user so that the event stream stays the single
/// source of session truth.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Resolve the current session, if any, e.g. from persisted credentials.
    async fn verify_session(&self) -> AuthResult<Option<UserIdentity>>;

    /// Subscribe to session-change notifications.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<()>;

    /// Create an account. May sign the user in immediately or require email
    /// confirmation first.
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome>;

    /// Start a redirect-based OAuth flow. Completion, if the redirect ever
    /// returns, arrives via the event stream.
    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AuthResult<()>;

    /// Issue a time-limited one-time code to the address.
    async fn request_otp(&self, email: &str) -> AuthResult<()>;

    /// Exchange a previously issued code for a session. The code is assumed
    /// to be well-formed; local validation happens above this boundary.
    async fn verify_otp(&self, email: &str, code: &str) -> AuthResult<()>;

    async fn sign_out(&self) -> AuthResult<()>;

    /// All notes owned by `owner`, most recently updated first.
    async fn list_notes(&self, owner: &str) -> PersistenceResult<Vec<Note>>;

    async fn insert_note(
        &self,
        owner: &str,
        title: &str,
        content: Option<&str>,
    ) -> PersistenceResult<Note>;

    async fn update_note(&self, id: NoteId, patch: &NotePatch) -> PersistenceResult<Note>;

    async fn delete_note(&self, id: NoteId) -> PersistenceResult<()>;
}
