//! Session manager: the single owner of the `{user, loading}` projection.
//!
//! All three credential paths (password, OAuth, one-time code) funnel into
//! the same outcome: a session-change event from the remote facade. The
//! manager applies those events in arrival order from one listener task; the
//! operations below never write the projection themselves, with the single
//! exception of sign-out's local clear.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::error::{Error, Result};
use crate::models::UserIdentity;
use crate::remote::{AuthEvent, OAuthProvider, RemoteService, SignUpOutcome};
use crate::util::is_six_digit_code;

/// Observable session state.
///
/// `loading` is true only between process start and the resolution of the
/// initial session check; every published snapshot after that carries a
/// determinate user state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<UserIdentity>,
    pub loading: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Clone)]
pub struct SessionManager {
    remote: Arc<dyn RemoteService>,
    tx: watch::Sender<SessionSnapshot>,
}

impl SessionManager {
    /// Start the manager: publish `loading=true`, resolve the initial
    /// session, then follow the facade's event stream for the rest of the
    /// manager's life.
    pub fn start(remote: Arc<dyn RemoteService>) -> Self {
        let (tx, _) = watch::channel(SessionSnapshot {
            user: None,
            loading: true,
        });
        let manager = Self { remote, tx };

        let remote = Arc::clone(&manager.remote);
        let tx = manager.tx.clone();
        // Subscribe before this constructor returns so no transition between
        // construction and the listener's first poll is missed.
        let events = remote.subscribe();
        tokio::spawn(async move {
            let initial = match remote.verify_session().await {
                Ok(user) => user,
                Err(error) => {
                    tracing::warn!("Initial session check failed: {}", error);
                    None
                }
            };
            tx.send_replace(SessionSnapshot {
                user: initial,
                loading: false,
            });

            Self::follow_events(events, tx).await;
        });

        manager
    }

    async fn follow_events(
        mut events: broadcast::Receiver<AuthEvent>,
        tx: watch::Sender<SessionSnapshot>,
    ) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tx.send_replace(SessionSnapshot {
                        user: event.user().cloned(),
                        loading: false,
                    });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Intermediate transitions were dropped; the next event
                    // still carries the latest state, so keep following.
                    tracing::warn!("Session event stream lagged by {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Receiver for session snapshots. The current value is observable
    /// immediately.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// The current session snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<()> {
        // Success reaches the projection through the facade's event stream,
        // not through this return value.
        self.remote.sign_in_with_password(email, password).await?;
        Ok(())
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        Ok(self.remote.sign_up(email, password).await?)
    }

    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> Result<()> {
        self.remote.sign_in_with_oauth(provider).await?;
        Ok(())
    }

    pub async fn request_otp(&self, email: &str) -> Result<()> {
        self.remote.request_otp(email).await?;
        Ok(())
    }

    /// Verify a one-time code. Codes that are not exactly 6 digits are
    /// rejected locally without a remote call.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<()> {
        if !is_six_digit_code(code) {
            return Err(Error::Validation(
                "Please enter a valid 6-digit OTP".to_string(),
            ));
        }
        self.remote.verify_otp(email, code).await?;
        Ok(())
    }

    /// Sign out. The local session is cleared even when the remote call
    /// fails; the failure is still surfaced to the caller as non-fatal.
    pub async fn sign_out(&self) -> Result<()> {
        self.tx.send_replace(SessionSnapshot {
            user: None,
            loading: false,
        });

        self.remote.sign_out().await?;
        Ok(())
    }
}
