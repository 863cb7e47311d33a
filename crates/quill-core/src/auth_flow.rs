//! Auth mode controller: which credential form is shown pre-login.
//!
//! A small state machine over [`SessionManager`]. The OTP step is entered
//! only after a code was actually issued, and an OTP failure never leaves
//! the step; the user retries or resends.

use tokio::sync::watch;

use crate::error::Result;
use crate::remote::SignUpOutcome;
use crate::session::SessionManager;

/// The credential form currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
    OtpVerify,
}

/// Observable auth flow state. `pending_email` is meaningful only in
/// `OtpVerify` and equals the address the latest code was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFlowSnapshot {
    pub mode: AuthMode,
    pub pending_email: String,
}

pub struct AuthFlowController {
    session: SessionManager,
    tx: watch::Sender<AuthFlowSnapshot>,
}

impl AuthFlowController {
    #[must_use]
    pub fn new(session: SessionManager) -> Self {
        let (tx, _) = watch::channel(AuthFlowSnapshot {
            mode: AuthMode::SignIn,
            pending_email: String::new(),
        });
        Self { session, tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthFlowSnapshot> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthFlowSnapshot {
        self.tx.borrow().clone()
    }

    pub fn show_sign_in(&self) {
        self.set_mode(AuthMode::SignIn, String::new());
    }

    pub fn show_sign_up(&self) {
        self.set_mode(AuthMode::SignUp, String::new());
    }

    /// Leave the OTP step, discarding the pending address.
    pub fn back_to_sign_in(&self) {
        self.set_mode(AuthMode::SignIn, String::new());
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        self.session.sign_in_with_password(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        self.session.sign_up(email, password).await
    }

    /// Request a one-time code. Only a successful issuance moves the flow to
    /// the OTP step.
    pub async fn request_otp(&self, email: &str) -> Result<()> {
        self.session.request_otp(email).await?;
        self.set_mode(AuthMode::OtpVerify, email.to_string());
        Ok(())
    }

    /// Re-issue a code for the pending address. The mode and pending email
    /// are unchanged; the presentation layer clears any partial input.
    pub async fn resend_otp(&self) -> Result<()> {
        let email = self.snapshot().pending_email;
        self.session.request_otp(&email).await
    }

    /// Verify the entered code against the pending address. On any failure
    /// the flow stays in the OTP step so the user may retry or resend.
    pub async fn verify_pending_otp(&self, code: &str) -> Result<()> {
        let email = self.snapshot().pending_email;
        self.session.verify_otp(&email, code).await
    }

    fn set_mode(&self, mode: AuthMode, pending_email: String) {
        // send_replace publishes even when no receiver currently exists, so
        // a later snapshot() always sees the latest mode.
        self.tx.send_replace(AuthFlowSnapshot {
            mode,
            pending_email,
        });
    }
}
