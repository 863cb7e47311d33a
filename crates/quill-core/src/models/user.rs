//! Authenticated user identity

use serde::{Deserialize, Serialize};

/// The identity of an authenticated user as reported by the remote service.
///
/// The `id` is opaque; the email may be absent for OAuth identities that do
/// not share one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
}

impl UserIdentity {
    /// Display label for the user, falling back when no email is known.
    #[must_use]
    pub fn email_label(&self) -> &str {
        self.email.as_deref().unwrap_or("(no email)")
    }
}
