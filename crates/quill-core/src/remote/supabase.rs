//! Supabase-backed implementation of the remote service facade.
//!
//! Auth goes through the GoTrue endpoints under `/auth/v1`; note rows live in
//! a `notes` table reached through PostgREST under `/rest/v1`.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::models::{Note, NoteId, NotePatch, UserIdentity};
use crate::util::{compact_text, is_http_url};

use super::{
    AuthError, AuthEvent, AuthResult, AuthSession, OAuthProvider, PersistenceError,
    PersistenceResult, RemoteService, SessionPersistence, SignUpOutcome,
};

const EVENT_CHANNEL_CAPACITY: usize = 16;

pub struct SupabaseRemote<S: SessionPersistence> {
    auth_url: String,
    rest_url: String,
    anon_key: String,
    oauth_redirect: Option<String>,
    client: Client,
    store: Arc<S>,
    session: Arc<RwLock<Option<AuthSession>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl<S: SessionPersistence> Clone for SupabaseRemote<S> {
    fn clone(&self) -> Self {
        Self {
            auth_url: self.auth_url.clone(),
            rest_url: self.rest_url.clone(),
            anon_key: self.anon_key.clone(),
            oauth_redirect: self.oauth_redirect.clone(),
            client: self.client.clone(),
            store: Arc::clone(&self.store),
            session: Arc::clone(&self.session),
            events: self.events.clone(),
        }
    }
}

impl<S: SessionPersistence> SupabaseRemote<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let base = normalize_service_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            auth_url: format!("{base}/auth/v1"),
            rest_url: format!("{base}/rest/v1"),
            anon_key,
            oauth_redirect: None,
            client: Client::builder().build()?,
            store: Arc::new(store),
            session: Arc::new(RwLock::new(None)),
            events,
        })
    }

    /// Set the redirect target appended to OAuth authorize URLs.
    #[must_use]
    pub fn with_oauth_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.oauth_redirect = Some(redirect.into());
        self
    }

    /// The browser URL that starts a redirect-based OAuth sign-in.
    pub fn authorize_url(&self, provider: OAuthProvider) -> String {
        let mut url = format!(
            "{}/authorize?provider={}",
            self.auth_url,
            provider.as_str()
        );
        if let Some(redirect) = &self.oauth_redirect {
            url.push_str("&redirect_to=");
            url.push_str(&urlencoding::encode(redirect));
        }
        url
    }

    fn current_session(&self) -> Option<AuthSession> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }

    fn install_session(&self, session: AuthSession, notify: bool) -> AuthResult<()> {
        self.store.save_session(&session)?;
        let user = session.user.clone();
        if let Ok(mut guard) = self.session.write() {
            *guard = Some(session);
        }
        if notify {
            let _ = self.events.send(AuthEvent::SignedIn(user));
        }
        Ok(())
    }

    fn drop_session(&self, notify: bool) -> AuthResult<()> {
        if let Ok(mut guard) = self.session.write() {
            *guard = None;
        }
        if notify {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
        self.store.clear_session()
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({ "refresh_token": refresh_token });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Refresh response did not include an active session".to_string())
        })?;

        // Same user, so no session-change event.
        self.install_session(session.clone(), false)?;
        Ok(session)
    }

    /// Bearer token for note requests, refreshed through the refresh grant
    /// when the stored one has expired.
    async fn bearer_for_notes(&self) -> PersistenceResult<String> {
        let session = self
            .current_session()
            .ok_or(PersistenceError::NotSignedIn)?;
        if !session.is_expired() {
            return Ok(session.access_token);
        }

        let refreshed = self
            .refresh_session(&session.refresh_token)
            .await
            .map_err(|error| PersistenceError::Api(format!("session refresh failed: {error}")))?;
        Ok(refreshed.access_token)
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    fn rest_request(&self, request: RequestBuilder, access_token: &str) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<SupabaseAuthResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_auth_error(status, &body));
        }
        Ok(response.json::<SupabaseAuthResponse>().await?)
    }

    async fn read_notes_rows(&self, response: reqwest::Response) -> PersistenceResult<Vec<Note>> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<Vec<Note>>().await?)
    }
}

#[async_trait]
impl<S: SessionPersistence> RemoteService for SupabaseRemote<S> {
    async fn verify_session(&self) -> AuthResult<Option<UserIdentity>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            let user = stored_session.user.clone();
            self.install_session(stored_session, false)?;
            return Ok(Some(user));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed.user)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.drop_session(false)?;
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<()> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&payload),
        );

        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Sign-in response did not include an active session".to_string())
        })?;

        self.install_session(session, true)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        match response.into_session()? {
            Some(session) => {
                let user = session.user.clone();
                self.install_session(session, true)?;
                Ok(SignUpOutcome::SignedIn(user))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AuthResult<()> {
        // The redirect runs in the user's browser; if it ever completes, the
        // backend session lands through a later verify/refresh. No client
        // timeout is imposed.
        let url = self.authorize_url(provider);
        tracing::info!("Continue sign-in with {} at {}", provider.as_str(), url);
        Ok(())
    }

    async fn request_otp(&self, email: &str) -> AuthResult<()> {
        if email.trim().is_empty() {
            return Err(AuthError::Api("Email is required".to_string()));
        }

        let payload = serde_json::json!({
            "email": email,
            "create_user": true,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/otp", self.auth_url))
                .json(&payload),
        );

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_auth_error(status, &body));
        }
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> AuthResult<()> {
        let payload = serde_json::json!({
            "email": email,
            "token": code,
            "type": "email",
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/verify", self.auth_url))
                .json(&payload),
        );

        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Verify response did not include an active session".to_string())
        })?;

        self.install_session(session, true)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let session = self.current_session();

        // Local state is cleared before the remote call so the client ends
        // up signed out even when the backend is unreachable.
        self.drop_session(true)?;

        let Some(session) = session else {
            return Ok(());
        };

        let request = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token);

        let response = request.send().await?;
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_auth_error(status, &body));
        }
        Ok(())
    }

    async fn list_notes(&self, owner: &str) -> PersistenceResult<Vec<Note>> {
        let token = self.bearer_for_notes().await?;
        let response = self
            .rest_request(
                self.client
                    .get(format!("{}/notes", self.rest_url))
                    .query(&[
                        ("select", "*"),
                        ("user_id", &format!("eq.{owner}")),
                        ("order", "updated_at.desc"),
                    ]),
                &token,
            )
            .send()
            .await?;
        self.read_notes_rows(response).await
    }

    async fn insert_note(
        &self,
        owner: &str,
        title: &str,
        content: Option<&str>,
    ) -> PersistenceResult<Note> {
        let token = self.bearer_for_notes().await?;
        let payload = serde_json::json!([{
            "user_id": owner,
            "title": title,
            "content": content,
        }]);
        let response = self
            .rest_request(
                self.client
                    .post(format!("{}/notes", self.rest_url))
                    .header("Prefer", "return=representation")
                    .json(&payload),
                &token,
            )
            .send()
            .await?;

        let mut rows = self.read_notes_rows(response).await?;
        rows.pop()
            .ok_or_else(|| PersistenceError::Api("Insert returned no row".to_string()))
    }

    async fn update_note(&self, id: NoteId, patch: &NotePatch) -> PersistenceResult<Note> {
        let token = self.bearer_for_notes().await?;
        // Unset patch fields must stay out of the payload entirely so the
        // columns keep their values.
        let mut payload = serde_json::to_value(patch)?;
        if let serde_json::Value::Object(row) = &mut payload {
            row.insert(
                "updated_at".to_string(),
                serde_json::Value::String(Utc::now().to_rfc3339()),
            );
        }
        let response = self
            .rest_request(
                self.client
                    .patch(format!("{}/notes", self.rest_url))
                    .query(&[("id", format!("eq.{id}"))])
                    .header("Prefer", "return=representation")
                    .json(&payload),
                &token,
            )
            .send()
            .await?;

        let mut rows = self.read_notes_rows(response).await?;
        rows.pop()
            .ok_or_else(|| PersistenceError::Api(format!("No note row matched id {id}")))
    }

    async fn delete_note(&self, id: NoteId) -> PersistenceResult<()> {
        let token = self.bearer_for_notes().await?;
        let response = self
            .rest_request(
                self.client
                    .delete(format!("{}/notes", self.rest_url))
                    .query(&[("id", format!("eq.{id}"))]),
                &token,
            )
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }
}

/// Normalize a Supabase project URL to its scheme://host[:port] base.
///
/// A trailing `/auth/v1` or `/rest/v1` segment is tolerated and stripped.
pub fn normalize_service_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !is_http_url(trimmed) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }

    let base = trimmed
        .strip_suffix("/auth/v1")
        .or_else(|| trimmed.strip_suffix("/rest/v1"))
        .unwrap_or(trimmed);
    Ok(base.to_string())
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
    session: Option<SupabaseAuthResponseSession>,
}

impl SupabaseAuthResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let nested = self.session;
        let access_token = self
            .access_token
            .or_else(|| nested.as_ref().and_then(|session| session.access_token.clone()));
        let refresh_token = self
            .refresh_token
            .or_else(|| nested.as_ref().and_then(|session| session.refresh_token.clone()));
        let expires_at = self
            .expires_at
            .or_else(|| nested.as_ref().and_then(|session| session.expires_at))
            .or_else(|| {
                self.expires_in
                    .or_else(|| nested.as_ref().and_then(|session| session.expires_in))
                    .map(|expires_in| Utc::now().timestamp().saturating_add(expires_in))
            });
        let user = self
            .user
            .or_else(|| nested.and_then(|session| session.user))
            .map(Into::into);

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponseSession {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

impl From<SupabaseUser> for UserIdentity {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: value.id,
            email: value.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    error_code: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

impl SupabaseErrorResponse {
    fn message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

/// Map an auth error body to the taxonomy the session layer depends on.
///
/// GoTrue reports OTP failures either through an `error_code` or a message
/// fragment, depending on version; both spellings are handled.
fn classify_auth_error(status: StatusCode, body: &str) -> AuthError {
    if let Ok(payload) = serde_json::from_str::<SupabaseErrorResponse>(body) {
        if let Some(code) = payload.error_code.as_deref() {
            match code {
                "otp_expired" => return AuthError::OtpExpired,
                "otp_disabled" | "otp_invalid" => return AuthError::OtpInvalid,
                "invalid_credentials" => return AuthError::InvalidCredentials,
                _ => {}
            }
        }
        if let Some(message) = payload.message() {
            if message.contains("Token has expired") {
                return AuthError::OtpExpired;
            }
            if message.contains("Invalid token") {
                return AuthError::OtpInvalid;
            }
            if message.contains("Invalid login credentials") {
                return AuthError::InvalidCredentials;
            }
            return AuthError::Api(format!("{} ({})", message.trim(), status.as_u16()));
        }
    }

    AuthError::Api(parse_api_error(status, body))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SupabaseErrorResponse>(body) {
        if let Some(message) = payload.message() {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
