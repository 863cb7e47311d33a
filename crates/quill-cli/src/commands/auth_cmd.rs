use std::sync::Arc;

use quill_core::remote::{OAuthProvider, SignUpOutcome};
use quill_core::session::SessionManager;
use quill_core::UserIdentity;

use crate::cli::{AuthCommands, OtpCommands};
use crate::commands::common::{build_remote, resolve_profile, settled_snapshot};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, profile: Option<&str>) -> Result<(), CliError> {
    let (profile_name, profile_config) = resolve_profile(profile)?;
    let remote = build_remote(&profile_name, &profile_config)?;
    let session = SessionManager::start(Arc::new(remote.clone()));
    settled_snapshot(&session).await;

    match command {
        AuthCommands::Login { email, password } => {
            session.sign_in_with_password(&email, &password).await?;
            let user = wait_for_user(&session).await?;
            println!("Signed in as {}", user.email_label());
            Ok(())
        }
        AuthCommands::Signup { email, password } => {
            match session.sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(user) => {
                    println!("Account created; signed in as {}", user.email_label());
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!("Account created. Check {email} for a confirmation link.");
                }
            }
            Ok(())
        }
        AuthCommands::Oauth { provider } => {
            let provider = OAuthProvider::from(provider);
            session.sign_in_with_oauth(provider).await?;
            println!("Open this URL in your browser to continue sign-in:");
            println!("{}", remote.authorize_url(provider));
            println!("Once the redirect completes, run `quill auth status`.");
            Ok(())
        }
        AuthCommands::Otp { command } => run_otp(command, &session).await,
        AuthCommands::Status => {
            let snapshot = settled_snapshot(&session).await;
            match snapshot.user {
                Some(user) => println!("Signed in as {}", user.email_label()),
                None => println!("Not signed in."),
            }
            Ok(())
        }
        AuthCommands::Logout => {
            session.sign_out().await?;
            println!("Signed out.");
            Ok(())
        }
    }
}

async fn run_otp(command: OtpCommands, session: &SessionManager) -> Result<(), CliError> {
    match command {
        OtpCommands::Request { email } => {
            session.request_otp(&email).await?;
            println!("Code sent to {email}. Run `quill auth otp verify` with it.");
            Ok(())
        }
        OtpCommands::Verify { email, code } => {
            session.verify_otp(&email, &code).await?;
            let user = wait_for_user(session).await?;
            println!("Signed in as {}", user.email_label());
            Ok(())
        }
    }
}

/// Wait for the acknowledged sign-in to land through the event stream.
async fn wait_for_user(session: &SessionManager) -> Result<UserIdentity, CliError> {
    let mut receiver = session.subscribe();
    loop {
        if let Some(user) = receiver.borrow_and_update().user.clone() {
            return Ok(user);
        }
        if receiver.changed().await.is_err() {
            return Err(CliError::NotSignedIn);
        }
    }
}
