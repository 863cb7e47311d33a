use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Your notes, synced from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for auth/sync configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title
        title: String,
        /// Optional note body (opens $EDITOR when omitted and stdin is a TTY)
        content: Vec<String>,
    },
    /// List recent notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Filter notes by a title/body substring
        #[arg(short, long)]
        query: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// New title (body is untouched when only this is set)
        #[arg(long, value_name = "TITLE")]
        title: Option<String>,
        /// Edit the body in $EDITOR even when --title is set
        #[arg(long)]
        body: bool,
    },
    /// Delete an existing note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authenticate a CLI profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show resolved profile config
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email/password and store the session in the keychain
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account with email/password
    Signup {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Start a browser-redirect OAuth sign-in
    Oauth {
        /// Identity provider
        #[arg(value_enum)]
        provider: OAuthProviderArg,
    },
    /// Email one-time code sign-in
    Otp {
        #[command(subcommand)]
        command: OtpCommands,
    },
    /// Show auth status for the profile
    Status,
    /// Sign out and clear the stored session
    Logout,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OAuthProviderArg {
    Google,
    Github,
}

impl From<OAuthProviderArg> for quill_core::remote::OAuthProvider {
    fn from(value: OAuthProviderArg) -> Self {
        match value {
            OAuthProviderArg::Google => Self::Google,
            OAuthProviderArg::Github => Self::Github,
        }
    }
}

#[derive(Subcommand)]
pub enum OtpCommands {
    /// Email a one-time sign-in code
    Request {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
    },
    /// Exchange a received code for a session
    Verify {
        /// Account email the code was sent to
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// The 6-digit code
        #[arg(long, value_name = "CODE")]
        code: String,
    },
}
