use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use quill_core::remote::{RemoteService, SupabaseRemote};
use quill_core::session::{SessionManager, SessionSnapshot};
use quill_core::store::NoteStore;
use quill_core::{Note, NoteId, UserIdentity};
use serde::Serialize;

use crate::auth::SessionStore;
use crate::config::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn resolve_profile(global_profile: Option<&str>) -> Result<(String, CliProfile), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let profile = config.profile(&profile_name).cloned().ok_or_else(|| {
        CliError::Config(format!(
            "Profile '{profile_name}' is not configured. Run `quill config init --profile {profile_name}` first."
        ))
    })?;
    Ok((profile_name, profile))
}

pub fn build_remote(
    profile_name: &str,
    profile: &CliProfile,
) -> Result<SupabaseRemote<SessionStore>, CliError> {
    let url = profile.supabase_url().ok_or_else(|| {
        CliError::Config(format!(
            "Profile '{profile_name}' is missing a Supabase URL. Set it via `quill config init`."
        ))
    })?;
    let anon_key = profile.supabase_anon_key().ok_or_else(|| {
        CliError::Config(format!(
            "Profile '{profile_name}' is missing a Supabase anon key. Set it via `quill config init`."
        ))
    })?;

    SupabaseRemote::new(&url, anon_key, SessionStore::new(profile_name))
        .map_err(|error| CliError::Auth(error.to_string()))
}

/// Wait for the initial session restore to finish.
pub async fn settled_snapshot(session: &SessionManager) -> SessionSnapshot {
    let mut receiver = session.subscribe();
    loop {
        let snapshot = receiver.borrow_and_update().clone();
        if !snapshot.loading {
            return snapshot;
        }
        if receiver.changed().await.is_err() {
            return snapshot;
        }
    }
}

pub async fn signed_in_user(session: &SessionManager) -> Result<UserIdentity, CliError> {
    settled_snapshot(session)
        .await
        .user
        .ok_or(CliError::NotSignedIn)
}

/// Build a loaded note store for the signed-in user of the profile.
pub async fn open_store(global_profile: Option<&str>) -> Result<NoteStore, CliError> {
    let (profile_name, profile) = resolve_profile(global_profile)?;
    let remote = build_remote(&profile_name, &profile)?;
    let remote: Arc<dyn RemoteService> = Arc::new(remote);
    let session = SessionManager::start(Arc::clone(&remote));
    let user = signed_in_user(&session).await?;

    let store = NoteStore::new(remote, user);
    let notes = store.load().await?;
    tracing::debug!("Loaded {} notes for profile '{}'", notes.len(), profile_name);
    Ok(store)
}

pub fn resolve_note(store: &NoteStore, note_query: &str) -> Result<Note, CliError> {
    let snapshot = store.snapshot();

    if let Ok(note_id) = note_query.parse::<NoteId>() {
        if let Some(note) = snapshot.get(note_id) {
            return Ok(note.clone());
        }
    }

    let matches = snapshot
        .notes
        .iter()
        .filter(|note| note.id.to_string().starts_with(note_query))
        .take(3)
        .cloned()
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Err(CliError::NoteNotFound(note_query.to_string())),
        [only] => Ok(only.clone()),
        _ => {
            let options = matches
                .iter()
                .map(|note| note.id.to_string().chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub relative_time: String,
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note.title_preview(80),
        content: note.content_or_empty().to_string(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at.timestamp_millis(), now_ms),
    }
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let id = note.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let preview = note.title_preview(40);
            let relative_time = format_relative_time(note.updated_at.timestamp_millis(), now_ms);
            format!("{short_id:<13}  {preview:<40}  {relative_time}")
        })
        .collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn resolve_note_body(content_parts: &[String]) -> Result<Option<String>, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(Some(content));
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(Some(content));
    }

    capture_editor_input()
}

fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // Fallback for editor commands with args, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("quill-note-{}-{now}.md", std::process::id()))
}
