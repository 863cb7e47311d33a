use crate::commands::common::{normalize_content, open_store, resolve_note_body};
use crate::error::CliError;

pub async fn run_add(
    title: &str,
    content_parts: &[String],
    profile: Option<&str>,
) -> Result<(), CliError> {
    let Some(title) = normalize_content(title) else {
        return Err(CliError::EmptyTitle);
    };
    let content = resolve_note_body(content_parts)?;

    let store = open_store(profile).await?;
    let note = store.create(&title, content.as_deref()).await?;

    println!("{}", note.id);
    Ok(())
}
