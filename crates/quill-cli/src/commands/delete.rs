use crate::commands::common::{normalize_note_identifier, open_store, resolve_note};
use crate::error::CliError;

pub async fn run_delete(id: &str, profile: Option<&str>) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let store = open_store(profile).await?;
    let note = resolve_note(&store, &normalized_id)?;

    store.delete(note.id).await?;
    println!("{}", note.id);
    Ok(())
}
