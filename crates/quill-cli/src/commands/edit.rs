use quill_core::editor::EditSession;

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_content, normalize_note_identifier, open_store,
    resolve_note,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    title: Option<&str>,
    edit_body: bool,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let store = open_store(profile).await?;
    let note = resolve_note(&store, &normalized_id)?;

    let new_title = match title {
        Some(title) => Some(normalize_content(title).ok_or(CliError::EmptyTitle)?),
        None => None,
    };

    // Open the editor for the body unless this is a title-only edit.
    let new_body = if edit_body || new_title.is_none() {
        capture_editor_input_with_initial(note.content_or_empty())?
    } else {
        None
    };

    let editor = EditSession::new(store);
    editor.bind(&note);
    if let Some(title) = new_title {
        editor.set_title(title);
    }
    if let Some(body) = new_body {
        editor.set_content(body);
    }
    editor.save().await?;

    println!("{}", note.id);
    Ok(())
}
