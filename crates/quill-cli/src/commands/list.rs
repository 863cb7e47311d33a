use crate::commands::common::{format_note_lines, note_to_list_item, open_store, NoteListItem};
use crate::error::CliError;

pub async fn run_list(
    limit: usize,
    query: Option<&str>,
    as_json: bool,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let store = open_store(profile).await?;

    let mut notes = match query {
        Some(query) => store.filter(query),
        None => store.snapshot().notes,
    };
    notes.truncate(limit);

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
