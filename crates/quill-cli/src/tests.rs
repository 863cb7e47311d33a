use chrono::{TimeZone, Utc};
use quill_core::{Note, NoteId};

use crate::commands::common::{
    default_editor, format_note_lines, format_relative_time, normalize_content,
    normalize_note_identifier, note_to_list_item,
};
use crate::commands::config::validate_supabase_url;
use crate::config::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

fn sample_note(title: &str, content: Option<&str>) -> Note {
    let id = "11111111-1111-4111-8111-111111111111"
        .parse::<NoteId>()
        .unwrap();
    Note {
        id,
        owner: "user-1".to_string(),
        title: title.to_string(),
        content: content.map(str::to_string),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        updated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_content_keeps_multiline_text() {
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn normalize_note_identifier_rejects_blank_input() {
    assert!(matches!(
        normalize_note_identifier("   "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(normalize_note_identifier(" abc ").unwrap(), "abc");
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn note_lines_start_with_the_short_id() {
    let lines = format_note_lines(&[sample_note("Groceries", None)]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("11111111-1111"));
    assert!(lines[0].contains("Groceries"));
}

#[test]
fn list_item_renders_absent_body_as_empty() {
    let item = note_to_list_item(&sample_note("Groceries", None));
    assert_eq!(item.content, "");
    assert_eq!(item.title, "Groceries");
}

#[test]
fn validate_supabase_url_requires_http_scheme() {
    assert!(validate_supabase_url("https://demo.supabase.co".to_string()).is_ok());
    assert!(validate_supabase_url("demo.supabase.co".to_string()).is_err());
}

#[test]
fn profile_name_falls_back_to_default() {
    let config = CliProfilesConfig::default();
    assert_eq!(config.resolve_profile_name(Some("work")), "work");
    assert_eq!(config.resolve_profile_name(Some("  ")), "default");
}

#[test]
fn active_profile_wins_over_the_default() {
    let config = CliProfilesConfig {
        active_profile: Some("personal".to_string()),
        ..CliProfilesConfig::default()
    };
    assert_eq!(config.resolve_profile_name(None), "personal");
}

#[test]
fn config_round_trips_through_disk() {
    let dir = std::env::temp_dir().join(format!("quill-config-test-{}", std::process::id()));
    let path = dir.join("cli-config.json");

    let mut config = CliProfilesConfig::default();
    config.upsert_profile(
        "work",
        CliProfile {
            supabase_url: Some("https://demo.supabase.co".to_string()),
            supabase_anon_key: Some("anon".to_string()),
        },
    );
    config.active_profile = Some("work".to_string());
    config.save_to_path(&path).unwrap();

    let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
    assert_eq!(loaded.active_profile, config.active_profile);
    assert_eq!(loaded.profiles, config.profiles);

    let _ = std::fs::remove_dir_all(&dir);
}
