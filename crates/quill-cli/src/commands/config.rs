use quill_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            supabase_url,
            supabase_anon_key,
            no_activate,
        ),
        ConfigCommands::Show { profile } => {
            run_config_show(profile.as_deref().or(global_profile))
        }
    }
}

fn run_config_init(
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let supabase_url = match normalize_text_option(supabase_url) {
        Some(url) => Some(validate_supabase_url(url)?),
        None => existing.supabase_url,
    };
    let supabase_anon_key =
        normalize_text_option(supabase_anon_key).or(existing.supabase_anon_key);

    config.upsert_profile(
        &profile_name,
        CliProfile {
            supabase_url,
            supabase_anon_key,
        },
    );
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Saved profile '{}' to {}", profile_name, path.display());
    Ok(())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    println!("profile: {profile_name}");
    println!(
        "supabase_url: {}",
        profile.supabase_url().as_deref().unwrap_or("(unset)")
    );
    println!(
        "supabase_anon_key: {}",
        if profile.supabase_anon_key().is_some() {
            "(set)"
        } else {
            "(unset)"
        }
    );
    Ok(())
}

pub fn validate_supabase_url(url: String) -> Result<String, CliError> {
    if is_http_url(&url) {
        Ok(url)
    } else {
        Err(CliError::Config(format!(
            "Supabase URL must start with http:// or https://, got '{url}'"
        )))
    }
}
