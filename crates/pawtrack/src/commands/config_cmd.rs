//! Config subcommand handlers.

use std::fmt::Write;

use dialoguer::{Confirm, Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "api_url = \"{}\"", p.api_url);
        if let Some(ref push) = p.push_url {
            let _ = writeln!(out, "push_url = \"{push}\"");
        }
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"{MASK}\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ms) = p.handshake_timeout_ms {
            let _ = writeln!(out, "handshake_timeout_ms = {ms}");
        }
        if let Some(mode) = p.merge_mode {
            let _ = writeln!(out, "merge_mode = \"{mode}\"");
        }
        if let Some(reconnect) = p.reconnect {
            let _ = writeln!(out, "reconnect = {reconnect}");
        }
        if let Some(hours) = p.stats_hours {
            let _ = writeln!(out, "stats_hours = {hours}");
        }
        for z in &p.zones {
            let _ = writeln!(out);
            let _ = writeln!(out, "[[profiles.{name}.zones]]");
            let _ = writeln!(out, "name = \"{}\"", z.name);
            let _ = writeln!(out, "latitude = {}", z.latitude);
            let _ = writeln!(out, "longitude = {}", z.longitude);
            let _ = writeln!(out, "radius_m = {}", z.radius_m);
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_token() -> Result<String, CliError> {
    let token = rpassword::prompt_password("Token: ").map_err(prompt_err)?;
    let token = token.trim().to_owned();
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(token)
}

/// Ask where a freshly entered token should live.
///
/// Returns `Some(token)` for plaintext config, `None` once it is in the keyring.
fn prompt_token_storage(profile_name: &str, token: String) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the token?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_token(profile_name, &token)?;
        eprintln!("   ✓ token stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(token))
    }
}

// ── Init ────────────────────────────────────────────────────────────

fn init(args: ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    let mut cfg = config::load_config_or_default();

    let (name, profile) = match global.api_url {
        // Non-interactive: everything comes from flags.
        Some(ref api_url) => {
            let name = args.name.unwrap_or_else(|| "default".into());
            let profile = Profile {
                api_url: api_url.clone(),
                push_url: global.push_url.clone(),
                token: global.token.clone(),
                token_env: args.token_env,
                insecure: global.insecure.then_some(true),
                timeout: global.timeout,
                ..Profile::default()
            };
            (name, profile)
        }
        None => {
            eprintln!("pawtrack configuration");
            eprintln!("   Config path: {}\n", config_path.display());

            let name: String = Input::new()
                .with_prompt("Profile name")
                .default(args.name.unwrap_or_else(|| "default".into()))
                .interact_text()
                .map_err(prompt_err)?;

            let api_url: String = Input::new()
                .with_prompt("API URL")
                .default("http://localhost:3000".into())
                .interact_text()
                .map_err(prompt_err)?;

            let separate_push = Confirm::new()
                .with_prompt("Does the push server live at a different URL?")
                .default(false)
                .interact()
                .map_err(prompt_err)?;
            let push_url = if separate_push {
                Some(
                    Input::<String>::new()
                        .with_prompt("Push URL")
                        .interact_text()
                        .map_err(prompt_err)?,
                )
            } else {
                None
            };

            let (token, token_env) = match args.token_env {
                Some(env) => (None, Some(env)),
                None => {
                    let token = prompt_token()?;
                    (prompt_token_storage(&name, token)?, None)
                }
            };

            let profile = Profile {
                api_url,
                push_url,
                token,
                token_env,
                ..Profile::default()
            };
            (name, profile)
        }
    };

    // Validate before writing anything.
    pawtrack_config::profile_to_tracker_config(&profile)?;

    cfg.profiles.insert(name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(name.clone());
    }
    config::save_config(&cfg)?;

    eprintln!("✓ Configuration written to {}", config_path.display());
    eprintln!("  Profile: {name}");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(init_args) => init(init_args, global),

        ConfigCommand::Show => {
            let mut cfg = config::load_config_or_default();
            for p in cfg.profiles.values_mut() {
                if p.token.is_some() {
                    p.token = Some(MASK.into());
                }
            }
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                config::config_path().display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { token } => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
                available.sort();
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                });
            }

            let token = match token {
                Some(t) if !t.trim().is_empty() => t.trim().to_owned(),
                Some(_) => {
                    return Err(CliError::Validation {
                        field: "token".into(),
                        reason: "token cannot be empty".into(),
                    });
                }
                None => prompt_token()?,
            };
            config::store_token(&profile_name, &token)?;
            eprintln!("✓ Token for profile '{profile_name}' stored in system keyring");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoneConfig;

    #[test]
    fn redacted_view_masks_tokens_and_lists_zones() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                api_url: "http://localhost:3000".into(),
                token: Some("super-secret".into()),
                zones: vec![ZoneConfig {
                    name: "Park".into(),
                    latitude: 6.2,
                    longitude: -75.5,
                    radius_m: 50.0,
                }],
                ..Profile::default()
            },
        );

        let out = format_config_redacted(&cfg);
        assert!(out.contains("[profiles.home]"));
        assert!(out.contains("token = \"****\""));
        assert!(!out.contains("super-secret"));
        assert!(out.contains("[[profiles.home.zones]]"));
        assert!(out.contains("name = \"Park\""));
    }
}
