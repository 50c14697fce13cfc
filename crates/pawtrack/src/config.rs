//! CLI configuration: thin wrapper around `pawtrack_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--api-url, --token, --timeout, ...).

use std::time::Duration;

use secrecy::SecretString;

use pawtrack_core::{MergeMode, TlsVerification, TrackerConfig};

use crate::cli::{GlobalOpts, MergeArg};
use crate::error::CliError;

pub use pawtrack_config::{
    Config, Profile, ZoneConfig, config_path, load_config, load_config_or_default, save_config,
    store_token,
};

/// A fully resolved invocation target.
pub struct Resolved {
    pub profile_name: String,
    pub tracker: TrackerConfig,
    pub token: SecretString,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Config file + profile + CLI overrides.
///
/// Without a matching profile, `--api-url` and `--token` alone are enough.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        let mut tracker = pawtrack_config::profile_to_tracker_config(profile)?;
        apply_overrides(&mut tracker, global)?;
        let token = match global.token {
            Some(ref token) => SecretString::from(token.clone()),
            None => pawtrack_config::resolve_token(profile, &profile_name)?,
        };
        return Ok(Resolved {
            profile_name,
            tracker,
            token,
        });
    }

    let Some(ref raw) = global.api_url else {
        if global.profile.is_some() {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available.join(", "),
            });
        }
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    };

    let mut tracker = TrackerConfig::new(parse_url("api_url", raw)?);
    apply_overrides(&mut tracker, global)?;
    let token = global
        .token
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.clone(),
        })?;

    Ok(Resolved {
        profile_name,
        tracker,
        token,
    })
}

/// CLI flag overrides take priority over profile values.
fn apply_overrides(tracker: &mut TrackerConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref raw) = global.api_url {
        tracker.api_url = parse_url("api_url", raw)?;
    }
    match global.push_url {
        Some(ref raw) => tracker.push_url = parse_push_url(raw)?,
        None if global.api_url.is_some() => tracker.push_url = tracker.api_url.clone(),
        None => {}
    }
    if global.insecure {
        tracker.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        tracker.timeout = Duration::from_secs(secs);
    }
    if let Some(merge) = global.merge {
        tracker.merge_mode = match merge {
            MergeArg::PushPrecedence => MergeMode::PushPrecedence,
            MergeArg::Freshest => MergeMode::Freshest,
        };
    }
    Ok(())
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

fn parse_push_url(raw: &str) -> Result<url::Url, CliError> {
    let url = parse_url("push_url", raw)?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(url),
        other => Err(CliError::Validation {
            field: "push_url".into(),
            reason: format!("unsupported scheme '{other}' (expected http, https, ws or wss)"),
        }),
    }
}

/// Zones of the active profile, or the default home zone. Needs no token.
pub fn zones(global: &GlobalOpts) -> Result<Vec<pawtrack_core::GeofenceZone>, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let configured = cfg
        .profiles
        .get(&profile_name)
        .map(|p| p.zones.as_slice())
        .unwrap_or_default();

    if configured.is_empty() {
        return Ok(vec![pawtrack_core::GeofenceZone::default_home()]);
    }
    Ok(configured
        .iter()
        .map(ZoneConfig::to_zone)
        .collect::<Result<_, _>>()?)
}
