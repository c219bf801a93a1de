use std::{fs, path::Path};

use anyhow::{anyhow, Context};
use feedback_core::ReplyLookup;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "feedback_admin.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub max_in_flight: Option<usize>,
    pub reply_lookup: ReplyLookup,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".into(),
            auth_token: None,
            max_in_flight: None,
            reply_lookup: ReplyLookup::ByFeedback,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    auth_token: Option<String>,
    max_in_flight: Option<usize>,
    reply_lookup: Option<String>,
}

/// Defaults, then the config file (if present), then the environment.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if config_path.is_some() => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.auth_token {
        settings.auth_token = Some(v);
    }
    if let Some(v) = file_cfg.max_in_flight {
        settings.max_in_flight = (v > 0).then_some(v);
    }
    if let Some(v) = file_cfg.reply_lookup {
        settings.reply_lookup = parse_reply_lookup(&v)?;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("FEEDBACK_API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("FEEDBACK_AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }
    if let Some(v) = lookup("APP__AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }

    if let Some(v) = lookup("APP__MAX_IN_FLIGHT") {
        let parsed = v
            .parse::<usize>()
            .with_context(|| format!("APP__MAX_IN_FLIGHT must be a positive integer, got '{v}'"))?;
        settings.max_in_flight = (parsed > 0).then_some(parsed);
    }

    if let Some(v) = lookup("APP__REPLY_LOOKUP") {
        settings.reply_lookup = parse_reply_lookup(&v)?;
    }
    Ok(())
}

fn parse_reply_lookup(raw: &str) -> anyhow::Result<ReplyLookup> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "feedback" | "by_feedback" => Ok(ReplyLookup::ByFeedback),
        "email" | "by_email" => Ok(ReplyLookup::ByEmail),
        other => Err(anyhow!("unknown reply lookup '{other}' (expected feedback or email)")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            r#"
            api_base_url = "https://backend.example.com/api"
            max_in_flight = 8
            reply_lookup = "email"
            "#,
        )
        .expect("apply");

        assert_eq!(settings.api_base_url, "https://backend.example.com/api");
        assert_eq!(settings.max_in_flight, Some(8));
        assert_eq!(settings.reply_lookup, ReplyLookup::ByEmail);
        assert_eq!(settings.auth_token, None);
    }

    #[test]
    fn app_prefixed_env_wins_over_plain_env() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env(&[
                ("FEEDBACK_API_BASE_URL", "http://plain"),
                ("APP__API_BASE_URL", "http://prefixed"),
                ("FEEDBACK_AUTH_TOKEN", "token-1"),
            ]),
        )
        .expect("apply");

        assert_eq!(settings.api_base_url, "http://prefixed");
        assert_eq!(settings.auth_token.as_deref(), Some("token-1"));
    }

    #[test]
    fn zero_in_flight_means_unbounded() {
        let mut settings = Settings::default();
        apply_env(&mut settings, env(&[("APP__MAX_IN_FLIGHT", "0")])).expect("apply");
        assert_eq!(settings.max_in_flight, None);
    }

    #[test]
    fn zero_in_flight_in_file_means_unbounded() {
        let mut settings = Settings {
            max_in_flight: Some(4),
            ..Settings::default()
        };
        apply_file(&mut settings, "max_in_flight = 0").expect("apply");
        assert_eq!(settings.max_in_flight, None);
    }

    #[test]
    fn rejects_unknown_reply_lookup() {
        let mut settings = Settings::default();
        assert!(apply_env(&mut settings, env(&[("APP__REPLY_LOOKUP", "sms")])).is_err());
        assert!(apply_file(&mut settings, "max_in_flight = \"many\"").is_err());
    }

    #[test]
    fn explicit_missing_config_file_is_an_error() {
        let missing = std::env::temp_dir().join("feedback_admin_missing_config.toml");
        assert!(load_settings(Some(&missing)).is_err());
    }
}
