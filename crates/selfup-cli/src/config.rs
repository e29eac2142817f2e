use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use selfup_completion::{ApiKey, CompletionSettings};
use serde::Deserialize;

pub(crate) const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub(crate) const BASE_URL_ENV: &str = "SELFUP_BASE_URL";
pub(crate) const MODEL_ENV: &str = "SELFUP_MODEL";
pub(crate) const TIMEOUT_ENV: &str = "SELFUP_TIMEOUT_SECS";

/// Optional `selfup.toml` at the project root.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigFile {
    #[serde(default)]
    pub(crate) completion: CompletionSection,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct CompletionSection {
    pub(crate) base_url: Option<String>,
    pub(crate) model: Option<String>,
    pub(crate) timeout_secs: Option<u64>,
}

pub(crate) fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed reading config: {}", path.display()));
        }
    };

    toml::from_str(&raw).with_context(|| format!("failed parsing config: {}", path.display()))
}

/// Variables from the project's `.env`, without touching the process
/// environment. A missing file yields no variables.
pub(crate) fn read_dotenv_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) if err.not_found() => return Ok(HashMap::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed reading env file: {}", path.display()));
        }
    };

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) =
            item.with_context(|| format!("failed parsing env file: {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Process environment first, then the project's `.env`. Empty process
/// values fall through to the file.
pub(crate) fn layered_env<'a, F>(
    process: F,
    dotenv: &'a HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> + 'a
where
    F: Fn(&str) -> Option<String> + 'a,
{
    move |key| {
        process(key)
            .filter(|value| !value.trim().is_empty())
            .or_else(|| dotenv.get(key).cloned())
    }
}

/// Environment beats the config file, which beats built-in defaults.
/// The API key is only ever taken from the environment.
pub(crate) fn resolve_completion_settings<F>(file: &ConfigFile, env: F) -> Result<CompletionSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

    let api_key = lookup(API_KEY_ENV)
        .ok_or_else(|| anyhow!("{API_KEY_ENV} is not set; cannot call the completion service"))?;
    let mut settings = CompletionSettings::new(ApiKey::new(api_key.trim()));

    if let Some(base_url) = lookup(BASE_URL_ENV).or_else(|| file.completion.base_url.clone()) {
        settings.base_url = base_url.trim().to_string();
    }
    if let Some(model) = lookup(MODEL_ENV).or_else(|| file.completion.model.clone()) {
        settings.model = model.trim().to_string();
    }

    let timeout_secs = match lookup(TIMEOUT_ENV) {
        Some(raw) => Some(
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("{TIMEOUT_ENV} must be a whole number of seconds"))?,
        ),
        None => file.completion.timeout_secs,
    };
    if let Some(timeout_secs) = timeout_secs {
        if timeout_secs == 0 {
            return Err(anyhow!("completion timeout must be greater than zero seconds"));
        }
        settings.timeout = Duration::from_secs(timeout_secs);
    }

    if !(settings.base_url.starts_with("http://") || settings.base_url.starts_with("https://")) {
        return Err(anyhow!(
            "completion base url must start with http:// or https://: {}",
            settings.base_url
        ));
    }
    if settings.model.is_empty() {
        return Err(anyhow!("completion model must not be empty"));
    }

    Ok(settings)
}
