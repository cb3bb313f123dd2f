use std::{fs, io, path::Path};

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "runmate.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".into(),
            auth_token: None,
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    auth_token: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then `runmate.toml` in the working directory, then the environment.
pub fn load_settings() -> Result<ClientSettings, ConfigError> {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, ConfigError> {
    let mut settings = ClientSettings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings =
                toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
            debug!(path = %path.display(), "loaded client settings file");
            if let Some(v) = file_cfg.api_url {
                settings.api_url = v;
            }
            if let Some(v) = file_cfg.auth_token {
                settings.auth_token = Some(v);
            }
            if let Some(v) = file_cfg.request_timeout_secs {
                settings.request_timeout_secs = v;
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    }

    if let Some(v) = env("RUNMATE_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env("RUNMATE_TOKEN") {
        settings.auth_token = Some(v);
    }
    if let Some(v) = env("APP__AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: "APP__REQUEST_TIMEOUT_SECS",
            value: v.clone(),
        })?;
    }

    settings.api_url = normalize_api_url(&settings.api_url)?;
    settings.auth_token = settings
        .auth_token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    Ok(settings)
}

/// Trims whitespace and trailing slashes so request paths can be appended directly.
pub fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(ClientSettings::default().api_url);
    }

    let parsed = Url::parse(trimmed).map_err(|err| ConfigError::InvalidApiUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidApiUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
