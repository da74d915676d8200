//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;
#[cfg(test)]
mod tests;

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::CacheConfig;

pub use cli::{CliArgs, Command, GlobalOverrides, RemoteCommand, SignInArgs, TodoCommand};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const ENV_PREFIX: &str = "QUIRE";
const DEFAULT_STORAGE_DIR: &str = ".quire";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub remote: RemoteSettings,
    pub cache: CacheConfig,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    pub with_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// Base URL of the backend; `None` when no backend is configured.
    pub url: Option<Url>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Where the provider sends the user after an OAuth sign-in.
    pub redirect_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    remote: RawRemoteSettings,
    cache: CacheConfig,
    storage: RawStorageSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(directory) = overrides.storage_dir.as_ref() {
            self.storage.directory = Some(directory.clone());
        }
        if let Some(url) = overrides.remote_url.as_ref() {
            self.remote.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            remote,
            cache,
            storage,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let remote = build_remote_settings(remote)?;
        let cache = build_cache_settings(cache)?;
        let storage = build_storage_settings(storage)?;

        Ok(Self {
            logging,
            remote,
            cache,
            storage,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings {
        level,
        format,
        with_target: logging.with_target.unwrap_or(false),
    })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let url = non_blank(remote.url)
        .map(|value| parse_base_url("remote.url", &value))
        .transpose()?;
    let redirect_url = non_blank(remote.redirect_url)
        .map(|value| {
            Url::parse(&value)
                .map_err(|err| LoadError::invalid("remote.redirect_url", err.to_string()))
        })
        .transpose()?;

    let timeout_secs = remote.timeout_seconds.unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "remote.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RemoteSettings {
        url,
        api_key: non_blank(remote.api_key),
        timeout: Duration::from_secs(timeout_secs),
        redirect_url,
    })
}

fn build_cache_settings(cache: CacheConfig) -> Result<CacheConfig, LoadError> {
    cache
        .validate()
        .map_err(|err| LoadError::invalid("cache", err.to_string()))?;
    if cache.max_entries == 0 {
        return Err(LoadError::invalid(
            "cache.max_entries",
            "must be greater than zero",
        ));
    }
    if cache.gc_interval_ms == 0 {
        return Err(LoadError::invalid(
            "cache.gc_interval_ms",
            "must be greater than zero",
        ));
    }
    Ok(cache)
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let directory = storage
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.directory",
            "must not be empty",
        ));
    }
    Ok(StorageSettings { directory })
}

/// Parse a base URL, normalizing it to end with `/` so joins keep its path.
fn parse_base_url(key: &'static str, value: &str) -> Result<Url, LoadError> {
    let mut url = Url::parse(value).map_err(|err| LoadError::invalid(key, err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(LoadError::invalid(key, "must be an absolute http(s) URL"));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "scheme must be http or https"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
    with_target: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    url: Option<String>,
    api_key: Option<String>,
    timeout_seconds: Option<u64>,
    redirect_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    directory: Option<PathBuf>,
}
