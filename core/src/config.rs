use directories::BaseDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const API_URL_VAR: &str = "JOBBOARD_API_URL";
pub const REALTIME_URL_VAR: &str = "JOBBOARD_REALTIME_URL";
pub const APP_NAME_VAR: &str = "JOBBOARD_APP_NAME";

const DEFAULT_APP_NAME: &str = "Jobboard";

/// Endpoints and display name of the client. Nothing else is configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub realtime_url: Url,
    pub app_name: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("client not configured: set JOBBOARD_API_URL and JOBBOARD_REALTIME_URL or create jobboard.yaml")]
    Missing,
    #[error("client configuration invalid: {0}")]
    Invalid(String),
}

impl ClientConfig {
    /// Loads `jobboard.yaml` if present, then a `.env` file, then the
    /// process environment. Later sources win.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let file = match locate_config_file() {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        resolve(file, |key| std::env::var(key).ok())
    }
}

fn read_config_file(path: &Path) -> Result<FileSection, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|err| {
        ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
    })?;
    let config: JobboardConfig = serde_yaml::from_str(&contents)
        .map_err(|err| ConfigError::Invalid(format!("invalid jobboard.yaml: {err}")))?;
    Ok(config.client.unwrap_or_default())
}

fn resolve(
    file: Option<FileSection>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let file = file.unwrap_or_default();
    let pick = |var: &str, from_file: Option<String>| {
        env(var)
            .or(from_file)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let api = pick(API_URL_VAR, file.api_url);
    let realtime = pick(REALTIME_URL_VAR, file.realtime_url);
    let (api, realtime) = match (api, realtime) {
        (None, None) => return Err(ConfigError::Missing),
        (Some(api), Some(realtime)) => (api, realtime),
        (None, Some(_)) => {
            return Err(ConfigError::Invalid(format!("missing {API_URL_VAR}")));
        }
        (Some(_), None) => {
            return Err(ConfigError::Invalid(format!("missing {REALTIME_URL_VAR}")));
        }
    };

    let api_base_url = parse_url(API_URL_VAR, &api, &["http", "https"])?;
    let realtime_url = parse_url(REALTIME_URL_VAR, &realtime, &["ws", "wss"])?;
    let app_name =
        pick(APP_NAME_VAR, file.app_name).unwrap_or_else(|| DEFAULT_APP_NAME.to_string());

    Ok(ClientConfig {
        api_base_url,
        realtime_url,
        app_name,
    })
}

fn parse_url(var: &str, raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::Invalid(format!("{var}: {err}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Invalid(format!(
            "{var}: unsupported scheme `{}`",
            url.scheme()
        )));
    }
    Ok(url)
}

fn locate_config_file() -> Option<PathBuf> {
    config_candidates().into_iter().find(|path| path.exists())
}

fn config_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("jobboard");
        paths.push(config_dir.join("jobboard.yaml"));
        paths.push(config_dir.join("jobboard.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".jobboard").join("jobboard.yaml"));
        paths.push(home_dir.join(".jobboard").join("jobboard.yml"));
    } else {
        paths.push(PathBuf::from("jobboard.yaml"));
        paths.push(PathBuf::from("jobboard.yml"));
    }
    paths
}

#[derive(Debug, Deserialize)]
struct JobboardConfig {
    client: Option<FileSection>,
}

#[derive(Debug, Default, Deserialize)]
struct FileSection {
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    realtime_url: Option<String>,
    #[serde(default)]
    app_name: Option<String>,
}
