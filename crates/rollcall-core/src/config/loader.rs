use super::schema::RollcallConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid site URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },
}

pub const ENV_CHAT_ID: &str = "ROLLCALL_CHAT_ID";
pub const ENV_EMAIL: &str = "ROLLCALL_EMAIL";
pub const ENV_PASSWORD: &str = "ROLLCALL_PASSWORD";
pub const ENV_SCHEDULE: &str = "ROLLCALL_SCHEDULE";
pub const ENV_HEADLESS: &str = "ROLLCALL_HEADLESS";
pub const ENV_DEPLOYMENT: &str = "ROLLCALL_ENV";
pub const ENV_CHROME_BIN: &str = "CHROME_BIN";
pub const ENV_USER_DATA_DIR: &str = "ROLLCALL_USER_DATA_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./rollcall.yaml
    /// 2. ~/.rollcall/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<RollcallConfig, ConfigError> {
        let local_config = PathBuf::from("./rollcall.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".rollcall").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(RollcallConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<RollcallConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: RollcallConfig = serde_yaml::from_str(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when given, otherwise from the default locations, then
    /// apply process environment overrides and validate.
    pub async fn load(path: Option<&Path>) -> Result<RollcallConfig, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path).await?,
            None => Self::load_default().await?,
        };
        Self::apply_env(&mut config, |key| std::env::var(key).ok())?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(config: &mut RollcallConfig, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(chat_id) = lookup(ENV_CHAT_ID) {
            config.site.chat_id = chat_id;
        }
        if let Some(email) = lookup(ENV_EMAIL) {
            config.credentials.email = Some(email);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            config.credentials.password = Some(password);
        }
        if let Some(cron) = lookup(ENV_SCHEDULE) {
            config.schedule.cron = cron;
        }
        if let Some(dir) = lookup(ENV_USER_DATA_DIR) {
            config.browser.user_data_dir = Some(PathBuf::from(dir));
        }
        if let Some(bin) = lookup(ENV_CHROME_BIN) {
            config.browser.chrome_executable = Some(PathBuf::from(bin));
        }

        // Production deployments run headless unless told otherwise.
        if let Some(deployment) = lookup(ENV_DEPLOYMENT) {
            if deployment.trim().eq_ignore_ascii_case("production") {
                config.browser.headless = true;
            }
        }
        if let Some(value) = lookup(ENV_HEADLESS) {
            config.browser.headless = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
                key: ENV_HEADLESS.to_string(),
                value,
            })?;
        }
        Ok(())
    }

    pub fn validate(config: &RollcallConfig) -> Result<(), ConfigError> {
        url::Url::parse(&config.site.base_url).map_err(|source| ConfigError::InvalidUrl {
            url: config.site.base_url.clone(),
            source,
        })?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
