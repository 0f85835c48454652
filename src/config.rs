use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::errors::{AppError, Result};

pub const DEFAULT_RELAY_BASE_URL: &str = "https://cors.slimshadowapps.workers.dev";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_IFRAME_SOURCE: &str = "website";
pub const ENV_PREFIX: &str = "RELAY_DL";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub relay_base_url: String,
    pub poll_interval_ms: u64,
    pub progress_rounding: ProgressRounding,
    pub max_poll_attempts: Option<u32>,
    pub job_timeout_secs: Option<u64>,
    pub request_timeout_secs: u64,
    pub iframe_source: String,
    pub strict_url_validation: bool,
    pub proxy: Option<String>,
    pub download_dir: PathBuf,
}

/// How the remote 0-1000 progress counter becomes a display percentage.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProgressRounding {
    /// 345 -> 35
    #[default]
    Round,
    /// 345 -> 34
    Truncate,
}

impl std::str::FromStr for ProgressRounding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round" => Ok(ProgressRounding::Round),
            "truncate" => Ok(ProgressRounding::Truncate),
            other => Err(format!("unknown rounding '{}', expected 'round' or 'truncate'", other)),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            relay_base_url: DEFAULT_RELAY_BASE_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            progress_rounding: ProgressRounding::Round,
            max_poll_attempts: None,
            job_timeout_secs: None,
            request_timeout_secs: 30,
            iframe_source: DEFAULT_IFRAME_SOURCE.to_string(),
            strict_url_validation: false,
            proxy: None,
            download_dir: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("./downloads")),
        }
    }
}

impl AppConfig {
    /// Defaults, then the JSON file, then `RELAY_DL_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };

        if let Some(config_dir) = config_path.parent() {
            if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
                std::fs::create_dir_all(config_dir)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Config(config::ConfigError::Message("Could not find config directory".to_string())))?;

        Ok(config_dir.join("relay-downloader").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "poll_interval_ms must be greater than zero".to_string(),
            )));
        }

        let base = url::Url::parse(&self.relay_base_url).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "relay_base_url '{}' is not a valid URL: {}",
                self.relay_base_url, e
            )))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "relay_base_url must use http or https, got '{}'",
                base.scheme()
            ))));
        }

        if self.max_poll_attempts == Some(0) {
            return Err(AppError::Config(config::ConfigError::Message(
                "max_poll_attempts must be at least 1 when set".to_string(),
            )));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(dir.path().join("absent.json").as_path())).unwrap();
        assert_eq!(config.relay_base_url, DEFAULT_RELAY_BASE_URL);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.progress_rounding, ProgressRounding::Round);
        assert_eq!(config.max_poll_attempts, None);
        assert_eq!(config.iframe_source, "website");
    }

    #[test]
    fn file_overrides_selected_fields() {
        let file = make_config(
            r#"{ "poll_interval_ms": 1000, "progress_rounding": "truncate", "max_poll_attempts": 20 }"#,
        );
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.progress_rounding, ProgressRounding::Truncate);
        assert_eq!(config.max_poll_attempts, Some(20));
        assert_eq!(config.relay_base_url, DEFAULT_RELAY_BASE_URL);
    }

    #[test]
    fn environment_overrides_file() {
        // No other test asserts request_timeout_secs.
        let file = make_config(r#"{ "request_timeout_secs": 10 }"#);
        std::env::set_var("RELAY_DL_REQUEST_TIMEOUT_SECS", "45");
        let loaded = AppConfig::load(Some(file.path()));
        std::env::remove_var("RELAY_DL_REQUEST_TIMEOUT_SECS");

        assert_eq!(loaded.unwrap().request_timeout_secs, 45);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let file = make_config(r#"{ "poll_interval_ms": 0 }"#);
        assert!(matches!(AppConfig::load(Some(file.path())), Err(AppError::Config(_))));
    }

    #[test]
    fn relay_url_must_be_http() {
        let config = AppConfig {
            relay_base_url: "ftp://relay.example".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            relay_base_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rounding_parses_from_text() {
        assert_eq!("Truncate".parse::<ProgressRounding>().unwrap(), ProgressRounding::Truncate);
        assert_eq!("round".parse::<ProgressRounding>().unwrap(), ProgressRounding::Round);
        assert!("floor".parse::<ProgressRounding>().is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            job_timeout_secs: Some(600),
            strict_url_validation: true,
            ..AppConfig::default()
        };
        config.save(Some(path.as_path())).unwrap();

        let loaded = AppConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded.job_timeout(), Some(Duration::from_secs(600)));
        assert!(loaded.strict_url_validation);
    }
}
