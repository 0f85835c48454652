use std::sync::OnceLock;
use regex::Regex;
use url::Url;
use crate::errors::{AppError, Result};

const SUPPORTED_DOMAINS: [&str; 5] = [
    "youtube.com", "youtu.be", "vimeo.com", "dailymotion.com", "soundcloud.com",
];

pub struct InputValidator {
    strict: bool,
}

impl InputValidator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Returns the trimmed URL when it is acceptable as a source URL.
    pub fn validate_source_url(&self, url: &str) -> Result<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::InvalidInput(String::new()));
        }

        let parsed_url = Url::parse(url)
            .map_err(|e| AppError::InvalidInput(format!("Invalid URL: {}", e)))?;

        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(AppError::InvalidInput(format!(
                "Unsupported URL scheme: {}",
                parsed_url.scheme()
            )));
        }

        let host = parsed_url.host_str()
            .ok_or_else(|| AppError::InvalidInput("URL must have a host".to_string()))?
            .to_ascii_lowercase();

        if self.strict {
            self.check_video_host(&host, &parsed_url)?;
        }

        Ok(url.to_string())
    }

    fn check_video_host(&self, host: &str, parsed_url: &Url) -> Result<()> {
        let is_supported = SUPPORTED_DOMAINS.iter().any(|domain| {
            host == *domain || host.ends_with(&format!(".{}", domain))
        });

        if !is_supported {
            return Err(AppError::InvalidInput(format!(
                "Unsupported platform: {}. Supported platforms: {}",
                host,
                SUPPORTED_DOMAINS.join(", ")
            )));
        }

        if host == "youtu.be" || host.ends_with("youtube.com") {
            let path = parsed_url.path();
            let shaped = if host == "youtu.be" {
                path.strip_prefix('/')
                    .map(|id| video_id().is_match(id.trim_end_matches('/')))
                    .unwrap_or(false)
            } else {
                youtube_path().is_match(path)
                    || parsed_url.query_pairs().any(|(key, value)| key == "v" && video_id().is_match(&value))
            };
            if !shaped {
                return Err(AppError::InvalidInput(format!(
                    "URL does not point to a video: {}",
                    parsed_url
                )));
            }
        }

        Ok(())
    }
}

fn video_id() -> &'static Regex {
    static VIDEO_ID: OnceLock<Regex> = OnceLock::new();
    VIDEO_ID.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{6,}$").expect("valid regex"))
}

fn youtube_path() -> &'static Regex {
    static PATH: OnceLock<Regex> = OnceLock::new();
    PATH.get_or_init(|| {
        Regex::new(r"^/(?:shorts|embed|live|v)/[A-Za-z0-9_-]{6,}/?$").expect("valid regex")
    })
}
