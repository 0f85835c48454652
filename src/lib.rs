pub mod api;
pub mod config;
pub mod downloader;
pub mod errors;
pub mod formats;
pub mod security;
pub mod utils;

pub use api::{RelayClient, RemoteService, VideoMetadata};
pub use config::{AppConfig, ProgressRounding};
pub use downloader::{DownloadOrchestrator, JobHandle, JobStatus, UiEvent, UiState};
pub use errors::{AppError, Result};
pub use formats::{FormatKey, FORMAT_CATALOG};
