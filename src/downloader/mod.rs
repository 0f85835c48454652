pub mod cache;
pub mod orchestrator;
pub mod poller;
pub mod state;

use serde::{Deserialize, Serialize};
use crate::api::ProgressResponse;
use crate::config::ProgressRounding;
use crate::errors::{AppError, Result};
use crate::formats::FormatKey;

pub use orchestrator::DownloadOrchestrator;
pub use poller::{poll_until_terminal, PollPolicy};
pub use state::{transition, UiEvent, UiState};

const PROGRESS_SCALE_MAX: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source_url: String,
    pub format: FormatKey,
}

/// Correlation key for one remote job. Not `Clone`: polling consumes the
/// handle, so a job whose loop has ended cannot be polled again.
#[derive(Debug)]
pub struct JobHandle {
    job_id: String,
    request: DownloadRequest,
}

impl JobHandle {
    pub(crate) fn new(job_id: String, request: DownloadRequest) -> Self {
        Self { job_id, request }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn request(&self) -> &DownloadRequest {
        &self.request
    }
}

/// Remote progress counter, kept raw (0-1000) next to the display percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub raw: u32,
    pub percent: u8,
}

impl Progress {
    pub fn from_raw(raw: u32, rounding: ProgressRounding) -> Self {
        let clamped = raw.min(PROGRESS_SCALE_MAX);
        let percent = match rounding {
            ProgressRounding::Round => (clamped + 5) / 10,
            ProgressRounding::Truncate => clamped / 10,
        };
        Self { raw, percent: percent as u8 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The service reported success without an artifact URL.
    Server,
    /// Transport failure, non-2xx status or unreadable body.
    Communication(String),
    /// The configured attempt or time bound ran out.
    TimedOut,
}

impl FailureReason {
    pub fn into_error(self) -> AppError {
        match self {
            FailureReason::Server => AppError::JobFailed("Download failed on the server.".to_string()),
            FailureReason::Communication(msg) => AppError::JobCommunication(msg),
            FailureReason::TimedOut => AppError::JobFailed("Download did not finish within the configured limit.".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// `None` means the job has not reported progress yet.
    Pending(Option<Progress>),
    Completed(String),
    Failed(FailureReason),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed(_) | JobStatus::Failed(_))
    }
}

/// Maps one raw status poll to a `JobStatus`. Errors from the call itself
/// fold into `Failed(Communication)`.
pub fn interpret_status(response: Result<ProgressResponse>, rounding: ProgressRounding) -> JobStatus {
    let response = match response {
        Ok(response) => response,
        Err(AppError::JobCommunication(msg)) => return JobStatus::Failed(FailureReason::Communication(msg)),
        Err(e) => return JobStatus::Failed(FailureReason::Communication(e.to_string())),
    };

    match (response.success, response.download_url, response.progress) {
        (Some(1), Some(url), _) => JobStatus::Completed(url),
        (Some(1), None, _) => JobStatus::Failed(FailureReason::Server),
        (_, _, Some(raw)) => JobStatus::Pending(Some(Progress::from_raw(raw, rounding))),
        (_, _, None) => JobStatus::Pending(None),
    }
}
