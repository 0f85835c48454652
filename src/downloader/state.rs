use serde::Serialize;
use crate::api::VideoMetadata;
use crate::downloader::JobStatus;
use crate::formats::FormatKey;
use crate::utils::suggested_filename;

/// Everything the presentation layer needs to render one screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UiState {
    Idle,
    FetchingMetadata {
        source_url: String,
    },
    MetadataReady {
        source_url: String,
        metadata: VideoMetadata,
        selected: Option<FormatKey>,
    },
    JobStarting {
        source_url: String,
        metadata: VideoMetadata,
        format: FormatKey,
    },
    JobInProgress {
        metadata: VideoMetadata,
        format: FormatKey,
        job_id: String,
        /// `None` until the service reports a progress counter.
        percent: Option<u8>,
    },
    JobComplete {
        url: String,
        filename: String,
    },
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Submit(String),
    MetadataLoaded(VideoMetadata),
    SelectFormat(FormatKey),
    StartDownload,
    JobStarted(String),
    Status(JobStatus),
    Failure(String),
    Reset,
}

impl UiState {
    /// True while a job is being started or polled; new submissions are
    /// refused in these states.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            UiState::FetchingMetadata { .. } | UiState::JobStarting { .. } | UiState::JobInProgress { .. }
        )
    }
}

/// Pure transition function. Events that do not apply to the current state
/// leave it unchanged.
pub fn transition(state: UiState, event: UiEvent) -> UiState {
    match (state, event) {
        (_, UiEvent::Reset) => UiState::Idle,

        (state, UiEvent::Submit(source_url)) if !state.is_busy() => {
            UiState::FetchingMetadata { source_url }
        }

        (UiState::FetchingMetadata { source_url }, UiEvent::MetadataLoaded(metadata)) => {
            UiState::MetadataReady { source_url, metadata, selected: None }
        }

        (UiState::MetadataReady { source_url, metadata, .. }, UiEvent::SelectFormat(format)) => {
            UiState::MetadataReady { source_url, metadata, selected: Some(format) }
        }

        (UiState::MetadataReady { source_url, metadata, selected: Some(format) }, UiEvent::StartDownload) => {
            UiState::JobStarting { source_url, metadata, format }
        }

        (UiState::JobStarting { metadata, format, .. }, UiEvent::JobStarted(job_id)) => {
            UiState::JobInProgress { metadata, format, job_id, percent: None }
        }

        (UiState::JobInProgress { metadata, format, job_id, percent }, UiEvent::Status(status)) => {
            match status {
                JobStatus::Pending(progress) => {
                    let percent = match (percent, progress) {
                        (Some(shown), Some(progress)) if progress.percent < shown => {
                            log::warn!(
                                "📉 [JOB] {} reported {}% after {}%, keeping {}%",
                                job_id, progress.percent, shown, shown
                            );
                            Some(shown)
                        }
                        (_, Some(progress)) => Some(progress.percent),
                        (shown, None) => shown,
                    };
                    UiState::JobInProgress { metadata, format, job_id, percent }
                }
                JobStatus::Completed(url) => UiState::JobComplete {
                    url,
                    filename: suggested_filename(&metadata.title, format),
                },
                JobStatus::Failed(reason) => UiState::Error(reason.into_error().user_message()),
            }
        }

        (state, UiEvent::Failure(message)) if state.is_busy() => UiState::Error(message),

        (state, event) => {
            log::debug!("🔁 [JOB] Ignoring {:?} in state {:?}", event, state);
            state
        }
    }
}
