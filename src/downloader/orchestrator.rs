use std::sync::Arc;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use crate::api::{RemoteService, VideoMetadata};
use crate::config::{AppConfig, ProgressRounding};
use crate::downloader::cache::MetadataCache;
use crate::downloader::poller::{poll_until_terminal, PollPolicy};
use crate::downloader::state::{transition, UiEvent, UiState};
use crate::downloader::{interpret_status, DownloadRequest, FailureReason, JobHandle, JobStatus};
use crate::errors::{AppError, Result};
use crate::formats::FormatKey;
use crate::security::InputValidator;

/// Drives metadata lookup, job initiation and status polling against a
/// `RemoteService`.
pub struct DownloadOrchestrator<S: RemoteService + 'static> {
    service: Arc<S>,
    validator: InputValidator,
    rounding: ProgressRounding,
    policy: PollPolicy,
    metadata: MetadataCache,
}

impl<S: RemoteService + 'static> DownloadOrchestrator<S> {
    pub fn new(service: S, config: &AppConfig) -> Self {
        let policy = PollPolicy::every(config.poll_interval())
            .with_max_attempts(config.max_poll_attempts)
            .with_timeout(config.job_timeout());

        Self {
            service: Arc::new(service),
            validator: InputValidator::new(config.strict_url_validation),
            rounding: config.progress_rounding,
            policy,
            metadata: MetadataCache::new(),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn request_metadata(&self, source_url: &str) -> Result<VideoMetadata> {
        let source_url = self.validator.validate_source_url(source_url)?;
        log::info!("🔎 [JOB] Fetching video metadata for {}", source_url);

        let result = match self.service.fetch_metadata(&source_url).await {
            Ok(response) => {
                if let Some(error) = response.error {
                    Err(AppError::MetadataFetch(error))
                } else {
                    match (response.title, response.thumbnail_url) {
                        (Some(title), Some(thumbnail_url)) => Ok(VideoMetadata {
                            title,
                            thumbnail_url,
                            author_name: response.author_name,
                        }),
                        (None, _) => Err(AppError::MetadataFetch("response has no title".to_string())),
                        (_, None) => Err(AppError::MetadataFetch("response has no thumbnail_url".to_string())),
                    }
                }
            }
            Err(AppError::MetadataFetch(msg)) => Err(AppError::MetadataFetch(msg)),
            Err(e) => Err(AppError::MetadataFetch(e.to_string())),
        };

        match result {
            Ok(metadata) => {
                log::info!("✅ [JOB] Metadata ready: {}", metadata.title);
                self.metadata.set(source_url, metadata.clone()).await;
                Ok(metadata)
            }
            Err(e) => {
                log::error!("❌ [JOB] {}", e);
                self.metadata.remove(&source_url).await;
                Err(e)
            }
        }
    }

    /// Starts a conversion job. Metadata for the URL is fetched first when
    /// this session has not looked it up yet.
    pub async fn start_job(&self, source_url: &str, format: FormatKey) -> Result<JobHandle> {
        let source_url = self.validator.validate_source_url(source_url)?;
        if self.metadata.get(&source_url).await.is_none() {
            self.request_metadata(&source_url).await?;
        }

        log::info!("🚀 [JOB] Initiating download as {}", format);
        let response = self.service
            .initiate_job(&source_url, format)
            .await
            .map_err(|e| match e {
                AppError::JobInitiation(msg) => AppError::JobInitiation(msg),
                other => AppError::JobInitiation(other.to_string()),
            })?;

        let job_id = response.id
            .ok_or_else(|| AppError::JobInitiation("Failed to initiate download.".to_string()))?;

        log::info!("📊 [JOB] Download started with ID: {}", job_id);
        Ok(JobHandle::new(job_id, DownloadRequest { source_url, format }))
    }

    /// Lazy, finite stream of statuses for `handle`. Ends right after the
    /// first `Completed` or `Failed` item. Dropping the stream stops polling;
    /// the remote job is not told.
    pub fn poll_until_terminal(&self, handle: JobHandle) -> BoxStream<'static, JobStatus> {
        let service = self.service.clone();
        let rounding = self.rounding;
        let job_id = handle.job_id;
        log::info!("⏳ [POLL] Tracking job {} every {:?}", job_id, self.policy.interval);

        let request = move || {
            let service = service.clone();
            let job_id = job_id.clone();
            async move { service.job_status(&job_id).await }
        };

        poll_until_terminal(
            self.policy,
            request,
            move |response| interpret_status(response, rounding),
            JobStatus::is_terminal,
            || JobStatus::Failed(FailureReason::TimedOut),
        )
        .boxed()
    }

    /// Runs the whole workflow for one request, sending every UI state to
    /// `sink`. Returns the final state. If the receiver goes away the run
    /// stops at the next state change.
    pub async fn run(&self, source_url: &str, format: FormatKey, sink: &UnboundedSender<UiState>) -> UiState {
        let mut session = Session::new(sink);
        if !session.apply(UiEvent::Submit(source_url.to_string())) {
            return session.state;
        }

        match self.request_metadata(source_url).await {
            Ok(metadata) => {
                if !session.apply(UiEvent::MetadataLoaded(metadata)) {
                    return session.state;
                }
            }
            Err(e) => {
                session.apply(UiEvent::Failure(e.user_message()));
                return session.state;
            }
        }

        if !session.apply(UiEvent::SelectFormat(format)) || !session.apply(UiEvent::StartDownload) {
            return session.state;
        }

        let handle = match self.start_job(source_url, format).await {
            Ok(handle) => handle,
            Err(e) => {
                session.apply(UiEvent::Failure(e.user_message()));
                return session.state;
            }
        };

        if !session.apply(UiEvent::JobStarted(handle.job_id().to_string())) {
            return session.state;
        }

        let mut statuses = self.poll_until_terminal(handle);
        while let Some(status) = statuses.next().await {
            if !session.apply(UiEvent::Status(status)) {
                log::info!("👋 [POLL] Nobody is watching any more, stopping");
                break;
            }
        }

        session.state
    }
}

struct Session<'a> {
    state: UiState,
    sink: &'a UnboundedSender<UiState>,
}

impl<'a> Session<'a> {
    fn new(sink: &'a UnboundedSender<UiState>) -> Self {
        // A closed sink only means nobody renders the idle state.
        let _ = sink.send(UiState::Idle);
        Self { state: UiState::Idle, sink }
    }

    /// Applies `event` and publishes the new state. Returns false once the
    /// receiving side has been dropped.
    fn apply(&mut self, event: UiEvent) -> bool {
        let state = std::mem::replace(&mut self.state, UiState::Idle);
        self.state = transition(state, event);
        self.sink.send(self.state.clone()).is_ok()
    }
}
