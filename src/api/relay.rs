use std::path::{Path, PathBuf};
use std::time::Duration;
use futures_util::StreamExt;
use reqwest::{Client, ClientBuilder, Proxy, Response};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use url::Url;
use crate::api::{InitiateResponse, OEmbedResponse, ProgressResponse, RemoteService};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::formats::FormatKey;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP client for the CORS relay that fronts the lookup, initiator and
/// progress endpoints.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    base_url: Url,
    iframe_source: String,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout_seconds: u64, proxy_url: Option<&str>) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(timeout_seconds))
            .connect_timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .gzip(true)
            .brotli(true)
            .tcp_keepalive(Duration::from_secs(60));

        if let Some(proxy_url) = proxy_url {
            log::info!("🌐 [RELAY] Using proxy: {}", proxy_url);
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }

        // A trailing slash keeps `join` from dropping the last path segment.
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| AppError::InvalidInput(format!("Invalid relay URL {}: {}", base_url, e)))?;

        Ok(Self {
            client: builder.build()?,
            base_url,
            iframe_source: crate::config::DEFAULT_IFRAME_SOURCE.to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            &config.relay_base_url,
            config.request_timeout_secs,
            config.proxy.as_deref(),
        )?
        .with_iframe_source(&config.iframe_source))
    }

    pub fn with_iframe_source(mut self, iframe_source: &str) -> Self {
        self.iframe_source = iframe_source.to_string();
        self
    }

    pub fn metadata_url(&self, source_url: &str) -> Result<Url> {
        let mut url = self.endpoint("noembed")?;
        // noembed wants the whole video URL percent-encoded in one parameter
        url.set_query(Some(&format!("url={}", urlencoding::encode(source_url))));
        Ok(url)
    }

    pub fn initiate_url(&self, source_url: &str, format: FormatKey) -> Result<Url> {
        let mut url = self.endpoint("download")?;
        url.query_pairs_mut()
            .append_pair("button", "1")
            .append_pair("start", "1")
            .append_pair("end", "1")
            .append_pair("format", format.as_str())
            .append_pair("iframe_source", &self.iframe_source)
            .append_pair("url", source_url);
        Ok(url)
    }

    pub fn progress_url(&self, job_id: &str) -> Result<Url> {
        let mut url = self.endpoint("progress")?;
        url.query_pairs_mut().append_pair("id", job_id);
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::InvalidInput(format!("Invalid relay endpoint {}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> std::result::Result<T, String> {
        log::debug!("🌐 [RELAY] GET {}", url);
        let response = self.client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP error! status: {}", response.status().as_u16()));
        }

        let body = response.text().await.map_err(|e| e.to_string())?;
        serde_json::from_str(&body).map_err(|e| format!("Unexpected response body: {}", e))
    }

    /// Streams a finished artifact to `target`, reporting
    /// `(downloaded, total, percent)` after each chunk. Single pass, no resume.
    pub async fn save_artifact<F>(
        &self,
        artifact_url: &str,
        target: &Path,
        mut progress_callback: F,
    ) -> Result<u64>
    where
        F: FnMut(u64, u64, f32) + Send,
    {
        log::info!("📥 [RELAY] Saving artifact to {:?}", target);
        let response: Response = self.client
            .get(artifact_url)
            .header("Accept", "*/*")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::JobCommunication(format!(
                "HTTP error! status: {}",
                response.status().as_u16()
            )));
        }

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // The body lands in `<target>.part` and is renamed only once complete.
        let partial = partial_path(target);
        match write_body(response, &partial, &mut progress_callback).await {
            Ok(downloaded) => {
                tokio::fs::rename(&partial, target).await?;
                log::info!("✅ [RELAY] Saved {} bytes to {:?}", downloaded, target);
                Ok(downloaded)
            }
            Err(e) => {
                log::error!("❌ [RELAY] Saving {:?} failed: {}", target, e);
                if let Err(remove_err) = tokio::fs::remove_file(&partial).await {
                    log::warn!("⚠️ [RELAY] Could not remove {:?}: {}", partial, remove_err);
                }
                Err(e)
            }
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn write_body<F>(response: Response, path: &Path, progress_callback: &mut F) -> Result<u64>
where
    F: FnMut(u64, u64, f32) + Send,
{
    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(path).await?;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        downloaded += chunk.len() as u64;
        file.write_all(&chunk).await?;

        let progress = if total_size > 0 {
            (downloaded as f32 / total_size as f32) * 100.0
        } else {
            0.0
        };

        progress_callback(downloaded, total_size, progress);
    }

    file.flush().await?;
    Ok(downloaded)
}

#[async_trait::async_trait]
impl RemoteService for RelayClient {
    async fn fetch_metadata(&self, source_url: &str) -> Result<OEmbedResponse> {
        let url = self.metadata_url(source_url)?;
        self.get_json(url).await.map_err(AppError::MetadataFetch)
    }

    async fn initiate_job(&self, source_url: &str, format: FormatKey) -> Result<InitiateResponse> {
        let url = self.initiate_url(source_url, format)?;
        self.get_json(url).await.map_err(AppError::JobInitiation)
    }

    async fn job_status(&self, job_id: &str) -> Result<ProgressResponse> {
        let url = self.progress_url(job_id)?;
        self.get_json(url).await.map_err(AppError::JobCommunication)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn client() -> RelayClient {
        RelayClient::new("https://relay.example/api/", 10, None).unwrap()
    }

    #[test]
    fn metadata_url_encodes_the_whole_source_url() {
        let url = client().metadata_url("https://www.youtube.com/watch?v=abc&t=10").unwrap();
        assert_eq!(
            url.as_str(),
            "https://relay.example/api/noembed?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dabc%26t%3D10"
        );
    }

    #[test]
    fn initiate_url_carries_fixed_parameters() {
        let url = client()
            .with_iframe_source("web-app")
            .initiate_url("https://youtu.be/abc", FormatKey::WebmAudio)
            .unwrap();
        assert_eq!(url.path(), "/api/download");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("button".to_string(), "1".to_string()),
                ("start".to_string(), "1".to_string()),
                ("end".to_string(), "1".to_string()),
                ("format".to_string(), "webm_audio".to_string()),
                ("iframe_source".to_string(), "web-app".to_string()),
                ("url".to_string(), "https://youtu.be/abc".to_string()),
            ]
        );
    }

    #[test]
    fn progress_url_uses_job_id() {
        let url = RelayClient::new("https://relay.example", 10, None)
            .unwrap()
            .progress_url("job 42")
            .unwrap();
        assert_eq!(url.as_str(), "https://relay.example/progress?id=job+42");
    }

    #[test]
    fn rejects_unparsable_relay() {
        assert!(matches!(
            RelayClient::new("::nope::", 10, None),
            Err(AppError::InvalidInput(_))
        ));
    }

    /// Answers a single request on a loopback port with `response`, then
    /// closes the connection. Returns the base URL to reach it.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn non_success_status_is_a_communication_error() {
        let base = serve_once("HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let client = RelayClient::new(&base, 5, None).unwrap();

        match client.job_status("job-1").await {
            Err(AppError::JobCommunication(msg)) => assert_eq!(msg, "HTTP error! status: 502"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreadable_lookup_body_is_a_fetch_error() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 13\r\nConnection: close\r\n\r\n<html></html>",
        )
        .await;
        let client = RelayClient::new(&base, 5, None).unwrap();

        match client.fetch_metadata("https://youtu.be/abc").await {
            Err(AppError::MetadataFetch(msg)) => assert!(msg.starts_with("Unexpected response body")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn status_body_is_parsed() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 28\r\nConnection: close\r\n\r\n{\"success\":0,\"progress\":345}",
        )
        .await;
        let client = RelayClient::new(&base, 5, None).unwrap();

        let status = client.job_status("job-1").await.unwrap();
        assert_eq!(status.success, Some(0));
        assert_eq!(status.progress, Some(345));
    }

    #[tokio::test]
    async fn saved_artifact_is_written_in_full() {
        let base = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 16\r\nConnection: close\r\n\r\n0123456789abcdef").await;
        let client = RelayClient::new(&base, 5, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("clip.mp3");

        let mut reported = 0;
        let written = client
            .save_artifact(&format!("{}/file", base), &target, |downloaded, _, _| reported = downloaded)
            .await
            .unwrap();

        assert_eq!(written, 16);
        assert_eq!(reported, 16);
        assert_eq!(std::fs::read(&target).unwrap(), b"0123456789abcdef");
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn truncated_artifact_leaves_no_file_behind() {
        let base = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 100000\r\nConnection: close\r\n\r\n0123456789abcdef").await;
        let client = RelayClient::new(&base, 5, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("clip.mp3");

        let result = client.save_artifact(&format!("{}/file", base), &target, |_, _, _| {}).await;

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
    }
}
