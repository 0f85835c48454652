pub mod relay;

use serde::{Deserialize, Deserializer, Serialize};
use crate::errors::Result;
use crate::formats::FormatKey;

pub use relay::RelayClient;

/// Display data returned by the oEmbed lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author_name: Option<String>,
}

/// Raw body of the lookup call. noembed answers lookup failures with
/// `200 {"error": "..."}`, so every field is optional here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OEmbedResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiateResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
}

/// Raw body of one status poll.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressResponse {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub success: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub progress: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub download_url: Option<String>,
}

/// The three remote collaborators, reached through the relay.
#[async_trait::async_trait]
pub trait RemoteService: Send + Sync {
    async fn fetch_metadata(&self, source_url: &str) -> Result<OEmbedResponse>;
    async fn initiate_job(&self, source_url: &str, format: FormatKey) -> Result<InitiateResponse>;
    async fn job_status(&self, job_id: &str) -> Result<ProgressResponse>;
}

// Optional fields degrade to None when the service sends an unexpected
// type, an empty string or null.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n.min(u32::MAX as u64) as u32),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u32>().ok(),
        Some(serde_json::Value::Bool(b)) => Some(b as u32),
        _ => None,
    })
}
