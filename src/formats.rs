use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::errors::AppError;

/// Output formats the conversion service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKey {
    #[serde(rename = "mp3")]
    Mp3,
    #[serde(rename = "m4a")]
    M4a,
    #[serde(rename = "360")]
    Mp4_360,
    #[serde(rename = "480")]
    Mp4_480,
    #[serde(rename = "720")]
    Mp4_720,
    #[serde(rename = "1080")]
    Mp4_1080,
    #[serde(rename = "4k")]
    Mp4_4k,
    #[serde(rename = "8k")]
    Mp4_8k,
    #[serde(rename = "webm_audio")]
    WebmAudio,
    #[serde(rename = "aac")]
    Aac,
    #[serde(rename = "flac")]
    Flac,
    #[serde(rename = "ogg")]
    Ogg,
    #[serde(rename = "opus")]
    Opus,
    #[serde(rename = "wav")]
    Wav,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatDescriptor {
    pub key: FormatKey,
    pub label: &'static str,
    pub quality_hint: Option<&'static str>,
}

impl FormatDescriptor {
    const fn new(key: FormatKey, label: &'static str, quality_hint: Option<&'static str>) -> Self {
        Self { key, label, quality_hint }
    }

    /// "MP4 720p", "MP3", ...
    pub fn display_name(&self) -> String {
        match self.quality_hint {
            Some(hint) => format!("{} {}", self.label, hint),
            None => self.label.to_string(),
        }
    }
}

pub static FORMAT_CATALOG: [FormatDescriptor; 14] = [
    FormatDescriptor::new(FormatKey::Mp3, "MP3", None),
    FormatDescriptor::new(FormatKey::M4a, "M4A", None),
    FormatDescriptor::new(FormatKey::Mp4_360, "MP4", Some("360p")),
    FormatDescriptor::new(FormatKey::Mp4_480, "MP4", Some("480p")),
    FormatDescriptor::new(FormatKey::Mp4_720, "MP4", Some("720p")),
    FormatDescriptor::new(FormatKey::Mp4_1080, "MP4", Some("1080p")),
    FormatDescriptor::new(FormatKey::Mp4_4k, "MP4", Some("4K")),
    FormatDescriptor::new(FormatKey::Mp4_8k, "MP4", Some("8K")),
    FormatDescriptor::new(FormatKey::WebmAudio, "WEBM", Some("Audio")),
    FormatDescriptor::new(FormatKey::Aac, "AAC", None),
    FormatDescriptor::new(FormatKey::Flac, "FLAC", None),
    FormatDescriptor::new(FormatKey::Ogg, "OGG", None),
    FormatDescriptor::new(FormatKey::Opus, "OPUS", None),
    FormatDescriptor::new(FormatKey::Wav, "WAV", None),
];

impl FormatKey {
    /// Wire value sent as the `format` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKey::Mp3 => "mp3",
            FormatKey::M4a => "m4a",
            FormatKey::Mp4_360 => "360",
            FormatKey::Mp4_480 => "480",
            FormatKey::Mp4_720 => "720",
            FormatKey::Mp4_1080 => "1080",
            FormatKey::Mp4_4k => "4k",
            FormatKey::Mp4_8k => "8k",
            FormatKey::WebmAudio => "webm_audio",
            FormatKey::Aac => "aac",
            FormatKey::Flac => "flac",
            FormatKey::Ogg => "ogg",
            FormatKey::Opus => "opus",
            FormatKey::Wav => "wav",
        }
    }

    /// Extension of the suggested local filename. Only `webm_audio` differs
    /// from the wire key; video keys such as `720` are used verbatim.
    pub fn file_extension(&self) -> &'static str {
        match self {
            FormatKey::WebmAudio => "webm",
            other => other.as_str(),
        }
    }

    pub fn descriptor(&self) -> &'static FormatDescriptor {
        FORMAT_CATALOG
            .iter()
            .find(|descriptor| descriptor.key == *self)
            .unwrap_or(&FORMAT_CATALOG[0])
    }

    pub fn all() -> impl Iterator<Item = FormatKey> {
        FORMAT_CATALOG.iter().map(|descriptor| descriptor.key)
    }
}

impl fmt::Display for FormatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        FormatKey::all()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = FormatKey::all().map(|key| key.as_str()).collect();
                AppError::InvalidInput(format!(
                    "Unsupported format: {}. Valid formats: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}
