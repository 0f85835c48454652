use crate::formats::FormatKey;

/// Replaces every char outside `[A-Za-z0-9._-]` with one underscore.
/// Runs of replaced chars are not collapsed, so `": "` becomes `"__"`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Local filename offered for a finished job: `<title>.<extension>`.
/// The title is not trimmed, so surrounding spaces become `_`. A blank
/// title falls back to `download`.
pub fn suggested_filename(title: &str, format: FormatKey) -> String {
    let stem = if title.trim().is_empty() { "download" } else { title };
    sanitize_filename(&format!("{}.{}", stem, format.file_extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_spaces_become_underscores() {
        let name = suggested_filename("My Video: Part 1?!", FormatKey::Mp3);
        assert_eq!(name, "My_Video__Part_1__.mp3");
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')));
        assert!(name.ends_with(".mp3"));
    }

    #[test]
    fn webm_audio_uses_webm_extension() {
        assert_eq!(suggested_filename("clip", FormatKey::WebmAudio), "clip.webm");
    }

    #[test]
    fn video_keys_are_used_verbatim() {
        assert_eq!(suggested_filename("clip", FormatKey::Mp4_720), "clip.720");
        assert_eq!(suggested_filename("clip", FormatKey::Mp4_4k), "clip.4k");
    }

    #[test]
    fn each_non_ascii_char_is_one_underscore() {
        assert_eq!(sanitize_filename("Café/Ünïcode"), "Caf___n_code");
        assert_eq!(sanitize_filename("a-b_c.d"), "a-b_c.d");
    }

    #[test]
    fn blank_title_falls_back() {
        assert_eq!(suggested_filename("   ", FormatKey::Flac), "download.flac");
        assert_eq!(suggested_filename("", FormatKey::Flac), "download.flac");
    }

    #[test]
    fn surrounding_spaces_are_kept() {
        assert_eq!(suggested_filename(" x ", FormatKey::Mp3), "_x_.mp3");
    }
}
