//! Input validation and sanitization.

/// Maximum filename length for Content-Disposition overrides.
pub const MAX_FILENAME_LENGTH: usize = 256;

/// Validate track id format.
///
/// Valid format: alphanumeric, hyphens, underscores, 1-64 chars.
pub fn is_valid_track_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 64 {
        return false;
    }
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validate playlist id format. Same shape as track ids.
pub fn is_valid_playlist_id(id: &str) -> bool {
    is_valid_track_id(id)
}

/// Sanitize a caller-provided download filename.
///
/// Strips path components and characters that would corrupt the
/// Content-Disposition header; falls back to `audio.mp3` when nothing
/// survives.
pub fn sanitize_download_filename(input: &str) -> String {
    let name = input
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(input)
        .trim();

    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ' | '(' | ')'))
        .take(MAX_FILENAME_LENGTH)
        .collect();

    let cleaned = cleaned.trim_matches(['.', ' ']).to_string();
    if cleaned.is_empty() {
        "audio.mp3".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_validation() {
        assert!(is_valid_track_id("t1"));
        assert!(is_valid_track_id("lecture-05_intro"));
        assert!(!is_valid_track_id(""));
        assert!(!is_valid_track_id("has/slash"));
        assert!(!is_valid_track_id("has..dots"));
        assert!(!is_valid_track_id(&"x".repeat(65)));
    }

    #[test]
    fn test_filename_sanitization() {
        assert_eq!(sanitize_download_filename("lecture 01.mp3"), "lecture 01.mp3");
        assert_eq!(sanitize_download_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_download_filename("a\"b;c.mp3"), "abc.mp3");
        assert_eq!(sanitize_download_filename("..."), "audio.mp3");
        assert_eq!(sanitize_download_filename(""), "audio.mp3");
    }
}
