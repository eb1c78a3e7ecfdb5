//! File id extraction from share links.

use regex::Regex;
use std::sync::OnceLock;

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://(?:www\.)?(?:k2s\.cc|keep2share\.cc)/file/([a-zA-Z0-9]+)")
            .expect("link pattern is valid")
    })
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("id pattern is valid"))
}

/// Extract the file id from a share link, or accept a bare id.
///
/// ```
/// use keepfetch::api::extract_file_id;
///
/// assert_eq!(extract_file_id("https://k2s.cc/file/1a2b3c/movie.mkv"), Some("1a2b3c".into()));
/// assert_eq!(extract_file_id("1a2b3c"), Some("1a2b3c".into()));
/// assert_eq!(extract_file_id("https://example.com/file/1a2b3c"), None);
/// ```
pub fn extract_file_id(input: &str) -> Option<String> {
    let input = input.trim();

    if let Some(captures) = link_pattern().captures(input) {
        return Some(captures[1].to_string());
    }

    id_pattern()
        .is_match(input)
        .then(|| input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_domains() {
        assert_eq!(
            extract_file_id("https://keep2share.cc/file/abcDEF123"),
            Some("abcDEF123".to_string())
        );
        assert_eq!(
            extract_file_id("https://k2s.cc/file/abcDEF123/name.zip?site=x"),
            Some("abcDEF123".to_string())
        );
    }

    #[test]
    fn test_rejects_foreign_links() {
        assert_eq!(extract_file_id("https://example.com/file/abc"), None);
        assert_eq!(extract_file_id("https://k2s.cc/folder/abc"), None);
        assert_eq!(extract_file_id(""), None);
    }
}
