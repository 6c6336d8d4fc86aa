use crate::{CaptureError, OutputFormat};
use chrono::{DateTime, Utc};
use std::time::Duration;
use url::Url;

/// Turns arbitrary text into a lowercase, filesystem-safe token.
///
/// Reserved path characters and control characters are dropped, runs of
/// whitespace and hyphens collapse into one hyphen, and the result is cut
/// to `max_len` characters. Returns an empty string when nothing usable
/// remains.
pub fn sanitize_token(input: &str, max_len: usize) -> String {
    let mut token = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => {}
            c if c.is_whitespace() || c == '-' => pending_hyphen = !token.is_empty(),
            c if c.is_control() => {}
            c => {
                if pending_hyphen {
                    token.push('-');
                    pending_hyphen = false;
                }
                token.extend(c.to_lowercase());
            }
        }
    }

    let truncated: String = token.chars().take(max_len).collect();
    truncated
        .trim_start_matches('.')
        .trim_end_matches(&['-', '.'][..])
        .to_string()
}

/// Archive folder name: the sanitized label, or a timestamped default.
pub fn derive_folder_name(label: Option<&str>, max_len: usize, now: DateTime<Utc>) -> String {
    label
        .map(|label| sanitize_token(label, max_len))
        .filter(|token| !token.is_empty())
        .unwrap_or_else(|| format!("screenshots-{}", now.format("%Y%m%d-%H%M%S")))
}

/// `<NN>-<title|host|page-N>.<ext>` for the URL at 1-based `position`.
pub fn build_filename(
    position: usize,
    title: Option<&str>,
    url: &str,
    format: OutputFormat,
    max_len: usize,
) -> String {
    let base = title
        .map(|title| sanitize_token(title, max_len))
        .filter(|token| !token.is_empty())
        .or_else(|| {
            extract_host(url)
                .map(|host| sanitize_token(&host, max_len))
                .filter(|token| !token.is_empty())
        })
        .unwrap_or_else(|| format!("page-{position}"));

    format!("{:02}-{}.{}", position, base, format.extension())
}

/// Name of the text entry describing a failed URL.
pub fn failure_entry_name(url: &str, max_len: usize) -> String {
    let token = sanitize_token(url, max_len);
    if token.is_empty() {
        "failed.txt".to_string()
    } else {
        format!("{token}.txt")
    }
}

/// Parses `url` and accepts only `http` and `https` targets.
pub fn validate_url(url: &str) -> Result<Url, CaptureError> {
    let parsed = Url::parse(url).map_err(|_| CaptureError::InvalidUrl)?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(CaptureError::InvalidUrl),
    }
}

pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sanitize_token() {
        assert_eq!(sanitize_token("My Report/2024:Q1", 60), "my-report2024q1");
        assert_eq!(sanitize_token("  Hello   World -- 2024 ", 60), "hello-world-2024");
        assert_eq!(sanitize_token("a<b>c|d?e*f\"g", 60), "abcdefg");
        assert_eq!(sanitize_token("///", 60), "");
        assert_eq!(sanitize_token("..hidden", 60), "hidden");
    }

    #[test]
    fn test_sanitize_token_is_deterministic() {
        let first = sanitize_token("My Report/2024:Q1", 60);
        let second = sanitize_token("My Report/2024:Q1", 60);
        assert_eq!(first, second);
    }

    #[test]
    fn test_sanitize_token_truncates() {
        assert_eq!(sanitize_token("abcdefghij", 4), "abcd");
        // A cut that lands on a separator must not leave a dangling hyphen.
        assert_eq!(sanitize_token("abc def", 4), "abc");
    }

    #[test]
    fn test_derive_folder_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(derive_folder_name(Some("Q1 Review"), 60, now), "q1-review");
        assert_eq!(derive_folder_name(None, 60, now), "screenshots-20240309-140507");
        assert_eq!(derive_folder_name(Some(":::"), 60, now), "screenshots-20240309-140507");
    }

    #[test]
    fn test_build_filename_prefers_title_then_host() {
        assert_eq!(
            build_filename(1, Some("Example Domain"), "https://example.com", OutputFormat::Png, 60),
            "01-example-domain.png"
        );
        assert_eq!(
            build_filename(3, Some("   "), "https://www.example.org/a", OutputFormat::Jpeg, 60),
            "03-www.example.org.jpg"
        );
        assert_eq!(
            build_filename(12, None, "data:text/plain,hi", OutputFormat::Png, 60),
            "12-page-12.png"
        );
    }

    #[test]
    fn test_failure_entry_name() {
        assert_eq!(failure_entry_name("not a url", 60), "not-a-url.txt");
        assert_eq!(failure_entry_name("https://example.com/x", 60), "httpsexample.comx.txt");
        assert_eq!(failure_entry_name("://", 60), "failed.txt");
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com/path?query=value").is_ok());
        assert!(matches!(validate_url("ftp://example.com"), Err(CaptureError::InvalidUrl)));
        assert!(matches!(validate_url("file:///etc/passwd"), Err(CaptureError::InvalidUrl)));
        assert!(matches!(validate_url("not a url"), Err(CaptureError::InvalidUrl)));
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_extract_host() {
        assert_eq!(extract_host("https://example.com/path"), Some("example.com".to_string()));
        assert_eq!(extract_host("https://127.0.0.1:8080/"), Some("127.0.0.1".to_string()));
        assert_eq!(extract_host("invalid-url"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.0s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m 5s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
