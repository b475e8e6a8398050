use lazy_regex::regex;
use url::Url;

use crate::download::batch::normalize_url;

/// Escapes special characters for Telegram MarkdownV2.
///
/// # Example
///
/// ```
/// use tubecore::core::utils::escape_markdown_v2;
///
/// let escaped = escape_markdown_v2("Hello. World!");
/// assert_eq!(escaped, "Hello\\. World\\!");
/// ```
pub fn escape_markdown_v2(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        match c {
            '\\' | '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|' | '{' | '}'
            | '.' | '!' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }

    result
}

/// Truncates a title to `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let cut: String = title.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Formats a media duration as `H:MM:SS`, or `M:SS` under an hour.
pub fn format_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Formats an ETA as `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_eta(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Formats a transfer speed given in bytes per second.
pub fn format_speed(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(speed) if speed > 0.0 => {
            let mbs = speed / (1024.0 * 1024.0);
            if mbs > 1.0 {
                format!("{:.1} MB/s", mbs)
            } else {
                format!("{:.0} KB/s", speed / 1024.0)
            }
        }
        _ => "Calculating...".to_string(),
    }
}

/// Bytes to megabytes, one decimal.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Extracts retry-after seconds from a Telegram rate limit error text.
pub fn extract_retry_after(error_str: &str) -> Option<u64> {
    let lower = error_str.to_lowercase();

    if let Some(pos) = lower.find("retry after ") {
        let after = &lower[pos + 12..];
        let num: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(secs) = num.parse() {
            return Some(secs);
        }
    }

    if let Some(pos) = lower.find("retry_after") {
        let after = &lower[pos + 11..];
        let num: String = after
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(secs) = num.parse() {
            return Some(secs);
        }
    }

    None
}

/// Hosts served by YouTube; subdomains count too
const YOUTUBE_DOMAINS: &[&str] = &["youtube.com", "youtu.be", "youtube-nocookie.com"];

/// Whether an http(s) URL points at YouTube.
pub fn is_youtube_link(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    url.host_str().is_some_and(|host| {
        let host = host.to_ascii_lowercase();
        YOUTUBE_DOMAINS.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|sub| sub.ends_with('.'))
        })
    })
}

/// YouTube links found anywhere in a message, in order, without duplicates.
pub fn extract_youtube_urls(text: &str) -> Vec<Url> {
    let pattern = regex!(r"(?i)(?:https?://)?(?:www\.|m\.|music\.)?(?:youtube\.com|youtu\.be)/[^\s<>]+");
    let mut urls: Vec<Url> = Vec::new();
    for found in pattern.find_iter(text) {
        if let Some(url) = normalize_url(found.as_str()) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}
