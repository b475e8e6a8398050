//! Classification of yt-dlp failures.
//!
//! yt-dlp reports everything through stderr text, so the type of a failure is
//! recovered by matching well-known phrases.

use strum::{Display, EnumString};

/// Types of yt-dlp errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum YtDlpErrorType {
    /// Cookies are invalid or expired
    InvalidCookies,
    /// Video requires sign-in for age verification and no cookies were supplied
    AgeRestricted,
    /// YouTube detected automated requests
    BotDetection,
    /// Video is private, removed or region-locked
    VideoUnavailable,
    /// Requested format does not exist
    UnsupportedFormat,
    /// Timeouts, DNS, connection resets
    NetworkError,
    /// Anything else
    Unknown,
}

/// Analyzes yt-dlp stderr and returns the error type
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("cookies are no longer valid")
        || stderr_lower.contains("cookies have likely been rotated")
        || stderr_lower.contains("the provided youtube account cookies are no longer valid")
    {
        return YtDlpErrorType::InvalidCookies;
    }

    if stderr_lower.contains("sign in to confirm your age")
        || stderr_lower.contains("age-restricted")
        || stderr_lower.contains("inappropriate for some users")
    {
        return YtDlpErrorType::AgeRestricted;
    }

    if stderr_lower.contains("sign in to confirm you're not a bot")
        || stderr_lower.contains("sign in to confirm you’re not a bot")
        || stderr_lower.contains("http error 403")
        || stderr_lower.contains("unable to extract")
        || stderr_lower.contains("signature extraction failed")
    {
        return YtDlpErrorType::BotDetection;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("this video does not exist")
        || stderr_lower.contains("is not a valid url")
        || stderr_lower.contains("unsupported url")
        || stderr_lower.contains("http error 404")
    {
        return YtDlpErrorType::VideoUnavailable;
    }

    if stderr_lower.contains("requested format is not available") || stderr_lower.contains("no video formats found")
    {
        return YtDlpErrorType::UnsupportedFormat;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network is unreachable")
        || stderr_lower.contains("name or service not known")
        || stderr_lower.contains("temporary failure in name resolution")
        || stderr_lower.contains("failed to connect")
    {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// Returns the user-facing message for an error type
pub fn get_error_message(error_type: &YtDlpErrorType) -> &'static str {
    match error_type {
        YtDlpErrorType::InvalidCookies => {
            "❌ The saved YouTube cookies have expired.\n\nSend a fresh cookies.txt with /update_cookies."
        }
        YtDlpErrorType::AgeRestricted => {
            "❌ This video is age-restricted.\n\nUpload your YouTube cookies with /update_cookies and try again."
        }
        YtDlpErrorType::BotDetection => "❌ YouTube blocked the request.\n\nTry another video or retry later.",
        YtDlpErrorType::VideoUnavailable => {
            "❌ Video is unavailable.\n\nIt may be private, removed or blocked in this region."
        }
        YtDlpErrorType::UnsupportedFormat => "❌ No downloadable format was found for this video.",
        YtDlpErrorType::NetworkError => "❌ Network problem.\n\nPlease try again in a minute.",
        YtDlpErrorType::Unknown => "❌ Could not download the video.\n\nCheck that the link is correct.",
    }
}
