//! Batch lists: text files with one URL per line.

use dashmap::DashMap;
use serde::Serialize;
use std::path::Path;
use url::Url;
use uuid::Uuid;

use crate::core::error::{AppError, AppResult};
use crate::core::utils::is_youtube_link;
use crate::download::job::{BatchRef, DownloadJob};
use crate::download::resolution::Resolution;

/// A valid URL line of a batch file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLine {
    /// One-based line number in the file
    pub line_no: usize,
    pub url: Url,
}

/// Counts of each line kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub valid: usize,
    pub invalid: usize,
    pub blank: usize,
    pub comments: usize,
}

impl BatchSummary {
    pub fn is_empty(&self) -> bool {
        self.valid == 0
    }
}

enum LineKind {
    Blank,
    Comment,
    Url(Url),
    Invalid,
}

fn classify(line: &str) -> LineKind {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Blank;
    }
    if line.starts_with('#') {
        return LineKind::Comment;
    }
    match normalize_url(line) {
        Some(url) if is_youtube_link(&url) => LineKind::Url(url),
        _ => LineKind::Invalid,
    }
}

/// Parses a URL-shaped string. Bare `host/path` gets an `https://` prefix.
pub fn normalize_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains(char::is_whitespace) {
        return None;
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    // A bare word like "hello" parses as a host; require a dot
    let host = url.host_str()?;
    if !host.contains('.') && host != "localhost" {
        return None;
    }
    Some(url)
}

/// Expands the text of an uploaded batch file into download inputs.
///
/// Only YouTube links count as valid lines; any other URL is invalid.
///
/// The sequence is lazy and restartable: each call to [`BatchExpander::iter`]
/// walks the text again and yields the same URLs in file order.
#[derive(Debug, Clone)]
pub struct BatchExpander {
    text: String,
}

impl BatchExpander {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let bytes = fs_err::tokio::read(path.as_ref()).await?;
        let text = String::from_utf8(bytes)
            .map_err(|_| AppError::Input("Batch file must be UTF-8 text.".to_string()))?;
        Ok(Self::from_text(text))
    }

    /// Valid URL lines in file order.
    pub fn iter(&self) -> impl Iterator<Item = BatchLine> + '_ {
        self.text
            .lines()
            .enumerate()
            .filter_map(|(i, line)| match classify(line) {
                LineKind::Url(url) => Some(BatchLine { line_no: i + 1, url }),
                _ => None,
            })
    }

    /// Line numbers and contents of lines that are neither URLs, blanks nor comments.
    pub fn invalid_lines(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.text
            .lines()
            .enumerate()
            .filter(|(_, line)| matches!(classify(line), LineKind::Invalid))
            .map(|(i, line)| (i + 1, line.trim()))
    }

    pub fn summary(&self) -> BatchSummary {
        self.text
            .lines()
            .fold(BatchSummary::default(), |mut summary, line| {
                match classify(line) {
                    LineKind::Blank => summary.blank += 1,
                    LineKind::Comment => summary.comments += 1,
                    LineKind::Url(_) => summary.valid += 1,
                    LineKind::Invalid => summary.invalid += 1,
                }
                summary
            })
    }

    /// One job per valid line, sharing a fresh batch id.
    ///
    /// Fails with an input error when the file holds no valid URL.
    pub fn into_jobs(&self, chat_id: i64, resolution: Resolution) -> AppResult<Vec<DownloadJob>> {
        batch_jobs(chat_id, self.iter().map(|line| line.url).collect(), resolution)
    }
}

/// Builds the jobs of one batch, in the given order.
pub fn batch_jobs(chat_id: i64, urls: Vec<Url>, resolution: Resolution) -> AppResult<Vec<DownloadJob>> {
    if urls.is_empty() {
        return Err(AppError::Input("No valid links found in the file.".to_string()));
    }

    let batch_id = Uuid::new_v4();
    let total = urls.len();
    Ok(urls
        .into_iter()
        .enumerate()
        .map(|(index, url)| DownloadJob::new(chat_id, url, resolution).with_batch(BatchRef { batch_id, index, total }))
        .collect())
}

/// Final outcome of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl BatchReport {
    pub fn to_message(&self) -> String {
        format!(
            "📦 Batch complete\n\n✅ Successful: {}\n❌ Failed: {}\n📁 Total: {}",
            self.succeeded, self.failed, self.total
        )
    }
}

/// Collects job outcomes per batch and reports once every job has finished.
#[derive(Debug, Default)]
pub struct BatchTracker {
    batches: DashMap<Uuid, BatchReport>,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one finished job. Returns the report when it was the last one.
    pub fn record(&self, batch: &BatchRef, success: bool) -> Option<BatchReport> {
        let report = {
            let mut entry = self.batches.entry(batch.batch_id).or_insert(BatchReport {
                succeeded: 0,
                failed: 0,
                total: batch.total,
            });
            if success {
                entry.succeeded += 1;
            } else {
                entry.failed += 1;
            }
            *entry
        };

        if report.succeeded + report.failed >= report.total {
            self.batches.remove(&batch.batch_id);
            Some(report)
        } else {
            None
        }
    }

    pub fn active(&self) -> usize {
        self.batches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "https://youtu.be/aaaaaaaaaaa\n\nwww.youtube.com/watch?v=bbbbbbbbbbb\nhttps://www.youtube.com/watch?v=ccccccccccc\n";

    // ==================== Expansion Tests ====================

    #[test]
    fn test_three_valid_lines_and_blank_give_three_jobs_in_order() {
        let expander = BatchExpander::from_text(SAMPLE);
        let jobs = expander.into_jobs(1, Resolution::P720).unwrap();

        assert_eq!(jobs.len(), 3);
        let urls: Vec<&str> = jobs.iter().map(|j| j.source_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://youtu.be/aaaaaaaaaaa",
                "https://www.youtube.com/watch?v=bbbbbbbbbbb",
                "https://www.youtube.com/watch?v=ccccccccccc",
            ]
        );

        let batch_ids: Vec<Uuid> = jobs.iter().filter_map(|j| j.batch).map(|b| b.batch_id).collect();
        assert_eq!(batch_ids.len(), 3);
        assert!(batch_ids.iter().all(|id| *id == batch_ids[0]));
        let indices: Vec<usize> = jobs.iter().filter_map(|j| j.batch).map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_comments_and_invalid_lines_are_counted() {
        let text = "# my list\nhttps://youtu.be/x\nnot a url\nftp://example.com/file\n   \nhello\n";
        let expander = BatchExpander::from_text(text);
        assert_eq!(
            expander.summary(),
            BatchSummary {
                valid: 1,
                invalid: 3,
                blank: 1,
                comments: 1,
            }
        );
        let invalid: Vec<usize> = expander.invalid_lines().map(|(n, _)| n).collect();
        assert_eq!(invalid, vec![3, 4, 6]);
    }

    #[test]
    fn test_non_youtube_links_are_invalid() {
        let text = "https://example.com/clip\nhttps://youtu.be/abc\nvimeo.com/123\n";
        let expander = BatchExpander::from_text(text);
        assert_eq!(expander.summary().valid, 1);
        assert_eq!(expander.summary().invalid, 2);
        let invalid: Vec<&str> = expander.invalid_lines().map(|(_, line)| line).collect();
        assert_eq!(invalid, vec!["https://example.com/clip", "vimeo.com/123"]);
        let jobs = expander.into_jobs(1, Resolution::P720).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source_url.as_str(), "https://youtu.be/abc");
    }

    #[test]
    fn test_iteration_is_restartable() {
        let expander = BatchExpander::from_text(SAMPLE);
        let first: Vec<BatchLine> = expander.iter().collect();
        let second: Vec<BatchLine> = expander.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|l| l.line_no).collect::<Vec<_>>(), vec![1, 3, 4]);
    }

    #[test]
    fn test_job_count_matches_non_blank_non_comment_lines() {
        let text = "# header\nyoutu.be/a1\n\n\nyoutu.be/a2\n# trailing\nyoutu.be/a3\nyoutu.be/a4";
        let expander = BatchExpander::from_text(text);
        let expected = text
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim().starts_with('#'))
            .count();
        assert_eq!(expander.into_jobs(5, Resolution::P480).unwrap().len(), expected);
    }

    #[test]
    fn test_empty_file_is_input_error() {
        let expander = BatchExpander::from_text("\n# nothing here\n\n");
        let err = expander.into_jobs(1, Resolution::P720).unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
    }

    #[tokio::test]
    async fn test_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), SAMPLE).unwrap();
        let expander = BatchExpander::from_file(file.path()).await.unwrap();
        assert_eq!(expander.summary().valid, 3);
    }

    // ==================== Tracker Tests ====================

    #[test]
    fn test_tracker_reports_after_last_job() {
        let tracker = BatchTracker::new();
        let batch_id = Uuid::new_v4();
        let item = |index| BatchRef {
            batch_id,
            index,
            total: 3,
        };

        assert_eq!(tracker.record(&item(0), true), None);
        assert_eq!(tracker.record(&item(1), false), None);
        assert_eq!(tracker.active(), 1);
        assert_eq!(
            tracker.record(&item(2), true),
            Some(BatchReport {
                succeeded: 2,
                failed: 1,
                total: 3,
            })
        );
        assert_eq!(tracker.active(), 0);
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("youtube.com/watch?v=x").map(|u| u.to_string()),
            Some("https://youtube.com/watch?v=x".to_string())
        );
        assert!(normalize_url("javascript:alert(1)").is_none());
        assert!(normalize_url("https://").is_none());
    }
}
