//! Resolution choices waiting for a button press
//!
//! A link message or batch file stores its URLs under a random token and
//! answers with a keyboard whose callback data is `res:<token>:<height>`.
//! Entries expire after [`SELECTION_TTL`]; a late press finds nothing and
//! the user is told the session expired.

use moka::future::Cache;
use std::time::Duration;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;
use uuid::Uuid;

use tubecore::download::resolution::Resolution;

/// How long a resolution keyboard stays usable
pub const SELECTION_TTL: Duration = Duration::from_secs(600);

/// Upper bound on remembered selections
const MAX_PENDING: u64 = 10_000;

const CALLBACK_PREFIX: &str = "res:";

/// Links waiting for a resolution choice
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSelection {
    pub chat_id: i64,
    pub urls: Vec<Url>,
    /// Invalid lines of a batch file, reported back to the user
    pub skipped_lines: usize,
    /// Came from an uploaded file rather than a message
    pub from_file: bool,
}

impl PendingSelection {
    pub fn from_message(chat_id: i64, urls: Vec<Url>) -> Self {
        Self {
            chat_id,
            urls,
            skipped_lines: 0,
            from_file: false,
        }
    }

    pub fn from_file(chat_id: i64, urls: Vec<Url>, skipped_lines: usize) -> Self {
        Self {
            chat_id,
            urls,
            skipped_lines,
            from_file: true,
        }
    }

    pub fn is_batch(&self) -> bool {
        self.from_file || self.urls.len() > 1
    }

    /// Text shown above the resolution keyboard.
    pub fn prompt(&self) -> String {
        let mut text = match (self.from_file, self.urls.len()) {
            (false, 1) => "🎬 Choose a resolution:".to_string(),
            (false, n) => format!("🎬 Found {} links. Choose a resolution for all of them:", n),
            (true, n) => format!("📁 Found {} links in the file. Choose a resolution for all videos:", n),
        };
        if self.skipped_lines > 0 {
            text.push_str(&format!("\n\n⚠️ {} invalid line(s) skipped.", self.skipped_lines));
        }
        text
    }
}

/// TTL cache of pending selections, shared by all handlers.
#[derive(Clone)]
pub struct PendingSelections {
    cache: Cache<String, PendingSelection>,
}

impl Default for PendingSelections {
    fn default() -> Self {
        Self::new(SELECTION_TTL)
    }
}

impl PendingSelections {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(MAX_PENDING).time_to_live(ttl).build(),
        }
    }

    /// Stores the selection and returns its token.
    pub async fn insert(&self, selection: PendingSelection) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.cache.insert(token.clone(), selection).await;
        token
    }

    /// Removes and returns the selection; `None` once it expired or was used.
    pub async fn take(&self, token: &str) -> Option<PendingSelection> {
        // `get` honours the TTL; `remove` settles concurrent presses
        let selection = self.cache.get(token).await?;
        self.cache.remove(token).await.map(|_| selection)
    }
}

pub fn callback_data(token: &str, resolution: Resolution) -> String {
    format!("{}{}:{}", CALLBACK_PREFIX, token, resolution.height())
}

/// Splits `res:<token>:<height>` into its parts.
pub fn parse_callback_data(data: &str) -> Option<(&str, Resolution)> {
    let (token, height) = data.strip_prefix(CALLBACK_PREFIX)?.rsplit_once(':')?;
    let height: u32 = height.parse().ok()?;
    if token.is_empty() || height == 0 {
        return None;
    }
    Some((token, Resolution::new(height)))
}

/// Two rows of resolution buttons; the default one is starred.
pub fn resolution_keyboard(token: &str, default: Resolution) -> InlineKeyboardMarkup {
    resolution_keyboard_with(token, default, &Resolution::CHOICES)
}

/// Buttons for the given choices, two per row.
pub fn resolution_keyboard_with(token: &str, default: Resolution, choices: &[Resolution]) -> InlineKeyboardMarkup {
    let rows = choices.chunks(2).map(|row| {
        row.iter()
            .map(|&resolution| {
                let label = if resolution == default {
                    format!("⭐ {}", resolution)
                } else {
                    resolution.to_string()
                };
                InlineKeyboardButton::callback(label, callback_data(token, resolution))
            })
            .collect::<Vec<_>>()
    });
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use teloxide::types::InlineKeyboardButtonKind;

    fn url(id: &str) -> Url {
        Url::parse(&format!("https://youtu.be/{}", id)).unwrap()
    }

    // ==================== Callback Data Tests ====================

    #[test]
    fn test_callback_data_fits_telegram_limit() {
        let token = Uuid::new_v4().simple().to_string();
        let data = callback_data(&token, Resolution::P1080);
        assert!(data.len() <= 64);
        assert_eq!(parse_callback_data(&data), Some((token.as_str(), Resolution::P1080)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_callback_data("res:abc:0"), None);
        assert_eq!(parse_callback_data("res::720"), None);
        assert_eq!(parse_callback_data("res:abc:high"), None);
        assert_eq!(parse_callback_data("bulk_res:abc:720"), None);
    }

    // ==================== Keyboard Tests ====================

    #[test]
    fn test_keyboard_layout() {
        let keyboard = resolution_keyboard("tok", Resolution::P720);
        let labels: Vec<Vec<String>> = keyboard
            .inline_keyboard
            .iter()
            .map(|row| row.iter().map(|b| b.text.clone()).collect())
            .collect();
        assert_eq!(labels, vec![vec!["360p", "480p"], vec!["⭐ 720p", "1080p"]]);

        match &keyboard.inline_keyboard[1][1].kind {
            InlineKeyboardButtonKind::CallbackData(data) => assert_eq!(data, "res:tok:1080"),
            other => panic!("unexpected button kind: {:?}", other),
        }
    }

    #[test]
    fn test_keyboard_with_limited_choices() {
        let keyboard = resolution_keyboard_with("tok", Resolution::P720, &[Resolution::P360, Resolution::P720, Resolution::P1080]);
        let labels: Vec<Vec<String>> = keyboard
            .inline_keyboard
            .iter()
            .map(|row| row.iter().map(|b| b.text.clone()).collect())
            .collect();
        assert_eq!(labels, vec![vec!["360p", "⭐ 720p"], vec!["1080p"]]);
    }

    // ==================== Prompt Tests ====================

    #[test]
    fn test_prompts() {
        assert_eq!(
            PendingSelection::from_message(1, vec![url("a")]).prompt(),
            "🎬 Choose a resolution:"
        );
        assert!(PendingSelection::from_message(1, vec![url("a"), url("b")]).is_batch());
        assert_eq!(
            PendingSelection::from_file(1, vec![url("a"), url("b")], 1).prompt(),
            "📁 Found 2 links in the file. Choose a resolution for all videos:\n\n⚠️ 1 invalid line(s) skipped."
        );
    }

    // ==================== Cache Tests ====================

    #[tokio::test]
    async fn test_take_is_single_use() {
        let selections = PendingSelections::default();
        let token = selections.insert(PendingSelection::from_message(5, vec![url("a")])).await;

        let taken = selections.take(&token).await.unwrap();
        assert_eq!(taken.chat_id, 5);
        assert_eq!(selections.take(&token).await, None);
    }

    #[tokio::test]
    async fn test_expired_selection_is_gone() {
        let selections = PendingSelections::new(Duration::from_millis(50));
        let token = selections.insert(PendingSelection::from_message(5, vec![url("a")])).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(selections.take(&token).await, None);
    }
}
