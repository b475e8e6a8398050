//! Video resolutions and the fallback policy used when the requested one is missing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Video height in pixels, displayed as `720p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution(u32);

impl Resolution {
    pub const P360: Resolution = Resolution(360);
    pub const P480: Resolution = Resolution(480);
    pub const P720: Resolution = Resolution(720);
    pub const P1080: Resolution = Resolution(1080);

    /// Choices offered on the inline keyboard.
    pub const CHOICES: [Resolution; 4] = [Self::P360, Self::P480, Self::P720, Self::P1080];

    pub fn new(height: u32) -> Self {
        Self(height)
    }

    pub fn height(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.0)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_suffix('p')
            .or_else(|| trimmed.strip_suffix('P'))
            .unwrap_or(trimmed);
        match digits.parse::<u32>() {
            Ok(height) if height > 0 => Ok(Resolution(height)),
            _ => Err(format!("invalid resolution: {:?}", s)),
        }
    }
}

impl TryFrom<String> for Resolution {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// How to pick a substitute when the requested resolution is not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Highest available height not above the request, else the lowest available
    #[default]
    BestBelow,
    /// Smallest distance to the request; ties go to the lower height
    Nearest,
    /// No substitute
    Strict,
}

/// Outcome of a failed selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionUnavailable {
    pub requested: Resolution,
    /// What the policy would use instead, if anything
    pub fallback: Option<Resolution>,
    pub available: Vec<Resolution>,
}

impl ResolutionPolicy {
    /// Picks the resolution to download.
    ///
    /// Returns the requested value when it is offered. Otherwise returns
    /// `Err` carrying the policy's fallback, which the caller announces and uses.
    /// An empty `available` list means the source did not report heights;
    /// the request is passed through as is.
    pub fn resolve(self, requested: Resolution, available: &[Resolution]) -> Result<Resolution, ResolutionUnavailable> {
        if available.is_empty() || available.contains(&requested) {
            return Ok(requested);
        }

        let mut sorted = available.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let fallback = match self {
            ResolutionPolicy::BestBelow => sorted
                .iter()
                .rev()
                .find(|r| **r <= requested)
                .or_else(|| sorted.first())
                .copied(),
            ResolutionPolicy::Nearest => sorted
                .iter()
                .min_by_key(|r| (r.height().abs_diff(requested.height()), r.height()))
                .copied(),
            ResolutionPolicy::Strict => None,
        };

        Err(ResolutionUnavailable {
            requested,
            fallback,
            available: sorted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn heights(values: &[u32]) -> Vec<Resolution> {
        values.iter().copied().map(Resolution::new).collect()
    }

    // ==================== Resolution Tests ====================

    #[test]
    fn test_parse_resolution() {
        assert_eq!("720p".parse::<Resolution>(), Ok(Resolution::P720));
        assert_eq!("1080".parse::<Resolution>(), Ok(Resolution::P1080));
        assert_eq!(" 480P ".parse::<Resolution>(), Ok(Resolution::P480));
        assert!("hd".parse::<Resolution>().is_err());
        assert!("0p".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_resolution_serde_as_string() {
        let json = serde_json::to_string(&Resolution::P360).unwrap();
        assert_eq!(json, "\"360p\"");
        let parsed: Resolution = serde_json::from_str("\"1080p\"").unwrap();
        assert_eq!(parsed, Resolution::P1080);
    }

    #[test]
    fn test_policy_serde_names() {
        let parsed: ResolutionPolicy = serde_json::from_str("\"best_below\"").unwrap();
        assert_eq!(parsed, ResolutionPolicy::BestBelow);
        assert_eq!(ResolutionPolicy::Nearest.to_string(), "nearest");
        assert_eq!("strict".parse::<ResolutionPolicy>(), Ok(ResolutionPolicy::Strict));
    }

    // ==================== Policy Tests ====================

    #[test]
    fn test_exact_match_wins() {
        for policy in [ResolutionPolicy::BestBelow, ResolutionPolicy::Nearest, ResolutionPolicy::Strict] {
            assert_eq!(policy.resolve(Resolution::P720, &heights(&[480, 720, 1080])), Ok(Resolution::P720));
        }
    }

    #[test]
    fn test_best_below_picks_lower() {
        let err = ResolutionPolicy::BestBelow
            .resolve(Resolution::P720, &heights(&[1080, 480]))
            .unwrap_err();
        assert_eq!(err.fallback, Some(Resolution::P480));
        assert_eq!(err.available, heights(&[480, 1080]));
    }

    #[test]
    fn test_best_below_falls_back_to_lowest() {
        let err = ResolutionPolicy::BestBelow
            .resolve(Resolution::P360, &heights(&[720, 1080]))
            .unwrap_err();
        assert_eq!(err.fallback, Some(Resolution::P720));
    }

    #[test]
    fn test_nearest_prefers_lower_on_tie() {
        let err = ResolutionPolicy::Nearest
            .resolve(Resolution::new(600), &heights(&[480, 720]))
            .unwrap_err();
        assert_eq!(err.fallback, Some(Resolution::P480));

        let err = ResolutionPolicy::Nearest
            .resolve(Resolution::P720, &heights(&[480, 1080, 2160]))
            .unwrap_err();
        assert_eq!(err.fallback, Some(Resolution::P480));

        let err = ResolutionPolicy::Nearest
            .resolve(Resolution::P1080, &heights(&[480, 1440]))
            .unwrap_err();
        assert_eq!(err.fallback, Some(Resolution::new(1440)));
    }

    #[test]
    fn test_strict_has_no_fallback() {
        let err = ResolutionPolicy::Strict
            .resolve(Resolution::P720, &heights(&[480, 1080]))
            .unwrap_err();
        assert_eq!(err.fallback, None);
    }

    #[test]
    fn test_unknown_heights_pass_through() {
        assert_eq!(ResolutionPolicy::Strict.resolve(Resolution::P720, &[]), Ok(Resolution::P720));
    }
}
