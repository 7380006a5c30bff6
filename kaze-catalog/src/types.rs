//! Data model types for the title catalog.
//!
//! These types represent the persistent schema: canonical titles, their
//! per-provider source links, chapters, and per-user library and reading
//! state.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::Provider;

// ── Chapter Index ───────────────────────────────────────────────────────────

/// Rejected chapter index input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidChapterIndex {
    #[error("Chapter index is not a number: '{0}'")]
    NotANumber(String),
    #[error("Chapter index must be finite and non-negative, got {0}")]
    OutOfRange(f64),
}

/// Ordering key of a chapter within its title.
///
/// Indices are rational (side chapters like `10.5` are common) and are not
/// required to be dense. The value is always finite and non-negative, which
/// makes total ordering and bitwise hashing sound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ChapterIndex(f64);

impl ChapterIndex {
    pub fn new(value: f64) -> Result<Self, InvalidChapterIndex> {
        if !value.is_finite() || value < 0.0 {
            return Err(InvalidChapterIndex::OutOfRange(value));
        }
        // -0.0 and 0.0 must hash identically
        Ok(Self(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ChapterIndex {
    type Error = InvalidChapterIndex;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChapterIndex> for f64 {
    fn from(index: ChapterIndex) -> Self {
        index.0
    }
}

impl FromStr for ChapterIndex {
    type Err = InvalidChapterIndex;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| InvalidChapterIndex::NotANumber(s.to_string()))?;
        Self::new(value)
    }
}

impl PartialEq for ChapterIndex {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for ChapterIndex {}

impl Hash for ChapterIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for ChapterIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChapterIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for ChapterIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{}", self.0 as u64)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// ── Title ───────────────────────────────────────────────────────────────────

/// Publication lifecycle of a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
    Unknown,
}

impl TitleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleStatus::Ongoing => "ongoing",
            TitleStatus::Completed => "completed",
            TitleStatus::Hiatus => "hiatus",
            TitleStatus::Cancelled => "cancelled",
            TitleStatus::Unknown => "unknown",
        }
    }

    /// Parse a provider status string, mapping anything unrecognized to `Unknown`.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ongoing" | "publishing" | "releasing" => TitleStatus::Ongoing,
            "completed" | "complete" | "finished" | "ended" => TitleStatus::Completed,
            "hiatus" | "on hiatus" | "paused" => TitleStatus::Hiatus,
            "cancelled" | "canceled" | "dropped" => TitleStatus::Cancelled,
            _ => TitleStatus::Unknown,
        }
    }
}

impl fmt::Display for TitleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical local record of a work, regardless of how many providers list it.
#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub status: TitleStatus,
    pub genres: Vec<String>,
    /// Cached count of chapters the provider reported at the last successful check.
    pub chapters_count: u32,
    /// `None` until the first successful check; sorts as the stalest.
    pub last_checked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for inserting a brand new canonical title.
#[derive(Debug, Clone)]
pub struct NewTitle {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub status: TitleStatus,
    pub genres: Vec<String>,
}

/// Metadata fields a sync may refresh on an existing title.
///
/// The display title and slug are deliberately absent: slugs are stable
/// once issued.
#[derive(Debug, Clone, Default)]
pub struct TitleRefresh {
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub status: Option<TitleStatus>,
    pub genres: Option<Vec<String>>,
}

// ── Source Link ─────────────────────────────────────────────────────────────

/// Association between a canonical title and one provider's representation of it.
#[derive(Debug, Clone, Serialize)]
pub struct SourceLink {
    pub title_id: String,
    pub provider: Provider,
    pub provider_id: String,
    pub url: Option<String>,
    pub preferred: bool,
    pub last_checked_at: Option<String>,
    pub created_at: String,
}

/// Fields for linking a provider's representation to a title.
#[derive(Debug, Clone)]
pub struct NewSourceLink {
    pub title_id: String,
    pub provider: Provider,
    pub provider_id: String,
    pub url: Option<String>,
}

// ── Chapter ─────────────────────────────────────────────────────────────────

/// A stored chapter of a title.
#[derive(Debug, Clone, Serialize)]
pub struct Chapter {
    pub id: String,
    pub title_id: String,
    pub provider: Provider,
    pub provider_chapter_id: String,
    pub index: ChapterIndex,
    pub title: Option<String>,
    pub released_at: Option<String>,
    pub pages: Vec<String>,
    pub created_at: String,
}

/// Fields for inserting a chapter discovered by a sync.
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub id: String,
    pub title_id: String,
    pub provider: Provider,
    pub provider_chapter_id: String,
    pub index: ChapterIndex,
    pub title: Option<String>,
    pub released_at: Option<String>,
    pub pages: Vec<String>,
}

/// Sort direction for chapter listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChapterOrder {
    #[default]
    Ascending,
    Descending,
}

// ── Library ─────────────────────────────────────────────────────────────────

/// A user's tracking entry for one title.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryEntry {
    pub user_id: String,
    pub title_id: String,
    pub favourite: bool,
    /// Set when a sync adds chapters; cleared when the user reads the latest one.
    pub has_unseen: bool,
    pub last_read_chapter_id: Option<String>,
    pub rating: Option<u8>,
    pub notes: Option<String>,
    pub added_at: String,
}

/// Partial update of the user-editable fields of a library entry.
#[derive(Debug, Clone, Default)]
pub struct LibraryUpdate {
    pub favourite: Option<bool>,
    pub rating: Option<Option<u8>>,
    pub notes: Option<Option<String>>,
}

/// Per-user, per-chapter reading position.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingProgress {
    pub user_id: String,
    pub chapter_id: String,
    pub percentage: f64,
    pub completed: bool,
    pub last_read_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn chapter_index_rejects_nan_and_negative() {
        assert!(ChapterIndex::new(f64::NAN).is_err());
        assert!(ChapterIndex::new(f64::INFINITY).is_err());
        assert!(ChapterIndex::new(-1.0).is_err());
    }

    #[test]
    fn chapter_index_negative_zero_equals_zero() {
        let mut set = HashSet::new();
        set.insert(ChapterIndex::new(0.0).unwrap());
        assert!(set.contains(&ChapterIndex::new(-0.0).unwrap()));
    }

    #[test]
    fn chapter_index_orders_side_chapters() {
        let mut indices: Vec<ChapterIndex> = ["11", "10.5", "10", "2"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        indices.sort();
        let shown: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
        assert_eq!(shown, vec!["2", "10", "10.5", "11"]);
    }

    #[test]
    fn chapter_index_parse_error_keeps_input() {
        assert_eq!(
            "ten".parse::<ChapterIndex>(),
            Err(InvalidChapterIndex::NotANumber("ten".to_string()))
        );
    }

    #[test]
    fn status_loose_parsing() {
        assert_eq!(TitleStatus::from_str_loose("Ongoing"), TitleStatus::Ongoing);
        assert_eq!(TitleStatus::from_str_loose("FINISHED"), TitleStatus::Completed);
        assert_eq!(TitleStatus::from_str_loose("on hiatus"), TitleStatus::Hiatus);
        assert_eq!(TitleStatus::from_str_loose("???"), TitleStatus::Unknown);
    }
}
