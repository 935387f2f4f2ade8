//! Near-duplicate detection for submitted posts.
//!
//! Scores a candidate against existing posts with per-field similarity:
//! an insertion/deletion edit ratio for free text, exact match for the marketplace,
//! and Hamming distance over 64-bit average hashes for images. Only fields
//! present on both sides take part in the average.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::post::{Post, PostContent};
use super::PostId;
use crate::error::SchedulerError;

/// Default score at or above which a candidate counts as a duplicate.
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 80.0;

/// 64-bit average hash of an image (8×8 grayscale thumbnail, one bit per
/// pixel set when the pixel is brighter than the mean).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHash(u64);

impl ImageHash {
    /// Number of bits in the hash.
    pub const BITS: u32 = 64;

    /// Wraps a precomputed hash.
    #[must_use]
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw hash bits.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Computes the average hash of an 8×8 grayscale thumbnail in row-major
    /// order. Decoding and downscaling happen upstream.
    #[must_use]
    pub fn from_thumbnail(pixels: &[u8; 64]) -> Self {
        let sum: u32 = pixels.iter().map(|&p| u32::from(p)).sum();
        let bits = pixels
            .iter()
            .enumerate()
            .filter(|&(_, &p)| u32::from(p) * 64 > sum)
            .fold(0u64, |acc, (i, _)| acc | (1u64 << (63 - i)));
        Self(bits)
    }

    /// Number of differing bits.
    #[must_use]
    pub const fn distance(self, other: Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Similarity in `0..=100`: `(1 - distance/64) * 100`.
    #[must_use]
    pub fn similarity(self, other: Self) -> f64 {
        let ratio = f64::from(self.distance(other)) / f64::from(Self::BITS);
        ((1.0 - ratio) * 100.0).max(0.0)
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for ImageHash {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| SchedulerError::InvalidRequest(format!("invalid image hash {s}: {e}")))
    }
}

impl Serialize for ImageHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCheck {
    /// `true` when `score` meets the threshold.
    pub is_duplicate: bool,
    /// Closest existing post, reported even below the threshold.
    pub best_match: Option<PostId>,
    /// Similarity of the closest post in `0..=100`.
    pub score: f64,
}

/// Weighted field comparison against a set of existing posts.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    threshold: f64,
}

impl DuplicateDetector {
    /// Creates a detector flagging scores at or above `threshold`.
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Returns the configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scores `candidate` against every post in `existing`.
    ///
    /// Ties keep the earliest post in iteration order.
    pub fn check<'a, I>(&self, candidate: &PostContent, existing: I) -> DuplicateCheck
    where
        I: IntoIterator<Item = &'a Post>,
    {
        let mut best: Option<(PostId, f64)> = None;
        for post in existing {
            let Some(score) = similarity(candidate, &post.content) else {
                continue;
            };
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((post.id, score));
            }
        }

        let score = best.map_or(0.0, |(_, s)| s);
        DuplicateCheck {
            is_duplicate: best.is_some() && score >= self.threshold,
            best_match: best.map(|(id, _)| id),
            score,
        }
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_THRESHOLD)
    }
}

/// Average per-field similarity, or `None` when no field is comparable.
#[must_use]
pub fn similarity(a: &PostContent, b: &PostContent) -> Option<f64> {
    let mut scores = Vec::with_capacity(4);

    if let Some(s) = text_similarity(Some(a.product_name.as_str()), Some(b.product_name.as_str())) {
        scores.push(s);
    }
    if let (Some(x), Some(y)) = (present(a.marketplace.as_deref()), present(b.marketplace.as_deref()))
    {
        scores.push(if x == y { 100.0 } else { 0.0 });
    }
    if let Some(s) = text_similarity(a.blog_theme.as_deref(), b.blog_theme.as_deref()) {
        scores.push(s);
    }
    if let (Some(x), Some(y)) = (a.image_hash, b.image_hash) {
        scores.push(x.similarity(y));
    }

    if scores.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = scores.len() as f64;
    Some(scores.iter().sum::<f64>() / count)
}

fn present(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Case-insensitive text similarity scaled to `0..=100`.
fn text_similarity(a: Option<&str>, b: Option<&str>) -> Option<f64> {
    let (a, b) = (present(a)?, present(b)?);
    Some(indel_ratio(&a.to_lowercase(), &b.to_lowercase()))
}

/// Edit ratio where only insertions and deletions count:
/// `(len_a + len_b - indel) / (len_a + len_b) * 100`, which equals
/// `2 * lcs / (len_a + len_b) * 100`. A substitution costs two edits.
#[allow(clippy::cast_precision_loss)]
fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    (2 * longest_common_subsequence(&a, &b) * 100) as f64 / total as f64
}

/// Length of the longest common subsequence, one DP row at a time.
fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    for ca in a {
        let mut row = Vec::with_capacity(b.len() + 1);
        row.push(0);
        for (cb, (&diag, &up)) in b.iter().zip(prev.iter().zip(prev.iter().skip(1))) {
            let left = row.last().copied().unwrap_or(0);
            row.push(if ca == cb { diag + 1 } else { up.max(left) });
        }
        prev = row;
    }
    prev.last().copied().unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::post::Payment;
    use crate::domain::post_state::PostState;

    fn post(id: i64, content: PostContent) -> Post {
        Post {
            id: PostId::new(id),
            owner_id: 1,
            state: PostState::Draft,
            payment: Payment::default(),
            content,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn content(name: &str, marketplace: Option<&str>) -> PostContent {
        PostContent {
            product_name: name.to_string(),
            marketplace: marketplace.map(str::to_string),
            ..PostContent::default()
        }
    }

    #[test]
    fn identical_name_and_marketplace_is_duplicate() {
        let existing = [post(1, content("Vitamin C serum", Some("Ozon")))];
        let check = DuplicateDetector::new(80.0)
            .check(&content("Vitamin C serum", Some("Ozon")), &existing);
        assert!(check.is_duplicate);
        assert_eq!(check.best_match, Some(PostId::new(1)));
        assert!((check.score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn name_comparison_ignores_case() {
        let a = content("FACE CREAM", None);
        let b = content("face cream", None);
        let Some(score) = similarity(&a, &b) else {
            panic!("names are comparable");
        };
        assert!((score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn appended_words_score_by_insertions_only() {
        let existing = [post(1, content("Nike Air", None))];
        let check = DuplicateDetector::new(80.0).check(&content("Nike Air Max", None), &existing);
        assert!((check.score - 80.0).abs() < 1e-9, "score was {}", check.score);
        assert!(check.is_duplicate);
    }

    #[test]
    fn substitution_counts_as_two_edits() {
        // "cat" vs "cut": common subsequence "ct", 4 of 6 characters kept.
        assert!((indel_ratio("cat", "cut") - 400.0 / 6.0).abs() < 1e-9);
        assert!((indel_ratio("", "") - 100.0).abs() < f64::EPSILON);
        assert!(indel_ratio("abc", "xyz").abs() < f64::EPSILON);
    }

    #[test]
    fn marketplace_mismatch_drags_average_down() {
        let existing = [post(1, content("Vitamin C serum", Some("Ozon")))];
        let check = DuplicateDetector::new(80.0)
            .check(&content("Vitamin C serum", Some("Wildberries")), &existing);
        assert!(!check.is_duplicate);
        assert!((check.score - 50.0).abs() < f64::EPSILON);
        assert_eq!(check.best_match, Some(PostId::new(1)));
    }

    #[test]
    fn missing_fields_are_skipped_not_zeroed() {
        let mut a = content("Garden hose", Some("Ozon"));
        a.blog_theme = Some("gardening".to_string());
        let b = content("Garden hose", Some("Ozon"));
        let Some(score) = similarity(&a, &b) else {
            panic!("fields are comparable");
        };
        assert!((score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nothing_comparable_yields_no_match() {
        let existing = [post(1, content("", None))];
        let check = DuplicateDetector::default().check(&content("Lamp", None), &existing);
        assert!(!check.is_duplicate);
        assert_eq!(check.best_match, None);
        assert!(check.score.abs() < f64::EPSILON);
    }

    #[test]
    fn best_match_is_reported_below_threshold() {
        let existing = [
            post(1, content("Table lamp", None)),
            post(2, content("Desk lamp", None)),
        ];
        let check = DuplicateDetector::new(99.0).check(&content("Desk lamps", None), &existing);
        assert!(!check.is_duplicate);
        assert_eq!(check.best_match, Some(PostId::new(2)));
        assert!(check.score > 80.0);
    }

    #[test]
    fn image_similarity_uses_hamming_distance() {
        let a = ImageHash::new(0);
        let b = ImageHash::new(0xFFFF);
        assert_eq!(a.distance(b), 16);
        assert!((a.similarity(b) - 75.0).abs() < f64::EPSILON);
        assert!(a.similarity(ImageHash::new(u64::MAX)).abs() < f64::EPSILON);
    }

    #[test]
    fn average_hash_marks_bright_pixels() {
        let mut pixels = [0u8; 64];
        if let Some(first) = pixels.first_mut() {
            *first = 255;
        }
        let hash = ImageHash::from_thumbnail(&pixels);
        assert_eq!(hash.bits(), 1u64 << 63);
        assert_eq!(ImageHash::from_thumbnail(&[128u8; 64]).bits(), 0);
    }

    #[test]
    fn image_hash_serializes_as_hex() {
        let hash = ImageHash::new(0xdead_beef);
        let Ok(json) = serde_json::to_string(&hash) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"00000000deadbeef\"");
        let Ok(back) = serde_json::from_str::<ImageHash>(&json) else {
            panic!("deserialization failed");
        };
        assert_eq!(back, hash);
    }
}
