use std::collections::HashMap;

use crate::shared::rect::Rect;
use crate::tracking::domain::bounded_history::BoundedHistory;

/// Rounds `value` to the nearest multiple of `bucket`. Ties round up.
pub fn quantize(value: i32, bucket: i32) -> i32 {
    (value + bucket / 2).div_euclid(bucket) * bucket
}

/// A rectangle snapped to a `bucket`-pixel grid, used as a vote key so that
/// sub-bucket jitter counts as the same detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuantizedKey([i32; 4]);

impl QuantizedKey {
    pub fn new(rect: &Rect, bucket: i32) -> Self {
        Self([
            quantize(rect.x, bucket),
            quantize(rect.y, bucket),
            quantize(rect.width, bucket),
            quantize(rect.height, bucket),
        ])
    }
}

/// Occurrence counts of quantized keys over a history of candidate sets.
///
/// Keys keep the order in which they were first seen (oldest frame first), which
/// is what breaks ties between equal counts.
pub struct VoteTally {
    counts: Vec<(QuantizedKey, usize)>,
}

impl VoteTally {
    pub fn from_history(history: &BoundedHistory<Vec<Rect>>, bucket: i32) -> Self {
        let mut counts: Vec<(QuantizedKey, usize)> = Vec::new();
        let mut slots: HashMap<QuantizedKey, usize> = HashMap::new();
        for rect in history.iter().flatten() {
            let key = QuantizedKey::new(rect, bucket);
            match slots.get(&key) {
                Some(&slot) => counts[slot].1 += 1,
                None => {
                    slots.insert(key, counts.len());
                    counts.push((key, 1));
                }
            }
        }
        Self { counts }
    }

    /// Up to `limit` keys with the highest counts, each counted at least
    /// `min_count` times. Highest count first.
    pub fn leaders(&self, limit: usize, min_count: usize) -> Vec<(QuantizedKey, usize)> {
        let mut ranked = self.counts.clone();
        // Stable: equal counts stay in first-seen order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .take(limit)
            .filter(|(_, count)| *count >= min_count)
            .collect()
    }
}

/// The newest raw rectangle in `history` that quantizes to `key`.
pub fn most_recent_match(
    history: &BoundedHistory<Vec<Rect>>,
    key: &QuantizedKey,
    bucket: i32,
) -> Option<Rect> {
    history
        .iter()
        .rev()
        .flat_map(|set| set.iter())
        .find(|r| QuantizedKey::new(r, bucket) == *key)
        .copied()
}

/// Majority vote over `history`.
///
/// Returns up to `limit` rectangles whose quantized keys occur at least
/// `min_count` times, most frequent first, each resolved to its newest raw
/// instance. Nothing is returned while the history holds fewer than
/// `min_count` frames.
pub fn consistent_rects(
    history: &BoundedHistory<Vec<Rect>>,
    bucket: i32,
    min_count: usize,
    limit: usize,
) -> Vec<Rect> {
    if history.len() < min_count {
        return Vec::new();
    }
    let tally = VoteTally::from_history(history, bucket);
    tally
        .leaders(limit, min_count)
        .iter()
        .filter_map(|(key, _)| most_recent_match(history, key, bucket))
        .collect()
}
