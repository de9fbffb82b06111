//! Temporal matching of primary items against located reference items.

use chrono::{DateTime, Utc};

use crate::types::GeoPoint;

/// Maximum timestamp distance for a valid match: 24 hours.
pub const MATCH_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// A reference-set item that carries a usable coordinate.
///
/// Built once per run from the reference images; items without a decodable
/// location never make it into this list.
#[derive(Debug, Clone)]
pub struct ReferenceRecord {
    /// Reference filename, recorded on matched outputs
    pub filename: String,
    /// Capture timestamp, or the file modification time when the image
    /// carries no capture date
    pub timestamp: DateTime<Utc>,
    /// Decoded coordinate
    pub location: GeoPoint,
}

/// Pairs a primary-item timestamp with the closest reference in time.
pub struct TemporalMatcher;

impl TemporalMatcher {
    /// Find the candidate closest in time to `timestamp`, if any lies
    /// within the match window.
    ///
    /// The window bound is inclusive: a delta of exactly 24 hours still
    /// matches. On an exact tie the earlier-indexed candidate wins, so the
    /// result is deterministic for a fixed candidate order. Returns the
    /// winning record and its absolute delta in milliseconds.
    pub fn find_closest<'a>(
        timestamp: DateTime<Utc>,
        candidates: &'a [ReferenceRecord],
    ) -> Option<(&'a ReferenceRecord, i64)> {
        let mut best: Option<(&ReferenceRecord, i64)> = None;

        for candidate in candidates {
            let delta = (timestamp - candidate.timestamp).num_milliseconds().abs();
            match best {
                Some((_, best_delta)) if delta >= best_delta => {}
                _ => best = Some((candidate, delta)),
            }
        }

        best.filter(|(_, delta)| *delta <= MATCH_WINDOW_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
    }

    fn reference(name: &str, timestamp: DateTime<Utc>) -> ReferenceRecord {
        ReferenceRecord {
            filename: name.to_string(),
            timestamp,
            location: GeoPoint {
                latitude: 1.0,
                longitude: 2.0,
            },
        }
    }

    #[test]
    fn test_picks_closest_candidate() {
        let candidates = vec![
            reference("far.jpg", at(2, 0)),
            reference("near.jpg", at(11, 30)),
            reference("other.jpg", at(20, 0)),
        ];
        let (winner, delta) = TemporalMatcher::find_closest(at(12, 0), &candidates).unwrap();
        assert_eq!(winner.filename, "near.jpg");
        assert_eq!(delta, 30 * 60 * 1000);
    }

    #[test]
    fn test_window_bound_is_inclusive() {
        // Exactly 24 hours away still matches
        let candidates = vec![reference("edge.jpg", at(0, 0))];
        let target = at(0, 0) + chrono::Duration::hours(24);
        let (winner, delta) = TemporalMatcher::find_closest(target, &candidates).unwrap();
        assert_eq!(winner.filename, "edge.jpg");
        assert_eq!(delta, MATCH_WINDOW_MS);
    }

    #[test]
    fn test_one_millisecond_past_window_is_rejected() {
        let candidates = vec![reference("late.jpg", at(0, 0))];
        let target = at(0, 0) + chrono::Duration::hours(24) + chrono::Duration::milliseconds(1);
        assert!(TemporalMatcher::find_closest(target, &candidates).is_none());
    }

    #[test]
    fn test_tie_breaks_toward_earlier_candidate() {
        // Two candidates equidistant on opposite sides
        let candidates = vec![
            reference("before.jpg", at(11, 0)),
            reference("after.jpg", at(13, 0)),
        ];
        let (winner, _) = TemporalMatcher::find_closest(at(12, 0), &candidates).unwrap();
        assert_eq!(winner.filename, "before.jpg");

        // Swapping the order flips the winner
        let swapped: Vec<_> = candidates.into_iter().rev().collect();
        let (winner, _) = TemporalMatcher::find_closest(at(12, 0), &swapped).unwrap();
        assert_eq!(winner.filename, "after.jpg");
    }

    #[test]
    fn test_empty_candidates() {
        assert!(TemporalMatcher::find_closest(at(12, 0), &[]).is_none());
    }

    #[test]
    fn test_deterministic_over_repeated_calls() {
        let candidates = vec![
            reference("a.jpg", at(10, 0)),
            reference("b.jpg", at(14, 0)),
        ];
        let first = TemporalMatcher::find_closest(at(12, 0), &candidates)
            .map(|(r, d)| (r.filename.clone(), d));
        for _ in 0..10 {
            let again = TemporalMatcher::find_closest(at(12, 0), &candidates)
                .map(|(r, d)| (r.filename.clone(), d));
            assert_eq!(first, again);
        }
    }
}
