//! Distance → range bucket.

use rangelight_types::{LightError, Range};

/// The first range, in the order given, whose half-open interval
/// `[lower, upper)` contains `distance`.
///
/// Callers pass ranges in table order, so on overlap the lowest id wins.
/// Non-finite distances never match.
pub fn resolve_range(ranges: &[Range], distance: f64) -> Result<&Range, LightError> {
    if !distance.is_finite() {
        return Err(LightError::NoMatchingRange { distance });
    }
    ranges
        .iter()
        .find(|r| r.contains(distance))
        .ok_or(LightError::NoMatchingRange { distance })
}

/// Ranges sorted by lower bound, ties broken by id.
pub fn by_lower_bound(ranges: &[Range]) -> Vec<&Range> {
    let mut sorted: Vec<&Range> = ranges.iter().collect();
    sorted.sort_by(|a, b| a.lower.total_cmp(&b.lower).then(a.id.cmp(&b.id)));
    sorted
}

/// Position of `range_id` among `ranges` ordered by lower bound
/// (close = 0, mid = 1, far = 2 for the usual three buckets).
pub fn position(ranges: &[Range], range_id: i64) -> Option<usize> {
    by_lower_bound(ranges).iter().position(|r| r.id == range_id)
}

/// Upper limits of the two nearest ranges, as announced to the strips.
pub fn range_limits(ranges: &[Range]) -> Result<(f64, f64), LightError> {
    match by_lower_bound(ranges).as_slice() {
        [close, mid, ..] => Ok((close.upper, mid.upper)),
        _ => Err(LightError::not_found("Close and mid ranges")),
    }
}
