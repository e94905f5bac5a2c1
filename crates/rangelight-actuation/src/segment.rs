//! Range position → span of LEDs on a strip.

use std::fmt;

use rangelight_types::LightError;
use serde::Serialize;

/// Inclusive span of LED indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Span `index` of `partitions` equal-as-possible spans covering
/// `[0, strip_length)`.
///
/// `start = floor(k·L/n)`, `end = floor((k+1)·L/n) − 1`. Consecutive spans are
/// contiguous and disjoint and together cover the whole strip. A strip
/// shorter than the partition count, zero partitions, or an index past the
/// last partition are layout errors.
pub fn map_segment(index: usize, partitions: usize, strip_length: u32) -> Result<Segment, LightError> {
    let layout = LightError::SegmentLayout {
        strip_length,
        partitions,
    };
    if partitions == 0 || (strip_length as usize) < partitions || index >= partitions {
        return Err(layout);
    }
    let (k, n, l) = (index as u64, partitions as u64, u64::from(strip_length));
    let start = k * l / n;
    let end = (k + 1) * l / n - 1;
    Ok(Segment {
        start: start as u32,
        end: end as u32,
    })
}
