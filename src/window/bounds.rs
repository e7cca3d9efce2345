use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::common::{Duration, Time};

/// A half-open time interval `[start, stop)`. Bounds produced by a window also
/// carry their position in the window's sequence; two bounds are equal when
/// they cover the same interval regardless of that position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bounds {
    start: Time,
    stop: Time,
    #[serde(default)]
    index: i64,
}

impl Bounds {
    pub fn new(start: Time, stop: Time) -> Self {
        Self { start, stop, index: 0 }
    }

    pub(crate) fn with_index(start: Time, stop: Time, index: i64) -> Self {
        Self { start, stop, index }
    }

    pub fn start(&self) -> Time {
        self.start
    }

    pub fn stop(&self) -> Time {
        self.stop
    }

    /// Position within the window that produced these bounds.
    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn contains(&self, t: Time) -> bool {
        self.start <= t && t < self.stop
    }

    /// Touching edges do not overlap.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.stop
    }

    pub fn length(&self) -> Duration {
        if self.is_empty() {
            return Duration::ZERO;
        }
        self.stop.sub(self.start)
    }
}

impl PartialEq for Bounds {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.stop == other.stop
    }
}

impl Eq for Bounds {}

impl Hash for Bounds {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.start.hash(state);
        self.stop.hash(state);
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(start: i64, stop: i64) -> Bounds {
        Bounds::new(Time(start), Time(stop))
    }

    #[test]
    fn test_overlaps() {
        assert!(!b(0, 10).overlaps(&b(10, 20)));
        assert!(!b(10, 20).overlaps(&b(0, 10)));
        assert!(b(0, 10).overlaps(&b(5, 15)));
        assert!(b(0, 10).overlaps(&b(2, 3)));
    }

    #[test]
    fn test_contains_is_half_open() {
        let bounds = b(0, 10);
        assert!(bounds.contains(Time(0)));
        assert!(bounds.contains(Time(9)));
        assert!(!bounds.contains(Time(10)));
        assert!(!bounds.contains(Time(-1)));
    }

    #[test]
    fn test_empty_and_length() {
        assert!(b(5, 5).is_empty());
        assert!(b(6, 5).is_empty());
        assert_eq!(b(6, 5).length(), Duration::ZERO);
        assert_eq!(b(0, 10).length(), Duration::from_nanos(10));
    }

    #[test]
    fn test_equality_ignores_index() {
        assert_eq!(Bounds::with_index(Time(0), Time(1), 7), b(0, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            b(0, 60_000_000_000).to_string(),
            "[1970-01-01T00:00:00Z, 1970-01-01T00:01:00Z)"
        );
    }
}
