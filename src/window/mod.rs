pub mod bounds;

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{Duration, Time};
use crate::error::{Error, Result};

pub use bounds::Bounds;

/// An infinite sequence of time bounds. Bound `i` starts at
/// `zero + every * i` and lasts `period`, where `zero` is the Unix epoch
/// shifted by `offset`. A negative period makes each bound extend backwards
/// from that instant instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowParts", into = "WindowParts")]
pub struct Window {
    every: Duration,
    period: Duration,
    offset: Duration,
    zero: Time,
    zero_months: i64,
}

#[derive(Serialize, Deserialize)]
struct WindowParts {
    every: Duration,
    period: Duration,
    offset: Duration,
}

impl TryFrom<WindowParts> for Window {
    type Error = Error;

    fn try_from(parts: WindowParts) -> Result<Self> {
        Window::new(parts.every, parts.period, parts.offset)
    }
}

impl From<Window> for WindowParts {
    fn from(w: Window) -> Self {
        WindowParts { every: w.every, period: w.period, offset: w.offset }
    }
}

impl Window {
    /// `every` must be positive and either purely calendar months or purely
    /// nanoseconds. `period` and `offset` may be anything.
    pub fn new(every: Duration, period: Duration, offset: Duration) -> Result<Window> {
        if every.is_zero() {
            return Err(Error::InvalidWindow(
                "duration used as an interval cannot be zero".to_string(),
            ));
        }
        if every.is_mixed() {
            return Err(Error::InvalidWindow(
                "duration used as an interval cannot mix month and nanosecond units".to_string(),
            ));
        }
        if every.is_negative() {
            return Err(Error::InvalidWindow(
                "duration used as an interval cannot be negative".to_string(),
            ));
        }

        let zero = Time::EPOCH.add(offset);
        let w = Window {
            every,
            period,
            offset,
            zero,
            zero_months: zero.calendar_months(),
        };
        debug!(%every, %period, %offset, %zero, "created window");
        Ok(w)
    }

    pub fn every(&self) -> Duration {
        self.every
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// The anchor all bound indices are measured from.
    pub fn zero(&self) -> Time {
        self.zero
    }

    /// The bounds with the greatest index whose nominal start is at or
    /// before `t`. For a negative period this is the latest bound containing
    /// `t`. Underlapping windows may return bounds that end before `t` when
    /// `t` falls in a gap.
    pub fn get_latest_bounds(&self, t: Time) -> Bounds {
        let index = self.last_index(t);
        let b = self.bounds_at(index);
        if !self.period.is_negative() {
            return b;
        }

        if self.every.nanos_only() && self.period.nanos_only() {
            // Bound k contains t iff t < start_k <= t + |period|.
            let reach = self.last_index(t.add(self.period.neg()));
            return if reach > index { self.bounds_at(reach) } else { b };
        }

        let mut b = b;
        let mut next = self.next_bounds(&b);
        // Saturation at the end of the time range repeats the same bound.
        while next.contains(t) && next != b {
            b = next;
            next = self.next_bounds(&b);
        }
        b
    }

    pub fn next_bounds(&self, b: &Bounds) -> Bounds {
        self.bounds_at(b.index().saturating_add(1))
    }

    pub fn prev_bounds(&self, b: &Bounds) -> Bounds {
        self.bounds_at(b.index().saturating_sub(1))
    }

    /// Every bound overlapping `[start, stop)`, latest first.
    pub fn get_overlapping_bounds(&self, start: Time, stop: Time) -> Vec<Bounds> {
        let range = Bounds::new(start, stop);
        if range.is_empty() {
            return Vec::new();
        }

        let mut bounds = Vec::new();
        let mut b = self.get_latest_bounds(stop);
        while b.stop() > start {
            if b.overlaps(&range) {
                bounds.push(b);
            }
            let prev = self.prev_bounds(&b);
            if prev.index() == b.index() || prev == b {
                break;
            }
            b = prev;
        }
        bounds
    }

    /// Bound `index`, always computed from the anchor so that month lengths
    /// never accumulate drift.
    fn bounds_at(&self, index: i64) -> Bounds {
        let start = self.zero.add(self.every.mul(index));
        let stop = start.add(self.period);
        if self.period.is_negative() {
            Bounds::with_index(stop, start, index)
        } else {
            Bounds::with_index(start, stop, index)
        }
    }

    /// Greatest index whose nominal start is at or before `t`.
    fn last_index(&self, t: Time) -> i64 {
        if !self.every.months_only() {
            return floor_index(self.zero.nanos(), t.nanos(), self.every.nanoseconds());
        }

        let mut target = t.calendar_months();
        if is_before_within_month(t, self.zero) {
            target -= 1;
        }
        let index = floor_index(self.zero_months, target, self.every.months());

        // Day clamping can pull the next start back to or before t, e.g. an
        // anchor on the 31st lands on Feb 28.
        let next = index.saturating_add(1);
        if self.zero.add(self.every.mul(next)) <= t {
            next
        } else {
            index
        }
    }
}

/// `floor((target - zero) / every)` for a positive `every`.
fn floor_index(zero: i64, target: i64, every: i64) -> i64 {
    let delta = target as i128 - zero as i128;
    let index = delta.div_euclid(every as i128);
    index.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Compares the day of month and time of day of `t` against `zero`, ignoring
/// year and month.
fn is_before_within_month(t: Time, zero: Time) -> bool {
    let (a, b) = (t.to_datetime(), zero.to_datetime());
    (a.day(), a.hour(), a.minute(), a.second(), a.nanosecond())
        < (b.day(), b.hour(), b.minute(), b.second(), b.nanosecond())
}
