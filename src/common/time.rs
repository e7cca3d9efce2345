use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const NANOS_PER_MICRO: i64 = 1_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
pub const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
pub const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;
pub const NANOS_PER_WEEK: i64 = 7 * NANOS_PER_DAY;

/// A point in time as nanoseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Time(pub i64);

impl Time {
    pub const EPOCH: Time = Time(0);
    pub const MIN: Time = Time(i64::MIN);
    pub const MAX: Time = Time(i64::MAX);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn nanos(self) -> i64 {
        self.0
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_nanos(self.0)
    }

    /// Parses an RFC 3339 timestamp, e.g. `2021-02-28T00:00:00Z`.
    pub fn parse(s: &str) -> Result<Self> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| Error::InvalidTime(format!("'{}': {}", s, e)))?;
        dt.with_timezone(&Utc)
            .timestamp_nanos_opt()
            .map(Time)
            .ok_or_else(|| Error::InvalidTime(format!("'{}' is out of range", s)))
    }

    /// Calendar-aware addition: the month component is applied first (clamping
    /// the day to the end of the target month), then the nanosecond component.
    pub fn add(self, d: Duration) -> Time {
        let mut t = self;
        if d.months != 0 {
            let months = if d.negative { -d.months } else { d.months };
            t = t.add_months(months);
        }
        if d.nsecs != 0 {
            let nsecs = if d.negative { -d.nsecs } else { d.nsecs };
            t = Time(t.0.saturating_add(nsecs));
        }
        t
    }

    /// Fixed-length difference `self - other`.
    pub fn sub(self, other: Time) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(other.0))
    }

    /// Absolute month number of this time: `year * 12 + (month - 1)`.
    pub fn calendar_months(self) -> i64 {
        let dt = self.to_datetime();
        dt.year() as i64 * 12 + dt.month0() as i64
    }

    fn add_months(self, months: i64) -> Time {
        let saturated = if months > 0 { Time::MAX } else { Time::MIN };
        let dt = self.to_datetime();

        let total = self.calendar_months().saturating_add(months);
        let Ok(year) = i32::try_from(total.div_euclid(12)) else {
            return saturated;
        };
        let month = total.rem_euclid(12) as u32 + 1;
        let day = dt.day().min(days_in_month(year, month));

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_nano_opt(dt.hour(), dt.minute(), dt.second(), dt.nanosecond()))
            .and_then(|ndt| ndt.and_utc().timestamp_nanos_opt())
            .map(Time)
            .unwrap_or(saturated)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl From<i64> for Time {
    fn from(nanos: i64) -> Self {
        Time(nanos)
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

/// A duration made of a calendar month component and a fixed nanosecond
/// component. Both magnitudes are stored non-negative with a shared sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Duration {
    months: i64,
    nsecs: i64,
    negative: bool,
}

impl Duration {
    pub const ZERO: Duration = Duration { months: 0, nsecs: 0, negative: false };

    /// Builds a duration from magnitudes; the signs of `months` and `nsecs` are ignored.
    pub fn new(months: i64, nsecs: i64, negative: bool) -> Self {
        let months = months.checked_abs().unwrap_or(i64::MAX);
        let nsecs = nsecs.checked_abs().unwrap_or(i64::MAX);
        Self {
            months,
            nsecs,
            negative: negative && (months != 0 || nsecs != 0),
        }
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self::new(0, nanos, nanos < 0)
    }

    pub fn from_months(months: i64) -> Self {
        Self::new(months, 0, months < 0)
    }

    pub fn seconds(secs: i64) -> Self {
        Self::from_nanos(secs.saturating_mul(NANOS_PER_SECOND))
    }

    pub fn minutes(mins: i64) -> Self {
        Self::from_nanos(mins.saturating_mul(NANOS_PER_MINUTE))
    }

    pub fn hours(hours: i64) -> Self {
        Self::from_nanos(hours.saturating_mul(NANOS_PER_HOUR))
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.nsecs == 0
    }

    pub fn is_positive(&self) -> bool {
        !self.negative && !self.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_mixed(&self) -> bool {
        self.months != 0 && self.nsecs != 0
    }

    pub fn months_only(&self) -> bool {
        self.months != 0 && self.nsecs == 0
    }

    pub fn nanos_only(&self) -> bool {
        self.months == 0
    }

    /// Signed month component.
    pub fn months(&self) -> i64 {
        if self.negative { -self.months } else { self.months }
    }

    /// Signed nanosecond component.
    pub fn nanoseconds(&self) -> i64 {
        if self.negative { -self.nsecs } else { self.nsecs }
    }

    /// Multiplies each component by `scale`.
    pub fn mul(self, scale: i64) -> Self {
        if self.is_zero() || scale == 0 {
            return Self::ZERO;
        }
        let negative = if scale < 0 { !self.negative } else { self.negative };
        let scale = scale.checked_abs().unwrap_or(i64::MAX);
        Self {
            months: self.months.saturating_mul(scale),
            nsecs: self.nsecs.saturating_mul(scale),
            negative,
        }
    }

    pub fn neg(self) -> Self {
        if self.is_zero() {
            return self;
        }
        Self { negative: !self.negative, ..self }
    }

    /// Parses a duration literal such as `1mo`, `-30s` or `1y2mo3w4d5h6m7s8ms9us10ns`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |msg: &str| Error::InvalidDuration(format!("'{}': {}", s, msg));

        let (negative, body) = match s.trim().strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.trim()),
        };
        if body.is_empty() {
            return Err(invalid("empty duration"));
        }

        let mut months: i64 = 0;
        let mut nsecs: i64 = 0;
        let mut rest = body;
        while !rest.is_empty() {
            let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            if digits == 0 {
                return Err(invalid("expected a magnitude"));
            }
            let magnitude: i64 = rest[..digits]
                .parse()
                .map_err(|_| invalid("magnitude out of range"))?;
            rest = &rest[digits..];

            let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
            if unit_len == 0 {
                return Err(invalid("missing unit"));
            }
            let unit = &rest[..unit_len];
            rest = &rest[unit_len..];

            let overflow = || invalid("duration out of range");
            match unit {
                "y" => months = months.checked_add(magnitude.checked_mul(12).ok_or_else(overflow)?).ok_or_else(overflow)?,
                "mo" => months = months.checked_add(magnitude).ok_or_else(overflow)?,
                _ => {
                    let scale = match unit {
                        "w" => NANOS_PER_WEEK,
                        "d" => NANOS_PER_DAY,
                        "h" => NANOS_PER_HOUR,
                        "m" => NANOS_PER_MINUTE,
                        "s" => NANOS_PER_SECOND,
                        "ms" => NANOS_PER_MILLI,
                        "us" | "µs" => NANOS_PER_MICRO,
                        "ns" => 1,
                        other => return Err(invalid(&format!("unknown unit '{}'", other))),
                    };
                    let delta = magnitude.checked_mul(scale).ok_or_else(overflow)?;
                    nsecs = nsecs.checked_add(delta).ok_or_else(overflow)?;
                }
            }
        }

        Ok(Self::new(months, nsecs, negative))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0s");
        }
        if self.negative {
            f.write_str("-")?;
        }

        let years = self.months / 12;
        let months = self.months % 12;
        if years > 0 {
            write!(f, "{}y", years)?;
        }
        if months > 0 {
            write!(f, "{}mo", months)?;
        }

        let mut rem = self.nsecs;
        for (unit, scale) in [
            ("w", NANOS_PER_WEEK),
            ("d", NANOS_PER_DAY),
            ("h", NANOS_PER_HOUR),
            ("m", NANOS_PER_MINUTE),
            ("s", NANOS_PER_SECOND),
            ("ms", NANOS_PER_MILLI),
            ("us", NANOS_PER_MICRO),
            ("ns", 1),
        ] {
            let n = rem / scale;
            if n > 0 {
                write!(f, "{}{}", n, unit)?;
                rem -= n * scale;
            }
        }
        Ok(())
    }
}

impl FromStr for Duration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Duration::parse(s)
    }
}

impl TryFrom<String> for Duration {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Duration::parse(&s)
    }
}

impl From<Duration> for String {
    fn from(d: Duration) -> Self {
        d.to_string()
    }
}
