// Local wall-clock readings, second precision. Only valid for fixed-offset zones.

use chrono::{NaiveDateTime, SubsecRound, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn from_naive(value: NaiveDateTime) -> Self {
        Self(value.trunc_subsecs(0))
    }

    /// 00:00:00 of the calendar day after this one. `None` only at the end
    /// of chrono's representable range.
    pub fn next_midnight(&self) -> Option<Timestamp> {
        let next_day = self.0.date().succ_opt()?;
        next_day.and_hms_opt(0, 0, 0).map(Self)
    }

    /// Fractional minutes from `self` to `later`, negative if `later` is earlier.
    pub fn minutes_until(&self, later: &Timestamp) -> f64 {
        (later.0 - self.0).num_seconds() as f64 / 60.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).map(Self)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Reads the system clock and converts it into the configured zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_naive(Utc::now().with_timezone(&self.tz).naive_local())
    }
}

#[cfg(test)]
pub struct FixedClock {
    now: std::sync::Mutex<Timestamp>,
}

#[cfg(test)]
impl FixedClock {
    pub fn at(now: &str) -> Self {
        Self {
            now: std::sync::Mutex::new(now.parse().unwrap()),
        }
    }

    pub fn set(&self, now: &str) {
        *self.now.lock().unwrap() = now.parse().unwrap();
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }
}
