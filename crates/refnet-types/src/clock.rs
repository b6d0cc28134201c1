//! Time source.
//!
//! Everything that compares against wall-clock time (countdowns, token
//! expiry, income windows) reads it through a [`Clock`], so tests can pin
//! and advance time without real timers. Calendar boundaries go through the
//! clock's [`LocalZone`], which follows daylight-saving changes.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
pub use chrono_tz::Tz;

/// The zone whose midnights bound the user's days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    /// The machine's zone.
    System,
    /// An IANA zone such as `Europe/Berlin`.
    Named(Tz),
    /// A constant offset with no daylight saving.
    Fixed(FixedOffset),
}

impl LocalZone {
    /// Empty or `"local"` selects the machine's zone.
    pub fn parse(name: &str) -> Result<Self, String> {
        match name.trim() {
            "" | "local" => Ok(Self::System),
            other => other
                .parse::<Tz>()
                .map(Self::Named)
                .map_err(|e| e.to_string()),
        }
    }

    /// Calendar date of `at` in this zone.
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::System => at.with_timezone(&Local).date_naive(),
            Self::Named(tz) => at.with_timezone(tz).date_naive(),
            Self::Fixed(offset) => at.with_timezone(offset).date_naive(),
        }
    }

    /// The instant `date` begins in this zone.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        match self {
            Self::System => start_of_day(&Local, date),
            Self::Named(tz) => start_of_day(tz, date),
            Self::Fixed(offset) => start_of_day(offset, date),
        }
    }
}

fn start_of_day<Z: TimeZone>(zone: &Z, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Some zones skip midnight when clocks go forward; the day then starts
    // at the first local time that exists.
    (0..=2)
        .find_map(|h| {
            zone.from_local_datetime(&(midnight + Duration::hours(h)))
                .earliest()
        })
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// A source of the current instant and the user's zone.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    fn zone(&self) -> LocalZone;

    /// Today's date in [`Clock::zone`].
    fn today(&self) -> NaiveDate {
        self.zone().date_of(self.now_utc())
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    zone: LocalZone,
}

impl SystemClock {
    pub fn new(zone: LocalZone) -> Self {
        Self { zone }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(LocalZone::System)
    }
}

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn zone(&self) -> LocalZone {
        self.zone
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    zone: LocalZone,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, zone: LocalZone) -> Self {
        Self {
            now: Mutex::new(now),
            zone,
        }
    }

    /// Parse an RFC 3339 instant; its offset becomes a fixed local zone.
    pub fn at(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        let parsed = DateTime::parse_from_rfc3339(rfc3339)?;
        Ok(Self::new(
            parsed.with_timezone(&Utc),
            LocalZone::Fixed(*parsed.offset()),
        ))
    }

    /// Parse an RFC 3339 instant and observe it from `zone`.
    pub fn in_zone(rfc3339: &str, zone: Tz) -> Result<Self, chrono::ParseError> {
        let parsed = DateTime::parse_from_rfc3339(rfc3339)?;
        Ok(Self::new(parsed.with_timezone(&Utc), LocalZone::Named(zone)))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.lock()
    }

    fn zone(&self) -> LocalZone {
        self.zone
    }
}
