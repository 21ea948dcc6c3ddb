//! Shared record types: closed trades, candles and integer day keys

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01
const UNIX_EPOCH_CE_DAYS: i64 = 719_163;

/// UTC calendar day as an ordinal (unix seconds / seconds per day).
///
/// Integer keys keep the aggregator hot path free of date formatting while
/// grouping exactly like `YYYY-MM-DD` strings would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayKey(pub i64);

impl DayKey {
    pub fn from_timestamp(ts: DateTime<Utc>) -> Self {
        Self(ts.timestamp().div_euclid(SECONDS_PER_DAY))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(i64::from(date.num_days_from_ce()) - UNIX_EPOCH_CE_DAYS)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        let ce = i32::try_from(self.0 + UNIX_EPOCH_CE_DAYS).ok()?;
        NaiveDate::from_num_days_from_ce_opt(ce)
    }

    /// Midnight UTC at the start of this day
    pub fn start(&self) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(self.0)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Monday through Friday. 1970-01-01 was a Thursday.
    pub fn is_weekday(&self) -> bool {
        (self.0 + 3).rem_euclid(7) < 5
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date() {
            Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            None => write!(f, "day#{}", self.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

/// Closed round-trip trade produced by a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub entry_ts: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exit_ts: DateTime<Utc>,
    /// Realized P&L in account currency
    pub pnl: f64,
}

impl Trade {
    /// Trades are bucketed by the day they closed on
    pub fn day_key(&self) -> DayKey {
        DayKey::from_timestamp(self.exit_ts)
    }
}

/// OHLC bar from a chart export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Anything that can be placed on the UTC day timeline
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for Candle {
    fn timestamp(&self) -> DateTime<Utc> {
        self.ts
    }
}

impl Timestamped for Trade {
    fn timestamp(&self) -> DateTime<Utc> {
        self.exit_ts
    }
}

impl Timestamped for DayKey {
    fn timestamp(&self) -> DateTime<Utc> {
        self.start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_key_midnight_boundary() {
        let before = Utc.with_ymd_and_hms(2025, 3, 4, 23, 59, 59).unwrap();
        let after = before + Duration::seconds(2);
        assert_ne!(DayKey::from_timestamp(before), DayKey::from_timestamp(after));
        assert_eq!(DayKey::from_timestamp(after), DayKey::from_timestamp(before).next());
    }

    #[test]
    fn test_day_key_same_day() {
        let early = Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 3, 4, 23, 59, 59).unwrap();
        assert_eq!(DayKey::from_timestamp(early), DayKey::from_timestamp(late));
    }

    #[test]
    fn test_day_key_dates() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let key = DayKey::from_date(date);
        assert_eq!(key.date(), Some(date));
        assert_eq!(key.to_string(), "2025-03-04");
        assert_eq!(DayKey(0).to_string(), "1970-01-01");
        assert_eq!(DayKey::from_timestamp(key.start()), key);
    }

    #[test]
    fn test_pre_epoch_timestamps_floor() {
        let ts = Utc.with_ymd_and_hms(1969, 12, 31, 12, 0, 0).unwrap();
        assert_eq!(DayKey::from_timestamp(ts), DayKey(-1));
    }

    #[test]
    fn test_weekdays() {
        // 2025-03-03 is a Monday
        let monday = DayKey::from_date(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        let flags: Vec<bool> = (0..7).map(|i| DayKey(monday.0 + i).is_weekday()).collect();
        assert_eq!(flags, vec![true, true, true, true, true, false, false]);
    }
}
