//! Day bucketing for trade streams and datasets
//!
//! Trades are grouped by the UTC calendar day of their exit. Because a valid
//! stream is ordered by exit time, every day's trades form one contiguous
//! slice of the input and no copying is needed.
//!
//! Datasets (candles or any [`Timestamped`] rows) get a [`DayIndex`]: the
//! ordered distinct days plus the row range of each, so a window starting on
//! day `s` is just `&rows[index.start_row(s)..]`.

use std::ops::Range;

use crate::error::{Result, ValidationError};
use crate::types::{DayKey, Timestamped, Trade};

/// Check the single-position invariant the producing strategy promises
pub fn validate_trades(trades: &[Trade]) -> Result<()> {
    for (index, trade) in trades.iter().enumerate() {
        if !trade.pnl.is_finite() {
            return Err(ValidationError::NonFiniteProfit { index });
        }
        if trade.exit_ts < trade.entry_ts {
            return Err(ValidationError::TradeExitBeforeEntry { index });
        }
        if index > 0 {
            let prev = &trades[index - 1];
            if trade.exit_ts < prev.exit_ts {
                return Err(ValidationError::TradesOutOfOrder { index });
            }
            if trade.entry_ts < prev.exit_ts {
                return Err(ValidationError::OverlappingTrades { index });
            }
        }
    }
    Ok(())
}

/// Validated trade stream partitioned by exit day
#[derive(Debug, Clone)]
pub struct DayBuckets<'a> {
    trades: &'a [Trade],
    days: Vec<DayKey>,
    ranges: Vec<Range<usize>>,
}

impl<'a> DayBuckets<'a> {
    pub fn partition(trades: &'a [Trade]) -> Result<Self> {
        validate_trades(trades)?;

        let mut days: Vec<DayKey> = Vec::new();
        let mut ranges: Vec<Range<usize>> = Vec::new();
        for (i, trade) in trades.iter().enumerate() {
            let key = trade.day_key();
            match days.last() {
                Some(&last) if last == key => {
                    if let Some(range) = ranges.last_mut() {
                        range.end = i + 1;
                    }
                }
                _ => {
                    days.push(key);
                    ranges.push(i..i + 1);
                }
            }
        }

        Ok(Self { trades, days, ranges })
    }

    /// Days that had at least one fill, ascending
    pub fn trade_days(&self) -> &[DayKey] {
        &self.days
    }

    /// Trades that closed on `day`, in stream order
    pub fn trades_on(&self, day: DayKey) -> &'a [Trade] {
        let trades = self.trades;
        match self.days.binary_search(&day) {
            Ok(i) => &trades[self.ranges[i].clone()],
            Err(_) => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DayKey, &'a [Trade])> + '_ {
        let trades = self.trades;
        self.days
            .iter()
            .zip(self.ranges.iter())
            .map(move |(&day, range)| (day, &trades[range.clone()]))
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// The ordered days an attempt walks through.
    ///
    /// With `count_empty_calendar_days` the walk follows `calendar` (or, with
    /// no calendar, every weekday between the first and last trade day), so
    /// idle days still use up attempt time. Without it only days with fills
    /// are walked, restricted to `calendar` when one is given.
    pub fn simulated_days(&self, calendar: Option<&[DayKey]>, count_empty_calendar_days: bool) -> Vec<DayKey> {
        match (calendar, count_empty_calendar_days) {
            (Some(calendar), true) => calendar.to_vec(),
            (Some(calendar), false) => self
                .days
                .iter()
                .copied()
                .filter(|day| calendar.binary_search(day).is_ok())
                .collect(),
            (None, true) => match (self.days.first(), self.days.last()) {
                (Some(&first), Some(&last)) => fill_business_days(&self.days, first, last),
                _ => Vec::new(),
            },
            (None, false) => self.days.clone(),
        }
    }
}

/// Weekdays from `first` to `last` inclusive, plus any weekend day that had fills
fn fill_business_days(trade_days: &[DayKey], first: DayKey, last: DayKey) -> Vec<DayKey> {
    (first.0..=last.0)
        .map(DayKey)
        .filter(|day| day.is_weekday() || trade_days.binary_search(day).is_ok())
        .collect()
}

/// Distinct days of a time-ordered dataset with the row range of each
#[derive(Debug, Clone, Default)]
pub struct DayIndex {
    days: Vec<DayKey>,
    ranges: Vec<Range<usize>>,
}

impl DayIndex {
    pub fn build<T: Timestamped>(rows: &[T]) -> Result<Self> {
        let mut index = Self::default();
        let mut prev = None;
        for (i, row) in rows.iter().enumerate() {
            let ts = row.timestamp();
            if prev.is_some_and(|p| ts < p) {
                return Err(ValidationError::DatasetOutOfOrder { index: i });
            }
            prev = Some(ts);

            let key = DayKey::from_timestamp(ts);
            if index.days.last() == Some(&key) {
                if let Some(range) = index.ranges.last_mut() {
                    range.end = i + 1;
                }
            } else {
                index.days.push(key);
                index.ranges.push(i..i + 1);
            }
        }
        Ok(index)
    }

    pub fn days(&self) -> &[DayKey] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Row range belonging to the `i`-th day
    pub fn range(&self, i: usize) -> Range<usize> {
        self.ranges[i].clone()
    }

    /// First row of the `i`-th day
    pub fn start_row(&self, i: usize) -> usize {
        self.ranges[i].start
    }

    pub fn position(&self, day: DayKey) -> Option<usize> {
        self.days.binary_search(&day).ok()
    }
}
