//! Synthetic strategy for exercising the evaluator without market data
//!
//! Trades are drawn from win/loss normal distributions around a strategy's
//! average win and loss. Every day gets its own RNG seeded from
//! `(seed, day)`, so a day's trades are identical no matter which window the
//! day is generated from.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};
use serde::{Deserialize, Serialize};

use crate::types::{DayKey, Side, Timestamped, Trade};

/// Configuration for a synthetic strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub name: String,
    pub win_rate: f64,
    pub avg_win: f64,  // dollars
    pub avg_loss: f64, // dollars (positive)
    pub win_std: f64,
    pub loss_std: f64,
    pub trades_per_day: usize,
    pub seed: u64,
    /// First entry, seconds after midnight UTC (14:30 = 9:30 ET)
    pub session_open_secs: i64,
    pub hold_secs: i64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        // 5 MNQ scalper: 45% WR, $260 avg win, $150 avg loss
        Self {
            name: "5 MNQ scalper".to_string(),
            win_rate: 0.45,
            avg_win: 260.0,
            avg_loss: 150.0,
            win_std: 90.0,
            loss_std: 45.0,
            trades_per_day: 2,
            seed: 7,
            session_open_secs: 14 * 3600 + 30 * 60,
            hold_secs: 15 * 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticStrategy {
    config: StrategyConfig,
    win_dist: Normal<f64>,
    loss_dist: Normal<f64>,
}

impl SyntheticStrategy {
    pub fn new(config: StrategyConfig) -> Result<Self, NormalError> {
        let win_dist = Normal::new(config.avg_win, config.win_std)?;
        let loss_dist = Normal::new(config.avg_loss, config.loss_std)?;
        Ok(Self { config, win_dist, loss_dist })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn rng_for(&self, day: DayKey) -> StdRng {
        StdRng::seed_from_u64(self.config.seed ^ (day.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Closed trades for one session, back to back from the open
    pub fn trades_for_day(&self, day: DayKey) -> Vec<Trade> {
        let mut rng = self.rng_for(day);
        let open = day.start() + Duration::seconds(self.config.session_open_secs);
        let hold = Duration::seconds(self.config.hold_secs);

        (0..self.config.trades_per_day)
            .map(|i| {
                let pnl = if rng.gen::<f64>() < self.config.win_rate {
                    self.win_dist.sample(&mut rng).max(self.config.avg_win * 0.3)
                } else {
                    -self.loss_dist.sample(&mut rng).max(self.config.avg_loss * 0.5)
                };
                let side = if rng.gen_bool(0.5) { Side::Long } else { Side::Short };
                let entry_ts = open + hold * (2 * i as i32);
                Trade {
                    side,
                    entry_ts,
                    exit_ts: entry_ts + hold,
                    pnl,
                }
            })
            .collect()
    }

    /// Trades for every distinct day present in `rows` (time-ordered)
    pub fn generate<T: Timestamped>(&self, rows: &[T]) -> Vec<Trade> {
        let mut trades = Vec::new();
        let mut last: Option<DayKey> = None;
        for row in rows {
            let day = DayKey::from_timestamp(row.timestamp());
            if last != Some(day) {
                trades.extend(self.trades_for_day(day));
                last = Some(day);
            }
        }
        trades
    }
}

/// `count` consecutive weekdays starting at `start` (or the next weekday)
pub fn business_days(start: NaiveDate, count: usize) -> Vec<DayKey> {
    let mut day = DayKey::from_date(start);
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        if day.is_weekday() {
            out.push(day);
        }
        day = day.next();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::validate_trades;

    fn strategy() -> SyntheticStrategy {
        SyntheticStrategy::new(StrategyConfig::default()).unwrap()
    }

    #[test]
    fn test_business_days_skip_weekends() {
        // 2025-03-08 is a Saturday
        let days = business_days(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(), 6);
        assert_eq!(days.len(), 6);
        assert_eq!(days[0].to_string(), "2025-03-10");
        assert_eq!(days[5].to_string(), "2025-03-17");
        assert!(days.iter().all(|d| d.is_weekday()));
    }

    #[test]
    fn test_same_day_same_trades_in_any_window() {
        let calendar = business_days(NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(), 20);
        let strategy = strategy();
        let full = strategy.generate(&calendar);
        let tail = strategy.generate(&calendar[7..]);

        let per_day = strategy.config().trades_per_day;
        assert_eq!(full.len(), 20 * per_day);
        assert_eq!(&full[7 * per_day..], &tail[..]);
    }

    #[test]
    fn test_trades_are_a_valid_stream() {
        let calendar = business_days(NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(), 50);
        let config = StrategyConfig { trades_per_day: 6, ..StrategyConfig::default() };
        let trades = SyntheticStrategy::new(config).unwrap().generate(&calendar);
        assert!(validate_trades(&trades).is_ok());
        assert!(trades.iter().all(|t| t.day_key() == DayKey::from_timestamp(t.entry_ts)));
    }

    #[test]
    fn test_win_rate_is_respected() {
        let calendar = business_days(NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(), 2000);
        let trades = strategy().generate(&calendar);
        let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
        let observed = wins as f64 / trades.len() as f64;
        assert!((observed - 0.45).abs() < 0.05, "observed win rate {observed}");
        assert!(trades.iter().filter(|t| t.pnl > 0.0).all(|t| t.pnl >= 260.0 * 0.3));
    }

    #[test]
    fn test_rejects_bad_distribution() {
        let config = StrategyConfig { win_std: f64::NAN, ..StrategyConfig::default() };
        assert!(SyntheticStrategy::new(config).is_err());
    }
}
