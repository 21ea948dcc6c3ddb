//! Evaluation core - rule enforcement for a single attempt and the
//! sliding-window distribution built on top of it:
//! - Day bucketing of trade streams and datasets
//! - Intraday profit/loss gate
//! - Trailing end-of-day drawdown governor
//! - Consistency checks
//! - Attempt state machine
//! - Days-to-pass distribution

pub mod bucketer;
pub mod gate;
pub mod drawdown;
pub mod consistency;
pub mod simulator;
pub mod distribution;

// Re-export commonly used types
pub use bucketer::{validate_trades, DayBuckets, DayIndex};
pub use gate::{GateHalt, GatedDay, IntradayGate};
pub use drawdown::{loss_floor, DrawdownCheck, TrailingDrawdownGovernor};
pub use consistency::{consistency_ratio, ConsistencyChecker};
pub use simulator::{
    step, AccountState, DailySeries, DayInput, EvalOutcome, EvalPathSimulator, PathResult, TradeSource,
    TradeStream,
};
pub use distribution::{
    DistributionAggregator, DistributionReport, OutcomeCounts, PassBucket, DEFAULT_HORIZONS,
};
