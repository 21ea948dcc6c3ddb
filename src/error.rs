use crate::types::DayKey;

/// Malformed input rejected before any day is simulated.
///
/// Rule outcomes (breaches, timeouts) are never errors; they are terminal
/// [`EvalOutcome`](crate::eval::EvalOutcome) values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("day sequence is empty")]
    EmptyDaySequence,
    #[error("profit target must be positive and finite, got {0}")]
    NonPositiveProfitTarget(f64),
    #[error("max_days must be at least 1")]
    NonPositiveMaxDays,
    #[error("consistency cap must be in (0, 1], got {0}")]
    InvalidConsistencyCap(f64),
    #[error("max loss limit must be non-negative and finite, got {0}")]
    NegativeMaxLossLimit(f64),
    #[error("{field} must be finite, got {value}")]
    NonFiniteRule { field: &'static str, value: f64 },
    #[error("{field} must be positive and finite when set, got {value}")]
    InvalidDailyCap { field: &'static str, value: f64 },
    #[error("trade {index} exits before it enters")]
    TradeExitBeforeEntry { index: usize },
    #[error("trade {index} exits before trade {} (trades must be ordered by exit time)", .index.saturating_sub(1))]
    TradesOutOfOrder { index: usize },
    #[error("trade {index} opens before trade {} closes (single open position expected)", .index.saturating_sub(1))]
    OverlappingTrades { index: usize },
    #[error("non-finite profit at position {index}")]
    NonFiniteProfit { index: usize },
    #[error("{closes} closing balances supplied for {profits} day profits")]
    ClosesLengthMismatch { profits: usize, closes: usize },
    #[error("dataset row {index} is earlier than the row before it")]
    DatasetOutOfOrder { index: usize },
    #[error("window starting {start_day} rejected: {source}")]
    InvalidWindow {
        start_day: DayKey,
        #[source]
        source: Box<ValidationError>,
    },
}

pub type Result<T, E = ValidationError> = std::result::Result<T, E>;
