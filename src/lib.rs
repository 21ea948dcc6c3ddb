// Library crate - exports the evaluation core and its data types

pub mod types;
pub mod error;
pub mod rules;
pub mod eval;
pub mod synthetic;
pub mod io;

// Re-export commonly used types
pub use types::*;
pub use error::ValidationError;
pub use rules::{LockMode, RiskRules};
pub use eval::{DistributionAggregator, DistributionReport, EvalOutcome, EvalPathSimulator, PathResult};
