mod engine;
mod error;
mod finance;
mod summary;
mod types;

pub use engine::{MAX_SIMULATION_YEARS, simulate, validate_periods};
pub use error::{ConfigurationError, ConfigurationIssue, FundsExhaustedError, SimulationError};
pub use finance::{level_deposit_future_value, level_payout};
pub use summary::{PlanSummary, summarize};
pub use types::{
    ContractPeriod, LedgerEntry, PayoutMode, RoundingPolicy, SimulationConfig, WithdrawalPolicy,
};
