use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationIssue {
    #[error("no contract periods supplied")]
    Empty,
    #[error("end year {end_year} is before start year {start_year}")]
    ReversedRange { start_year: i32, end_year: i32 },
    #[error("gap: expected start year {expected_start}, got {actual_start}")]
    Gap { expected_start: i64, actual_start: i32 },
    #[error("overlap: expected start year {expected_start}, got {actual_start}")]
    Overlap { expected_start: i64, actual_start: i32 },
    #[error("periods span {years} years, more than the maximum of {max}")]
    SpanTooLong { years: u64, max: u32 },
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("annual withdrawal must be >= 0, got {value}")]
    NegativeWithdrawal { value: f64 },
    #[error("interest rate must be > -1, got {value}")]
    InterestRateOutOfRange { value: f64 },
    #[error("tax rate must be between 0 and 1, got {value}")]
    TaxRateOutOfRange { value: f64 },
    #[error("starting balance must be >= 0, got {value}")]
    NegativeStartingBalance { value: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}{issue}", location(.period_index))]
pub struct ConfigurationError {
    /// `None` when the problem is not tied to a single period.
    pub period_index: Option<usize>,
    pub issue: ConfigurationIssue,
}

fn location(period_index: &Option<usize>) -> String {
    period_index.map_or_else(String::new, |index| format!("period {index}: "))
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "funds exhausted in {year} (period {period_index}): requested {requested:.2}, available {available:.2}, shortfall {shortfall:.2}"
)]
pub struct FundsExhaustedError {
    pub year: i32,
    pub period_index: usize,
    pub requested: f64,
    pub available: f64,
    pub shortfall: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    FundsExhausted(#[from] FundsExhaustedError),
}
