use tracing::debug;

use super::error::{
    ConfigurationError, ConfigurationIssue, FundsExhaustedError, SimulationError,
};
use super::finance::level_payout;
use super::types::{
    ContractPeriod, LedgerEntry, PayoutMode, RoundingPolicy, SimulationConfig, WithdrawalPolicy,
};

// Withdrawals within this margin of the available balance are treated as affordable.
const FUNDS_EPS: f64 = 1e-9;

/// Longest run of years a single simulation may cover.
pub const MAX_SIMULATION_YEARS: u32 = 1_000;

#[derive(Debug, Clone, Copy)]
struct YearContext<'a> {
    year: i32,
    period_index: usize,
    period: &'a ContractPeriod,
    scheduled_withdrawal: f64,
    drain: bool,
}

pub fn validate_periods(
    config: &SimulationConfig,
    periods: &[ContractPeriod],
) -> Result<(), ConfigurationError> {
    let global = |issue| ConfigurationError {
        period_index: None,
        issue,
    };

    if periods.is_empty() {
        return Err(global(ConfigurationIssue::Empty));
    }
    if !config.starting_balance.is_finite() {
        return Err(global(ConfigurationIssue::NonFinite {
            field: "starting balance",
        }));
    }
    if config.starting_balance < 0.0 {
        return Err(global(ConfigurationIssue::NegativeStartingBalance {
            value: config.starting_balance,
        }));
    }

    let mut previous_end: Option<i32> = None;
    let mut total_years: u64 = 0;
    for (index, period) in periods.iter().enumerate() {
        validate_period(period).map_err(|issue| ConfigurationError {
            period_index: Some(index),
            issue,
        })?;

        total_years += u64::from(period.years());
        if total_years > u64::from(MAX_SIMULATION_YEARS) {
            return Err(ConfigurationError {
                period_index: Some(index),
                issue: ConfigurationIssue::SpanTooLong {
                    years: total_years,
                    max: MAX_SIMULATION_YEARS,
                },
            });
        }

        if let Some(end) = previous_end {
            let expected_start = i64::from(end) + 1;
            let start = i64::from(period.start_year);
            let issue = if start > expected_start {
                Some(ConfigurationIssue::Gap {
                    expected_start,
                    actual_start: period.start_year,
                })
            } else if start < expected_start {
                Some(ConfigurationIssue::Overlap {
                    expected_start,
                    actual_start: period.start_year,
                })
            } else {
                None
            };
            if let Some(issue) = issue {
                return Err(ConfigurationError {
                    period_index: Some(index),
                    issue,
                });
            }
        }
        previous_end = Some(period.end_year);
    }

    Ok(())
}

fn validate_period(period: &ContractPeriod) -> Result<(), ConfigurationIssue> {
    let fields = [
        ("annual deposit", period.annual_deposit),
        ("annual withdrawal", period.annual_withdrawal),
        ("interest rate", period.interest_rate),
        ("tax rate", period.tax_rate),
    ];
    if let Some((field, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
        return Err(ConfigurationIssue::NonFinite { field: *field });
    }

    if period.end_year < period.start_year {
        return Err(ConfigurationIssue::ReversedRange {
            start_year: period.start_year,
            end_year: period.end_year,
        });
    }
    if period.annual_withdrawal < 0.0 {
        return Err(ConfigurationIssue::NegativeWithdrawal {
            value: period.annual_withdrawal,
        });
    }
    if period.interest_rate <= -1.0 {
        return Err(ConfigurationIssue::InterestRateOutOfRange {
            value: period.interest_rate,
        });
    }
    if !(0.0..=1.0).contains(&period.tax_rate) {
        return Err(ConfigurationIssue::TaxRateOutOfRange {
            value: period.tax_rate,
        });
    }
    Ok(())
}

/// Runs the contract periods year by year and returns one ledger entry per year.
///
/// Within a year the deposit and the gross withdrawal are applied first, interest accrues on
/// the resulting balance, and tax is withheld from the withdrawal. Deposits and interest are
/// never taxed inside the contract.
///
/// The only side effect is `tracing` output at debug level.
pub fn simulate(
    config: &SimulationConfig,
    periods: &[ContractPeriod],
) -> Result<Vec<LedgerEntry>, SimulationError> {
    validate_periods(config, periods)?;

    let total_years = periods.iter().map(|p| p.years() as usize).sum();
    let mut ledger = Vec::with_capacity(total_years);
    let mut balance = config.rounding.apply(config.starting_balance);

    for (period_index, period) in periods.iter().enumerate() {
        let scheduled_withdrawal = match period.payout {
            PayoutMode::Fixed => period.annual_withdrawal,
            // Each year's deposit is paid straight back out on top of the level payout.
            PayoutMode::Annuity => (level_payout(balance, period.interest_rate, period.years())
                + config.rounding.apply(period.annual_deposit))
            .max(0.0),
        };
        debug!(
            period_index,
            start_year = period.start_year,
            end_year = period.end_year,
            opening_balance = balance,
            scheduled_withdrawal,
            "entering contract period"
        );

        for year in period.start_year..=period.end_year {
            let ctx = YearContext {
                year,
                period_index,
                period,
                scheduled_withdrawal,
                drain: period.payout == PayoutMode::Annuity && year == period.end_year,
            };
            let entry = simulate_year(config, ctx, balance)?;
            balance = entry.closing_balance;
            ledger.push(entry);
        }
    }

    debug!(
        years = ledger.len(),
        closing_balance = balance,
        "simulation complete"
    );
    Ok(ledger)
}

fn simulate_year(
    config: &SimulationConfig,
    ctx: YearContext<'_>,
    opening: f64,
) -> Result<LedgerEntry, FundsExhaustedError> {
    let rounding = config.rounding;
    let period = ctx.period;
    let mut shortfall = 0.0;

    let mut deposit = rounding.apply(period.annual_deposit);
    let mut available = opening + deposit;
    if available < -FUNDS_EPS {
        let missing = -available;
        match config.withdrawal_policy {
            WithdrawalPolicy::Fatal => {
                return Err(FundsExhaustedError {
                    year: ctx.year,
                    period_index: ctx.period_index,
                    requested: -deposit,
                    available: opening,
                    shortfall: missing,
                });
            }
            WithdrawalPolicy::Clamp => {
                debug!(
                    year = ctx.year,
                    period_index = ctx.period_index,
                    shortfall = missing,
                    "negative deposit clamped to available balance"
                );
                deposit = -opening;
                shortfall += missing;
            }
        }
    }
    available = available.max(0.0);

    let requested = if ctx.drain {
        available
    } else {
        rounding.apply(ctx.scheduled_withdrawal)
    };
    let gross_withdrawal = if requested > available + FUNDS_EPS {
        let missing = requested - available;
        match config.withdrawal_policy {
            WithdrawalPolicy::Fatal => {
                return Err(FundsExhaustedError {
                    year: ctx.year,
                    period_index: ctx.period_index,
                    requested,
                    available,
                    shortfall: missing,
                });
            }
            WithdrawalPolicy::Clamp => {
                debug!(
                    year = ctx.year,
                    period_index = ctx.period_index,
                    requested,
                    available,
                    "withdrawal clamped to available balance"
                );
                shortfall += missing;
                available
            }
        }
    } else {
        requested.min(available)
    };

    let working = available - gross_withdrawal;
    let interest_accrued = rounding.apply(working * period.interest_rate);
    let tax_effect = rounding.apply(gross_withdrawal * period.tax_rate);
    let tax_relief = rounding.apply(deposit.max(0.0) * period.tax_rate);
    let closing_balance = snap(rounding, working + interest_accrued);

    Ok(LedgerEntry {
        year: ctx.year,
        period_index: ctx.period_index,
        opening_balance: opening,
        deposit,
        gross_withdrawal,
        withdrawal: gross_withdrawal - tax_effect,
        interest_accrued,
        tax_effect,
        tax_relief,
        shortfall,
        closing_balance,
    })
}

// Sums of grid values can drift off the grid by an ulp.
fn snap(rounding: RoundingPolicy, amount: f64) -> f64 {
    rounding.apply(amount).max(0.0)
}
