use serde::Serialize;

use super::types::LedgerEntry;

const YIELD_SEARCH_MIN: f64 = -0.9;
const YIELD_SEARCH_MAX: f64 = 10.0;
const YIELD_TOLERANCE: f64 = 1e-10;
const YIELD_MAX_ITERATIONS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub period_index: usize,
    pub start_year: i32,
    pub end_year: i32,
    pub deposits: f64,
    pub gross_withdrawals: f64,
    pub net_withdrawals: f64,
    pub tax_paid: f64,
    pub tax_relief: f64,
    pub interest: f64,
    pub closing_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub first_year: i32,
    pub last_year: i32,
    pub years: usize,
    pub starting_balance: f64,
    pub total_deposits: f64,
    /// Income tax deducted thanks to deposits.
    pub total_tax_relief: f64,
    /// Starting balance plus deposits, minus the tax relief on those deposits.
    pub net_own_contributions: f64,
    pub total_gross_withdrawals: f64,
    pub total_net_withdrawals: f64,
    pub total_tax_paid: f64,
    pub total_interest: f64,
    pub total_shortfall: f64,
    pub final_balance: f64,
    /// Value produced by the contract (withdrawn plus remaining) over net own contributions.
    pub gross_profit: f64,
    pub profit_percentage: Option<f64>,
    /// Share of gross withdrawals withheld as tax.
    pub overall_tax_rate: Option<f64>,
    /// Annual rate at which net own contributions grow into net payouts plus the final balance.
    pub money_weighted_return: Option<f64>,
    pub periods: Vec<PeriodTotals>,
}

/// Aggregates a finished ledger. Returns `None` for an empty ledger.
pub fn summarize(starting_balance: f64, ledger: &[LedgerEntry]) -> Option<PlanSummary> {
    let first = ledger.first()?;
    let last = ledger.last()?;

    let mut periods: Vec<PeriodTotals> = Vec::new();
    for entry in ledger {
        match periods.last_mut() {
            Some(totals) if totals.period_index == entry.period_index => {
                accumulate(totals, entry);
            }
            _ => {
                let mut totals = PeriodTotals {
                    period_index: entry.period_index,
                    start_year: entry.year,
                    end_year: entry.year,
                    deposits: 0.0,
                    gross_withdrawals: 0.0,
                    net_withdrawals: 0.0,
                    tax_paid: 0.0,
                    tax_relief: 0.0,
                    interest: 0.0,
                    closing_balance: entry.closing_balance,
                };
                accumulate(&mut totals, entry);
                periods.push(totals);
            }
        }
    }

    let sum = |f: fn(&PeriodTotals) -> f64| periods.iter().map(f).sum::<f64>();
    let total_deposits = sum(|p| p.deposits);
    let total_tax_relief = sum(|p| p.tax_relief);
    let total_gross_withdrawals = sum(|p| p.gross_withdrawals);
    let total_net_withdrawals = sum(|p| p.net_withdrawals);
    let total_tax_paid = sum(|p| p.tax_paid);
    let total_interest = sum(|p| p.interest);
    let total_shortfall = ledger.iter().map(|e| e.shortfall).sum();

    let final_balance = last.closing_balance;
    let net_own_contributions = starting_balance + total_deposits - total_tax_relief;
    let produced = final_balance + total_gross_withdrawals;
    let gross_profit = produced - net_own_contributions;

    Some(PlanSummary {
        first_year: first.year,
        last_year: last.year,
        years: ledger.len(),
        starting_balance,
        total_deposits,
        total_tax_relief,
        net_own_contributions,
        total_gross_withdrawals,
        total_net_withdrawals,
        total_tax_paid,
        total_interest,
        total_shortfall,
        final_balance,
        gross_profit,
        profit_percentage: (produced > 0.0).then(|| gross_profit * 100.0 / produced),
        overall_tax_rate: (total_gross_withdrawals > 0.0)
            .then(|| total_tax_paid / total_gross_withdrawals),
        money_weighted_return: money_weighted_return(starting_balance, ledger),
        periods,
    })
}

fn accumulate(totals: &mut PeriodTotals, entry: &LedgerEntry) {
    totals.end_year = entry.year;
    totals.deposits += entry.deposit;
    totals.gross_withdrawals += entry.gross_withdrawal;
    totals.net_withdrawals += entry.withdrawal;
    totals.tax_paid += entry.tax_effect;
    totals.tax_relief += entry.tax_relief;
    totals.interest += entry.interest_accrued;
    totals.closing_balance = entry.closing_balance;
}

// Present value of the saver's own cash flows. Flows land at the start of each year and the
// final balance is valued at the end of the last year.
fn net_present_value(rate: f64, starting_balance: f64, ledger: &[LedgerEntry]) -> f64 {
    let discount = 1.0 + rate;
    let mut npv = -starting_balance;
    let mut factor = 1.0;
    for entry in ledger {
        let paid_in = entry.deposit - entry.tax_relief;
        npv += (entry.withdrawal - paid_in) / factor;
        factor *= discount;
    }
    npv + ledger.last().map_or(0.0, |e| e.closing_balance) / factor
}

fn money_weighted_return(starting_balance: f64, ledger: &[LedgerEntry]) -> Option<f64> {
    let npv = |rate| net_present_value(rate, starting_balance, ledger);
    let mut lo = YIELD_SEARCH_MIN;
    let mut hi = YIELD_SEARCH_MAX;
    let npv_lo = npv(lo);
    let npv_hi = npv(hi);
    if !npv_lo.is_finite() || !npv_hi.is_finite() || npv_lo.signum() == npv_hi.signum() {
        return None;
    }

    let mut it = 0;
    while it < YIELD_MAX_ITERATIONS {
        it += 1;
        let mid = (lo + hi) * 0.5;
        if npv(mid).signum() == npv_lo.signum() {
            lo = mid;
        } else {
            hi = mid;
        }
        if (hi - lo).abs() <= YIELD_TOLERANCE {
            break;
        }
    }
    Some((lo + hi) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ContractPeriod, PayoutMode, SimulationConfig, level_deposit_future_value, simulate,
    };

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn period(
        start_year: i32,
        end_year: i32,
        annual_deposit: f64,
        annual_withdrawal: f64,
        interest_rate: f64,
        tax_rate: f64,
    ) -> ContractPeriod {
        ContractPeriod {
            start_year,
            end_year,
            annual_deposit,
            annual_withdrawal,
            interest_rate,
            tax_rate,
            payout: PayoutMode::Fixed,
        }
    }

    // Age 40 to 69: one-off 1000 deposit, 20 years of 1200, then 9 idle years, all at 2% with
    // contributions deductible at 37%.
    fn savings_plan() -> Vec<ContractPeriod> {
        vec![
            period(2026, 2026, 1_000.0, 0.0, 0.02, 0.37),
            period(2027, 2046, 1_200.0, 0.0, 0.02, 0.37),
            period(2047, 2055, 0.0, 0.0, 0.02, 0.37),
        ]
    }

    #[test]
    fn empty_ledger_has_no_summary() {
        assert!(summarize(0.0, &[]).is_none());
    }

    #[test]
    fn savings_plan_totals_match_hand_calculation() {
        let ledger = simulate(&SimulationConfig::default(), &savings_plan()).expect("valid");
        let summary = summarize(0.0, &ledger).expect("non-empty");

        assert_eq!(summary.first_year, 2026);
        assert_eq!(summary.last_year, 2055);
        assert_eq!(summary.years, 30);
        assert_eq!(summary.periods.len(), 3);
        assert_approx(summary.total_deposits, 25_000.0);
        assert_approx(summary.total_tax_relief, 9_250.0);
        assert_approx(summary.net_own_contributions, 15_750.0);
        assert_eq!(summary.overall_tax_rate, None);

        let after_first = level_deposit_future_value(0.0, 1_000.0, 0.02, 1);
        let after_second = level_deposit_future_value(after_first, 1_200.0, 0.02, 20);
        let expected_final = level_deposit_future_value(after_second, 0.0, 0.02, 9);
        assert_approx(summary.final_balance, expected_final);
        assert_approx(summary.periods[1].closing_balance, after_second);
        assert_approx(summary.gross_profit, expected_final - 15_750.0);
        assert_approx(summary.total_interest, expected_final - 25_000.0);

        // Tax relief lifts the saver's own yield above the contract rate.
        let yield_rate = summary.money_weighted_return.expect("has a root");
        assert!(yield_rate > 0.02, "yield {yield_rate}");
    }

    #[test]
    fn untaxed_single_deposit_yield_equals_interest_rate() {
        let ledger = simulate(
            &SimulationConfig {
                starting_balance: 1_000.0,
                ..SimulationConfig::default()
            },
            &[period(2020, 2029, 0.0, 0.0, 0.05, 0.0)],
        )
        .expect("valid");
        let summary = summarize(1_000.0, &ledger).expect("non-empty");
        let yield_rate = summary.money_weighted_return.expect("has a root");
        assert!((yield_rate - 0.05).abs() <= 1e-8, "yield {yield_rate}");
    }

    #[test]
    fn payout_totals_report_overall_tax_rate() {
        let periods = vec![
            period(2020, 2024, 1_000.0, 0.0, 0.05, 0.0),
            period(2025, 2034, 0.0, 500.0, 0.03, 0.20),
        ];
        let ledger = simulate(&SimulationConfig::default(), &periods).expect("valid");
        let summary = summarize(0.0, &ledger).expect("non-empty");

        assert_approx(summary.total_gross_withdrawals, 5_000.0);
        assert_approx(summary.total_net_withdrawals, 4_000.0);
        assert_approx(summary.total_tax_paid, 1_000.0);
        assert_approx(summary.overall_tax_rate.unwrap_or_default(), 0.2);

        let identity = summary.starting_balance + summary.total_deposits + summary.total_interest
            - summary.total_gross_withdrawals;
        assert_approx(summary.final_balance, identity);

        let payout = summary.periods[1];
        assert_eq!((payout.start_year, payout.end_year), (2025, 2034));
        assert_approx(payout.tax_paid, 1_000.0);
    }
}
