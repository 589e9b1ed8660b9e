//! Closed-form annuity helpers.
//!
//! All formulas use the simulator's timing: flows hit the balance at the start of the year
//! and interest accrues on the post-flow balance (annuity-due).

const RATE_EPS: f64 = 1e-12;

/// Sum of `(1 + rate)^k` for `k` in `1..=years`.
fn growth_sum(rate: f64, years: u32) -> f64 {
    if rate.abs() <= RATE_EPS {
        return years as f64;
    }
    let growth = 1.0 + rate;
    growth * (growth.powi(years as i32) - 1.0) / rate
}

/// Balance after `years` of depositing `deposit` at the start of every year.
pub fn level_deposit_future_value(opening: f64, deposit: f64, rate: f64, years: u32) -> f64 {
    opening * (1.0 + rate).powi(years as i32) + deposit * growth_sum(rate, years)
}

/// Level gross withdrawal that runs `balance` down to zero after `years` withdrawals.
pub fn level_payout(balance: f64, rate: f64, years: u32) -> f64 {
    if years == 0 || balance <= 0.0 {
        return 0.0;
    }
    balance * (1.0 + rate).powi(years as i32) / growth_sum(rate, years)
}
