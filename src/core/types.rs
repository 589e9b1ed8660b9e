use serde::Serialize;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WithdrawalPolicy {
    #[default]
    Fatal,
    Clamp,
}

/// How yearly amounts are carried forward.
///
/// `MinorUnit { decimals: 2 }` rounds every flow to whole cents before it touches the
/// balance, which changes long-run compounding compared to full precision.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RoundingPolicy {
    #[default]
    None,
    MinorUnit { decimals: u32 },
}

impl RoundingPolicy {
    pub fn apply(self, amount: f64) -> f64 {
        match self {
            RoundingPolicy::None => amount,
            RoundingPolicy::MinorUnit { decimals } => {
                let scale = 10f64.powi(decimals as i32);
                (amount * scale).round() / scale
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PayoutMode {
    /// Withdraw `annual_withdrawal` every year.
    #[default]
    Fixed,
    /// Withdraw the level amount that runs the period's opening balance down to zero by its
    /// last year.
    Annuity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractPeriod {
    pub start_year: i32,
    pub end_year: i32,
    pub annual_deposit: f64,
    /// Gross amount drawn from the contract; tax is withheld from it.
    pub annual_withdrawal: f64,
    pub interest_rate: f64,
    pub tax_rate: f64,
    pub payout: PayoutMode,
}

impl ContractPeriod {
    pub fn years(&self) -> u32 {
        let span = i64::from(self.end_year) - i64::from(self.start_year) + 1;
        u32::try_from(span.max(0)).unwrap_or(u32::MAX)
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub starting_balance: f64,
    pub withdrawal_policy: WithdrawalPolicy,
    pub rounding: RoundingPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            starting_balance: 0.0,
            withdrawal_policy: WithdrawalPolicy::Fatal,
            rounding: RoundingPolicy::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub year: i32,
    pub period_index: usize,
    pub opening_balance: f64,
    pub deposit: f64,
    pub gross_withdrawal: f64,
    /// Net amount paid out, after tax.
    pub withdrawal: f64,
    pub interest_accrued: f64,
    pub tax_effect: f64,
    pub tax_relief: f64,
    pub shortfall: f64,
    pub closing_balance: f64,
}
