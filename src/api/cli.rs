use clap::{Parser, ValueEnum};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use super::{
    ApiPayoutMode, PeriodPayload, SimulatePayload, SimulationRequest, report, request_from_json,
    request_from_payload, run_request,
};
use crate::core::{RoundingPolicy, WithdrawalPolicy};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliWithdrawalPolicy {
    Fatal,
    Clamp,
}

impl From<CliWithdrawalPolicy> for WithdrawalPolicy {
    fn from(value: CliWithdrawalPolicy) -> Self {
        match value {
            CliWithdrawalPolicy::Fatal => WithdrawalPolicy::Fatal,
            CliWithdrawalPolicy::Clamp => WithdrawalPolicy::Clamp,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "lijfrente",
    about = "Year-by-year estimate of a Dutch lijfrente across sequential contract periods",
    after_help = "Run `lijfrente serve [port]` to start the HTTP API instead."
)]
struct Cli {
    #[arg(long, help = "Balance before the first period starts")]
    starting_balance: Option<f64>,
    #[arg(
        long = "period",
        value_name = "START:END:DEPOSIT:WITHDRAWAL:INTEREST%:TAX%[:annuity]",
        help = "Contract period; repeat in chronological order. Rates in percent, e.g. 2020:2024:1000:0:5:0"
    )]
    periods: Vec<String>,
    #[arg(
        long,
        conflicts_with = "periods",
        help = "JSON plan file with the same schema as the HTTP API payload"
    )]
    plan: Option<PathBuf>,
    #[arg(long, value_enum, help = "What to do when a withdrawal exceeds the balance [default: fatal]")]
    withdrawal_policy: Option<CliWithdrawalPolicy>,
    #[arg(long, help = "Round every yearly amount to whole cents before carrying it forward")]
    round_to_cents: bool,
    #[arg(long, help = "Print the ledger and summary as JSON")]
    json: bool,
}

fn parse_period(raw: &str) -> Result<PeriodPayload, String> {
    let fields = raw.split(':').map(str::trim).collect::<Vec<_>>();
    if !(6..=7).contains(&fields.len()) {
        return Err(format!(
            "--period '{raw}' must look like START:END:DEPOSIT:WITHDRAWAL:INTEREST:TAX[:annuity]"
        ));
    }

    let year = |idx: usize, name: &str| {
        fields[idx]
            .parse::<i32>()
            .map_err(|_| format!("--period '{raw}': {name} '{}' is not a year", fields[idx]))
    };
    let amount = |idx: usize, name: &str| {
        fields[idx]
            .parse::<f64>()
            .map_err(|_| format!("--period '{raw}': {name} '{}' is not a number", fields[idx]))
    };

    let payout = match fields.get(6) {
        None => ApiPayoutMode::Fixed,
        Some(&"fixed") => ApiPayoutMode::Fixed,
        Some(&"annuity") => ApiPayoutMode::Annuity,
        Some(other) => {
            return Err(format!(
                "--period '{raw}': payout mode '{other}' must be 'fixed' or 'annuity'"
            ));
        }
    };

    Ok(PeriodPayload {
        start_year: year(0, "start year")?,
        end_year: year(1, "end year")?,
        annual_deposit: amount(2, "deposit")?,
        annual_withdrawal: amount(3, "withdrawal")?,
        interest_rate: amount(4, "interest rate")?,
        tax_rate: amount(5, "tax rate")?,
        payout,
    })
}

fn build_request(cli: &Cli) -> Result<SimulationRequest, String> {
    let mut request = match &cli.plan {
        Some(path) => {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("--plan {}: {e}", path.display()))?;
            request_from_json(&json)?
        }
        None => {
            if cli.periods.is_empty() {
                return Err("at least one --period (or --plan) is required".to_string());
            }
            let periods = cli
                .periods
                .iter()
                .map(|raw| parse_period(raw))
                .collect::<Result<Vec<_>, _>>()?;
            request_from_payload(SimulatePayload {
                periods,
                ..SimulatePayload::default()
            })?
        }
    };

    if let Some(v) = cli.starting_balance {
        request.config.starting_balance = v;
    }
    if let Some(v) = cli.withdrawal_policy {
        request.config.withdrawal_policy = v.into();
    }
    if cli.round_to_cents {
        request.config.rounding = RoundingPolicy::MinorUnit { decimals: 2 };
    }
    Ok(request)
}

/// Parses command-line arguments, runs the simulation and prints the result to stdout.
pub fn run_cli<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let request = build_request(&cli)?;
    let response = run_request(&request).map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| format!("failed to encode JSON output: {e}"))?;
        println!("{json}");
    } else {
        print!("{}", report::render(&response));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PayoutMode;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn cli_from(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("lijfrente").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn parse_period_reads_all_fields() {
        let period = parse_period("2025:2034:0:500:3:20").expect("valid period");
        assert_eq!((period.start_year, period.end_year), (2025, 2034));
        assert_approx(period.annual_withdrawal, 500.0);
        assert_approx(period.interest_rate, 3.0);
        assert_approx(period.tax_rate, 20.0);
        assert_eq!(period.payout, ApiPayoutMode::Fixed);

        let period = parse_period("2040:2059:0:0:2.5:19:annuity").expect("valid period");
        assert_eq!(period.payout, ApiPayoutMode::Annuity);
    }

    #[test]
    fn parse_period_rejects_malformed_input() {
        let err = parse_period("2020:2024:1000").expect_err("too few fields");
        assert!(err.contains("START:END"));

        let err = parse_period("20x0:2024:1000:0:5:0").expect_err("bad year");
        assert!(err.contains("start year"));

        let err = parse_period("2020:2024:1000:0:5:0:monthly").expect_err("bad payout");
        assert!(err.contains("payout mode"));
    }

    #[test]
    fn build_request_converts_flags_into_config() {
        let cli = cli_from(&[
            "--starting-balance",
            "250",
            "--period",
            "2020:2024:1000:0:5:0",
            "--period",
            "2025:2034:0:500:3:20",
            "--withdrawal-policy",
            "clamp",
            "--round-to-cents",
        ]);
        let request = build_request(&cli).expect("valid request");

        assert_approx(request.config.starting_balance, 250.0);
        assert_eq!(request.config.withdrawal_policy, WithdrawalPolicy::Clamp);
        assert_eq!(
            request.config.rounding,
            RoundingPolicy::MinorUnit { decimals: 2 }
        );
        assert_eq!(request.periods.len(), 2);
        assert_approx(request.periods[0].interest_rate, 0.05);
        assert_eq!(request.periods[1].payout, PayoutMode::Fixed);
    }

    #[test]
    fn build_request_requires_periods() {
        let cli = cli_from(&["--starting-balance", "100"]);
        let err = build_request(&cli).expect_err("no periods");
        assert!(err.contains("--period"));
    }

    #[test]
    fn build_request_reads_plan_file_and_applies_overrides() {
        let path = std::env::temp_dir().join(format!("lijfrente-plan-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{ "startingBalance": 10, "periods": [{ "startYear": 2030, "endYear": 2031, "interestRate": 4 }] }"#,
        )
        .expect("temp plan should be writable");

        let path_arg = path.to_string_lossy().into_owned();
        let cli = cli_from(&["--plan", &path_arg, "--starting-balance", "99"]);
        let request = build_request(&cli);
        let _ = fs::remove_file(&path);

        let request = request.expect("plan should load");
        assert_approx(request.config.starting_balance, 99.0);
        assert_eq!(request.periods[0].start_year, 2030);
        assert_approx(request.periods[0].interest_rate, 0.04);
    }

    #[test]
    fn plan_and_period_flags_conflict() {
        let result = Cli::try_parse_from([
            "lijfrente",
            "--plan",
            "plan.json",
            "--period",
            "2020:2020:0:0:0:0",
        ]);
        assert!(result.is_err());
    }
}
