use std::fmt::Write;

use super::SimulateResponse;
use crate::core::PlanSummary;

const COLUMNS: [&str; 8] = [
    "year", "opening", "deposit", "withdrawn", "tax", "interest", "closing", "shortfall",
];

pub(super) fn render(response: &SimulateResponse) -> String {
    let mut out = String::new();
    let show_shortfall = response.ledger.iter().any(|e| e.shortfall > 0.0);
    let columns = if show_shortfall {
        &COLUMNS[..]
    } else {
        &COLUMNS[..7]
    };

    let header = columns
        .iter()
        .map(|c| format!("{c:>12}"))
        .collect::<String>();
    let _ = writeln!(out, "{header}");

    let mut previous_period = None;
    for entry in &response.ledger {
        if previous_period.is_some_and(|p| p != entry.period_index) {
            let _ = writeln!(out, "{}", "-".repeat(header.len()));
        }
        previous_period = Some(entry.period_index);

        let _ = write!(
            out,
            "{:>12}{:>12.2}{:>12.2}{:>12.2}{:>12.2}{:>12.2}{:>12.2}",
            entry.year,
            entry.opening_balance,
            entry.deposit,
            entry.withdrawal,
            entry.tax_effect,
            entry.interest_accrued,
            entry.closing_balance,
        );
        if show_shortfall {
            let _ = write!(out, "{:>12.2}", entry.shortfall);
        }
        out.push('\n');
    }

    if let Some(summary) = &response.summary {
        out.push('\n');
        render_summary(&mut out, summary);
    }
    out
}

fn render_summary(out: &mut String, summary: &PlanSummary) {
    let _ = writeln!(
        out,
        "Final balance: {:.0} euro after {} years ({}-{})",
        summary.final_balance, summary.years, summary.first_year, summary.last_year
    );
    let _ = writeln!(
        out,
        "Own contribution: {:.0} euro of {:.0} euro deposited ({:.0} euro tax deducted)",
        summary.net_own_contributions,
        summary.starting_balance + summary.total_deposits,
        summary.total_tax_relief
    );
    match summary.profit_percentage {
        Some(pct) => {
            let _ = writeln!(
                out,
                "Gross profit: {:.0} euro ({pct:.1}% of total value)",
                summary.gross_profit
            );
        }
        None => {
            let _ = writeln!(out, "Gross profit: {:.0} euro", summary.gross_profit);
        }
    }

    if summary.total_gross_withdrawals > 0.0 {
        let _ = writeln!(
            out,
            "Payouts: {:.0} euro gross, {:.0} euro net",
            summary.total_gross_withdrawals, summary.total_net_withdrawals
        );
        if let Some(rate) = summary.overall_tax_rate {
            let _ = writeln!(out, "Tax on payouts: {:.1}%", rate * 100.0);
        }
        for period in summary.periods.iter().filter(|p| p.gross_withdrawals > 0.0) {
            let years = (i64::from(period.end_year) - i64::from(period.start_year) + 1) as f64;
            let _ = writeln!(
                out,
                "  {}-{}: monthly gross {:.0} euro, monthly net {:.0} euro",
                period.start_year,
                period.end_year,
                period.gross_withdrawals / years / 12.0,
                period.net_withdrawals / years / 12.0
            );
        }
    }
    if summary.total_shortfall > 0.0 {
        let _ = writeln!(
            out,
            "Shortfall: {:.0} euro requested but not available",
            summary.total_shortfall
        );
    }
    if let Some(rate) = summary.money_weighted_return {
        let _ = writeln!(out, "Yield on own contributions: {:.2}% per year", rate * 100.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{request_from_json, run_request};

    fn render_json(json: &str) -> String {
        let request = request_from_json(json).expect("json should parse");
        let response = run_request(&request).expect("plan is valid");
        render(&response)
    }

    #[test]
    fn table_has_one_row_per_year_and_period_separators() {
        let text = render_json(
            r#"{ "periods": [
                { "startYear": 2020, "endYear": 2024, "annualDeposit": 1000, "interestRate": 5 },
                { "startYear": 2025, "endYear": 2034, "annualWithdrawal": 500, "interestRate": 3, "taxRate": 20 }
            ] }"#,
        );
        let lines = text.lines().collect::<Vec<_>>();

        assert!(lines[0].contains("closing"));
        assert!(!lines[0].contains("shortfall"));
        assert!(lines[1].trim_start().starts_with("2020"));
        assert!(lines[1].contains("1050.00"));
        assert!(lines[6].starts_with("---"));
        assert!(lines[7].trim_start().starts_with("2025"));
        assert!(text.contains("Tax on payouts: 20.0%"));
        assert!(text.contains("2025-2034: monthly gross 42 euro, monthly net 33 euro"));
    }

    #[test]
    fn shortfall_column_appears_only_when_clamping() {
        let text = render_json(
            r#"{ "startingBalance": 100, "withdrawalPolicy": "clamp", "periods": [
                { "startYear": 2020, "endYear": 2021, "annualWithdrawal": 150 }
            ] }"#,
        );
        assert!(text.lines().next().is_some_and(|h| h.contains("shortfall")));
        assert!(text.contains("Shortfall: 200 euro"));
    }
}
