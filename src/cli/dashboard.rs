use chrono::{Datelike, Duration, NaiveDate};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{open_book, parse_date_opt, parse_month, today};
use crate::error::{Result, ShopfloorError};
use crate::fmt::{compact_quantity, percent, plain_number};
use crate::views::{
    aggregate_by_stage_and_period, filter, month_over_month, production_trend, status_counts, Period,
    ReportFilter,
};

const BAR_WIDTH: usize = 30;
const TREND_DAYS: i64 = 7;

fn period_range(period: Period) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match period {
        Period::Day(d) => (Some(d), Some(d)),
        Period::Month { year, month } => {
            let first = NaiveDate::from_ymd_opt(year, month, 1);
            let next = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)
            };
            (first, next.and_then(|d| d.pred_opt()))
        }
        Period::All => (None, None),
    }
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "\u{2588}".repeat(len.min(BAR_WIDTH))
}

pub fn run(
    all: bool,
    day: Option<String>,
    month: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
) -> Result<()> {
    let period = match (parse_date_opt(&day)?, month) {
        _ if all => Period::All,
        (Some(d), _) => Period::Day(d),
        (None, Some(m)) => {
            let (year, month) = parse_month(&m)?;
            Period::Month { year, month }
        }
        (None, None) => {
            let t = today();
            Period::Month {
                year: t.year(),
                month: t.month(),
            }
        }
    };

    let (_, book) = open_book()?;
    let reports = book.reports();

    // Status counts for the period
    let (start, end) = period_range(period);
    let in_period = filter(
        reports,
        &ReportFilter {
            date_from: start,
            date_to: end,
            ..Default::default()
        },
    );
    let counts = status_counts(&in_period);
    println!("{}", format!("Production, {}", period.label()).bold());
    println!(
        "Reports: {}  ({} approved, {} pending, {} rejected)",
        counts.total,
        counts.approved.to_string().green(),
        counts.pending.to_string().yellow(),
        counts.rejected.to_string().red()
    );

    let totals = aggregate_by_stage_and_period(reports, period);
    print!("Total quantity: {}", compact_quantity(totals.total).bold());
    if let Period::Month { year, month } = period {
        let change = month_over_month(reports, year, month);
        let label = format!("{change:+.1}% vs previous month");
        if change >= 0.0 {
            print!("  {}", label.green());
        } else {
            print!("  {}", label.red());
        }
    }
    println!("\n");

    // Stage breakdown
    let mut table = Table::new();
    table.set_header(vec!["Stage", "Quantity", "Share"]);
    let mut stages: Vec<(&String, &f64)> = totals.stages.iter().collect();
    stages.sort_by(|a, b| b.1.total_cmp(a.1));
    for (name, qty) in stages {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(plain_number(*qty)).set_alignment(CellAlignment::Right),
            Cell::new(percent(totals.share(name))).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("By stage\n{table}\n");

    // Daily trend
    let to = parse_date_opt(&to_date)?.or(end).unwrap_or_else(today);
    let from = match parse_date_opt(&from_date)? {
        Some(d) => d,
        None => to - Duration::days(TREND_DAYS - 1),
    };
    if from > to {
        return Err(ShopfloorError::Validation(vec![format!(
            "trend start {from} is after end {to}"
        )]));
    }
    let trend = production_trend(reports, from, to);
    let max = trend.iter().map(|(_, q)| *q).fold(0.0, f64::max);
    let mut trend_table = Table::new();
    trend_table.set_header(vec!["Date", "Quantity", ""]);
    let mut day = from;
    while day <= to {
        let qty = trend
            .iter()
            .find(|(d, _)| *d == day)
            .map(|(_, q)| *q)
            .unwrap_or(0.0);
        trend_table.add_row(vec![
            Cell::new(crate::fmt::day_label(day)),
            Cell::new(compact_quantity(qty)).set_alignment(CellAlignment::Right),
            Cell::new(bar(qty, max).cyan()),
        ]);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    println!("Daily trend\n{trend_table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_range_month() {
        let (from, to) = period_range(Period::Month { year: 2024, month: 2 });
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 2, 29));
        let (_, dec_end) = period_range(Period::Month { year: 2024, month: 12 });
        assert_eq!(dec_end, NaiveDate::from_ymd_opt(2024, 12, 31));
    }

    #[test]
    fn test_bar_scales_to_max() {
        assert_eq!(bar(10.0, 10.0).chars().count(), BAR_WIDTH);
        assert_eq!(bar(5.0, 10.0).chars().count(), BAR_WIDTH / 2);
        assert_eq!(bar(5.0, 0.0), "");
    }
}
