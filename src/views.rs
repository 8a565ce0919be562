use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::fmt::day_label;
use crate::models::{Report, ReportStatus};

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub search: String,
    pub stage: Option<String>,
    pub status: Option<ReportStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl ReportFilter {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.stage.is_none()
            && self.status.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    pub fn matches(&self, report: &Report) -> bool {
        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty()
            && !report.id.to_lowercase().contains(&needle)
            && !report.stage.to_lowercase().contains(&needle)
        {
            return false;
        }
        if let Some(stage) = self.stage.as_deref().filter(|s| !s.is_empty()) {
            if report.stage != stage {
                return false;
            }
        }
        if let Some(status) = self.status {
            if report.status != status {
                return false;
            }
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(day) = report.day() else {
                return false;
            };
            if self.date_from.is_some_and(|from| day < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| day > to) {
                return false;
            }
        }
        true
    }
}

pub fn filter(reports: &[Report], criteria: &ReportFilter) -> Vec<Report> {
    reports
        .iter()
        .filter(|r| criteria.matches(r))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// 1-indexed contiguous page. Page 0 or past the end is empty.
pub fn paginate(reports: &[Report], page: usize, page_size: usize) -> Vec<Report> {
    if page == 0 || page_size == 0 {
        return Vec::new();
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= reports.len() {
        return Vec::new();
    }
    let end = (start + page_size).min(reports.len());
    reports[start..end].to_vec()
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

// ---------------------------------------------------------------------------
// Grouping by date
// ---------------------------------------------------------------------------

pub const NO_DATE_LABEL: &str = "(no date)";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusCounts {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
}

impl StatusCounts {
    fn add(&mut self, status: ReportStatus) {
        self.total += 1;
        match status {
            ReportStatus::Approved => self.approved += 1,
            ReportStatus::Pending => self.pending += 1,
            ReportStatus::Rejected => self.rejected += 1,
        }
    }
}

pub fn status_counts(reports: &[Report]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for r in reports {
        counts.add(r.status);
    }
    counts
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateGroup {
    pub day: Option<NaiveDate>,
    pub label: String,
    pub reports: Vec<Report>,
    pub counts: StatusCounts,
}

/// Partition by calendar day, newest first. Undated records form a trailing group.
pub fn group_by_date(reports: &[Report]) -> Vec<DateGroup> {
    let mut by_day: BTreeMap<NaiveDate, Vec<Report>> = BTreeMap::new();
    let mut undated = Vec::new();
    for r in reports {
        match r.day() {
            Some(day) => by_day.entry(day).or_default().push(r.clone()),
            None => undated.push(r.clone()),
        }
    }

    let mut groups: Vec<DateGroup> = by_day
        .into_iter()
        .rev()
        .map(|(day, reports)| DateGroup {
            day: Some(day),
            label: day_label(day),
            counts: status_counts(&reports),
            reports,
        })
        .collect();

    if !undated.is_empty() {
        groups.push(DateGroup {
            day: None,
            label: NO_DATE_LABEL.to_string(),
            counts: status_counts(&undated),
            reports: undated,
        });
    }
    groups
}

// ---------------------------------------------------------------------------
// Stage aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
    All,
}

impl Period {
    pub fn contains(&self, day: Option<NaiveDate>) -> bool {
        match (self, day) {
            (Period::All, _) => true,
            (Period::Day(anchor), Some(d)) => d == *anchor,
            (Period::Month { year, month }, Some(d)) => d.year() == *year && d.month() == *month,
            (_, None) => false,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Period::Day(d) => day_label(*d),
            Period::Month { year, month } => format!("{month}/{year}"),
            Period::All => "all time".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageTotals {
    pub total: f64,
    pub stages: BTreeMap<String, f64>,
}

impl StageTotals {
    pub fn share(&self, stage: &str) -> f64 {
        if self.total == 0.0 {
            return 0.0;
        }
        let share = self.stages.get(stage).copied().unwrap_or(0.0) / self.total;
        if share.is_finite() {
            share
        } else {
            0.0
        }
    }
}

pub fn aggregate_by_stage_and_period(reports: &[Report], period: Period) -> StageTotals {
    let mut totals = StageTotals::default();
    for r in reports.iter().filter(|r| period.contains(r.day())) {
        let qty = r.quantity_value();
        *totals.stages.entry(r.stage.clone()).or_default() += qty;
        totals.total += qty;
    }
    totals
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

pub fn production_trend(reports: &[Report], from: NaiveDate, to: NaiveDate) -> Vec<(NaiveDate, f64)> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in reports {
        if let Some(day) = r.day().filter(|d| *d >= from && *d <= to) {
            *by_day.entry(day).or_default() += r.quantity_value();
        }
    }
    by_day.into_iter().collect()
}

/// Percentage change of total quantity against the previous month, rounded
/// to one decimal. 0 when the previous month produced nothing.
pub fn month_over_month(reports: &[Report], year: i32, month: u32) -> f64 {
    let (prev_year, prev_month) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
    let current = aggregate_by_stage_and_period(reports, Period::Month { year, month }).total;
    let previous = aggregate_by_stage_and_period(
        reports,
        Period::Month {
            year: prev_year,
            month: prev_month,
        },
    )
    .total;
    if previous == 0.0 {
        return 0.0;
    }
    ((current - previous) / previous * 1000.0).round() / 10.0
}
