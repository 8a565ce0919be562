use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::{Draft, Report, ReportStatus};
use crate::views::{self, DateGroup, ReportFilter};

#[derive(Debug, Clone, PartialEq)]
pub enum Modal {
    None,
    NewReport,
    EditReport(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportScreen {
    pub draft: Draft,
    pub filter: ReportFilter,
    pub page: usize,
    pub page_size: usize,
    pub selection: BTreeSet<String>,
    pub grouped: bool,
    pub modal: Modal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Search(String),
    FilterStage(Option<String>),
    FilterStatus(Option<ReportStatus>),
    DateRange(Option<NaiveDate>, Option<NaiveDate>),
    GoToPage(usize),
    ToggleGrouped,
    Select(String),
    SelectAll(Vec<String>),
    OpenNew { entered_by: String, date: String },
    OpenEdit(Report),
    EditDraft(Draft),
}

impl ReportScreen {
    pub fn new(page_size: usize) -> Self {
        Self {
            draft: Draft::default(),
            filter: ReportFilter::default(),
            page: 1,
            page_size: page_size.max(1),
            selection: BTreeSet::new(),
            grouped: false,
            modal: Modal::None,
        }
    }

    /// What the screen shows for a given collection. The page is clamped to
    /// the filtered result, so a stale cursor never shows an empty page.
    pub fn view(&self, reports: &[Report]) -> PageView {
        let matched = views::filter(reports, &self.filter);
        let page_count = views::page_count(matched.len(), self.page_size);
        let page = self.page.clamp(1, page_count.max(1));
        let rows = views::paginate(&matched, page, self.page_size);
        let groups = if self.grouped {
            views::group_by_date(&rows)
        } else {
            Vec::new()
        };
        PageView {
            total_matches: matched.len(),
            page,
            page_count,
            rows,
            groups,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub total_matches: usize,
    pub page: usize,
    pub page_count: usize,
    pub rows: Vec<Report>,
    pub groups: Vec<DateGroup>,
}

/// Apply one user action. Filter changes return to page 1.
pub fn reduce(mut state: ReportScreen, action: Action) -> ReportScreen {
    match action {
        Action::Search(text) => {
            state.filter.search = text;
            state.page = 1;
        }
        Action::FilterStage(stage) => {
            state.filter.stage = stage.filter(|s| !s.trim().is_empty());
            state.page = 1;
        }
        Action::FilterStatus(status) => {
            state.filter.status = status;
            state.page = 1;
        }
        Action::DateRange(from, to) => {
            state.filter.date_from = from;
            state.filter.date_to = to;
            state.page = 1;
        }
        Action::GoToPage(page) => state.page = page.max(1),
        Action::ToggleGrouped => state.grouped = !state.grouped,
        Action::Select(id) => {
            state.selection.insert(id);
        }
        Action::SelectAll(ids) => state.selection.extend(ids),
        Action::OpenNew { entered_by, date } => {
            state.draft = Draft {
                date,
                entered_by,
                ..Default::default()
            };
            state.modal = Modal::NewReport;
        }
        Action::OpenEdit(report) => {
            state.draft = Draft::from_report(&report);
            state.modal = Modal::EditReport(report.id);
        }
        Action::EditDraft(draft) => state.draft = draft,
    }
    state
}
