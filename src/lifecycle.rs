use chrono::NaiveDateTime;

use crate::error::{Result, ShopfloorError};
use crate::fmt::plain_number;
use crate::models::{find_stage, parse_day, parse_number, Draft, Report, ReportStatus, Stage};

pub const ID_PREFIX: &str = "BC";

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

fn id_number(id: &str) -> u64 {
    id.trim()
        .trim_start_matches(ID_PREFIX)
        .parse()
        .unwrap_or(0)
}

pub fn format_id(n: u64) -> String {
    format!("{ID_PREFIX}{n:03}")
}

pub fn max_id_number(ids: &[String]) -> u64 {
    ids.iter().map(|id| id_number(id)).max().unwrap_or(0)
}

/// Next sequential id after the current maximum.
///
/// This reads a snapshot and increments it; two writers holding the same
/// snapshot get the same id. Nothing on the client side can prevent that.
pub fn next_id(ids: &[String]) -> String {
    format_id(max_id_number(ids) + 1)
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

pub fn history_entry(actor: &str, action: &str, at: NaiveDateTime) -> String {
    format!("[{}] {} - {}", at.format("%d/%m/%Y %H:%M:%S"), actor, action)
}

fn append_history(history: &str, actor: &str, action: &str, at: NaiveDateTime) -> String {
    let entry = history_entry(actor, action, at);
    let trimmed = history.trim_end_matches('\n');
    if trimmed.is_empty() {
        entry
    } else {
        format!("{trimmed}\n{entry}")
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(draft: &Draft) -> Result<()> {
    let mut errors = Vec::new();
    if draft.stage.trim().is_empty() {
        errors.push("stage is required".to_string());
    }
    if draft.quantity.trim().is_empty() {
        errors.push("quantity is required".to_string());
    }
    if draft.date.trim().is_empty() {
        errors.push("date is required".to_string());
    } else if parse_day(&draft.date).is_none() {
        errors.push(format!("date '{}' is not a calendar date", draft.date.trim()));
    }
    if draft.entered_by.trim().is_empty() {
        errors.push("entered_by is required".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ShopfloorError::Validation(errors))
    }
}

pub fn with_stage_price(mut draft: Draft, stages: &[Stage]) -> Draft {
    if let Some(stage) = find_stage(stages, &draft.stage) {
        draft.unit_price = stage.unit_price.trim().to_string();
    }
    draft
}

fn normalized_date(raw: &str) -> String {
    parse_day(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

pub fn compute_amount(quantity: &str, unit_price: &str) -> String {
    plain_number(parse_number(quantity) * parse_number(unit_price))
}

pub fn display_amount(report: &Report) -> f64 {
    report.quantity_value() * report.unit_price_value()
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

fn locked(report: &Report, action: &'static str) -> ShopfloorError {
    ShopfloorError::Locked {
        id: report.id.clone(),
        status: report.status,
        action,
    }
}

pub fn create(draft: &Draft, existing_ids: &[String], actor: &str, at: NaiveDateTime) -> Result<Report> {
    validate(draft)?;
    Ok(Report {
        id: next_id(existing_ids),
        date: normalized_date(&draft.date),
        stage: draft.stage.trim().to_string(),
        quantity: draft.quantity.trim().to_string(),
        unit_price: draft.unit_price.trim().to_string(),
        amount: String::new(),
        participants: draft.participant_names(),
        note: draft.note.trim().to_string(),
        entered_by: draft.entered_by.trim().to_string(),
        status: ReportStatus::Pending,
        approved_by: String::new(),
        history: history_entry(actor, "created", at),
    })
}

pub fn update(current: &Report, edited: &Draft, actor: &str, at: NaiveDateTime) -> Result<Report> {
    if current.status == ReportStatus::Approved {
        return Err(locked(current, "edit"));
    }
    validate(edited)?;

    let mut next = current.clone();
    next.date = normalized_date(&edited.date);
    next.stage = edited.stage.trim().to_string();
    next.quantity = edited.quantity.trim().to_string();
    next.unit_price = edited.unit_price.trim().to_string();
    next.participants = edited.participant_names();
    next.note = edited.note.trim().to_string();
    next.entered_by = edited.entered_by.trim().to_string();

    let mut changed = Vec::new();
    if next.date != current.date {
        changed.push("date");
    }
    if next.stage != current.stage {
        changed.push("stage");
    }
    if next.quantity != current.quantity {
        changed.push("quantity");
    }
    if next.unit_price != current.unit_price {
        changed.push("unit price");
    }
    if next.participants != current.participants {
        changed.push("participants");
    }
    if next.note != current.note {
        changed.push("note");
    }
    if next.entered_by != current.entered_by {
        changed.push("entered by");
    }
    let action = if changed.is_empty() {
        "updated".to_string()
    } else {
        format!("updated: {}", changed.join(", "))
    };
    next.history = append_history(&current.history, actor, &action, at);
    Ok(next)
}

pub fn approve(report: &Report, approver: &str, at: NaiveDateTime) -> Result<Report> {
    if report.status != ReportStatus::Pending {
        return Err(locked(report, "approve"));
    }
    let mut next = report.clone();
    next.amount = compute_amount(&report.quantity, &report.unit_price);
    next.status = ReportStatus::Approved;
    next.approved_by = approver.to_string();
    next.history = append_history(&report.history, approver, "approved", at);
    Ok(next)
}

pub fn reject(report: &Report, approver: &str, at: NaiveDateTime) -> Result<Report> {
    if report.status != ReportStatus::Pending {
        return Err(locked(report, "reject"));
    }
    let mut next = report.clone();
    next.amount = String::new();
    next.status = ReportStatus::Rejected;
    next.approved_by = approver.to_string();
    next.history = append_history(&report.history, approver, "rejected", at);
    Ok(next)
}

pub fn unapprove(report: &Report, actor: &str, at: NaiveDateTime) -> Result<Report> {
    if report.status != ReportStatus::Approved {
        return Err(locked(report, "unapprove"));
    }
    let mut next = report.clone();
    next.amount = String::new();
    next.status = ReportStatus::Pending;
    next.approved_by = String::new();
    next.history = append_history(&report.history, actor, "unapproved", at);
    Ok(next)
}

pub fn resubmit(report: &Report, actor: &str, at: NaiveDateTime) -> Result<Report> {
    if report.status != ReportStatus::Rejected {
        return Err(locked(report, "resubmit"));
    }
    let mut next = report.clone();
    next.status = ReportStatus::Pending;
    next.approved_by = String::new();
    next.history = append_history(&report.history, actor, "resubmitted", at);
    Ok(next)
}

pub fn check_delete(report: &Report) -> Result<()> {
    if report.status == ReportStatus::Approved {
        return Err(locked(report, "delete"));
    }
    Ok(())
}

pub fn imported(draft: &Draft, id: String, actor: &str, at: NaiveDateTime) -> Report {
    Report {
        id,
        date: normalized_date(&draft.date),
        stage: draft.stage.trim().to_string(),
        quantity: draft.quantity.trim().to_string(),
        unit_price: draft.unit_price.trim().to_string(),
        amount: String::new(),
        participants: draft.participant_names(),
        note: draft.note.trim().to_string(),
        entered_by: draft.entered_by.trim().to_string(),
        status: ReportStatus::Pending,
        approved_by: String::new(),
        history: history_entry(actor, "imported", at),
    }
}
