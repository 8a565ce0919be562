use colored::Colorize;
use comfy_table::{Cell, Table};
use dialoguer::Confirm;

use crate::cli::{actor, now, open_book, parse_date_opt, status_label, today, FilterArgs};
use crate::error::{Result, ShopfloorError};
use crate::fmt::{day_label, money};
use crate::ledger::{unknown_participants, ReportBook};
use crate::lifecycle::display_amount;
use crate::models::{parse_number, split_participants, Participant, Report};
use crate::screen::{reduce, Action, Modal, ReportScreen};
use crate::table::TableApi;

const HISTORY_WIDTH: usize = 88;

fn report_table(reports: &[Report]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Stage", "Quantity", "Amount", "Participants", "Entered by", "Status",
    ]);
    for r in reports {
        let date = r.day().map(day_label).unwrap_or_else(|| r.date.clone());
        table.add_row(vec![
            Cell::new(&r.id),
            Cell::new(date),
            Cell::new(&r.stage),
            Cell::new(&r.quantity),
            Cell::new(money(display_amount(r))),
            Cell::new(r.participants_joined()),
            Cell::new(&r.entered_by),
            Cell::new(status_label(r.status)),
        ]);
    }
    table
}

pub fn list(filter: FilterArgs, page: usize, by_date: bool) -> Result<()> {
    let (settings, book) = open_book()?;
    let criteria = filter.to_filter()?;

    let mut screen = ReportScreen::new(settings.page_size);
    screen = reduce(screen, Action::Search(criteria.search));
    screen = reduce(screen, Action::FilterStage(criteria.stage));
    screen = reduce(screen, Action::FilterStatus(criteria.status));
    screen = reduce(screen, Action::DateRange(criteria.date_from, criteria.date_to));
    screen = reduce(screen, Action::GoToPage(page));
    if by_date {
        screen = reduce(screen, Action::ToggleGrouped);
    }

    if !book.unreadable().is_empty() {
        println!(
            "{}",
            format!("Unreadable rows hidden: {}", book.unreadable().join(", ")).yellow()
        );
    }

    let mut reports = book.reports().to_vec();
    reports.reverse();
    let view = screen.view(&reports);

    if view.total_matches == 0 {
        if screen.filter.is_empty() {
            println!("No reports found.");
        } else {
            println!("No reports match the filters.");
        }
        return Ok(());
    }

    if screen.grouped {
        for group in &view.groups {
            let c = &group.counts;
            let mark = if group.day == Some(today()) { " (today)" } else { "" };
            println!(
                "{}{}  {} reports ({} approved, {} pending, {} rejected)",
                group.label.bold(),
                mark,
                c.total,
                c.approved,
                c.pending,
                c.rejected
            );
            println!("{}\n", report_table(&group.reports));
        }
    } else {
        println!("{}", report_table(&view.rows));
    }
    println!(
        "Page {} of {} ({} reports)",
        view.page, view.page_count, view.total_matches
    );
    Ok(())
}

pub fn show(id: &str) -> Result<()> {
    let (_, book) = open_book()?;
    let report = book.get(id)?;

    println!("{}", format!("Report {}", report.id).bold());
    println!("  Date:         {}", report.date);
    println!("  Stage:        {}", report.stage);
    println!("  Quantity:     {}", report.quantity);
    println!("  Unit price:   {}", money(report.unit_price_value()));
    if !report.amount.is_empty() {
        println!("  Amount:       {}", money(parse_number(&report.amount)));
    }
    println!("  Participants: {}", report.participants_joined());
    println!("  Note:         {}", report.note);
    println!("  Entered by:   {}", report.entered_by);
    println!("  Status:       {}", status_label(report.status));
    if !report.approved_by.is_empty() {
        println!("  Reviewed by:  {}", report.approved_by);
    }
    println!();
    println!("{}", "History".bold());
    for line in report.history_lines() {
        for wrapped in textwrap::wrap(line, HISTORY_WIDTH) {
            println!("  {wrapped}");
        }
    }
    Ok(())
}

fn warn_unknown_participants<T: TableApi>(book: &ReportBook<T>, names: &[String]) -> Result<()> {
    let unknown = unknown_participants(names, &book.staff()?);
    if !unknown.is_empty() {
        println!(
            "{}",
            format!("Not in the staff list: {}", unknown.join(", ")).yellow()
        );
    }
    Ok(())
}

fn print_saved(verb: &str, report: &Report, crew: &[String]) {
    println!(
        "{} {} ({}, {})",
        verb,
        report.id.bold(),
        report.stage,
        status_label(report.status)
    );
    if !crew.is_empty() {
        println!("  Crew: {}", crew.join(", "));
    }
}

fn crew_labels(participants: &[Participant]) -> Vec<String> {
    participants
        .iter()
        .map(|p| p.label.clone())
        .filter(|l| !l.is_empty())
        .collect()
}

pub fn add(
    as_user: Option<&str>,
    stage: String,
    quantity: String,
    date: Option<String>,
    participants: Option<String>,
    note: Option<String>,
    entered_by: Option<String>,
) -> Result<()> {
    let (settings, mut book) = open_book()?;
    let who = actor(&settings, as_user)?;

    let date = match parse_date_opt(&date)? {
        Some(d) => d,
        None => today(),
    };
    let screen = reduce(
        ReportScreen::new(settings.page_size),
        Action::OpenNew {
            entered_by: entered_by.unwrap_or_else(|| who.clone()),
            date: date.format("%Y-%m-%d").to_string(),
        },
    );
    let mut draft = screen.draft.clone();
    draft.stage = stage;
    draft.quantity = quantity;
    draft.note = note.unwrap_or_default();
    if let Some(p) = participants {
        draft.participants = split_participants(&p).iter().map(|n| Participant::new(n)).collect();
    }
    let screen = reduce(screen, Action::EditDraft(draft));

    warn_unknown_participants(&book, &screen.draft.participant_names())?;
    let crew = crew_labels(&screen.draft.participants);
    let report = match screen.modal {
        Modal::NewReport => book.create(screen.draft, &who, now())?,
        _ => return Err(ShopfloorError::Other("report form is not open".to_string())),
    };
    print_saved("Created", &report, &crew);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    as_user: Option<&str>,
    id: &str,
    date: Option<String>,
    stage: Option<String>,
    quantity: Option<String>,
    participants: Option<String>,
    note: Option<String>,
    entered_by: Option<String>,
) -> Result<()> {
    let (settings, mut book) = open_book()?;
    let who = actor(&settings, as_user)?;
    let current = book.get(id)?.clone();

    let screen = reduce(ReportScreen::new(settings.page_size), Action::OpenEdit(current));
    let mut draft = screen.draft.clone();
    if let Some(d) = parse_date_opt(&date)? {
        draft.date = d.format("%Y-%m-%d").to_string();
    }
    if let Some(s) = stage {
        draft.stage = s;
    }
    if let Some(q) = quantity {
        draft.quantity = q;
    }
    if let Some(p) = participants {
        draft.participants = split_participants(&p).iter().map(|n| Participant::new(n)).collect();
    }
    if let Some(n) = note {
        draft.note = n;
    }
    if let Some(e) = entered_by {
        draft.entered_by = e;
    }
    let screen = reduce(screen, Action::EditDraft(draft));

    warn_unknown_participants(&book, &screen.draft.participant_names())?;
    let crew = crew_labels(&screen.draft.participants);
    let report = match screen.modal {
        Modal::EditReport(ref target) => book.update(target, screen.draft.clone(), &who, now())?,
        _ => return Err(ShopfloorError::Other("report form is not open".to_string())),
    };
    print_saved("Updated", &report, &crew);
    Ok(())
}

pub fn approve(as_user: Option<&str>, id: &str) -> Result<()> {
    let (settings, mut book) = open_book()?;
    let who = actor(&settings, as_user)?;
    let report = book.approve(id, &who, now())?;
    println!(
        "Approved {} by {}: amount {}",
        report.id.bold(),
        who,
        money(parse_number(&report.amount)).green()
    );
    Ok(())
}

pub fn reject(as_user: Option<&str>, id: &str) -> Result<()> {
    let (settings, mut book) = open_book()?;
    let who = actor(&settings, as_user)?;
    let report = book.reject(id, &who, now())?;
    println!("Rejected {} by {}", report.id.bold(), who);
    Ok(())
}

pub fn unapprove(as_user: Option<&str>, id: &str) -> Result<()> {
    let (settings, mut book) = open_book()?;
    let who = actor(&settings, as_user)?;
    let report = book.unapprove(id, &who, now())?;
    print_saved("Unapproved", &report, &[]);
    Ok(())
}

pub fn resubmit(as_user: Option<&str>, id: &str) -> Result<()> {
    let (settings, mut book) = open_book()?;
    let who = actor(&settings, as_user)?;
    let report = book.resubmit(id, &who, now())?;
    print_saved("Resubmitted", &report, &[]);
    Ok(())
}

pub fn delete(ids: Vec<String>, yes: bool) -> Result<()> {
    let (settings, mut book) = open_book()?;
    let screen = reduce(ReportScreen::new(settings.page_size), Action::SelectAll(ids));
    let selected: Vec<String> = screen.selection.into_iter().collect();

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {} report(s): {}?", selected.len(), selected.join(", ")))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if selected.len() == 1 {
        book.delete(&selected[0])?;
        println!("Deleted {}", selected[0].bold());
        return Ok(());
    }

    let outcome = book.bulk_delete(&selected)?;
    println!("Deleted {} report(s)", outcome.deleted);
    if !outcome.locked.is_empty() {
        println!(
            "{}",
            format!("Approved, not deleted: {}", outcome.locked.join(", ")).yellow()
        );
    }
    if !outcome.missing.is_empty() {
        println!("{}", format!("Not found: {}", outcome.missing.join(", ")).yellow());
    }
    if !outcome.failed.is_empty() {
        println!("{}", format!("Failed: {}", outcome.failed.join(", ")).red());
    }
    Ok(())
}
