use std::path::PathBuf;

use crate::cli::{open_book, today, FilterArgs};
use crate::error::{Result, ShopfloorError};
use crate::exporter::{export_filename, export_reports, write_template, TEMPLATE_FILE};
use crate::screen::{reduce, Action, ReportScreen};
use crate::views;

fn default_path(dir: PathBuf) -> PathBuf {
    dir.join("exports").join(export_filename(today()))
}

/// Export the given ids, or every report matching the filters when no ids
/// are given.
pub fn run(ids: Vec<String>, filter: FilterArgs, output: Option<String>) -> Result<()> {
    let (settings, book) = open_book()?;

    let selected = if ids.is_empty() {
        views::filter(book.reports(), &filter.to_filter()?)
    } else {
        let mut screen = ReportScreen::new(settings.page_size);
        for id in ids {
            screen = reduce(screen, Action::Select(id.trim().to_uppercase()));
        }
        let missing: Vec<&String> = screen
            .selection
            .iter()
            .filter(|id| book.get(id).is_err())
            .collect();
        if !missing.is_empty() {
            let list: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
            return Err(ShopfloorError::NotFound(format!("report {}", list.join(", "))));
        }
        book.reports()
            .iter()
            .filter(|r| screen.selection.contains(&r.id.to_uppercase()))
            .cloned()
            .collect()
    };

    if selected.is_empty() {
        println!("No reports to export.");
        return Ok(());
    }

    let path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| default_path(settings.data_path()));
    let count = export_reports(&path, &selected)?;
    println!("Wrote {count} report(s) to {}", path.display());
    Ok(())
}

pub fn template(output: Option<String>) -> Result<()> {
    let path = output.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(TEMPLATE_FILE));
    write_template(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
