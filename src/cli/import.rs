use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{actor, local_conn, now, open_book};
use crate::error::{Result, ShopfloorError};
use crate::importer::{import_file, preview_file, ImportOptions};

const PREVIEW_ROWS: usize = 5;

fn print_invalid(rows: &[usize]) {
    if rows.is_empty() {
        return;
    }
    let list: Vec<String> = rows.iter().map(|n| n.to_string()).collect();
    println!(
        "{}",
        format!("{} invalid row(s) skipped: {}", rows.len(), list.join(", ")).yellow()
    );
}

pub fn run(as_user: Option<&str>, file: &str, dry_run: bool, force: bool) -> Result<()> {
    let file_path = PathBuf::from(file);
    if !file_path.exists() {
        return Err(ShopfloorError::NotFound(format!("file {file}")));
    }
    let (settings, mut book) = open_book()?;
    let who = actor(&settings, as_user)?;

    if dry_run {
        let plan = preview_file(&mut book, &file_path, &who, now())?;
        let mut table = Table::new();
        table.set_header(vec!["ID", "Date", "Stage", "Quantity", "Participants", "Entered by"]);
        for r in plan.reports.iter().take(PREVIEW_ROWS) {
            table.add_row(vec![
                Cell::new(&r.id),
                Cell::new(&r.date),
                Cell::new(&r.stage),
                Cell::new(&r.quantity),
                Cell::new(r.participants_joined()),
                Cell::new(&r.entered_by),
            ]);
        }
        println!("{table}");
        println!("{} row(s) would be imported", plan.reports.len());
        print_invalid(&plan.invalid_rows);
        return Ok(());
    }

    let log = local_conn(&settings)?;
    let options = ImportOptions {
        batch_size: settings.import_batch_size,
        force,
    };
    let result = import_file(
        &mut book,
        &log,
        &file_path,
        &who,
        now(),
        &options,
        &mut |sent, total| eprintln!("  sent {sent}/{total}"),
    )?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum). Use --force to import it again.");
        return Ok(());
    }

    print_invalid(&result.invalid_rows);
    if result.imported == 0 && result.failed_rows == 0 {
        println!("{}", "No valid rows to import.".red());
        return Ok(());
    }
    println!("{} imported", result.imported.to_string().green());
    if result.failed_batches > 0 {
        println!(
            "{}",
            format!(
                "{} row(s) in {} batch(es) failed to send",
                result.failed_rows, result.failed_batches
            )
            .red()
        );
    }
    Ok(())
}
