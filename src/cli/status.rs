use crate::cli::open_book;
use crate::db::DB_FILE;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::Backend;
use crate::views::status_counts;

pub fn run() -> Result<()> {
    let settings = crate::settings::load_settings();
    let data_dir = settings.data_path();
    let db_path = data_dir.join(DB_FILE);

    println!("User:       {}", if settings.user_name.is_empty() { "(not set)" } else { &settings.user_name });
    println!("Data dir:   {}", data_dir.display());
    match settings.backend {
        Backend::Local => println!("Backend:    local ({})", db_path.display()),
        Backend::Appsheet => println!(
            "Backend:    appsheet (app {})",
            if settings.appsheet.app_id.is_empty() { "(not set)" } else { &settings.appsheet.app_id }
        ),
    }

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));
    } else if settings.backend == Backend::Local {
        println!();
        println!("Database not found. Run `shopfloor init` to set up.");
        return Ok(());
    }

    let (_, book) = open_book()?;
    let counts = status_counts(book.reports());
    println!();
    println!("Reports:    {}", counts.total);
    println!("  Pending:  {}", counts.pending);
    println!("  Approved: {}", counts.approved);
    println!("  Rejected: {}", counts.rejected);
    if !book.unreadable().is_empty() {
        println!("  Unreadable: {}", book.unreadable().join(", "));
    }
    println!("Stages:     {}", book.stages()?.len());
    println!("Staff:      {}", book.staff()?.len());
    Ok(())
}
