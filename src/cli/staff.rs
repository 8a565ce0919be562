use comfy_table::{Cell, Table};

use crate::cli::open_book;
use crate::error::Result;

pub fn list() -> Result<()> {
    let (_, book) = open_book()?;
    let staff = book.staff()?;
    if staff.is_empty() {
        println!("No staff yet. Add someone with `shopfloor staff add NAME`.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Name", "Position"]);
    for s in &staff {
        table.add_row(vec![Cell::new(&s.name), Cell::new(&s.position)]);
    }
    println!("Staff\n{table}");
    Ok(())
}

pub fn add(name: &str, position: Option<&str>) -> Result<()> {
    let (_, book) = open_book()?;
    let staff = book.add_staff(name, position.unwrap_or(""))?;
    println!("Added staff: {}", staff.name);
    Ok(())
}

pub fn remove(name: &str) -> Result<()> {
    let (_, book) = open_book()?;
    book.remove_staff(name)?;
    println!("Removed staff: {}", name.trim());
    Ok(())
}
