use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::open_book;
use crate::error::Result;
use crate::fmt::money;
use crate::models::parse_number;

pub fn list() -> Result<()> {
    let (_, book) = open_book()?;
    let stages = book.stages()?;
    if stages.is_empty() {
        println!("No stages defined. Add one with `shopfloor stages add NAME --price P`.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Stage", "Unit price", "Note"]);
    for s in &stages {
        table.add_row(vec![
            Cell::new(&s.name),
            Cell::new(money(parse_number(&s.unit_price))).set_alignment(CellAlignment::Right),
            Cell::new(&s.note),
        ]);
    }
    println!("Stages\n{table}");
    Ok(())
}

pub fn add(name: &str, price: &str, note: Option<&str>) -> Result<()> {
    let (_, book) = open_book()?;
    let stage = book.add_stage(name, price, note.unwrap_or(""))?;
    println!("Added stage: {} ({})", stage.name, money(parse_number(&stage.unit_price)));
    Ok(())
}

pub fn set_price(name: &str, price: &str) -> Result<()> {
    let (_, book) = open_book()?;
    let stage = book.set_stage_price(name, price)?;
    println!("{}: unit price now {}", stage.name, money(parse_number(&stage.unit_price)));
    Ok(())
}

pub fn remove(name: &str) -> Result<()> {
    let (_, book) = open_book()?;
    book.remove_stage(name)?;
    println!("Removed stage: {name}");
    Ok(())
}
