use colored::Colorize;
use comfy_table::{Cell, Color, Table};

use crate::cli::{open_app, DirectionArg, TypeArg};
use crate::error::{FinError, Result};
use crate::fmt::money;
use crate::models::{Direction, Status};
use crate::review::FieldEdit;

pub fn list() -> Result<()> {
    let (settings, app) = open_app()?;
    if app.working_set.is_empty() {
        println!("No pending transactions. Upload a statement with `fintrack upload <file>`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["", "ID", "Date", "Bank", "Description", "Amount", "Direction", "Type", "Tag"]);
    for t in app.working_set.records() {
        let mark = if t.is_approved() { "✓" } else { " " };
        let amount_color = match t.direction {
            Direction::Spent => Color::Red,
            Direction::Received => Color::Green,
        };
        table.add_row(vec![
            Cell::new(mark),
            Cell::new(&t.id),
            Cell::new(&t.date),
            Cell::new(&t.bank_name),
            Cell::new(&t.description),
            Cell::new(money(t.amount, &settings.currency_symbol)).fg(amount_color),
            Cell::new(t.direction),
            Cell::new(t.category),
            Cell::new(t.tag_or_default()),
        ]);
    }
    println!("{table}");
    println!(
        "{} of {} approved",
        app.working_set.approved_count(),
        app.working_set.len()
    );
    Ok(())
}

pub fn set_status(ids: &[String], status: Status) -> Result<()> {
    let (_, mut app) = open_app()?;
    app.set_status(ids, status)?;
    let verb = match status {
        Status::Approved => "Approved",
        Status::Pending => "Unapproved",
    };
    println!("{verb} {} transaction(s).", ids.len());
    Ok(())
}

pub fn toggle_all() -> Result<()> {
    let (_, mut app) = open_app()?;
    if app.working_set.is_empty() {
        println!("No pending transactions.");
        return Ok(());
    }
    match app.toggle_all()? {
        Status::Approved => println!("Approved all {} transaction(s).", app.working_set.len()),
        Status::Pending => println!("Cleared approval on all {} transaction(s).", app.working_set.len()),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    id: &str,
    date: Option<String>,
    bank: Option<String>,
    description: Option<String>,
    amount: Option<f64>,
    direction: Option<DirectionArg>,
    category: Option<TypeArg>,
    tag: Option<String>,
) -> Result<()> {
    let edits: Vec<FieldEdit> = [
        date.map(FieldEdit::Date),
        bank.map(FieldEdit::BankName),
        description.map(FieldEdit::Description),
        amount.map(FieldEdit::Amount),
        direction.map(|d| FieldEdit::Direction(d.into())),
        category.map(|c| FieldEdit::Type(c.into())),
        tag.map(FieldEdit::Tag),
    ]
    .into_iter()
    .flatten()
    .collect();

    if edits.is_empty() {
        return Err(FinError::InvalidEdit("nothing to change; pass at least one field flag".to_string()));
    }

    let (_, mut app) = open_app()?;
    app.apply_edits(id, edits)?;
    println!("{} {id}", "Updated".green());
    Ok(())
}

pub fn delete(id: &str) -> Result<()> {
    let (_, mut app) = open_app()?;
    let removed = app.delete(id)?;
    println!("Deleted {} ({} {})", removed.id, removed.date, removed.description);
    Ok(())
}
