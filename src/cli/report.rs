use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::analytics::{
    analyze, available_banks, available_months, expense_mix, filter_records, tag_breakdown,
    AnalyticsFilter,
};
use crate::cli::open_app;
use crate::error::{FinError, Result};
use crate::fmt::money;

fn build_filter(month: Option<String>, bank: Option<String>) -> Result<AnalyticsFilter> {
    if let Some(m) = month.as_deref().filter(|m| !m.eq_ignore_ascii_case("all")) {
        let valid = m.len() == 7
            && chrono::NaiveDate::parse_from_str(&format!("{m}-01"), "%Y-%m-%d").is_ok();
        if !valid {
            return Err(FinError::Other(format!("month must be YYYY-MM, got '{m}'")));
        }
    }
    Ok(AnalyticsFilter::new(month, bank))
}

pub fn summary(month: Option<String>, bank: Option<String>) -> Result<()> {
    let (settings, app) = open_app()?;
    let filter = build_filter(month, bank)?;
    let report = analyze(&app.history, &filter);
    let s = report.summary;
    let sym = settings.currency_symbol.as_str();

    let mut table = Table::new();
    table.set_header(vec!["", "Amount"]);
    table.add_row(vec![Cell::new("Total Spent".red().bold()), Cell::new(money(s.total_spent, sym))]);
    table.add_row(vec![
        Cell::new("Total Received".green().bold()),
        Cell::new(money(s.total_received, sym)),
    ]);
    for item in expense_mix(&s) {
        table.add_row(vec![Cell::new(format!("  {}", item.name)), Cell::new(money(item.value, sym))]);
    }
    let net = s.total_received - s.total_spent;
    let net_label = if net >= 0.0 { "NET".green().bold() } else { "NET".red().bold() };
    table.add_row(vec![Cell::new(net_label), Cell::new(money(net, sym))]);

    println!("Summary: {} ({} transactions)\n{table}", filter.describe(), s.count);
    Ok(())
}

pub fn tags(month: Option<String>, bank: Option<String>) -> Result<()> {
    let (settings, app) = open_app()?;
    let filter = build_filter(month, bank)?;
    let records = filter_records(&app.history, &filter);
    let breakdown = tag_breakdown(&records);
    if breakdown.is_empty() {
        println!("No spending for {}.", filter.describe());
        return Ok(());
    }

    let total: f64 = breakdown.iter().map(|t| t.value).sum();
    let mut table = Table::new();
    table.set_header(vec!["Tag", "Spent", "%"]);
    for item in &breakdown {
        let pct = if total > 0.0 { item.value / total * 100.0 } else { 0.0 };
        table.add_row(vec![
            Cell::new(&item.name),
            Cell::new(money(item.value, &settings.currency_symbol)),
            Cell::new(format!("{pct:.1}%")),
        ]);
    }
    println!("Spending by tag: {}\n{table}", filter.describe());
    Ok(())
}

pub fn trend(month: Option<String>, bank: Option<String>) -> Result<()> {
    let (settings, app) = open_app()?;
    let filter = build_filter(month, bank)?;
    let report = analyze(&app.history, &filter);
    if report.trend.is_empty() {
        println!("No transactions for {}.", filter.describe());
        return Ok(());
    }

    let sym = settings.currency_symbol.as_str();
    let period = if filter.month.is_some() { "Date" } else { "Month" };
    let mut table = Table::new();
    table.set_header(vec![period, "Spent", "Received", "Net"]);
    for bucket in &report.trend {
        table.add_row(vec![
            Cell::new(&bucket.key),
            Cell::new(money(bucket.spent, sym)),
            Cell::new(money(bucket.received, sym)),
            Cell::new(money(bucket.received - bucket.spent, sym)),
        ]);
    }
    println!("Trend: {}\n{table}", filter.describe());
    Ok(())
}

pub fn banks(month: Option<String>, bank: Option<String>) -> Result<()> {
    let (settings, app) = open_app()?;
    let filter = build_filter(month, bank)?;
    let report = analyze(&app.history, &filter);
    if report.banks.is_empty() {
        println!("No transactions for {}.", filter.describe());
        return Ok(());
    }

    let sym = settings.currency_symbol.as_str();
    let mut table = Table::new();
    table.set_header(vec!["Bank", "Spent", "Received"]);
    for bucket in &report.banks {
        table.add_row(vec![
            Cell::new(&bucket.key),
            Cell::new(money(bucket.spent, sym)),
            Cell::new(money(bucket.received, sym)),
        ]);
    }
    println!("By bank: {}\n{table}", filter.describe());
    Ok(())
}

pub fn months() -> Result<()> {
    let (_, app) = open_app()?;
    let months = available_months(&app.history);
    if months.is_empty() {
        println!("No synced history yet.");
        return Ok(());
    }
    println!("Months: {}", months.join(", "));
    println!("Banks:  {}", available_banks(&app.history).join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_checks_month_shape() {
        assert!(build_filter(Some("2024-02".into()), None).is_ok());
        assert!(build_filter(Some("All".into()), None).unwrap().month.is_none());
        assert!(build_filter(Some("2024-13".into()), None).is_err());
        assert!(build_filter(Some("Feb 2024".into()), None).is_err());
    }
}
