use std::io::Write;

use crate::error::Result;
use crate::models::Transaction;

const HEADER: [&str; 8] = [
    "date",
    "bankName",
    "description",
    "amount",
    "direction",
    "type",
    "tag",
    "status",
];

/// Write records as CSV, oldest first. Returns the number of rows written.
pub fn write_history_csv<W: Write>(records: &[Transaction], out: W) -> Result<usize> {
    let mut sorted: Vec<&Transaction> = records.iter().collect();
    sorted.sort_by(|a, b| a.date.cmp(&b.date));

    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(HEADER)?;
    for t in &sorted {
        let amount = format!("{:.2}", t.amount);
        wtr.write_record([
            t.date.as_str(),
            t.bank_name.as_str(),
            t.description.as_str(),
            amount.as_str(),
            t.direction.as_str(),
            t.category.as_str(),
            t.tag_or_default(),
            if t.is_approved() { "approved" } else { "pending" },
        ])?;
    }
    wtr.flush()?;
    Ok(sorted.len())
}
