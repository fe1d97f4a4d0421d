use crate::cli::{open_app, sheet_client};
use crate::error::Result;

pub fn run() -> Result<()> {
    let (_, mut app) = open_app()?;
    let client = sheet_client(&app)?;
    let snapshot = client.fetch_remote()?;
    let got_tags = snapshot.tags.is_some();
    let got_banks = snapshot.banks.is_some();
    let count = app.apply_remote(snapshot)?;

    println!("Loaded {count} transaction(s) from the sheet.");
    if got_tags {
        println!("Tags:  {}", app.tags.join(", "));
    }
    if got_banks {
        println!("Banks: {}", app.banks.join(", "));
    }
    Ok(())
}
