use std::path::Path;

use colored::Colorize;

use crate::cli::{gemini_client, open_app};
use crate::error::Result;

pub fn run(file: &str, force: bool) -> Result<()> {
    let (settings, mut app) = open_app()?;
    let path = Path::new(file);

    println!("Extracting transactions from {}...", path.display());
    let outcome = app.upload(path, force, || gemini_client(&settings))?;

    if outcome.replaced > 0 {
        println!(
            "{}",
            format!("Discarded {} unsynced transaction(s) from the previous statement.", outcome.replaced)
                .yellow()
        );
    }
    if outcome.extracted == 0 {
        println!("No transactions found in this statement.");
    } else {
        println!(
            "{} {} transaction(s) ready for review. Run `fintrack review` or `fintrack pending list`.",
            "Extracted".green(),
            outcome.extracted
        );
    }
    Ok(())
}
