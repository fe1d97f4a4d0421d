use crate::cli::open_app;
use crate::error::Result;
use crate::settings::{api_key, load_settings};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Model:      {}", settings.model);
    println!(
        "API key:    {}",
        if api_key().is_some() { "set" } else { "(not set: export GEMINI_API_KEY)" }
    );

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `fintrack init` to set up.");
        return Ok(());
    }

    let (_, app) = open_app()?;
    println!("Endpoint:   {}", app.script_url);
    println!();
    println!("Pending:    {} ({} approved)", app.working_set.len(), app.working_set.approved_count());
    println!("History:    {}", app.history.len());
    println!("Tags:       {}", app.tags.len());
    println!("Banks:      {}", app.banks.len());
    Ok(())
}
