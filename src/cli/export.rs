use std::path::PathBuf;

use crate::cli::open_app;
use crate::error::Result;
use crate::export::write_history_csv;

fn default_path(data_dir: &str) -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    PathBuf::from(data_dir)
        .join("exports")
        .join(format!("fintrack-{date}.csv"))
}

pub fn run(output: Option<String>) -> Result<()> {
    let (settings, app) = open_app()?;
    let path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| default_path(&settings.data_dir));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(&path)?;
    let rows = write_history_csv(&app.history, file)?;
    println!("Wrote {rows} transaction(s) to {}", path.display());
    Ok(())
}
