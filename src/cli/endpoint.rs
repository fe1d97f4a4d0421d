use crate::cli::open_app;
use crate::error::Result;
use crate::store::DEFAULT_SCRIPT_URL;

pub fn show() -> Result<()> {
    let (_, app) = open_app()?;
    println!("{}", app.script_url);
    if app.script_url == DEFAULT_SCRIPT_URL {
        println!("(default; change it with `fintrack endpoint set <url>`)");
    }
    Ok(())
}

pub fn set(url: &str) -> Result<()> {
    let (_, mut app) = open_app()?;
    app.set_script_url(url)?;
    println!("Endpoint set to {}", app.script_url);
    Ok(())
}
