use colored::Colorize;

use crate::app::dispatch_message;
use crate::cli::{open_app, sheet_client};
use crate::error::Result;
use crate::review::Dispatch;

pub fn run() -> Result<()> {
    let (_, mut app) = open_app()?;
    let client = sheet_client(&app)?;
    let result = app.sync_approved(&client)?;
    match result {
        Dispatch::NothingApproved => println!("{}", dispatch_message(&result).yellow()),
        Dispatch::Sent(_) => {
            println!("{}", dispatch_message(&result).green());
            if !app.working_set.is_empty() {
                println!("{} transaction(s) still pending review.", app.working_set.len());
            }
        }
    }
    Ok(())
}
