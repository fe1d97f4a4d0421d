mod analytics;
mod app;
mod cli;
mod db;
mod error;
mod export;
mod extractor;
mod fmt;
mod logging;
mod models;
mod review;
mod settings;
mod store;
mod sync;
mod tui;

use clap::Parser;

use cli::config::NameList;
use cli::{Cli, Commands, ConfigCommands, EndpointCommands, PendingCommands, ReportCommands};
use models::Status;

fn main() {
    logging::init();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        if let Err(e) = cli::dashboard::run() {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    };

    let result = match command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Status => cli::status::run(),
        Commands::Upload { file, force } => cli::upload::run(&file, force),
        Commands::Pending { command } => match command {
            PendingCommands::List => cli::pending::list(),
            PendingCommands::Approve { ids } => cli::pending::set_status(&ids, Status::Approved),
            PendingCommands::Unapprove { ids } => cli::pending::set_status(&ids, Status::Pending),
            PendingCommands::ToggleAll => cli::pending::toggle_all(),
            PendingCommands::Edit {
                id,
                date,
                bank,
                description,
                amount,
                direction,
                category,
                tag,
            } => cli::pending::edit(&id, date, bank, description, amount, direction, category, tag),
            PendingCommands::Delete { id } => cli::pending::delete(&id),
        },
        Commands::Review => cli::review::run(),
        Commands::Sync => cli::sync::run(),
        Commands::Reload => cli::reload::run(),
        Commands::Endpoint { command } => match command {
            EndpointCommands::Show => cli::endpoint::show(),
            EndpointCommands::Set { url } => cli::endpoint::set(&url),
        },
        Commands::Tags { command } => cli::config::names(NameList::Tags, command),
        Commands::Banks { command } => cli::config::names(NameList::Banks, command),
        Commands::Config { command } => match command {
            ConfigCommands::Push => cli::config::push(),
        },
        Commands::Report { command } => match command {
            ReportCommands::Summary { month, bank } => cli::report::summary(month, bank),
            ReportCommands::Tags { month, bank } => cli::report::tags(month, bank),
            ReportCommands::Trend { month, bank } => cli::report::trend(month, bank),
            ReportCommands::Banks { month, bank } => cli::report::banks(month, bank),
            ReportCommands::Months => cli::report::months(),
        },
        Commands::Export { output } => cli::export::run(output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
