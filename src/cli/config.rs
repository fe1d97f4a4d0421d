use crate::app::AppState;
use crate::cli::{open_app, sheet_client, NameCommands};
use crate::error::Result;

#[derive(Clone, Copy)]
pub enum NameList {
    Tags,
    Banks,
}

impl NameList {
    fn label(self) -> &'static str {
        match self {
            NameList::Tags => "tag",
            NameList::Banks => "bank",
        }
    }

    fn items(self, app: &AppState) -> &[String] {
        match self {
            NameList::Tags => &app.tags,
            NameList::Banks => &app.banks,
        }
    }
}

pub fn names(list: NameList, command: NameCommands) -> Result<()> {
    let (_, mut app) = open_app()?;
    let label = list.label();
    match command {
        NameCommands::List => {
            let items = list.items(&app);
            if items.is_empty() {
                println!("No {label}s defined.");
            }
            for item in items {
                println!("{item}");
            }
        }
        NameCommands::Add { name } => {
            let added = match list {
                NameList::Tags => app.add_tag(&name)?,
                NameList::Banks => app.add_bank(&name)?,
            };
            if added {
                println!("Added {label} '{}'", name.trim());
            } else {
                println!("The {label} '{}' already exists.", name.trim());
            }
        }
        NameCommands::Remove { name } => {
            let removed = match list {
                NameList::Tags => app.remove_tag(&name)?,
                NameList::Banks => app.remove_bank(&name)?,
            };
            if removed {
                println!("Removed {label} '{}'", name.trim());
            } else {
                println!("No {label} named '{}'.", name.trim());
            }
        }
    }
    Ok(())
}

pub fn push() -> Result<()> {
    let (_, app) = open_app()?;
    let client = sheet_client(&app)?;
    client.push_config(&app.tags, &app.banks)?;
    println!(
        "Sent {} tag(s) and {} bank(s) to the sheet.",
        app.tags.len(),
        app.banks.len()
    );
    Ok(())
}
