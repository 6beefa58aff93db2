//! Maintain the exclusion list.

use avcal_common::config::AppConfig;
use avcal_device_model::{is_pseudo_device, COMMUNICATIONS_DEVICE_ID, DEFAULT_DEVICE_ID};

use super::open_store;
use crate::ExcludeAction;

pub fn run(config: &AppConfig, action: ExcludeAction) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let mut exclusions = store.load_exclusions();

    match action {
        ExcludeAction::Add { id } => {
            if is_pseudo_device(&id) {
                println!("{id} is always excluded.");
                return Ok(());
            }
            if !exclusions.insert(id.as_str()) {
                println!("{id} is already excluded.");
                return Ok(());
            }
            store.save_exclusions(&exclusions)?;
            println!("Excluded {id}.");
        }
        ExcludeAction::Remove { id } => {
            if !exclusions.remove(&id) {
                println!("{id} was not excluded.");
                return Ok(());
            }
            store.save_exclusions(&exclusions)?;
            println!("{id} is no longer excluded.");
        }
        ExcludeAction::List => {
            for id in exclusions.ids() {
                println!("{id}");
            }
            println!("{DEFAULT_DEVICE_ID} (implicit)");
            println!("{COMMUNICATIONS_DEVICE_ID} (implicit)");
        }
        ExcludeAction::Clear => {
            let count = exclusions.len();
            exclusions.clear();
            store.save_exclusions(&exclusions)?;
            println!("Cleared {count} exclusion(s).");
        }
    }

    Ok(())
}
