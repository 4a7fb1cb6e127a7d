use anyhow::Result;
use serde::Serialize;
use tracing::info;

use jflash_patch::{is_installation_root, PathLocator, JFLASH_EXECUTABLE};

use crate::common;

#[derive(Serialize)]
struct Location {
    root: Option<String>,
    executable: &'static str,
    executable_found: bool,
}

pub fn run(json: bool) -> Result<()> {
    let root = PathLocator::new().locate();
    let executable_found = root.as_deref().map_or(false, is_installation_root);
    info!(found = root.is_some(), executable_found, "located installation");

    if json {
        let location = Location {
            root: root.as_deref().map(common::display_path),
            executable: JFLASH_EXECUTABLE,
            executable_found,
        };
        return common::print_json(&location);
    }

    match root {
        Some(root) => {
            println!("{}", root.display());
            if !executable_found {
                println!("(directory does not contain {JFLASH_EXECUTABLE})");
            }
        }
        None => println!("No J-Flash installation found."),
    }
    Ok(())
}
