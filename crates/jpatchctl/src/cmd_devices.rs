use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use jflash_patch::xml::{device_name, Document};

use crate::common;

#[derive(Serialize)]
struct DeviceEntry<'a> {
    index: usize,
    tag: &'a str,
    name: Option<&'a str>,
}

pub fn run(file: PathBuf, json: bool) -> Result<()> {
    let text = fs::read_to_string(&file).with_context(|| format!("read {}", file.display()))?;
    let document = Document::parse(&text).with_context(|| format!("parse {}", file.display()))?;

    let entries: Vec<DeviceEntry<'_>> = document
        .root
        .elements()
        .enumerate()
        .map(|(index, element)| DeviceEntry {
            index,
            tag: &element.name,
            name: device_name(element),
        })
        .collect();

    if json {
        return common::print_json(&entries);
    }

    println!("{:<6} {:<16} {}", "INDEX", "Tag", "Name");
    for entry in &entries {
        println!(
            "{:<6} {:<16} {}",
            entry.index,
            entry.tag,
            entry.name.unwrap_or("(unnamed)")
        );
    }
    println!("{} entries", entries.len());
    Ok(())
}
