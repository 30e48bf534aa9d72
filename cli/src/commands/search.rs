use colored::*;

use crate::terminal::print;
use adlens_common::directory::{AttributeSelection, DirectoryEntry, DirectorySearch};
use adlens_core::browse;
use adlens_protocols::filter::AttributeSource;

pub fn search<D: DirectorySearch + ?Sized>(
    directory: &D,
    base: &str,
    filter: &str,
    attributes: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let selection: AttributeSelection = match attributes.is_empty() {
        true => AttributeSelection::All,
        false => AttributeSelection::Only(attributes),
    };

    if !json {
        print::header("search results");
    }

    let mut count: usize = 0;
    for entry in browse::search(directory, base, filter, selection)? {
        let entry: DirectoryEntry = entry?;
        if json {
            print::json_line(&entry)?;
        } else {
            print::tree_head(count, &entry.dn);
            print::as_tree_one_level(rendered_attributes(&entry));
        }
        count += 1;
    }

    if !json {
        print::summary(count, "entries");
    }
    Ok(())
}

pub(super) fn rendered_attributes(entry: &DirectoryEntry) -> Vec<(String, ColoredString)> {
    entry
        .attributes
        .keys()
        .map(|name| {
            let values: String = entry.text_values(name).join("; ");
            (name.clone(), values.normal())
        })
        .collect()
}
