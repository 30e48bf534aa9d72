use crate::terminal::print;
use adlens_common::directory::{AttributeSelection, DirectoryEntry, DirectorySearch};
use adlens_core::browse;

use super::search::rendered_attributes;

pub fn object<D: DirectorySearch + ?Sized>(
    directory: &D,
    target: &str,
    attributes: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let selection: AttributeSelection = match attributes.is_empty() {
        true => AttributeSelection::All,
        false => AttributeSelection::Only(attributes),
    };

    let entry: DirectoryEntry = browse::object(directory, target, selection)?;
    if json {
        return print::json_line(&entry);
    }

    print::header("object");
    print::tree_head(0, &entry.dn);
    print::as_tree_one_level(rendered_attributes(&entry));
    Ok(())
}
