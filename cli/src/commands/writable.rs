use colored::*;

use crate::terminal::print;
use adlens_common::directory::DirectorySearch;
use adlens_core::rights::{EffectiveRightsClassifier, ObjectType, RightFilter, RightsEntry};

pub fn writable<D: DirectorySearch + ?Sized>(
    directory: &D,
    otype: ObjectType,
    right: RightFilter,
    detail: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !json {
        print::header("writable objects");
    }

    let mut count: usize = 0;
    for entry in EffectiveRightsClassifier::new(directory).classify(otype, right, detail)? {
        let entry: RightsEntry = entry?;
        if json {
            print::json_line(&entry)?;
        } else {
            print::tree_head(count, &entry.distinguished_name);
            let details: Vec<(String, ColoredString)> = entry
                .rights
                .iter()
                .map(|(kind, subjects)| (kind.to_string(), subjects.join(", ").bright_yellow()))
                .collect();
            print::as_tree_one_level(details);
        }
        count += 1;
    }

    if json {
        return Ok(());
    }
    match count {
        0 => print::no_results("writable objects"),
        _ => print::summary(count, "objects"),
    }
    Ok(())
}
