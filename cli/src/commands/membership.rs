use colored::*;

use crate::terminal::{colors, print};
use adlens_common::directory::DirectorySearch;
use adlens_core::membership::{GroupMembership, MembershipResolver};

pub fn membership<D: DirectorySearch + ?Sized>(
    directory: &D,
    target: &str,
    no_recurse: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !json {
        print::header(&format!("groups of {target}"));
    }

    // warnings are logged by the resolver as they happen
    let groups = MembershipResolver::new(directory).resolve(target, no_recurse)?;

    let mut count: usize = 0;
    for group in groups {
        let group: GroupMembership = group?;
        if json {
            print::json_line(&group)?;
        } else {
            print::tree_head(count, &group.account_name);
            print::as_tree_one_level(vec![
                ("objectSid".to_string(), group.sid.color(colors::SID)),
                ("dn".to_string(), group.distinguished_name.normal()),
            ]);
        }
        count += 1;
    }

    if !json && count > 0 {
        print::summary(count, "groups");
    }
    Ok(())
}
