use crate::terminal::print;
use adlens_common::directory::DirectorySearch;
use adlens_core::browse;

pub fn children<D: DirectorySearch + ?Sized>(
    directory: &D,
    target: &str,
    class: &str,
    json: bool,
) -> anyhow::Result<()> {
    if !json {
        print::header(&format!("children of {target}"));
    }

    let mut count: usize = 0;
    for dn in browse::children(directory, target, class)? {
        let dn: String = dn?;
        if json {
            print::json_line(&serde_json::json!({ "distinguishedName": dn }))?;
        } else {
            print::print_status(&dn);
        }
        count += 1;
    }

    if !json {
        print::summary(count, "objects");
    }
    Ok(())
}
