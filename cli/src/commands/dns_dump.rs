use colored::*;

use crate::terminal::{colors, print};
use adlens_common::config::Config;
use adlens_common::directory::DirectorySearch;
use adlens_core::records::{RecordDecoder, RecordValue, ZoneEntry};

type Detail = (String, ColoredString);

pub fn dns_dump<D: DirectorySearch + ?Sized>(
    directory: &D,
    cfg: &Config,
    zone: Option<&str>,
    detail: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !json {
        print::header("dns records");
    }

    let mut count: usize = 0;
    for entry in RecordDecoder::new(directory, cfg).decode(zone, detail) {
        let entry: ZoneEntry = entry?;
        if json {
            print::json_line(&entry)?;
        } else {
            print::tree_head(count, &entry.record_name);
            print::as_tree_one_level(entry_details(&entry));
        }
        count += 1;
    }

    if json {
        return Ok(());
    }
    match count {
        0 => print::no_results("records"),
        _ => print::summary(count, "names"),
    }
    Ok(())
}

fn entry_details(entry: &ZoneEntry) -> Vec<Detail> {
    if entry.is_denied() {
        return vec![("type".to_string(), "ACCESS DENIED".color(colors::DENIED).bold())];
    }

    let mut details: Vec<Detail> = Vec::new();
    for (kind, values) in &entry.records {
        for value in values {
            let rendered: String = match value {
                RecordValue::Text(text) => text.clone(),
                RecordValue::Authority {
                    primary_server,
                    admin_email,
                } => format!("{primary_server} ({admin_email})"),
            };
            details.push((kind.to_string(), rendered.normal()));
        }
    }
    details
}
