use std::fmt::Display;

use crate::terminal::colors;
use crate::terminal::logging::PRINT_TARGET;
use colored::*;
use serde::Serialize;
use tracing::info;
use unicode_width::UnicodeWidthStr;

pub const TOTAL_WIDTH: usize = 64;

pub trait WithDefaultColor {
    fn with_default(self, default_color: Color) -> ColoredString;
}

impl WithDefaultColor for ColoredString {
    fn with_default(self, _default_color: Color) -> ColoredString {
        self
    }
}

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let msg_len: usize = UnicodeWidthStr::width(formatted.as_str());

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: ColoredString = format!(
        "{}{}{}",
        "─".repeat(left),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right)
    )
    .bright_black();

    print(&format!("{}", line));
}

pub fn fat_separator() {
    let sep: ColoredString = "═".repeat(TOTAL_WIDTH).bright_black();
    print(&format!("{}", sep));
}

pub fn print_status<T: AsRef<str>>(msg: T) {
    let prefix: ColoredString = ">".color(colors::SEPARATOR);
    let message: String = format!("{} {}", prefix, msg.as_ref().color(colors::TEXT_DEFAULT));
    print(&message);
}

pub fn tree_head(idx: usize, name: &str) {
    let idx_str: String = format!("[{}]", idx.to_string().color(colors::ACCENT));
    let output: String = format!(
        "{} {}",
        idx_str.color(colors::SEPARATOR),
        name.color(colors::PRIMARY)
    );
    print(&output);
}

/// Prints `key: value` pairs as branches below a [`tree_head`], keys padded
/// with dots to the widest one.
pub fn as_tree_one_level<V>(key_value_pair: Vec<(String, V)>)
where
    V: Display + WithDefaultColor,
{
    let key_width: usize = key_value_pair
        .iter()
        .map(|(key, _)| UnicodeWidthStr::width(key.as_str()))
        .max()
        .unwrap_or(0);

    let total: usize = key_value_pair.len();
    for (i, (key, value)) in key_value_pair.into_iter().enumerate() {
        let last: bool = i + 1 == total;
        let branch: ColoredString = if !last {
            "├─".bright_black()
        } else {
            "└─".bright_black()
        };
        let dots: usize = key_width.saturating_sub(UnicodeWidthStr::width(key.as_str()));
        let output: String = format!(
            " {} {}{}{} {}",
            branch,
            key.color(colors::TEXT_DEFAULT),
            ".".repeat(dots).color(colors::SEPARATOR),
            ":".color(colors::SEPARATOR),
            value.with_default(colors::TEXT_DEFAULT)
        );
        print(&output);
    }
}

pub fn no_results(what: &str) {
    header(&format!("no {what} found"));
}

/// Closing line with the number of results shown.
pub fn summary(count: usize, what: &str) {
    fat_separator();
    let total: String = format!("{count} {what}");
    let width: usize = UnicodeWidthStr::width(format!("Done: {total}").as_str());
    let space: String = " ".repeat(TOTAL_WIDTH.saturating_sub(width) / 2);
    print(&format!(
        "{}{} {}",
        space,
        "Done:".color(colors::TEXT_DEFAULT),
        total.bold().green()
    ));
}

/// Writes one JSON object on its own line of stdout.
pub fn json_line<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let line: String = serde_json::to_string(value)?;
    println!("{line}");
    Ok(())
}
