//! Rendering for every `--output` mode.
//!
//! Lists become a rounded `tabled` grid, single items a hand-written
//! detail block. JSON and YAML serialize the core types directly, so the
//! field names there match the host's event payloads.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use aldbkit_core::LinkStatus;

use crate::cli::{ColorMode, OutputFormat};

// ── Color ───────────────────────────────────────────────────────────

/// `auto` colors only an interactive stdout, and only without `NO_COLOR`.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal(),
    }
}

/// Link status label, colored by severity.
pub fn status_label(status: LinkStatus, color: bool) -> String {
    let label = status.to_string();
    if !color {
        return label;
    }
    match status {
        LinkStatus::Found => label.green().to_string(),
        LinkStatus::TargetDbNotLoaded => label.yellow().to_string(),
        LinkStatus::MissingController | LinkStatus::MissingResponder => label.red().to_string(),
        LinkStatus::MissingTarget => label.magenta().to_string(),
    }
}

// ── Rendering ───────────────────────────────────────────────────────

/// Render a collection. `to_row` feeds the table; `key` is the single
/// value printed per item in plain mode.
pub fn render_list<T: Serialize, R: Tabled>(
    format: &OutputFormat,
    items: &[T],
    to_row: impl Fn(&T) -> R,
    key: impl Fn(&T) -> String,
) -> String {
    match format {
        OutputFormat::Table => Table::new(items.iter().map(to_row))
            .with(Style::rounded())
            .to_string(),
        OutputFormat::Plain => items.iter().map(key).collect::<Vec<_>>().join("\n"),
        structured => serialize(structured, items),
    }
}

/// Render one item; table mode prints `detail` instead of a grid.
pub fn render_single<T: Serialize>(
    format: &OutputFormat,
    item: &T,
    detail: impl Fn(&T) -> String,
    key: impl Fn(&T) -> String,
) -> String {
    match format {
        OutputFormat::Table => detail(item),
        OutputFormat::Plain => key(item),
        structured => serialize(structured, item),
    }
}

fn serialize<T: Serialize + ?Sized>(format: &OutputFormat, value: &T) -> String {
    let rendered = match format {
        OutputFormat::JsonCompact => serde_json::to_string(value).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
    };
    rendered.unwrap_or_else(|e| format!("error: could not serialize output: {e}"))
}

/// Results go to stdout; nothing is printed under `--quiet`.
pub fn print_output(rendered: &str, quiet: bool) {
    if quiet || rendered.is_empty() {
        return;
    }
    let _ = writeln!(io::stdout().lock(), "{rendered}");
}

/// Progress and status chatter goes to stderr so stdout stays parseable.
pub fn note(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Item {
        name: &'static str,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "Name")]
        name: String,
    }

    fn items() -> Vec<Item> {
        vec![Item { name: "Kitchen" }, Item { name: "Hall" }]
    }

    #[test]
    fn plain_emits_one_id_per_line() {
        let out = render_list(
            &OutputFormat::Plain,
            &items(),
            |i| ItemRow { name: i.name.into() },
            |i| i.name.into(),
        );
        assert_eq!(out, "Kitchen\nHall");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_list(
            &OutputFormat::JsonCompact,
            &items(),
            |i| ItemRow { name: i.name.into() },
            |i| i.name.into(),
        );
        assert_eq!(out, r#"[{"name":"Kitchen"},{"name":"Hall"}]"#);
    }

    #[test]
    fn table_has_header() {
        let out = render_list(
            &OutputFormat::Table,
            &items(),
            |i| ItemRow { name: i.name.into() },
            |i| i.name.into(),
        );
        assert!(out.contains("Name"));
        assert!(out.contains("Kitchen"));
    }

    #[test]
    fn status_label_is_plain_without_color() {
        assert_eq!(status_label(LinkStatus::MissingResponder, false), "missing_responder");
        assert_ne!(status_label(LinkStatus::Found, true), "found");
    }
}
