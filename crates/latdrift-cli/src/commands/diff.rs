//! `latdrift diff`: compare two snapshots and classify the drift.

use std::path::Path;

use latdrift_core::render::{console_lines, diff_markdown};
use latdrift_core::{diff_snapshots, load_snapshot, DiffReport};

pub fn run(
    old: &str,
    new: &str,
    md: Option<&str>,
    json: Option<&str>,
    only_changed: bool,
    exit_on_critical: bool,
) {
    let old_doc = load_or_exit(old);
    let new_doc = load_or_exit(new);

    let mut report = diff_snapshots(&old_doc, &new_doc);
    if only_changed {
        report.retain_changed();
    }

    print_console(&report);

    if let Some(path) = md {
        if let Err(e) = std::fs::write(path, diff_markdown(&report, old, new)) {
            eprintln!("Failed to write {path}: {e}");
            std::process::exit(1);
        }
        log::info!("markdown report written to {path}");
    }
    if let Some(path) = json {
        let encoded = match serde_json::to_string_pretty(&report) {
            Ok(encoded) => encoded,
            Err(e) => {
                eprintln!("Failed to encode diff: {e}");
                std::process::exit(1);
            }
        };
        if let Err(e) = std::fs::write(path, encoded) {
            eprintln!("Failed to write {path}: {e}");
            std::process::exit(1);
        }
        log::info!("json diff written to {path}");
    }

    if exit_on_critical && report.critical_count() > 0 {
        std::process::exit(2);
    }
}

fn load_or_exit(path: &str) -> serde_json::Value {
    match load_snapshot(Path::new(path)) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn print_console(report: &DiffReport) {
    let lines = console_lines(report);
    if lines.is_empty() {
        println!("No differences detected.");
        return;
    }
    for line in &lines {
        println!("{line}");
    }
    let tally = report.tally();
    println!();
    println!("{} critical, {} warning, {} info", tally.critical, tally.warning, tally.info);
}
