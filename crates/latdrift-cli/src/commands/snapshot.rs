//! `latdrift snapshot`: capture the current host.

use std::path::Path;

use serde_json::Value;

use latdrift_core::{collect_snapshot, ProbeContext, Toolbox, EXTERNAL_TOOLS};

pub fn run(out: &str) {
    let tools = Toolbox::detect(EXTERNAL_TOOLS);
    let ctx = ProbeContext::host(tools);

    println!("Collecting snapshot (a few seconds with all tools present)...");
    let snapshot = collect_snapshot(&ctx);

    match snapshot.write_to_dir(Path::new(out)) {
        Ok(dir) => {
            println!();
            println!("Snapshot written to {}", dir.display());
            println!("  {:<14} {}", "release:", field(&snapshot.doc, "/kernel/uname/release"));
            println!(
                "  {:<14} {}",
                "clocksource:",
                field(&snapshot.doc, "/timekeeping/clocksource_current")
            );
            println!("  {:<14} {}", "interfaces:", interface_count(&snapshot.doc));
            println!("  {:<14} {}", "raw captures:", snapshot.raw.len());
        }
        Err(e) => {
            eprintln!("Error writing snapshot to {out}: {e}");
            std::process::exit(1);
        }
    }
}

fn field(doc: &Value, pointer: &str) -> String {
    match doc.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(value) if !value.is_null() => value.to_string(),
        _ => "(absent)".to_string(),
    }
}

fn interface_count(doc: &Value) -> usize {
    doc.pointer("/network/interfaces")
        .and_then(Value::as_object)
        .map(serde_json::Map::len)
        .unwrap_or(0)
}
