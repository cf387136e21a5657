//! Rendering of diff reports and snapshot summaries.
//!
//! Console output is a flat, globally severity-sorted list so critical drift
//! always tops the terminal; Markdown keeps the per-category grouping for
//! archival reports.

use serde_json::Value;

use crate::diff::{DiffEntry, DiffReport};

/// Truncation width applied to rendered values.
pub const VALUE_WIDTH: usize = 120;

/// Compact single-value rendering: bare text for strings, JSON for
/// everything else, truncated to `maxlen` characters with a `...` tail.
/// An absent side renders as `(absent)`.
pub fn fmt_value(value: Option<&Value>, maxlen: usize) -> String {
    let text = match value {
        None => return "(absent)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    truncate(text, maxlen)
}

fn truncate(text: String, maxlen: usize) -> String {
    if text.chars().count() <= maxlen {
        return text;
    }
    let head: String = text.chars().take(maxlen.saturating_sub(3)).collect();
    format!("{head}...")
}

fn entry_suffix(entry: &DiffEntry) -> String {
    match &entry.note {
        Some(note) => format!(" ({note})"),
        None => String::new(),
    }
}

/// Terminal lines for a report: every entry across all categories, ordered
/// by severity rank then address.
pub fn console_lines(report: &DiffReport) -> Vec<String> {
    let mut entries: Vec<&DiffEntry> = report.entries().collect();
    entries.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then_with(|| a.path.cmp(&b.path))
    });
    entries
        .iter()
        .map(|entry| {
            format!(
                "[{:<8}] {}: {} -> {}{}",
                entry.severity.label(),
                entry.path,
                fmt_value(entry.old.as_ref(), VALUE_WIDTH),
                fmt_value(entry.new.as_ref(), VALUE_WIDTH),
                entry_suffix(entry),
            )
        })
        .collect()
}

/// Markdown rendering of a diff report, one section per non-empty category.
pub fn diff_markdown(report: &DiffReport, old_label: &str, new_label: &str) -> String {
    let tally = report.tally();
    let mut md = String::new();
    md.push_str("# Latency drift report\n\n");
    md.push_str(&format!("- old: `{old_label}`\n"));
    md.push_str(&format!("- new: `{new_label}`\n"));
    md.push_str(&format!(
        "- drift: {} critical, {} warning, {} info\n",
        tally.critical, tally.warning, tally.info
    ));
    for (category, entries) in &report.categories {
        if entries.is_empty() {
            continue;
        }
        md.push_str(&format!("\n## {category}\n\n"));
        for entry in entries {
            md.push_str(&format!(
                "- [{}] `{}`: {} -> {}{}\n",
                entry.severity.label(),
                entry.path,
                fmt_value(entry.old.as_ref(), VALUE_WIDTH),
                fmt_value(entry.new.as_ref(), VALUE_WIDTH),
                entry_suffix(entry),
            ));
        }
    }
    md
}

// ---------------------------------------------------------------------------
// Snapshot summary
// ---------------------------------------------------------------------------

fn text_at(doc: &Value, pointer: &str) -> String {
    fmt_value(doc.pointer(pointer), VALUE_WIDTH)
}

fn first_line_at(doc: &Value, pointer: &str) -> String {
    match doc.pointer(pointer).and_then(Value::as_str) {
        Some(text) => text.trim().lines().next().unwrap_or("").to_string(),
        None => "(absent)".to_string(),
    }
}

fn governor_summary(doc: &Value) -> String {
    let governors = match doc.pointer("/cpu_topology/per_cpu_governors").and_then(Value::as_object) {
        Some(map) if !map.is_empty() => map,
        _ => return "(absent)".to_string(),
    };
    let mut performance = 0usize;
    let mut other = 0usize;
    for value in governors.values() {
        match value.as_str() {
            Some(g) if g.eq_ignore_ascii_case("performance") => performance += 1,
            Some(_) => other += 1,
            None => {}
        }
    }
    format!("performance={performance} non-performance={other}")
}

fn cmdline_flags_of_interest(doc: &Value) -> String {
    let params = match doc.pointer("/kernel/cmdline_params").and_then(Value::as_object) {
        Some(map) => map,
        None => return "(absent)".to_string(),
    };
    let mut hits: Vec<String> = Vec::new();
    for key in ["isolcpus", "nohz_full", "rcu_nocbs", "irqaffinity", "mitigations"] {
        if let Some(value) = params.get(key).and_then(Value::as_str) {
            if value.is_empty() {
                hits.push(key.to_string());
            } else {
                hits.push(format!("{key}={value}"));
            }
        }
    }
    if hits.is_empty() {
        "(none)".to_string()
    } else {
        hits.join(" ")
    }
}

/// Human-readable Markdown summary of a single snapshot document, written
/// next to `snapshot.json` at capture time.
pub fn snapshot_markdown(doc: &Value) -> String {
    let mut md = String::new();
    md.push_str("# Latency system snapshot\n\n");
    md.push_str(&format!("- Captured: {}\n", text_at(doc, "/meta/timestamp")));
    md.push_str(&format!("- Host: {}\n", text_at(doc, "/meta/host")));
    md.push_str(&format!("- Tool: {} {}\n", text_at(doc, "/meta/tool"), text_at(doc, "/meta/version")));

    md.push_str("\n## Kernel\n\n");
    md.push_str(&format!("- Release: {}\n", text_at(doc, "/kernel/uname/release")));
    md.push_str(&format!("- Cmdline: {}\n", text_at(doc, "/kernel/cmdline")));
    md.push_str(&format!("- Latency flags: {}\n", cmdline_flags_of_interest(doc)));

    md.push_str("\n## CPU / NUMA\n\n");
    md.push_str(&format!("- SMT active: {}\n", text_at(doc, "/cpu_topology/smt_active")));
    md.push_str(&format!("- Governors: {}\n", governor_summary(doc)));
    md.push_str(&format!("- Intel P-state: {}\n", text_at(doc, "/cpu_topology/intel_pstate_status")));
    md.push_str(&format!(
        "- Kernel cpufreq default governor: {}\n",
        text_at(doc, "/cpu_topology/kernel_cpufreq_default_governor")
    ));

    md.push_str("\n## Timekeeping\n\n");
    md.push_str(&format!(
        "- Clocksource: {} (avail: {})\n",
        text_at(doc, "/timekeeping/clocksource_current"),
        text_at(doc, "/timekeeping/clocksource_available"),
    ));
    let ptp = doc
        .pointer("/timekeeping/ptp_devices")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    md.push_str(&format!("- PTP devices: {ptp}\n"));

    md.push_str("\n## Memory\n\n");
    md.push_str(&format!(
        "- THP: enabled={} defrag={}\n",
        text_at(doc, "/memory/transparent_hugepage/enabled"),
        text_at(doc, "/memory/transparent_hugepage/defrag"),
    ));
    md.push_str(&format!(
        "- Hugepages: nr={} size={}\n",
        text_at(doc, "/memory/nr_hugepages"),
        text_at(doc, "/memory/hugepagesize"),
    ));
    md.push_str(&format!(
        "- Overcommit: {} swappiness: {}\n",
        text_at(doc, "/memory/overcommit_memory"),
        text_at(doc, "/memory/swappiness"),
    ));
    md.push_str(&format!("- KSM run: {}\n", text_at(doc, "/memory/ksm/run")));

    md.push_str("\n## Networking\n\n");
    if let Some(interfaces) = doc.pointer("/network/interfaces").and_then(Value::as_object) {
        let names: Vec<&str> = interfaces.keys().map(String::as_str).collect();
        md.push_str(&format!("- Interfaces: {}\n", names.join(", ")));
        for (name, iface) in interfaces {
            md.push_str(&format!(
                "  - {name}: mac={} mtu={} speed={}\n",
                fmt_value(iface.pointer("/mac"), VALUE_WIDTH),
                fmt_value(iface.pointer("/mtu"), VALUE_WIDTH),
                fmt_value(iface.pointer("/speed"), VALUE_WIDTH),
            ));
            if let Some(driver) = iface.pointer("/ethtool/driver/driver") {
                md.push_str(&format!(
                    "    driver={} fw={}\n",
                    fmt_value(Some(driver), VALUE_WIDTH),
                    fmt_value(iface.pointer("/ethtool/driver/firmware-version"), VALUE_WIDTH),
                ));
            }
        }
    } else {
        md.push_str("- Interfaces: (absent)\n");
    }

    md.push_str("\n## IRQs\n\n");
    let pinned = doc
        .pointer("/irq/smp_affinity_list")
        .and_then(Value::as_object)
        .map(serde_json::Map::len)
        .unwrap_or(0);
    md.push_str(&format!("- IRQs with affinity entries: {pinned}\n"));

    md.push_str("\n## Toolchain\n\n");
    md.push_str(&format!("- gcc: {}\n", first_line_at(doc, "/toolchain/gcc_version")));
    md.push_str(&format!("- clang: {}\n", first_line_at(doc, "/toolchain/clang_version")));
    md.push_str(&format!("- ldd: {}\n", first_line_at(doc, "/toolchain/ldd_version")));
    md.push_str(&format!(
        "- libstdc++ max GLIBCXX: {}\n",
        text_at(doc, "/toolchain/libstdcxx_max_glibcxx")
    ));

    md.push_str("\n## Services / Sysctls\n\n");
    md.push_str(&format!("- irqbalance: {}\n", text_at(doc, "/services_sysctl/irqbalance/state")));
    md.push_str(&format!("- tuned-adm: {}\n", first_line_at(doc, "/services_sysctl/tuned_adm")));
    md.push_str(&format!(
        "- ASLR: {} SELinux: {} AppArmor: {}\n",
        text_at(doc, "/services_sysctl/aslr"),
        text_at(doc, "/services_sysctl/selinux"),
        text_at(doc, "/services_sysctl/apparmor"),
    ));

    md.push_str("\n## Containers\n\n");
    md.push_str(&format!("- Docker active: {}\n", text_at(doc, "/containers/docker_systemd_state")));
    md.push_str(&format!("- cgroups: {}\n", text_at(doc, "/containers/cgroup/mode")));
    md.push_str(&format!("- WSL: {}\n", text_at(doc, "/containers/wsl")));
    md
}
