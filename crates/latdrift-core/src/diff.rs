//! Drift computation between two snapshot documents.
//!
//! The engine flattens both documents, emits structural entries for whole
//! network interfaces that appeared or disappeared, then walks the union of
//! leaf addresses and classifies every strict inequality. Entries are
//! grouped by top-level category and ordered by severity rank, then address.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::classify::{classify, RuleContext, Severity};
use crate::flatten::{category_of, flatten, FlatMap};

/// One detected drift: a changed leaf or a structural interface add/remove.
///
/// `old`/`new` of `None` mean the address is absent on that side, which is
/// distinct from a recorded null value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub path: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Diff of two snapshots, grouped by top-level category.
///
/// Every top-level key of either document gets a bucket, even when nothing
/// under it changed; [`DiffReport::retain_changed`] drops the empty ones.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DiffReport {
    pub categories: BTreeMap<String, Vec<DiffEntry>>,
}

/// Per-severity entry counts for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityTally {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl DiffReport {
    /// All entries across categories, in category order.
    pub fn entries(&self) -> impl Iterator<Item = &DiffEntry> {
        self.categories.values().flatten()
    }

    /// Total number of entries.
    pub fn total_entries(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Number of CRITICAL entries.
    pub fn critical_count(&self) -> usize {
        self.entries().filter(|e| e.severity == Severity::Critical).count()
    }

    /// Entry counts per severity.
    pub fn tally(&self) -> SeverityTally {
        let mut tally = SeverityTally::default();
        for entry in self.entries() {
            match entry.severity {
                Severity::Critical => tally.critical += 1,
                Severity::Warning => tally.warning += 1,
                Severity::Info => tally.info += 1,
            }
        }
        tally
    }

    /// Drop categories that have no entries.
    pub fn retain_changed(&mut self) {
        self.categories.retain(|_, entries| !entries.is_empty());
    }

    fn push(&mut self, category: &str, entry: DiffEntry) {
        self.categories.entry(category.to_string()).or_default().push(entry);
    }
}

/// Compute the classified diff between two snapshot documents.
pub fn diff_snapshots(old: &Value, new: &Value) -> DiffReport {
    let old_flat = flatten(old);
    let new_flat = flatten(new);

    let ctx = RuleContext {
        irq_affinity_present: has_affinity_entries(&old_flat) || has_affinity_entries(&new_flat),
    };

    let mut report = DiffReport::default();
    seed_categories(&mut report, old);
    seed_categories(&mut report, new);

    for entry in interface_changes(old, new) {
        report.push("network", entry);
    }

    let addresses: BTreeSet<&String> = old_flat.keys().chain(new_flat.keys()).collect();
    for path in addresses {
        let before = old_flat.get(path.as_str());
        let after = new_flat.get(path.as_str());
        if before == after {
            continue;
        }
        let (severity, note) = classify(path, before, after, &ctx);
        let entry = DiffEntry {
            path: path.clone(),
            old: before.cloned(),
            new: after.cloned(),
            severity,
            note: note.map(str::to_string),
        };
        report.push(category_of(path), entry);
    }

    for entries in report.categories.values_mut() {
        entries.sort_by(|a, b| {
            a.severity
                .rank()
                .cmp(&b.severity.rank())
                .then_with(|| a.path.cmp(&b.path))
        });
    }
    report
}

fn seed_categories(report: &mut DiffReport, doc: &Value) {
    if let Some(map) = doc.as_object() {
        for key in map.keys() {
            report.categories.entry(key.clone()).or_default();
        }
    }
}

fn has_affinity_entries(flat: &FlatMap) -> bool {
    flat.keys().any(|path| path.starts_with("irq.smp_affinity_list."))
}

/// Interface names present under a document's `network.interfaces` mapping.
fn interface_names(doc: &Value) -> BTreeSet<String> {
    doc.pointer("/network/interfaces")
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

/// Synthetic INFO entries for whole interfaces appearing or disappearing.
/// Leaf diffs under a vanished interface still show up individually; these
/// summarize the structural event itself.
fn interface_changes(old: &Value, new: &Value) -> Vec<DiffEntry> {
    let old_names = interface_names(old);
    let new_names = interface_names(new);
    let mut entries = Vec::new();
    for name in old_names.difference(&new_names) {
        entries.push(DiffEntry {
            path: format!("network.interfaces.{name}"),
            old: Some(Value::String("present".to_string())),
            new: Some(Value::String("absent".to_string())),
            severity: Severity::Info,
            note: Some("interface removed".to_string()),
        });
    }
    for name in new_names.difference(&old_names) {
        entries.push(DiffEntry {
            path: format!("network.interfaces.{name}"),
            old: Some(Value::String("absent".to_string())),
            new: Some(Value::String("present".to_string())),
            severity: Severity::Info,
            note: Some("interface added".to_string()),
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn queue_doc(rx: u32) -> Value {
        json!({
            "kernel": {"uname": {"release": "6.1.0"}},
            "network": {
                "interfaces": {
                    "eth0": {"mtu": "1500", "ethtool": {"rings": {"RX": rx}}}
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Core diffing
    // -----------------------------------------------------------------------

    #[test]
    fn identical_documents_produce_no_entries() {
        let doc = queue_doc(4096);
        let report = diff_snapshots(&doc, &doc);
        assert_eq!(report.total_entries(), 0);
        // Buckets for both top-level keys still exist.
        assert!(report.categories.contains_key("kernel"));
        assert!(report.categories.contains_key("network"));
    }

    #[test]
    fn self_diff_is_empty_after_retain_changed() {
        let doc = queue_doc(4096);
        let mut report = diff_snapshots(&doc, &doc);
        report.retain_changed();
        assert!(report.categories.is_empty());
    }

    #[test]
    fn changed_leaf_is_classified_and_bucketed() {
        let report = diff_snapshots(&queue_doc(4096), &queue_doc(512));
        let entries = &report.categories["network"];
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.path, "network.interfaces.eth0.ethtool.rings.RX");
        assert_eq!(entry.severity, Severity::Critical);
        assert_eq!(entry.note.as_deref(), Some("ring size reduced"));
        assert_eq!(entry.old, Some(json!(4096)));
        assert_eq!(entry.new, Some(json!(512)));
    }

    #[test]
    fn type_change_with_equal_rendering_still_differs() {
        let old = json!({"memory": {"swappiness": "60"}});
        let new = json!({"memory": {"swappiness": 60}});
        let report = diff_snapshots(&old, &new);
        assert_eq!(report.total_entries(), 1);
    }

    #[test]
    fn null_and_absent_are_distinct() {
        let old = json!({"kernel": {"cmdline": null}});
        let new = json!({"kernel": {}});
        let report = diff_snapshots(&old, &new);
        let entries = &report.categories["kernel"];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].old, Some(Value::Null));
        assert_eq!(entries[0].new, None);
    }

    #[test]
    fn added_and_removed_leaves_keep_sides_asymmetric() {
        let old = json!({"toolchain": {"gcc_version": "gcc 12.2"}});
        let new = json!({"toolchain": {"clang_version": "clang 17"}});
        let report = diff_snapshots(&old, &new);
        let entries = &report.categories["toolchain"];
        assert_eq!(entries.len(), 2);
        for entry in entries {
            assert_eq!(entry.severity, Severity::Warning);
            assert!(entry.old.is_none() ^ entry.new.is_none());
        }
    }

    // -----------------------------------------------------------------------
    // Interface add/remove detection
    // -----------------------------------------------------------------------

    #[test]
    fn removed_interface_yields_structural_entry_plus_leaf_entries() {
        let old = json!({"network": {"interfaces": {
            "eth0": {"mtu": "1500"},
            "eth1": {"mtu": "9000"}
        }}});
        let new = json!({"network": {"interfaces": {
            "eth0": {"mtu": "1500"}
        }}});
        let report = diff_snapshots(&old, &new);
        let entries = &report.categories["network"];

        let structural: Vec<_> = entries.iter().filter(|e| e.note.is_some()).collect();
        assert_eq!(structural.len(), 1);
        assert_eq!(structural[0].path, "network.interfaces.eth1");
        assert_eq!(structural[0].old, Some(json!("present")));
        assert_eq!(structural[0].new, Some(json!("absent")));
        assert_eq!(structural[0].note.as_deref(), Some("interface removed"));

        // The interface's own leaves still diff individually.
        assert!(entries.iter().any(|e| e.path == "network.interfaces.eth1.mtu"));
    }

    #[test]
    fn added_interface_yields_structural_entry() {
        let old = json!({"network": {"interfaces": {}}});
        let new = json!({"network": {"interfaces": {"ib0": {"mtu": "2044"}}}});
        let report = diff_snapshots(&old, &new);
        let structural: Vec<_> = report
            .categories["network"]
            .iter()
            .filter(|e| e.note.as_deref() == Some("interface added"))
            .collect();
        assert_eq!(structural.len(), 1);
        assert_eq!(structural[0].path, "network.interfaces.ib0");
    }

    // -----------------------------------------------------------------------
    // Context and ordering
    // -----------------------------------------------------------------------

    #[test]
    fn irq_pinning_in_either_snapshot_escalates_irqbalance() {
        let pinned = json!({
            "irq": {"smp_affinity_list": {"24": "2"}},
            "services_sysctl": {"irqbalance": {"state": "inactive"}}
        });
        let unpinned_changed = json!({
            "irq": {"smp_affinity_list": {}},
            "services_sysctl": {"irqbalance": {"state": "active"}}
        });
        let report = diff_snapshots(&pinned, &unpinned_changed);
        let entry = report
            .categories["services_sysctl"]
            .iter()
            .find(|e| e.path == "services_sysctl.irqbalance.state")
            .unwrap();
        assert_eq!(entry.severity, Severity::Critical);
        assert_eq!(entry.note.as_deref(), Some("irqbalance change with IRQ pinning"));
    }

    #[test]
    fn entries_within_a_category_sort_by_severity_then_path() {
        let old = json!({"network": {
            "interfaces": {"eth0": {
                "speed": "10000",
                "mtu": "1500",
                "ethtool": {"features": {"tso": true}}
            }}
        }});
        let new = json!({"network": {
            "interfaces": {"eth0": {
                "speed": "1000",
                "mtu": "9000",
                "ethtool": {"features": {"tso": false}}
            }}
        }});
        let report = diff_snapshots(&old, &new);
        let severities: Vec<Severity> =
            report.categories["network"].iter().map(|e| e.severity).collect();
        assert_eq!(severities, [Severity::Critical, Severity::Warning, Severity::Info]);
    }

    #[test]
    fn tally_counts_every_severity() {
        let old = json!({
            "kernel": {"uname": {"release": "5.10"}},
            "memory": {"swappiness": "60"},
            "containers": {"wsl": false}
        });
        let new = json!({
            "kernel": {"uname": {"release": "6.1"}},
            "memory": {"swappiness": "10"},
            "containers": {"wsl": true}
        });
        let report = diff_snapshots(&old, &new);
        let tally = report.tally();
        assert_eq!(tally, SeverityTally { critical: 1, warning: 1, info: 1 });
        assert_eq!(report.critical_count(), 1);
        assert_eq!(report.total_entries(), 3);
    }

    #[test]
    fn report_serializes_as_category_map() {
        let report = diff_snapshots(&queue_doc(4096), &queue_doc(512));
        let value = serde_json::to_value(&report).unwrap();
        let entry = &value["network"][0];
        assert_eq!(entry["severity"], "CRITICAL");
        assert_eq!(entry["path"], "network.interfaces.eth0.ethtool.rings.RX");
        assert_eq!(entry["note"], "ring size reduced");
        // Kernel bucket exists but is empty.
        assert_eq!(value["kernel"], json!([]));
    }

    #[test]
    fn note_is_omitted_from_json_when_absent() {
        let old = json!({"memory": {"swappiness": "60"}});
        let new = json!({"memory": {"swappiness": "10"}});
        let value = serde_json::to_value(diff_snapshots(&old, &new)).unwrap();
        assert!(value["memory"][0].get("note").is_none());
    }
}
