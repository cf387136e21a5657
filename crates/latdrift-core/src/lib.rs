//! # latdrift-core
//!
//! **Snapshot the latency-relevant configuration of a Linux host, then diff
//! two snapshots and rank every change by how much it can hurt tail
//! latency.**
//!
//! The crate has two halves:
//!
//! - a **collector**: nine category probes that capture kernel, CPU,
//!   timekeeping, memory, network, IRQ, toolchain, service, and container
//!   state from procfs/sysfs reads and bounded read-only diagnostic
//!   commands, with per-field fault isolation (anything unreadable becomes
//!   an explicit null);
//! - a **comparator**: a pure pipeline that flattens two snapshot documents
//!   into leaf addresses, detects whole network interfaces appearing or
//!   disappearing, and pushes every changed leaf through an ordered
//!   severity rule table.
//!
//! ## Quick start
//!
//! ```
//! use latdrift_core::{diff_snapshots, Severity};
//! use serde_json::json;
//!
//! let old = json!({"kernel": {"uname": {"release": "5.10.0"}}});
//! let new = json!({"kernel": {"uname": {"release": "6.1.0"}}});
//!
//! let report = diff_snapshots(&old, &new);
//! assert_eq!(report.critical_count(), 1);
//! let entry = report.entries().next().unwrap();
//! assert_eq!(entry.severity, Severity::Critical);
//! ```
//!
//! Collecting from the live host:
//!
//! ```no_run
//! use latdrift_core::{collect_snapshot, ProbeContext, Toolbox, EXTERNAL_TOOLS};
//!
//! let tools = Toolbox::detect(EXTERNAL_TOOLS);
//! let snapshot = collect_snapshot(&ProbeContext::host(tools));
//! let dir = snapshot.write_to_dir(std::path::Path::new(".")).unwrap();
//! println!("snapshot written to {}", dir.display());
//! ```

pub mod classify;
pub mod diff;
pub mod error;
pub mod flatten;
pub mod probe;
pub mod probes;
pub mod render;
pub mod snapshot;
pub mod tools;

pub use classify::{classify, parse_int, RuleContext, Severity};
pub use diff::{diff_snapshots, DiffEntry, DiffReport, SeverityTally};
pub use error::SnapshotLoadError;
pub use flatten::{category_of, flatten, FlatMap};
pub use probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput, RawCapture};
pub use probes::{all_probes, EXTERNAL_TOOLS};
pub use snapshot::{
    collect_snapshot, collect_with_probes, compact_timestamp, load_snapshot, Snapshot,
    SNAPSHOT_DIR_PREFIX, SNAPSHOT_FILE,
};
pub use tools::{command_exists, run_with_timeout, CommandOutput, Toolbox, COMMAND_TIMEOUT};

/// Library version, from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
