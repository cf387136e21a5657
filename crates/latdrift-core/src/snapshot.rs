//! Snapshot assembly, persistence, and loading.
//!
//! A collection run executes every category probe on its own scoped thread,
//! assembles one immutable JSON document with a `meta` block, and can
//! persist the result as a directory: `snapshot.json`, a human `report.md`,
//! and verbatim command output under `raw/`.

use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::SnapshotLoadError;
use crate::probe::{CategoryProbe, ProbeContext, ProbeOutput, RawCapture};
use crate::probes::{all_probes, helpers};
use crate::render;

/// File name of the structured document inside a snapshot directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Prefix of snapshot directory names.
pub const SNAPSHOT_DIR_PREFIX: &str = "latdrift_";

/// A captured snapshot: the immutable document plus raw text artifacts.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub doc: Value,
    pub raw: Vec<RawCapture>,
}

impl Snapshot {
    /// Timestamp recorded in the meta block.
    pub fn timestamp(&self) -> &str {
        self.doc
            .pointer("/meta/timestamp")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    /// Persist the snapshot as `<base>/latdrift_<timestamp>/`.
    ///
    /// Failing to create the destination or to write the document is fatal;
    /// individual raw captures are best-effort.
    pub fn write_to_dir(&self, base: &Path) -> std::io::Result<PathBuf> {
        let dir = base.join(format!("{SNAPSHOT_DIR_PREFIX}{}", self.timestamp()));
        let raw_dir = dir.join("raw");
        fs::create_dir_all(&raw_dir)?;

        let doc = serde_json::to_string_pretty(&self.doc)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        fs::write(dir.join(SNAPSHOT_FILE), doc)?;
        fs::write(dir.join("report.md"), render::snapshot_markdown(&self.doc))?;

        for capture in &self.raw {
            if let Err(e) = fs::write(raw_dir.join(&capture.name), &capture.contents) {
                log::warn!("failed to write raw capture {}: {e}", capture.name);
            }
        }
        Ok(dir)
    }
}

/// Collect a full snapshot with every registered probe.
pub fn collect_snapshot(ctx: &ProbeContext) -> Snapshot {
    collect_with_probes(ctx, &all_probes())
}

/// Collect a snapshot with an explicit probe set.
///
/// Probes run concurrently; a panicking probe degrades its category to null
/// without disturbing the others. Raw captures are joined in probe order.
pub fn collect_with_probes(ctx: &ProbeContext, probes: &[Box<dyn CategoryProbe>]) -> Snapshot {
    let mut doc = Map::new();
    doc.insert("meta".to_string(), build_meta());
    let mut raw = Vec::new();

    std::thread::scope(|scope| {
        let handles: Vec<_> = probes
            .iter()
            .map(|probe| scope.spawn(move || collect_one(probe.as_ref(), ctx)))
            .collect();

        for (probe, handle) in probes.iter().zip(handles) {
            let output = handle.join().unwrap_or_else(|_| ProbeOutput::new(Value::Null));
            doc.insert(probe.name().to_string(), output.data);
            raw.extend(output.raw);
        }
    });

    Snapshot { doc: Value::Object(doc), raw }
}

fn collect_one(probe: &dyn CategoryProbe, ctx: &ProbeContext) -> ProbeOutput {
    match catch_unwind(AssertUnwindSafe(|| probe.collect(ctx))) {
        Ok(output) => output,
        Err(_) => {
            log::warn!("probe '{}' panicked; recording null for the category", probe.name());
            ProbeOutput::new(Value::Null)
        }
    }
}

fn build_meta() -> Value {
    let host = helpers::uname_info().map(|u| u.node).filter(|node| !node.is_empty());
    let user = std::env::var("USER").or_else(|_| std::env::var("LOGNAME")).ok();
    json!({
        "timestamp": compact_timestamp(SystemTime::now()),
        "host": host,
        "user": user,
        "tool": "latdrift",
        "version": crate::VERSION,
        "capture_id": Uuid::new_v4().to_string(),
    })
}

/// Load a snapshot document from a JSON file, validating the top level.
pub fn load_snapshot(path: &Path) -> Result<Value, SnapshotLoadError> {
    let text = fs::read_to_string(path)
        .map_err(|source| SnapshotLoadError::Read { path: path.to_path_buf(), source })?;
    let doc: Value = serde_json::from_str(&text)
        .map_err(|source| SnapshotLoadError::Parse { path: path.to_path_buf(), source })?;
    if !doc.is_object() {
        return Err(SnapshotLoadError::NotAMapping { path: path.to_path_buf() });
    }
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Format a system time as a compact UTC stamp for directory names and the
/// meta block, e.g. `20260215_013000`.
pub fn compact_timestamp(time: SystemTime) -> String {
    let secs = time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let (year, month, day, hour, minute, second) = secs_to_utc(secs);
    format!("{year:04}{month:02}{day:02}_{hour:02}{minute:02}{second:02}")
}

/// Convert seconds since the Unix epoch to UTC civil time.
fn secs_to_utc(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let days = secs / 86_400;
    let day_secs = secs % 86_400;
    let hour = day_secs / 3_600;
    let minute = (day_secs % 3_600) / 60;
    let second = day_secs % 60;

    let mut year: u64 = 1970;
    let mut days_left = days;
    loop {
        let year_days: u64 = if is_leap(year) { 366 } else { 365 };
        if days_left < year_days {
            break;
        }
        days_left -= year_days;
        year += 1;
    }

    let month_days: [u64; 12] = [
        31,
        if is_leap(year) { 29 } else { 28 },
        31,
        30,
        31,
        30,
        31,
        31,
        30,
        31,
        30,
        31,
    ];
    let mut month: u64 = 1;
    for length in month_days {
        if days_left < length {
            break;
        }
        days_left -= length;
        month += 1;
    }

    (year, month, days_left + 1, hour, minute, second)
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeInfo;
    use crate::tools::Toolbox;
    use std::time::Duration;

    // -----------------------------------------------------------------------
    // Timestamps
    // -----------------------------------------------------------------------

    #[test]
    fn epoch_formats_as_19700101() {
        assert_eq!(compact_timestamp(UNIX_EPOCH), "19700101_000000");
    }

    #[test]
    fn known_instants_convert_correctly() {
        assert_eq!(secs_to_utc(0), (1970, 1, 1, 0, 0, 0));
        assert_eq!(secs_to_utc(86_399), (1970, 1, 1, 23, 59, 59));
        assert_eq!(secs_to_utc(86_400), (1970, 1, 2, 0, 0, 0));
        // 2001-09-09 01:46:40 UTC
        assert_eq!(secs_to_utc(1_000_000_000), (2001, 9, 9, 1, 46, 40));
        // 2023-11-14 22:13:20 UTC
        assert_eq!(secs_to_utc(1_700_000_000), (2023, 11, 14, 22, 13, 20));
    }

    #[test]
    fn leap_day_is_representable() {
        // 2024-02-29 00:00:00 UTC
        assert_eq!(secs_to_utc(1_709_164_800), (2024, 2, 29, 0, 0, 0));
        let stamp = compact_timestamp(UNIX_EPOCH + Duration::from_secs(1_709_164_800));
        assert_eq!(stamp, "20240229_000000");
    }

    #[test]
    fn leap_year_rules() {
        assert!(is_leap(2024));
        assert!(is_leap(2000));
        assert!(!is_leap(1900));
        assert!(!is_leap(2023));
    }

    // -----------------------------------------------------------------------
    // Collection
    // -----------------------------------------------------------------------

    static STATIC_INFO: ProbeInfo =
        ProbeInfo { name: "static_cat", description: "fixed test payload" };
    static PANICKY_INFO: ProbeInfo =
        ProbeInfo { name: "panicky_cat", description: "always panics" };

    struct StaticProbe;

    impl CategoryProbe for StaticProbe {
        fn info(&self) -> &ProbeInfo {
            &STATIC_INFO
        }

        fn collect(&self, _ctx: &ProbeContext) -> ProbeOutput {
            ProbeOutput {
                data: json!({"x": 1}),
                raw: vec![RawCapture::new("static.txt", "hello\n")],
            }
        }
    }

    struct PanickyProbe;

    impl CategoryProbe for PanickyProbe {
        fn info(&self) -> &ProbeInfo {
            &PANICKY_INFO
        }

        fn collect(&self, _ctx: &ProbeContext) -> ProbeOutput {
            panic!("boom");
        }
    }

    fn test_ctx(dir: &tempfile::TempDir) -> ProbeContext {
        ProbeContext::rooted(dir.path(), Toolbox::empty())
    }

    #[test]
    fn collection_assembles_meta_and_categories() {
        let dir = tempfile::tempdir().unwrap();
        let probes: Vec<Box<dyn CategoryProbe>> = vec![Box::new(StaticProbe)];
        let snapshot = collect_with_probes(&test_ctx(&dir), &probes);

        assert_eq!(snapshot.doc["static_cat"]["x"], json!(1));
        assert_eq!(snapshot.doc["meta"]["tool"], json!("latdrift"));
        assert_eq!(snapshot.doc["meta"]["version"], json!(crate::VERSION));
        let stamp = snapshot.timestamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
        assert_eq!(snapshot.doc["meta"]["capture_id"].as_str().unwrap().len(), 36);
        assert_eq!(snapshot.raw, vec![RawCapture::new("static.txt", "hello\n")]);
    }

    #[test]
    fn panicking_probe_degrades_only_its_category() {
        let dir = tempfile::tempdir().unwrap();
        let probes: Vec<Box<dyn CategoryProbe>> =
            vec![Box::new(PanickyProbe), Box::new(StaticProbe)];
        let snapshot = collect_with_probes(&test_ctx(&dir), &probes);
        assert_eq!(snapshot.doc["panicky_cat"], Value::Null);
        assert_eq!(snapshot.doc["static_cat"]["x"], json!(1));
    }

    // -----------------------------------------------------------------------
    // Persistence and loading
    // -----------------------------------------------------------------------

    #[test]
    fn write_then_load_roundtrips_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let probes: Vec<Box<dyn CategoryProbe>> = vec![Box::new(StaticProbe)];
        let snapshot = collect_with_probes(&test_ctx(&dir), &probes);

        let out = snapshot.write_to_dir(dir.path()).unwrap();
        assert!(out.file_name().unwrap().to_str().unwrap().starts_with(SNAPSHOT_DIR_PREFIX));
        assert!(out.join("report.md").exists());
        assert_eq!(fs::read_to_string(out.join("raw/static.txt")).unwrap(), "hello\n");

        let loaded = load_snapshot(&out.join(SNAPSHOT_FILE)).unwrap();
        assert_eq!(loaded, snapshot.doc);
    }

    #[test]
    fn load_rejects_missing_invalid_and_nonmapping_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = load_snapshot(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(SnapshotLoadError::Read { .. })));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{not json").unwrap();
        assert!(matches!(load_snapshot(&bad), Err(SnapshotLoadError::Parse { .. })));

        let list = dir.path().join("list.json");
        fs::write(&list, "[1, 2, 3]").unwrap();
        assert!(matches!(load_snapshot(&list), Err(SnapshotLoadError::NotAMapping { .. })));
    }
}
