//! Memory configuration: meminfo, THP, hugepages, swap, KSM.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput, RawCapture};
use crate::probes::helpers::{self, string_or_null};

static MEMORY_INFO: ProbeInfo = ProbeInfo {
    name: "memory",
    description: "meminfo, transparent hugepage modes, hugepages, overcommit, swap, KSM",
};

pub struct MemoryProbe;

impl CategoryProbe for MemoryProbe {
    fn info(&self) -> &ProbeInfo {
        &MEMORY_INFO
    }

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput {
        let mut raw = Vec::new();
        let mut map = Map::new();

        let meminfo_text = helpers::read_raw(&ctx.path("/proc/meminfo"));
        if let Some(text) = &meminfo_text {
            raw.push(RawCapture::new("proc-meminfo.txt", text.clone()));
        }
        let meminfo = meminfo_text.as_deref().map(helpers::parse_key_values);
        map.insert(
            "hugepagesize".to_string(),
            meminfo
                .as_ref()
                .and_then(|m| m.get("Hugepagesize").cloned())
                .unwrap_or(Value::Null),
        );
        map.insert(
            "meminfo".to_string(),
            meminfo.map(Value::Object).unwrap_or(Value::Null),
        );

        let thp = "/sys/kernel/mm/transparent_hugepage";
        let enabled = helpers::read_raw(&ctx.path(&format!("{thp}/enabled")));
        let defrag = helpers::read_raw(&ctx.path(&format!("{thp}/defrag")));
        let mut thp_map = Map::new();
        thp_map.insert("enabled".to_string(), string_or_null(thp_mode(enabled.as_deref())));
        thp_map.insert("defrag".to_string(), string_or_null(thp_mode(defrag.as_deref())));
        map.insert("transparent_hugepage".to_string(), Value::Object(thp_map));

        map.insert(
            "nr_hugepages".to_string(),
            string_or_null(helpers::read_first_line(&ctx.path("/proc/sys/vm/nr_hugepages"))),
        );
        map.insert(
            "overcommit_memory".to_string(),
            string_or_null(helpers::read_first_line(&ctx.path("/proc/sys/vm/overcommit_memory"))),
        );
        map.insert(
            "swappiness".to_string(),
            string_or_null(helpers::read_first_line(&ctx.path("/proc/sys/vm/swappiness"))),
        );

        map.insert("ksm".to_string(), Value::Object(ksm_state(ctx)));

        let proc_swaps = helpers::read_raw(&ctx.path("/proc/swaps"));
        if let Some(text) = &proc_swaps {
            raw.push(RawCapture::new("proc-swaps.txt", text.clone()));
        }
        let swapon = ctx.tools.run("swapon", &["--show"]);
        if let Some(text) = &swapon {
            raw.push(RawCapture::new("swapon-show.txt", text.clone()));
        }
        let mut swap = Map::new();
        swap.insert("proc_swaps".to_string(), string_or_null(proc_swaps));
        swap.insert("swapon_show".to_string(), string_or_null(swapon));
        map.insert("swap".to_string(), Value::Object(swap));

        ProbeOutput { data: Value::Object(map), raw }
    }
}

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\w+)\]").expect("pattern compiles"));

/// Extract the bracketed active mode from a THP sysfs value
/// (`always madvise [never]` → `never`). Text without brackets is returned
/// trimmed.
pub(crate) fn thp_mode(text: Option<&str>) -> Option<String> {
    let text = text?;
    if text.trim().is_empty() {
        return None;
    }
    match BRACKETED.captures(text).and_then(|caps| caps.get(1)) {
        Some(m) => Some(m.as_str().to_string()),
        None => Some(text.trim().to_string()),
    }
}

fn ksm_state(ctx: &ProbeContext) -> Map<String, Value> {
    let dir = ctx.path("/sys/kernel/mm/ksm");
    let mut map = Map::new();
    if !dir.is_dir() {
        return map;
    }
    for name in ["run", "pages_to_scan", "sleep_millisecs"] {
        map.insert(name.to_string(), string_or_null(helpers::read_first_line(&dir.join(name))));
    }
    map
}
