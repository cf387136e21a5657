//! CPU topology, frequency governors, and NUMA layout.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;

use flate2::read::GzDecoder;
use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput, RawCapture};
use crate::probes::helpers::{self, string_or_null};

static CPU_INFO: ProbeInfo = ProbeInfo {
    name: "cpu_topology",
    description: "lscpu topology, SMT state, per-CPU governors, NUMA layout, cpufreq defaults",
};

pub struct CpuTopologyProbe;

impl CategoryProbe for CpuTopologyProbe {
    fn info(&self) -> &ProbeInfo {
        &CPU_INFO
    }

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput {
        let mut raw = Vec::new();
        let mut map = Map::new();

        let lscpu = ctx.tools.run("lscpu", &[]);
        if let Some(text) = &lscpu {
            raw.push(RawCapture::new("lscpu.txt", text.clone()));
        }
        map.insert(
            "lscpu_hash".to_string(),
            match lscpu.as_deref() {
                Some(text) if !text.is_empty() => Value::String(sha256_hex(text)),
                _ => Value::Null,
            },
        );
        map.insert(
            "smt_active".to_string(),
            smt_active(lscpu.as_deref()).map(Value::Bool).unwrap_or(Value::Null),
        );
        map.insert("lscpu".to_string(), string_or_null(lscpu));

        let lscpu_extended = ctx.tools.run("lscpu", &["-e=CPU,CORE,SOCKET,NODE,ONLINE"]);
        if let Some(text) = &lscpu_extended {
            raw.push(RawCapture::new("lscpu-e.txt", text.clone()));
        }
        map.insert("lscpu_extended".to_string(), string_or_null(lscpu_extended));

        map.insert("per_cpu_governors".to_string(), Value::Object(per_cpu_governors(ctx)));
        map.insert(
            "intel_pstate_status".to_string(),
            string_or_null(helpers::read_first_line(
                &ctx.path("/sys/devices/system/cpu/intel_pstate/status"),
            )),
        );

        let cpupower = ctx.tools.run("cpupower", &["frequency-info"]);
        if let Some(text) = &cpupower {
            raw.push(RawCapture::new("cpupower-frequency-info.txt", text.clone()));
        }
        map.insert("cpupower_frequency_info".to_string(), string_or_null(cpupower));

        let numactl = ctx.tools.run("numactl", &["-H"]);
        if let Some(text) = &numactl {
            raw.push(RawCapture::new("numactl-H.txt", text.clone()));
        }
        map.insert("numactl_hardware".to_string(), string_or_null(numactl));

        let release = helpers::uname_info().map(|u| u.release).unwrap_or_default();
        let (governor, symbol, source) = default_governor(ctx, &release);
        map.insert("kernel_cpufreq_default_governor".to_string(), string_or_null(governor));
        map.insert("kernel_cpufreq_default_symbol".to_string(), string_or_null(symbol));
        map.insert("kernel_cpufreq_default_source".to_string(), string_or_null(source));

        map.insert("cpus_allowed_list".to_string(), string_or_null(cpus_allowed_list(ctx)));

        ProbeOutput { data: Value::Object(map), raw }
    }
}

/// SHA-256 hex digest of topology text; a digest change flags any topology
/// drift without diffing the whole blob.
pub(crate) fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Derive SMT state from the `Thread(s) per core:` line of lscpu output.
pub(crate) fn smt_active(lscpu: Option<&str>) -> Option<bool> {
    for line in lscpu?.lines() {
        if line.contains("Thread(s) per core:") {
            if let Some((_, value)) = line.split_once(':') {
                if let Ok(threads) = value.trim().parse::<u32>() {
                    return Some(threads > 1);
                }
            }
        }
    }
    None
}

fn per_cpu_governors(ctx: &ProbeContext) -> Map<String, Value> {
    let base = ctx.path("/sys/devices/system/cpu");
    let mut map = Map::new();
    for name in helpers::dir_names(&base) {
        if !is_cpu_dir(&name) {
            continue;
        }
        let governor = helpers::read_first_line(&base.join(&name).join("cpufreq/scaling_governor"));
        map.insert(name, string_or_null(governor));
    }
    map
}

fn is_cpu_dir(name: &str) -> bool {
    name.strip_prefix("cpu")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

static DEFAULT_GOV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^CONFIG_CPU_FREQ_DEFAULT_GOV_([A-Z0-9_]+)=y\s*$").expect("pattern compiles")
});

/// Extract the configured default cpufreq governor from kernel config text.
pub(crate) fn default_governor_from_config(text: &str) -> Option<(String, String)> {
    let caps = DEFAULT_GOV.captures(text)?;
    let tag = caps.get(1)?.as_str();
    Some((tag.to_ascii_lowercase(), format!("CONFIG_CPU_FREQ_DEFAULT_GOV_{tag}")))
}

/// The build-time default governor, from /boot/config-<release> first, then
/// /proc/config.gz.
fn default_governor(
    ctx: &ProbeContext,
    release: &str,
) -> (Option<String>, Option<String>, Option<String>) {
    if !release.is_empty() {
        if let Some(text) = helpers::read_raw(&ctx.path(&format!("/boot/config-{release}"))) {
            if let Some((governor, symbol)) = default_governor_from_config(&text) {
                return (
                    Some(governor),
                    Some(symbol),
                    Some(format!("/boot/config-{release}")),
                );
            }
        }
    }
    if let Some(text) = read_gzip_text(&ctx.path("/proc/config.gz")) {
        if let Some((governor, symbol)) = default_governor_from_config(&text) {
            return (Some(governor), Some(symbol), Some("/proc/config.gz".to_string()));
        }
    }
    (None, None, None)
}

/// Read a gzip-compressed text file. The kernel exposes its build config as
/// /proc/config.gz when CONFIG_IKCONFIG_PROC is set.
fn read_gzip_text(path: &Path) -> Option<String> {
    use std::io::Read;
    let file = std::fs::File::open(path).ok()?;
    let mut text = String::new();
    GzDecoder::new(file).read_to_string(&mut text).ok()?;
    Some(text)
}

fn cpus_allowed_list(ctx: &ProbeContext) -> Option<String> {
    let status = helpers::read_raw(&ctx.path("/proc/self/status"))?;
    status
        .lines()
        .find_map(|line| line.strip_prefix("Cpus_allowed_list:").map(|v| v.trim().to_string()))
}
