//! Kernel identity, boot parameters, and mitigation state.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput, RawCapture};
use crate::probes::helpers::{self, string_or_null};

/// Bytes of the kernel build config kept inline in the snapshot.
const BOOT_CONFIG_HEAD_BYTES: usize = 5 * 1024;

/// Cap on captured clock-related dmesg lines.
const DMESG_SNIPPET_LIMIT: usize = 500;

static KERNEL_INFO: ProbeInfo = ProbeInfo {
    name: "kernel",
    description: "uname, os-release, boot cmdline, CPU mitigations, clock-related dmesg lines",
};

pub struct KernelProbe;

impl CategoryProbe for KernelProbe {
    fn info(&self) -> &ProbeInfo {
        &KERNEL_INFO
    }

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput {
        let mut raw = Vec::new();
        let mut map = Map::new();

        let uname = helpers::uname_info();
        map.insert("uname".to_string(), uname_value(uname.as_ref()));

        let os_release = helpers::read_raw(&ctx.path("/etc/os-release"));
        if let Some(text) = &os_release {
            raw.push(RawCapture::new("os-release.txt", text.clone()));
        }
        map.insert(
            "os_release".to_string(),
            match &os_release {
                Some(text) => Value::Object(parse_os_release(text)),
                None => Value::Null,
            },
        );

        let cmdline = helpers::read_raw(&ctx.path("/proc/cmdline"));
        if let Some(text) = &cmdline {
            raw.push(RawCapture::new("proc-cmdline.txt", text.clone()));
        }
        let cmdline = cmdline.map(|text| text.trim().to_string());
        map.insert(
            "cmdline_params".to_string(),
            Value::Object(parse_cmdline_params(cmdline.as_deref().unwrap_or(""))),
        );
        map.insert("cmdline".to_string(), string_or_null(cmdline));

        map.insert("vulnerabilities".to_string(), Value::Object(read_vulnerabilities(ctx)));

        let release = uname.map(|u| u.release).unwrap_or_default();
        let boot_config = boot_config_head(ctx, &release);
        if let Some(text) = &boot_config {
            raw.push(RawCapture::new("boot-config-head.txt", text.clone()));
        }
        map.insert("boot_config_head".to_string(), string_or_null(boot_config));

        let dmesg = dmesg_text(ctx);
        if let Some(text) = &dmesg {
            raw.push(RawCapture::new("dmesg.txt", text.clone()));
        }
        map.insert(
            "dmesg_snippets".to_string(),
            match &dmesg {
                Some(text) => {
                    Value::Array(clock_snippets(text).into_iter().map(Value::String).collect())
                }
                None => Value::Null,
            },
        );

        ProbeOutput { data: Value::Object(map), raw }
    }
}

fn uname_value(uname: Option<&helpers::UnameInfo>) -> Value {
    match uname {
        Some(u) => json!({
            "system": u.system,
            "node": u.node,
            "release": u.release,
            "version": u.version,
            "machine": u.machine,
        }),
        None => Value::Null,
    }
}

/// Parse /etc/os-release `KEY=VALUE` lines, stripping surrounding quotes.
fn parse_os_release(text: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(
                key.trim().to_string(),
                Value::String(value.trim().trim_matches('"').to_string()),
            );
        }
    }
    map
}

/// Split the kernel command line into parameters. `key=value` tokens keep
/// their value; bare flags map to an empty string.
pub(crate) fn parse_cmdline_params(cmdline: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for token in cmdline.split_whitespace() {
        match token.split_once('=') {
            Some((key, value)) => {
                map.insert(key.to_string(), Value::String(value.to_string()));
            }
            None => {
                map.insert(token.to_string(), Value::String(String::new()));
            }
        }
    }
    map
}

fn read_vulnerabilities(ctx: &ProbeContext) -> Map<String, Value> {
    let dir = ctx.path("/sys/devices/system/cpu/vulnerabilities");
    let mut map = Map::new();
    for name in helpers::dir_names(&dir) {
        let text = helpers::read_trimmed(&dir.join(&name)).unwrap_or_default();
        map.insert(name, Value::String(text));
    }
    map
}

fn boot_config_head(ctx: &ProbeContext, release: &str) -> Option<String> {
    if release.is_empty() {
        return None;
    }
    helpers::read_head(&ctx.path(&format!("/boot/config-{release}")), BOOT_CONFIG_HEAD_BYTES)
}

fn dmesg_text(ctx: &ProbeContext) -> Option<String> {
    // Some dmesg builds lack --color; retry bare.
    ctx.tools
        .run("dmesg", &["--color=never"])
        .filter(|text| !text.is_empty())
        .or_else(|| ctx.tools.run("dmesg", &[]))
}

static CLOCK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(tsc|clocksource|timekeeping)\b").expect("pattern compiles"));

/// Lines of dmesg output that mention clock hardware, capped.
pub(crate) fn clock_snippets(dmesg: &str) -> Vec<String> {
    dmesg
        .lines()
        .filter(|line| CLOCK_LINE.is_match(line))
        .take(DMESG_SNIPPET_LIMIT)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Toolbox;
    use std::fs;

    #[test]
    fn cmdline_params_split_values_and_flags() {
        let params = parse_cmdline_params("isolcpus=1-3 nohz_full=2-7 rcu_nocbs=2-7 fooflag");
        assert_eq!(params.get("isolcpus"), Some(&Value::String("1-3".to_string())));
        assert_eq!(params.get("nohz_full"), Some(&Value::String("2-7".to_string())));
        assert_eq!(params.get("rcu_nocbs"), Some(&Value::String("2-7".to_string())));
        assert_eq!(params.get("fooflag"), Some(&Value::String(String::new())));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn cmdline_params_keep_equals_inside_values() {
        let params = parse_cmdline_params("console=ttyS0,115200 root=UUID=abc-123");
        assert_eq!(params.get("root"), Some(&Value::String("UUID=abc-123".to_string())));
    }

    #[test]
    fn os_release_strips_quotes_and_comments() {
        let map = parse_os_release("# comment\nNAME=\"Debian GNU/Linux\"\nVERSION_ID=\"12\"\nID=debian\n\n");
        assert_eq!(map.get("NAME"), Some(&Value::String("Debian GNU/Linux".to_string())));
        assert_eq!(map.get("ID"), Some(&Value::String("debian".to_string())));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn clock_snippets_match_whole_words_case_insensitively() {
        let dmesg = "\
[    0.000000] tsc: Detected 3600.000 MHz processor
[    0.100000] Memory: 16G available
[    1.200000] clocksource: Switched to clocksource tsc
[    2.000000] e1000e: eth0 NIC Link is Up
[    3.000000] TSC found unstable
[    4.000000] footscbar should not match";
        let snippets = clock_snippets(dmesg);
        assert_eq!(snippets.len(), 3);
        assert!(snippets[0].contains("Detected 3600.000 MHz"));
        assert!(snippets[2].contains("TSC found unstable"));
    }

    #[test]
    fn clock_snippets_are_capped() {
        let dmesg = "tsc line\n".repeat(DMESG_SNIPPET_LIMIT + 100);
        assert_eq!(clock_snippets(&dmesg).len(), DMESG_SNIPPET_LIMIT);
    }

    #[test]
    fn collect_from_synthetic_root_degrades_missing_fields_to_null() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("proc")).unwrap();
        fs::write(dir.path().join("proc/cmdline"), "quiet isolcpus=2-5\n").unwrap();
        let vuln_dir = dir.path().join("sys/devices/system/cpu/vulnerabilities");
        fs::create_dir_all(&vuln_dir).unwrap();
        fs::write(vuln_dir.join("meltdown"), "Mitigation: PTI\n").unwrap();
        fs::write(vuln_dir.join("spectre_v2"), "Vulnerable\n").unwrap();

        let ctx = ProbeContext::rooted(dir.path(), Toolbox::empty());
        let output = KernelProbe.collect(&ctx);
        let data = &output.data;

        assert_eq!(data["cmdline"], json!("quiet isolcpus=2-5"));
        assert_eq!(data["cmdline_params"]["isolcpus"], json!("2-5"));
        assert_eq!(data["cmdline_params"]["quiet"], json!(""));
        assert_eq!(data["vulnerabilities"]["meltdown"], json!("Mitigation: PTI"));
        assert_eq!(data["vulnerabilities"]["spectre_v2"], json!("Vulnerable"));
        // No /etc/os-release and no dmesg tool in this root.
        assert_eq!(data["os_release"], Value::Null);
        assert_eq!(data["dmesg_snippets"], Value::Null);
        // uname(2) always answers on the live kernel.
        assert!(data["uname"]["release"].is_string());

        let names: Vec<&str> = output.raw.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["proc-cmdline.txt"]);
    }
}
