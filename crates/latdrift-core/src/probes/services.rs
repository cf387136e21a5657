//! Service state and latency-relevant sysctls.

use serde_json::{Map, Value};

use crate::probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput};
use crate::probes::helpers::{self, string_or_null};

static SERVICES_INFO: ProbeInfo = ProbeInfo {
    name: "services_sysctl",
    description: "irqbalance/tuned state, scheduler and network sysctls, ASLR and LSM status",
};

/// Sysctl files read individually, beyond the globbed groups.
const EXTRA_SYSCTLS: &[&str] =
    &["kernel/timer_migration", "kernel/numa_balancing", "kernel/randomize_va_space"];

pub struct ServicesProbe;

impl CategoryProbe for ServicesProbe {
    fn info(&self) -> &ProbeInfo {
        &SERVICES_INFO
    }

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput {
        let mut map = Map::new();

        let mut irqbalance = Map::new();
        irqbalance.insert(
            "state".to_string(),
            string_or_null(
                ctx.tools
                    .run("systemctl", &["is-active", "irqbalance"])
                    .map(|text| text.trim().to_string()),
            ),
        );
        map.insert("irqbalance".to_string(), Value::Object(irqbalance));

        map.insert(
            "tuned_adm".to_string(),
            string_or_null(
                ctx.tools.run_lenient("tuned-adm", &["active"]).map(|text| text.trim().to_string()),
            ),
        );

        let sysctls = read_sysctls(ctx);
        map.insert(
            "aslr".to_string(),
            sysctls.get("kernel.randomize_va_space").cloned().unwrap_or(Value::Null),
        );
        map.insert("sysctl".to_string(), Value::Object(sysctls));

        map.insert(
            "selinux".to_string(),
            optional_file(ctx, "/sys/fs/selinux/enforce"),
        );
        map.insert(
            "apparmor".to_string(),
            optional_file(ctx, "/sys/module/apparmor/parameters/enabled"),
        );

        ProbeOutput::new(Value::Object(map))
    }
}

/// Scheduler knobs, all of net.core, TCP tuning, and a few individual keys,
/// under dotted sysctl names.
fn read_sysctls(ctx: &ProbeContext) -> Map<String, Value> {
    let mut map = Map::new();
    read_sysctl_dir(ctx, "kernel", "sched_", &mut map);
    read_sysctl_dir(ctx, "net/core", "", &mut map);
    read_sysctl_dir(ctx, "net/ipv4", "tcp_", &mut map);
    for rel in EXTRA_SYSCTLS {
        let path = ctx.path(&format!("/proc/sys/{rel}"));
        if let Some(value) = helpers::read_trimmed(&path) {
            map.insert(rel.replace('/', "."), Value::String(value));
        }
    }
    map
}

fn read_sysctl_dir(ctx: &ProbeContext, subdir: &str, prefix: &str, out: &mut Map<String, Value>) {
    let dir = ctx.path(&format!("/proc/sys/{subdir}"));
    for name in helpers::dir_names(&dir) {
        if !name.starts_with(prefix) {
            continue;
        }
        let path = dir.join(&name);
        if !path.is_file() {
            continue;
        }
        // Some sysctls refuse reads (EACCES, EIO); those are skipped, not
        // nulled, to keep the map to what the host actually exposes.
        if let Some(value) = helpers::read_trimmed(&path) {
            out.insert(format!("{}.{name}", subdir.replace('/', ".")), Value::String(value));
        }
    }
}

fn optional_file(ctx: &ProbeContext, path: &str) -> Value {
    let path = ctx.path(path);
    if path.exists() {
        string_or_null(helpers::read_first_line(&path))
    } else {
        Value::Null
    }
}
