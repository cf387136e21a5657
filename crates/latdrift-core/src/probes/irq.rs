//! Interrupt totals and per-IRQ CPU affinity.

use serde_json::{json, Map, Value};

use crate::probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput, RawCapture};
use crate::probes::helpers::{self, string_or_null};

static IRQ_INFO: ProbeInfo = ProbeInfo {
    name: "irq",
    description: "per-IRQ totals from /proc/interrupts and smp_affinity_list pinning",
};

pub struct IrqProbe;

impl CategoryProbe for IrqProbe {
    fn info(&self) -> &ProbeInfo {
        &IRQ_INFO
    }

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput {
        let mut raw = Vec::new();
        let mut map = Map::new();

        let text = helpers::read_raw(&ctx.path("/proc/interrupts"));
        if let Some(t) = &text {
            raw.push(RawCapture::new("proc-interrupts.txt", t.clone()));
        }
        let interrupts = parse_interrupts(text.as_deref().unwrap_or(""));

        let mut affinity = Map::new();
        for irq in interrupts.keys() {
            let path = ctx.path(&format!("/proc/irq/{irq}/smp_affinity_list"));
            if path.exists() {
                affinity.insert(irq.clone(), string_or_null(helpers::read_first_line(&path)));
            }
        }

        map.insert("interrupts".to_string(), Value::Object(interrupts));
        map.insert("smp_affinity_list".to_string(), Value::Object(affinity));

        ProbeOutput { data: Value::Object(map), raw }
    }
}

/// Parse /proc/interrupts. Only numeric IRQ rows are kept; per-row output is
/// `{total, desc}` where `total` sums the leading per-CPU counters and
/// `desc` joins whatever follows the counter columns.
pub(crate) fn parse_interrupts(text: &str) -> Map<String, Value> {
    let mut map = Map::new();
    let mut cpus = 0usize;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if line.starts_with(' ') && trimmed.starts_with("CPU0") {
            cpus = line.split_whitespace().count();
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let first = match parts.next() {
            Some(token) => token,
            None => continue,
        };
        let irq = match first.strip_suffix(':') {
            Some(id) => id,
            None => continue,
        };
        if irq.is_empty() || !irq.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let tokens: Vec<&str> = parts.collect();
        let mut total: i64 = 0;
        let mut counted = 0usize;
        for token in tokens.iter().take(cpus) {
            match token.parse::<i64>() {
                Ok(n) => {
                    total += n;
                    counted += 1;
                }
                Err(_) => break,
            }
        }
        let desc = tokens.get(cpus..).unwrap_or(&[]).join(" ");
        let total_value = if counted > 0 { json!(total) } else { Value::Null };
        map.insert(irq.to_string(), json!({"total": total_value, "desc": desc}));
    }
    map
}
