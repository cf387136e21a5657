//! Severity classification of configuration drift.
//!
//! Every changed leaf address is ranked CRITICAL, WARNING, or INFO by an
//! ordered rule table. Rules are evaluated top to bottom and the first
//! matching rule decides. Order is semantic: several path predicates overlap
//! (the `network.interfaces.` catch-all must sit below the ethtool
//! sub-rules), so the table must stay a sequence, never a keyed lookup.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operational severity of a single configuration drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Sort rank; CRITICAL orders first.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }

    /// Uppercase label as it appears in reports.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

/// Cross-field context computed once per diff, before any rule runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleContext {
    /// True when either snapshot pins any IRQ via an `smp_affinity_list`
    /// entry. Escalates irqbalance state changes.
    pub irq_affinity_present: bool,
}

/// Offload feature names whose toggling is ranked critical. Matched as
/// substrings of the feature segment, so `tx-gso-partial` is covered by
/// `gso`.
const CRITICAL_OFFLOADS: &[&str] = &[
    "generic-receive-offload",
    "large-receive-offload",
    "tcp-segmentation-offload",
    "tso",
    "gso",
    "lro",
    "rx-checksumming",
    "tx-checksumming",
    "scatter-gather",
];

type RuleEval = fn(&str, Option<&Value>, Option<&Value>, &RuleContext) -> (Severity, Option<&'static str>);

enum Outcome {
    Fixed(Severity),
    Noted(Severity, &'static str),
    Eval(RuleEval),
}

struct Rule {
    matches: fn(&str) -> bool,
    outcome: Outcome,
}

static RULES: &[Rule] = &[
    Rule {
        matches: |p| p == "kernel.uname.release",
        outcome: Outcome::Fixed(Severity::Critical),
    },
    Rule {
        matches: |p| p == "kernel.cmdline",
        outcome: Outcome::Fixed(Severity::Critical),
    },
    Rule {
        matches: |p| p == "timekeeping.clocksource_current",
        outcome: Outcome::Fixed(Severity::Critical),
    },
    Rule {
        matches: |p| p == "cpu_topology.smt_active",
        outcome: Outcome::Fixed(Severity::Critical),
    },
    Rule {
        matches: |p| p.starts_with("cpu_topology.per_cpu_governors."),
        outcome: Outcome::Eval(governor_outcome),
    },
    Rule {
        matches: |p| p == "cpu_topology.lscpu_hash",
        outcome: Outcome::Noted(Severity::Critical, "CPU topology changed"),
    },
    Rule {
        matches: |p| p == "memory.transparent_hugepage.enabled",
        outcome: Outcome::Fixed(Severity::Critical),
    },
    Rule {
        matches: |p| p.starts_with("irq.smp_affinity_list."),
        outcome: Outcome::Fixed(Severity::Critical),
    },
    Rule {
        matches: is_offload_feature_path,
        outcome: Outcome::Eval(feature_outcome),
    },
    Rule {
        matches: |p| is_ethtool_section_path(p, ".ethtool.rings."),
        outcome: Outcome::Eval(rings_outcome),
    },
    Rule {
        matches: |p| is_ethtool_section_path(p, ".ethtool.channels."),
        outcome: Outcome::Eval(channels_outcome),
    },
    Rule {
        matches: |p| is_ethtool_section_path(p, ".ethtool.coalesce."),
        outcome: Outcome::Eval(coalesce_outcome),
    },
    Rule {
        matches: |p| p == "toolchain.libstdcxx_max_glibcxx",
        outcome: Outcome::Noted(Severity::Critical, "libstdc++ ABI level changed"),
    },
    Rule {
        matches: |p| p == "services_sysctl.irqbalance.state",
        outcome: Outcome::Eval(irqbalance_outcome),
    },
    Rule {
        matches: |p| p == "memory.overcommit_memory" || p == "memory.swappiness",
        outcome: Outcome::Fixed(Severity::Warning),
    },
    Rule {
        matches: |p| p.starts_with("memory.ksm."),
        outcome: Outcome::Fixed(Severity::Warning),
    },
    Rule {
        matches: |p| p.starts_with("network.interfaces.") && p.ends_with(".mtu"),
        outcome: Outcome::Fixed(Severity::Warning),
    },
    Rule {
        matches: |p| p.starts_with("toolchain."),
        outcome: Outcome::Fixed(Severity::Warning),
    },
    Rule {
        matches: |p| p.starts_with("network.routes."),
        outcome: Outcome::Fixed(Severity::Warning),
    },
    Rule {
        matches: |p| p.starts_with("services_sysctl.sysctl."),
        outcome: Outcome::Fixed(Severity::Warning),
    },
    Rule {
        matches: |p| p.starts_with("timekeeping.ptp_devices"),
        outcome: Outcome::Fixed(Severity::Info),
    },
    Rule {
        matches: |p| p.starts_with("network.interfaces."),
        outcome: Outcome::Fixed(Severity::Info),
    },
    Rule {
        matches: |p| p.starts_with("containers."),
        outcome: Outcome::Fixed(Severity::Info),
    },
];

/// Classify one changed leaf. Always yields a severity; leaves no rule
/// claims fall through to INFO.
pub fn classify(
    path: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    ctx: &RuleContext,
) -> (Severity, Option<&'static str>) {
    for rule in RULES {
        if (rule.matches)(path) {
            return match rule.outcome {
                Outcome::Fixed(severity) => (severity, None),
                Outcome::Noted(severity, note) => (severity, Some(note)),
                Outcome::Eval(eval) => eval(path, old, new, ctx),
            };
        }
    }
    (Severity::Info, None)
}

fn is_offload_feature_path(path: &str) -> bool {
    path.starts_with("network.interfaces.") && path.contains(".ethtool.features.")
}

fn is_ethtool_section_path(path: &str, section: &str) -> bool {
    path.starts_with("network.interfaces.") && path.contains(section)
}

fn governor_outcome(
    _path: &str,
    _old: Option<&Value>,
    new: Option<&Value>,
    _ctx: &RuleContext,
) -> (Severity, Option<&'static str>) {
    let newv = lowered_text(new);
    if !newv.is_empty() && newv != "performance" {
        (Severity::Critical, Some("governor != performance"))
    } else {
        (Severity::Warning, None)
    }
}

fn feature_outcome(
    path: &str,
    _old: Option<&Value>,
    _new: Option<&Value>,
    _ctx: &RuleContext,
) -> (Severity, Option<&'static str>) {
    let feature = path
        .split_once(".ethtool.features.")
        .map(|(_, rest)| rest)
        .unwrap_or("");
    if CRITICAL_OFFLOADS.iter().any(|name| feature.contains(name)) {
        (Severity::Critical, None)
    } else {
        (Severity::Warning, None)
    }
}

fn rings_outcome(
    _path: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    _ctx: &RuleContext,
) -> (Severity, Option<&'static str>) {
    match (parse_int(old), parse_int(new)) {
        (Some(o), Some(n)) if n < o => (Severity::Critical, Some("ring size reduced")),
        _ => (Severity::Info, None),
    }
}

fn channels_outcome(
    _path: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    _ctx: &RuleContext,
) -> (Severity, Option<&'static str>) {
    match (parse_int(old), parse_int(new)) {
        (Some(o), Some(n)) if n < o => (Severity::Critical, Some("channels reduced")),
        _ => (Severity::Info, None),
    }
}

fn coalesce_outcome(
    _path: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    _ctx: &RuleContext,
) -> (Severity, Option<&'static str>) {
    match (parse_int(old), parse_int(new)) {
        (Some(o), Some(n)) if (i128::from(n) - i128::from(o)).abs() >= 32 => {
            (Severity::Critical, Some("coalesce changed drastically"))
        }
        _ => (Severity::Warning, None),
    }
}

fn irqbalance_outcome(
    _path: &str,
    _old: Option<&Value>,
    _new: Option<&Value>,
    ctx: &RuleContext,
) -> (Severity, Option<&'static str>) {
    if ctx.irq_affinity_present {
        (Severity::Critical, Some("irqbalance change with IRQ pinning"))
    } else {
        (Severity::Warning, None)
    }
}

fn lowered_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.to_ascii_lowercase(),
        Some(other) => other.to_string().to_ascii_lowercase(),
    }
}

/// Lenient integer parsing for numeric rule values: native JSON numbers,
/// decimal strings, and 0x-prefixed hexadecimal strings.
pub fn parse_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_int_str(s.trim()),
        _ => None,
    }
}

fn parse_int_str(text: &str) -> Option<i64> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}
