//! Network interfaces, NIC tuning state, routes, and PCI inventory.
//!
//! Per-interface ethtool output is both parsed into structured maps (so the
//! diff engine can rank offload and queue changes) and captured verbatim
//! under `raw/`.

use serde_json::{Map, Value};

use crate::probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput, RawCapture};
use crate::probes::helpers::{self, string_or_null};

static NETWORK_INFO: ProbeInfo = ProbeInfo {
    name: "network",
    description: "interfaces, ethtool offloads/rings/channels/coalesce, routes, PCI listing",
};

pub struct NetworkProbe;

impl CategoryProbe for NetworkProbe {
    fn info(&self) -> &ProbeInfo {
        &NETWORK_INFO
    }

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput {
        let mut raw = Vec::new();
        let mut map = Map::new();

        let mut interfaces = Map::new();
        for name in helpers::dir_names(&ctx.path("/sys/class/net")) {
            interfaces.insert(name.clone(), interface_entry(ctx, &name, &mut raw));
        }
        map.insert("interfaces".to_string(), Value::Object(interfaces));

        let routes_v4 = ctx.tools.run("ip", &["route", "show"]);
        if let Some(text) = &routes_v4 {
            raw.push(RawCapture::new("ip-route-show.txt", text.clone()));
        }
        let routes_v6 = ctx.tools.run("ip", &["-6", "route", "show"]);
        if let Some(text) = &routes_v6 {
            raw.push(RawCapture::new("ip6-route-show.txt", text.clone()));
        }
        let mut routes = Map::new();
        routes.insert("v4".to_string(), string_or_null(routes_v4));
        routes.insert("v6".to_string(), string_or_null(routes_v6));
        map.insert("routes".to_string(), Value::Object(routes));

        let lspci = ctx.tools.run("lspci", &["-nn"]);
        if let Some(text) = &lspci {
            raw.push(RawCapture::new("lspci-nn.txt", text.clone()));
        }
        map.insert("lspci_nn".to_string(), string_or_null(lspci));

        ProbeOutput { data: Value::Object(map), raw }
    }
}

fn interface_entry(ctx: &ProbeContext, name: &str, raw: &mut Vec<RawCapture>) -> Value {
    let base = ctx.path(&format!("/sys/class/net/{name}"));
    let mut map = Map::new();
    map.insert("mac".to_string(), string_or_null(helpers::read_first_line(&base.join("address"))));
    map.insert("mtu".to_string(), string_or_null(helpers::read_first_line(&base.join("mtu"))));
    // Reading speed on a downed link fails with EINVAL; that degrades to
    // null like any other unreadable field.
    map.insert("speed".to_string(), string_or_null(helpers::read_first_line(&base.join("speed"))));
    map.insert(
        "sys_queues".to_string(),
        Value::Array(
            helpers::dir_names(&base.join("queues")).into_iter().map(Value::String).collect(),
        ),
    );
    map.insert("ethtool".to_string(), Value::Object(ethtool_sections(ctx, name, raw)));
    Value::Object(map)
}

fn ethtool_sections(ctx: &ProbeContext, name: &str, raw: &mut Vec<RawCapture>) -> Map<String, Value> {
    let mut map = Map::new();
    if !ctx.tools.has("ethtool") {
        return map;
    }

    let driver = ethtool_capture(ctx, name, "-i", raw);
    map.insert(
        "driver".to_string(),
        Value::Object(helpers::parse_key_values(driver.as_deref().unwrap_or(""))),
    );

    let features = ethtool_capture(ctx, name, "-k", raw);
    map.insert(
        "features".to_string(),
        Value::Object(parse_onoff_map(features.as_deref().unwrap_or(""))),
    );

    let rings = ethtool_capture(ctx, name, "-g", raw);
    map.insert(
        "rings".to_string(),
        Value::Object(parse_numeric_map(rings.as_deref().unwrap_or(""))),
    );

    let channels = ethtool_capture(ctx, name, "-l", raw);
    map.insert(
        "channels".to_string(),
        Value::Object(parse_numeric_map(channels.as_deref().unwrap_or(""))),
    );

    let coalesce = ethtool_capture(ctx, name, "-c", raw);
    map.insert(
        "coalesce".to_string(),
        Value::Object(parse_numeric_map(coalesce.as_deref().unwrap_or(""))),
    );

    let pause = ethtool_capture(ctx, name, "-a", raw);
    map.insert(
        "pause".to_string(),
        Value::Object(parse_onoff_map(pause.as_deref().unwrap_or(""))),
    );

    let stats = ethtool_capture(ctx, name, "-S", raw);
    map.insert("stats_raw".to_string(), string_or_null(stats));

    map
}

/// Run one ethtool section for an interface and capture the raw output.
fn ethtool_capture(
    ctx: &ProbeContext,
    name: &str,
    flag: &str,
    raw: &mut Vec<RawCapture>,
) -> Option<String> {
    let text = ctx.tools.run("ethtool", &[flag, name]);
    if let Some(t) = &text {
        let tag = flag.trim_start_matches('-');
        raw.push(RawCapture::new(format!("ethtool-{tag}-{name}.txt"), t.clone()));
    }
    text
}

/// Parse `name: on|off` feature lines. Spaces in keys become underscores;
/// values other than on/off stay as strings.
pub(crate) fn parse_onoff_map(text: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().replace(' ', "_");
            let value = value.trim();
            if value.starts_with("on") {
                map.insert(key, Value::Bool(true));
            } else if value.starts_with("off") {
                map.insert(key, Value::Bool(false));
            } else {
                map.insert(key, Value::String(value.to_string()));
            }
        }
    }
    map
}

/// Parse `name: value` setting lines. Decimal and 0x-prefixed values become
/// numbers; everything else (including `n/a`) stays a string. Repeated keys
/// keep the last occurrence, so the current-settings block of `ethtool -g`
/// wins over the pre-set maximums.
pub(crate) fn parse_numeric_map(text: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().replace(' ', "_");
            map.insert(key, numeric_value(value.trim()));
        }
    }
    map
}

fn numeric_value(text: &str) -> Value {
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        if let Ok(n) = i64::from_str_radix(hex, 16) {
            return Value::Number(n.into());
        }
    } else if let Ok(n) = text.parse::<i64>() {
        return Value::Number(n.into());
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Toolbox;
    use serde_json::json;
    use std::fs;

    #[test]
    fn onoff_map_translates_states_and_keeps_oddities() {
        let map = parse_onoff_map(
            "Features for eth0:\nrx-checksumming: on\ntx-checksumming: off [fixed]\nhighdma: maybe\n",
        );
        assert_eq!(map.get("rx-checksumming"), Some(&json!(true)));
        assert_eq!(map.get("tx-checksumming"), Some(&json!(false)));
        assert_eq!(map.get("highdma"), Some(&json!("maybe")));
        // The banner line parses too; its value is an empty string.
        assert_eq!(map.get("Features_for_eth0"), Some(&json!("")));
    }

    #[test]
    fn numeric_map_parses_decimal_and_hex() {
        let map = parse_numeric_map("rx: 512\ntx: 0x100\nname: eth0\nRX Mini: n/a\n");
        assert_eq!(map.get("rx"), Some(&json!(512)));
        assert_eq!(map.get("tx"), Some(&json!(256)));
        assert_eq!(map.get("name"), Some(&json!("eth0")));
        assert_eq!(map.get("RX_Mini"), Some(&json!("n/a")));
    }

    #[test]
    fn numeric_map_last_occurrence_wins() {
        let text = "\
Ring parameters for eth0:
Pre-set maximums:
RX:             4096
TX:             4096
Current hardware settings:
RX:             512
TX:             1024
";
        let map = parse_numeric_map(text);
        assert_eq!(map.get("RX"), Some(&json!(512)));
        assert_eq!(map.get("TX"), Some(&json!(1024)));
    }

    #[test]
    fn interfaces_read_from_synthetic_sysfs() {
        let dir = tempfile::tempdir().unwrap();
        let eth0 = dir.path().join("sys/class/net/eth0");
        fs::create_dir_all(eth0.join("queues/rx-0")).unwrap();
        fs::create_dir_all(eth0.join("queues/tx-0")).unwrap();
        fs::write(eth0.join("address"), "aa:bb:cc:dd:ee:ff\n").unwrap();
        fs::write(eth0.join("mtu"), "1500\n").unwrap();
        fs::create_dir_all(dir.path().join("sys/class/net/lo")).unwrap();

        let ctx = ProbeContext::rooted(dir.path(), Toolbox::empty());
        let data = NetworkProbe.collect(&ctx).data;
        let eth0 = &data["interfaces"]["eth0"];
        assert_eq!(eth0["mac"], json!("aa:bb:cc:dd:ee:ff"));
        assert_eq!(eth0["mtu"], json!("1500"));
        assert_eq!(eth0["speed"], Value::Null);
        assert_eq!(eth0["sys_queues"], json!(["rx-0", "tx-0"]));
        // No ethtool in the toolbox: the subtree stays empty.
        assert_eq!(eth0["ethtool"], json!({}));
        assert!(data["interfaces"]["lo"].is_object());
        assert_eq!(data["routes"]["v4"], Value::Null);
        assert_eq!(data["lspci_nn"], Value::Null);
    }

    #[test]
    fn no_net_class_means_no_interfaces() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ProbeContext::rooted(dir.path(), Toolbox::empty());
        let data = NetworkProbe.collect(&ctx).data;
        assert_eq!(data["interfaces"], json!({}));
    }
}
