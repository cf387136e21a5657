//! Clocksource, time synchronization daemons, and PTP hardware.

use serde_json::{Map, Value};

use crate::probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput, RawCapture};
use crate::probes::helpers::{self, string_or_null};

static TIMEKEEPING_INFO: ProbeInfo = ProbeInfo {
    name: "timekeeping",
    description: "active/available clocksources, timedatectl and chrony state, PTP devices",
};

pub struct TimekeepingProbe;

impl CategoryProbe for TimekeepingProbe {
    fn info(&self) -> &ProbeInfo {
        &TIMEKEEPING_INFO
    }

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput {
        let mut raw = Vec::new();
        let mut map = Map::new();

        let clocksource_dir = "/sys/devices/system/clocksource/clocksource0";
        map.insert(
            "clocksource_current".to_string(),
            string_or_null(helpers::read_first_line(
                &ctx.path(&format!("{clocksource_dir}/current_clocksource")),
            )),
        );
        map.insert(
            "clocksource_available".to_string(),
            string_or_null(helpers::read_first_line(
                &ctx.path(&format!("{clocksource_dir}/available_clocksource")),
            )),
        );

        let timedatectl = ctx.tools.run("timedatectl", &[]);
        if let Some(text) = &timedatectl {
            raw.push(RawCapture::new("timedatectl.txt", text.clone()));
        }
        map.insert("timedatectl".to_string(), string_or_null(timedatectl));

        let sources = ctx.tools.run("chronyc", &["sources"]);
        if let Some(text) = &sources {
            raw.push(RawCapture::new("chronyc-sources.txt", text.clone()));
        }
        map.insert("chronyc_sources".to_string(), string_or_null(sources));

        let tracking = ctx.tools.run("chronyc", &["tracking"]);
        if let Some(text) = &tracking {
            raw.push(RawCapture::new("chronyc-tracking.txt", text.clone()));
        }
        map.insert("chronyc_tracking".to_string(), string_or_null(tracking));

        map.insert(
            "ptp_devices".to_string(),
            Value::Array(ptp_devices(ctx).into_iter().map(Value::String).collect()),
        );

        ProbeOutput { data: Value::Object(map), raw }
    }
}

/// Sorted /dev/ptp* device paths.
fn ptp_devices(ctx: &ProbeContext) -> Vec<String> {
    helpers::dir_names(&ctx.path("/dev"))
        .into_iter()
        .filter(|name| name.starts_with("ptp"))
        .map(|name| format!("/dev/{name}"))
        .collect()
}
