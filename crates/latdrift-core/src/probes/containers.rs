//! Container runtimes, cgroup layout, and WSL detection.

use serde_json::{Map, Value};

use crate::probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput, RawCapture};
use crate::probes::helpers::{self, string_or_null};

static CONTAINERS_INFO: ProbeInfo = ProbeInfo {
    name: "containers",
    description: "docker/podman state, cgroup hierarchy mode, WSL detection",
};

pub struct ContainersProbe;

impl CategoryProbe for ContainersProbe {
    fn info(&self) -> &ProbeInfo {
        &CONTAINERS_INFO
    }

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput {
        let mut raw = Vec::new();
        let mut map = Map::new();

        // `docker info` without a reachable daemon exits nonzero but still
        // prints the client half, which is worth keeping.
        let docker = ctx.tools.run_lenient("docker", &["info"]);
        if let Some(text) = &docker {
            raw.push(RawCapture::new("docker-info.txt", text.clone()));
        }
        map.insert("docker_info".to_string(), string_or_null(docker));

        let podman = ctx.tools.run_lenient("podman", &["info"]);
        if let Some(text) = &podman {
            raw.push(RawCapture::new("podman-info.txt", text.clone()));
        }
        map.insert("podman_info".to_string(), string_or_null(podman));

        map.insert(
            "docker_systemd_state".to_string(),
            string_or_null(
                ctx.tools
                    .run("systemctl", &["is-active", "docker"])
                    .map(|text| text.trim().to_string()),
            ),
        );

        let mut cgroup = Map::new();
        cgroup.insert("mode".to_string(), Value::String(cgroup_mode(ctx).to_string()));
        cgroup.insert(
            "self_cgroup".to_string(),
            string_or_null(helpers::read_raw(&ctx.path("/proc/self/cgroup"))),
        );
        map.insert("cgroup".to_string(), Value::Object(cgroup));

        map.insert("wsl".to_string(), Value::Bool(is_wsl(ctx)));

        ProbeOutput { data: Value::Object(map), raw }
    }
}

/// v2 when the unified hierarchy control file exists, v1 when /sys/fs/cgroup
/// exists without it, unknown otherwise.
fn cgroup_mode(ctx: &ProbeContext) -> &'static str {
    if ctx.path("/sys/fs/cgroup/cgroup.controllers").exists() {
        "v2"
    } else if ctx.path("/sys/fs/cgroup").is_dir() {
        "v1"
    } else {
        "unknown"
    }
}

fn is_wsl(ctx: &ProbeContext) -> bool {
    let osrelease = helpers::read_raw(&ctx.path("/proc/sys/kernel/osrelease")).unwrap_or_default();
    let lower = osrelease.to_ascii_lowercase();
    lower.contains("microsoft") || lower.contains("wsl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Toolbox;
    use serde_json::json;
    use std::fs;

    #[test]
    fn cgroup_mode_detects_v2_v1_and_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ProbeContext::rooted(dir.path(), Toolbox::empty());
        assert_eq!(cgroup_mode(&ctx), "unknown");

        fs::create_dir_all(dir.path().join("sys/fs/cgroup")).unwrap();
        assert_eq!(cgroup_mode(&ctx), "v1");

        fs::write(dir.path().join("sys/fs/cgroup/cgroup.controllers"), "cpu io memory\n").unwrap();
        assert_eq!(cgroup_mode(&ctx), "v2");
    }

    #[test]
    fn wsl_detection_matches_kernel_osrelease() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ProbeContext::rooted(dir.path(), Toolbox::empty());
        assert!(!is_wsl(&ctx));

        fs::create_dir_all(dir.path().join("proc/sys/kernel")).unwrap();
        fs::write(
            dir.path().join("proc/sys/kernel/osrelease"),
            "5.15.167.4-microsoft-standard-WSL2\n",
        )
        .unwrap();
        assert!(is_wsl(&ctx));
    }

    #[test]
    fn collect_without_tools_reports_nulls_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("proc/self")).unwrap();
        fs::write(dir.path().join("proc/self/cgroup"), "0::/user.slice\n").unwrap();

        let ctx = ProbeContext::rooted(dir.path(), Toolbox::empty());
        let data = ContainersProbe.collect(&ctx).data;
        assert_eq!(data["docker_info"], Value::Null);
        assert_eq!(data["podman_info"], Value::Null);
        assert_eq!(data["docker_systemd_state"], Value::Null);
        assert_eq!(data["cgroup"]["mode"], json!("unknown"));
        assert_eq!(data["cgroup"]["self_cgroup"], json!("0::/user.slice\n"));
        assert_eq!(data["wsl"], json!(false));
    }
}
