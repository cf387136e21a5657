//! Build toolchain versions and the libstdc++ ABI ceiling.
//!
//! The GLIBCXX scan reads libstdc++ shared objects as bytes and extracts
//! every version tag; the maximum is the ABI level a binary built on this
//! host may require at runtime.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde_json::{Map, Value};

use crate::probe::{CategoryProbe, ProbeContext, ProbeInfo, ProbeOutput, RawCapture};
use crate::probes::helpers::string_or_null;

/// Scanning more than a handful of libstdc++ copies never changes the
/// answer.
const MAX_CANDIDATES: usize = 10;

const MAX_WALK_DEPTH: usize = 3;

static TOOLCHAIN_INFO: ProbeInfo = ProbeInfo {
    name: "toolchain",
    description: "compiler/linker/build-tool versions and libstdc++ GLIBCXX symbol ceiling",
};

const VERSION_TOOLS: &[(&str, &str)] = &[
    ("ldd", "ldd_version"),
    ("gcc", "gcc_version"),
    ("g++", "gxx_version"),
    ("clang", "clang_version"),
    ("ld", "ld_version"),
    ("cmake", "cmake_version"),
    ("ninja", "ninja_version"),
    ("bazel", "bazel_version"),
];

pub struct ToolchainProbe;

impl CategoryProbe for ToolchainProbe {
    fn info(&self) -> &ProbeInfo {
        &TOOLCHAIN_INFO
    }

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput {
        let mut raw = Vec::new();
        let mut map = Map::new();

        for (tool, field) in VERSION_TOOLS {
            let output = ctx.tools.run(tool, &["--version"]);
            if let Some(text) = &output {
                raw.push(RawCapture::new(format!("{}.txt", field.replace('_', "-")), text.clone()));
            }
            map.insert(field.to_string(), string_or_null(output));
        }

        let (versions, max) = libstdcxx_scan(ctx);
        map.insert(
            "libstdcxx_glibcxx_versions".to_string(),
            Value::Array(versions.into_iter().map(Value::String).collect()),
        );
        map.insert("libstdcxx_max_glibcxx".to_string(), string_or_null(max));

        ProbeOutput { data: Value::Object(map), raw }
    }
}

static GLIBCXX: LazyLock<regex::bytes::Regex> = LazyLock::new(|| {
    regex::bytes::Regex::new(r"GLIBCXX_([0-9]+\.[0-9]+(?:\.[0-9]+)?)").expect("pattern compiles")
});

/// All distinct GLIBCXX_x.y[.z] tags in a binary blob.
pub(crate) fn glibcxx_tags(data: &[u8]) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for m in GLIBCXX.find_iter(data) {
        if let Ok(tag) = std::str::from_utf8(m.as_bytes()) {
            tags.insert(tag.to_string());
        }
    }
    tags
}

/// Numeric sort key for a `GLIBCXX_x.y[.z]` tag.
pub(crate) fn glibcxx_key(tag: &str) -> (u64, u64, u64) {
    let mut parts = tag
        .strip_prefix("GLIBCXX_")
        .unwrap_or(tag)
        .split('.')
        .map(|part| part.parse::<u64>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

fn libstdcxx_scan(ctx: &ProbeContext) -> (Vec<String>, Option<String>) {
    let mut tags = BTreeSet::new();
    for path in libstdcxx_candidates(ctx) {
        if let Ok(data) = std::fs::read(&path) {
            tags.extend(glibcxx_tags(&data));
        }
    }
    let mut versions: Vec<String> = tags.into_iter().collect();
    versions.sort_by_key(|tag| glibcxx_key(tag));
    let max = versions.last().cloned();
    (versions, max)
}

fn libstdcxx_candidates(ctx: &ProbeContext) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for root in ["/usr/lib", "/usr/lib64", "/usr/lib32", "/lib", "/lib64", "/lib32"] {
        walk_libdir(&ctx.path(root), 0, &mut found);
    }
    found
}

fn walk_libdir(dir: &Path, depth: usize, found: &mut Vec<PathBuf>) {
    if depth > MAX_WALK_DEPTH || found.len() >= MAX_CANDIDATES {
        return;
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    for path in paths {
        if found.len() >= MAX_CANDIDATES {
            return;
        }
        if path.is_dir() {
            walk_libdir(&path, depth + 1, found);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with("libstdc++.so.6")
                && std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false)
            {
                found.push(path);
            }
        }
    }
}
