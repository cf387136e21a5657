//! Category probe abstraction for the snapshot collector.
//!
//! One probe owns one top-level snapshot category. Probes are infallible by
//! contract: unreadable files and missing tools degrade individual fields to
//! explicit nulls, and collection always proceeds.

use std::path::PathBuf;

use serde_json::Value;

use crate::tools::Toolbox;

/// Static metadata about a category probe.
#[derive(Debug, Clone)]
pub struct ProbeInfo {
    /// Top-level category key this probe fills, e.g. `"cpu_topology"`.
    pub name: &'static str,
    /// One-line description of what the probe captures.
    pub description: &'static str,
}

/// Shared read context for one collection run.
///
/// Carries the resolved tool availability and the filesystem root. Probes
/// address fixed absolute paths like `/proc/cmdline` through
/// [`ProbeContext::path`], so tests can point the whole collector at a
/// synthetic root directory.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    root: PathBuf,
    pub tools: Toolbox,
}

impl ProbeContext {
    /// Context rooted at `/`, for collecting from the live host.
    pub fn host(tools: Toolbox) -> Self {
        ProbeContext { root: PathBuf::from("/"), tools }
    }

    /// Context rooted at an arbitrary directory.
    pub fn rooted(root: impl Into<PathBuf>, tools: Toolbox) -> Self {
        ProbeContext { root: root.into(), tools }
    }

    /// Resolve an absolute-style path against the context root.
    pub fn path(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }
}

/// A raw text artifact captured alongside the structured fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCapture {
    /// File name under the snapshot's `raw/` directory.
    pub name: String,
    pub contents: String,
}

impl RawCapture {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        RawCapture { name: name.into(), contents: contents.into() }
    }
}

/// Structured category data plus raw captures produced by one probe.
#[derive(Debug, Clone)]
pub struct ProbeOutput {
    /// Category subtree; null leaves mark degraded fields.
    pub data: Value,
    pub raw: Vec<RawCapture>,
}

impl ProbeOutput {
    pub fn new(data: Value) -> Self {
        ProbeOutput { data, raw: Vec::new() }
    }
}

/// Implemented by every category probe. `collect` must not fail; panics are
/// contained by the collector and degrade the whole category to null.
pub trait CategoryProbe: Send + Sync {
    fn info(&self) -> &ProbeInfo;

    fn collect(&self, ctx: &ProbeContext) -> ProbeOutput;

    /// Category key, from [`ProbeInfo`].
    fn name(&self) -> &'static str {
        self.info().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_paths_resolve_under_the_root() {
        let ctx = ProbeContext::rooted("/tmp/fakeroot", Toolbox::empty());
        assert_eq!(ctx.path("/proc/cmdline"), PathBuf::from("/tmp/fakeroot/proc/cmdline"));
        assert_eq!(ctx.path("etc/os-release"), PathBuf::from("/tmp/fakeroot/etc/os-release"));
    }

    #[test]
    fn host_context_uses_the_real_root() {
        let ctx = ProbeContext::host(Toolbox::empty());
        assert_eq!(ctx.path("/proc/cmdline"), PathBuf::from("/proc/cmdline"));
    }
}
