//! Category probe registry.
//!
//! One probe per fixed snapshot category, registered in the order the
//! categories appear in the snapshot document.

pub mod helpers;

mod containers;
mod cpu;
mod irq;
mod kernel;
mod memory;
mod network;
mod services;
mod timekeeping;
mod toolchain;

pub use containers::ContainersProbe;
pub use cpu::CpuTopologyProbe;
pub use irq::IrqProbe;
pub use kernel::KernelProbe;
pub use memory::MemoryProbe;
pub use network::NetworkProbe;
pub use services::ServicesProbe;
pub use timekeeping::TimekeepingProbe;
pub use toolchain::ToolchainProbe;

use crate::probe::CategoryProbe;

/// External commands the probes may invoke. Availability is resolved once
/// per run via [`crate::tools::Toolbox::detect`].
pub const EXTERNAL_TOOLS: &[&str] = &[
    "bazel",
    "chronyc",
    "clang",
    "cmake",
    "cpupower",
    "dmesg",
    "docker",
    "ethtool",
    "g++",
    "gcc",
    "ip",
    "ld",
    "ldd",
    "lscpu",
    "lspci",
    "ninja",
    "numactl",
    "podman",
    "swapon",
    "systemctl",
    "timedatectl",
    "tuned-adm",
];

/// Every category probe, in snapshot order.
pub fn all_probes() -> Vec<Box<dyn CategoryProbe>> {
    vec![
        Box::new(KernelProbe),
        Box::new(CpuTopologyProbe),
        Box::new(TimekeepingProbe),
        Box::new(MemoryProbe),
        Box::new(NetworkProbe),
        Box::new(IrqProbe),
        Box::new(ToolchainProbe),
        Box::new(ServicesProbe),
        Box::new(ContainersProbe),
    ]
}
