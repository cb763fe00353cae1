//! Network device enumeration and route queries.

use std::{
    io,
    net::IpAddr,
    num::NonZeroU32,
    path::Path,
};

use crate::command::{self, Runner};

/// Sysfs directory listing every network device of the current namespace.
pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// Name of the loopback device.
pub const LOOPBACK: &str = "lo";

/// Maximum device name length, excluding the trailing NUL (`IFNAMSIZ - 1`).
pub const IFNAME_MAX: usize = 15;

/// A network device as listed in sysfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Device name.
    pub name: String,
    /// Kernel interface index.
    pub index: u32,
}

impl Device {
    /// Creates a new device entry.
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self { name: name.into(), index }
    }

    /// Returns `true` for the loopback device.
    pub fn is_loopback(&self) -> bool {
        self.name == LOOPBACK
    }
}

/// Lists devices under `sys_class_net`, ordered by interface index, which is the kernel's
/// enumeration order. Entries without a readable `ifindex` are skipped.
pub fn devices(sys_class_net: impl AsRef<Path>) -> io::Result<Vec<Device>> {
    let mut devices = Vec::new();

    for entry in std::fs::read_dir(sys_class_net)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let index = std::fs::read_to_string(entry.path().join("ifindex"))
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok());

        match index {
            Some(index) => devices.push(Device { name, index }),
            None => tracing::debug!(name, "skipping device without ifindex"),
        }
    }

    devices.sort_by_key(|d| d.index);
    Ok(devices)
}

/// Returns the first non-loopback device in enumeration order.
pub fn first_non_loopback(devices: &[Device]) -> Option<&Device> {
    devices.iter().find(|d| !d.is_loopback())
}

/// Resolves the kernel index of `name`, or `None` if no such device exists.
pub fn if_index(name: &str) -> Option<NonZeroU32> {
    nix::net::if_::if_nametoindex(name).ok().and_then(NonZeroU32::new)
}

/// Returns `true` if `name` is a syntactically valid device name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= IFNAME_MAX
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == ':' || c.is_whitespace())
}

/// Extracts the output device from `ip -o route get` output, e.g.
/// `1.1.1.1 via 10.0.0.1 dev eth0 src 10.0.0.2 uid 0 \    cache`.
pub fn parse_route_dev(output: &str) -> Option<String> {
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "dev" {
            return tokens.next().filter(|name| is_valid_name(name)).map(str::to_owned);
        }
    }
    None
}

/// Asks the kernel which device traffic to `destination` would leave through.
///
/// `Ok(None)` means the kernel answered but named no device.
pub async fn route_dev(runner: &Runner, destination: IpAddr) -> command::Result<Option<String>> {
    let destination = destination.to_string();
    let output = runner.run("ip", ["-o", "route", "get", destination.as_str()]).await?;
    Ok(parse_route_dev(&output.stdout))
}
