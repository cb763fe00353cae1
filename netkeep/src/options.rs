//! Compiled-in tunables. There is no configuration file: defaults are the production values
//! and the `with_*` builders exist for embedding and tests.

use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    time::Duration,
};

use netkeep_sys::{ethtool::ETHTOOL, module};

use crate::bootstrap::unit::SYSTEMCTL;

/// Options for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct WatchdogOptions {
    /// Time between the start of two cycles.
    pub interval: Duration,
    /// Upper bound for every single kernel query or write.
    pub call_timeout: Duration,
}

impl WatchdogOptions {
    /// Sets the cycle interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

impl Default for WatchdogOptions {
    fn default() -> Self {
        Self { interval: Duration::from_secs(30), call_timeout: Duration::from_secs(5) }
    }
}

/// Options for egress interface resolution.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Well-known external address whose route names the egress device.
    pub probe_address: IpAddr,
    /// Route lookups attempted before falling back to device enumeration. At least one.
    pub route_attempts: usize,
    /// Delay between two route lookups.
    pub route_delay: Duration,
}

impl ResolverOptions {
    /// Sets the probe address.
    pub fn with_probe_address(mut self, address: IpAddr) -> Self {
        self.probe_address = address;
        self
    }

    /// Sets how many route lookups are attempted and how long to wait between them. The
    /// first lookup always happens, so `attempts` is raised to at least 1.
    pub fn with_route_retries(mut self, attempts: usize, delay: Duration) -> Self {
        self.route_attempts = attempts.max(1);
        self.route_delay = delay;
        self
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            probe_address: IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
            route_attempts: 30,
            route_delay: Duration::from_secs(1),
        }
    }
}

/// External programs run by the bootstrap.
#[derive(Debug, Clone)]
pub struct Tools {
    /// Kernel module loader.
    pub modprobe: String,
    /// NIC feature tool.
    pub ethtool: String,
    /// Service manager control.
    pub systemctl: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            modprobe: module::MODPROBE.to_owned(),
            ethtool: ETHTOOL.to_owned(),
            systemctl: SYSTEMCTL.to_owned(),
        }
    }
}

/// Options for the one-shot bootstrap. Paths default to the live system locations.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Root under which `/proc/sys` is resolved.
    pub sysctl_root: PathBuf,
    /// Directory listing loaded kernel modules.
    pub module_root: PathBuf,
    /// Resource limits file.
    pub limits_path: PathBuf,
    /// Directory holding the service unit.
    pub unit_dir: PathBuf,
    /// Service unit file name.
    pub unit_name: String,
    /// Watchdog binary started by the unit.
    pub exec_path: PathBuf,
    /// Upper bound for every external command.
    pub command_timeout: Duration,
    /// Programs invoked for module loading, offloads and the service manager.
    pub tools: Tools,
    /// Interface resolution, shared with the watchdog.
    pub resolver: ResolverOptions,
}

impl BootstrapOptions {
    /// Resolves sysctls under `root` instead of `/`.
    pub fn with_sysctl_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysctl_root = root.into();
        self
    }

    /// Looks up loaded modules under `root` instead of `/sys/module`.
    pub fn with_module_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.module_root = root.into();
        self
    }

    /// Sets the limits file location.
    pub fn with_limits_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.limits_path = path.into();
        self
    }

    /// Sets the unit directory.
    pub fn with_unit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unit_dir = dir.into();
        self
    }

    /// Sets the watchdog binary path.
    pub fn with_exec_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exec_path = path.into();
        self
    }

    /// Replaces the external programs.
    pub fn with_tools(mut self, tools: Tools) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the resolver options.
    pub fn with_resolver(mut self, resolver: ResolverOptions) -> Self {
        self.resolver = resolver;
        self
    }

    /// Full path of the unit file.
    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(&self.unit_name)
    }
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            sysctl_root: PathBuf::from("/"),
            module_root: PathBuf::from(module::SYS_MODULE),
            limits_path: PathBuf::from("/etc/security/limits.d/99-netkeep.conf"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            unit_name: String::from("netkeep.service"),
            exec_path: PathBuf::from("/usr/local/bin/netkeepd"),
            command_timeout: Duration::from_secs(30),
            tools: Tools::default(),
            resolver: ResolverOptions::default(),
        }
    }
}
