//! Ergonomic wrappers for Linux network sysctl parameters.
//!
//! This module provides type-safe access to the `/proc/sys/*` parameters a gateway host
//! tunes: TCP buffers and congestion control, core socket/backlog limits, forwarding,
//! conntrack and file-descriptor ceilings.
//!
//! # Usage
//!
//! ```no_run
//! use netkeep_sys::sysctl::{self, Protocol, Sysctl, Tcp};
//!
//! # async fn run() -> std::io::Result<()> {
//! let sysctl = Sysctl::default();
//! let current = sysctl.read(&Tcp::CongestionControl, Protocol::V4).await?;
//! let available =
//!     sysctl::parse_list(&sysctl.read(&Tcp::AvailableCongestionControl, Protocol::V4).await?);
//! if available.contains("bbr") && current != "bbr" {
//!     sysctl.write(&Tcp::CongestionControl, Protocol::V4, "bbr").await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Note on TCP and Protocol
//!
//! In Linux, TCP parameters under `/proc/sys/net/ipv4/tcp_*` affect **both** IPv4 and IPv6
//! connections. The `Protocol` argument is accepted for API consistency but doesn't change
//! the path for these parameters.
//!
//! # Alternate roots
//!
//! [`Sysctl`] resolves parameter paths under a configurable root directory, which lets
//! callers point it at a scratch tree instead of the live `/proc/sys`.

use std::{collections::BTreeSet, io, path::PathBuf};

/// IP protocol version for sysctl paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    /// IPv4 (`/proc/sys/net/ipv4/...`)
    #[default]
    V4,
    /// IPv6 (`/proc/sys/net/ipv6/...`)
    V6,
}

/// Trait for sysctl parameters that can be read/written.
///
/// The `path` method takes a [`Protocol`] to support parameters that have
/// different paths for IPv4 and IPv6.
pub trait SysctlParam {
    /// Returns the full path to the sysctl file for the given protocol.
    fn path(&self, protocol: Protocol) -> &'static str;

    /// Returns the dotted `sysctl(8)` name, e.g. `net.ipv4.tcp_congestion_control`.
    fn key(&self, protocol: Protocol) -> String {
        self.path(protocol).trim_start_matches("/proc/sys/").replace('/', ".")
    }
}

/// Splits a whitespace-delimited sysctl list, such as
/// `tcp_available_congestion_control`, into a set.
pub fn parse_list(value: &str) -> BTreeSet<String> {
    value.split_whitespace().map(str::to_owned).collect()
}

/// Collapses internal whitespace so that values written as `"4096 87380 6291456"` compare
/// equal to the kernel's tab-separated rendering.
pub fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sysctl accessor rooted at a directory. The default root is `/`.
#[derive(Debug, Clone)]
pub struct Sysctl {
    root: PathBuf,
}

impl Default for Sysctl {
    fn default() -> Self {
        Self { root: PathBuf::from("/") }
    }
}

impl Sysctl {
    /// Creates an accessor that resolves every parameter path under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the on-disk location of `param`.
    pub fn resolve<P: SysctlParam + ?Sized>(&self, param: &P, protocol: Protocol) -> PathBuf {
        self.root.join(param.path(protocol).trim_start_matches('/'))
    }

    /// Returns `true` if the running kernel exposes `param`.
    pub fn exists<P: SysctlParam + ?Sized>(&self, param: &P, protocol: Protocol) -> bool {
        self.resolve(param, protocol).exists()
    }

    /// Reads `param`, trimmed.
    pub async fn read<P: SysctlParam + ?Sized>(
        &self,
        param: &P,
        protocol: Protocol,
    ) -> io::Result<String> {
        tokio::fs::read_to_string(self.resolve(param, protocol)).await.map(|s| s.trim().to_string())
    }

    /// Writes `value` to `param`.
    ///
    /// Fails if the parameter doesn't exist (wrong kernel version, module not loaded), if
    /// permission is denied, or if the kernel rejects the value.
    pub async fn write<P: SysctlParam + ?Sized>(
        &self,
        param: &P,
        protocol: Protocol,
        value: &str,
    ) -> io::Result<()> {
        tokio::fs::write(self.resolve(param, protocol), value).await
    }
}

// ============================================================================
// TCP Parameters
// ============================================================================

/// TCP sysctl parameters under `/proc/sys/net/ipv4/tcp_*`.
///
/// **Note:** In Linux, TCP parameters are shared between IPv4 and IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Tcp {
    // ===== Buffer Sizes =====
    /// Receive buffer sizes: "min default max" (bytes).
    ///
    /// Default: "4096 131072 6291456"
    Rmem,

    /// Send buffer sizes: "min default max" (bytes).
    ///
    /// Default: "4096 16384 4194304"
    Wmem,

    /// Unsent bytes threshold below which the socket is reported writable.
    ///
    /// Default: 4294967295 (disabled)
    NotsentLowat,

    // ===== Congestion Control =====
    /// Default congestion control algorithm name.
    ///
    /// Default: "cubic" (most systems)
    CongestionControl,

    /// Read-only list of algorithms registered with the kernel (built in or loaded).
    AvailableCongestionControl,

    // ===== Connection Setup =====
    /// Maximum queued SYNs awaiting the final ACK.
    ///
    /// Default: 128-1024 depending on memory
    MaxSynBacklog,

    /// TCP Fast Open mode (0x1 client, 0x2 server).
    ///
    /// Default: 1
    Fastopen,

    /// Time to hold FIN_WAIT_2 state (seconds).
    ///
    /// Default: 60
    FinTimeout,

    // ===== Idle and MTU =====
    /// Reset cwnd after idle period (0/1).
    ///
    /// Default: 1
    SlowStartAfterIdle,

    /// Path MTU Discovery mode (0/1/2).
    ///
    /// Default: 0
    MtuProbing,
}

impl SysctlParam for Tcp {
    fn path(&self, _protocol: Protocol) -> &'static str {
        match self {
            Self::Rmem => "/proc/sys/net/ipv4/tcp_rmem",
            Self::Wmem => "/proc/sys/net/ipv4/tcp_wmem",
            Self::NotsentLowat => "/proc/sys/net/ipv4/tcp_notsent_lowat",
            Self::CongestionControl => "/proc/sys/net/ipv4/tcp_congestion_control",
            Self::AvailableCongestionControl => {
                "/proc/sys/net/ipv4/tcp_available_congestion_control"
            }
            Self::MaxSynBacklog => "/proc/sys/net/ipv4/tcp_max_syn_backlog",
            Self::Fastopen => "/proc/sys/net/ipv4/tcp_fastopen",
            Self::FinTimeout => "/proc/sys/net/ipv4/tcp_fin_timeout",
            Self::SlowStartAfterIdle => "/proc/sys/net/ipv4/tcp_slow_start_after_idle",
            Self::MtuProbing => "/proc/sys/net/ipv4/tcp_mtu_probing",
        }
    }
}

// ============================================================================
// Core Parameters
// ============================================================================

/// Protocol-independent socket and device parameters under `/proc/sys/net/core/*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Core {
    /// Maximum receive socket buffer size settable with `SO_RCVBUF` (bytes).
    RmemMax,
    /// Maximum send socket buffer size settable with `SO_SNDBUF` (bytes).
    WmemMax,
    /// Default receive socket buffer size (bytes).
    RmemDefault,
    /// Default send socket buffer size (bytes).
    WmemDefault,
    /// Packets queued on the input side when the interface receives faster than the kernel
    /// processes.
    NetdevMaxBacklog,
    /// Listen backlog ceiling.
    Somaxconn,
    /// Qdisc attached to newly created devices.
    DefaultQdisc,
}

impl SysctlParam for Core {
    fn path(&self, _protocol: Protocol) -> &'static str {
        match self {
            Self::RmemMax => "/proc/sys/net/core/rmem_max",
            Self::WmemMax => "/proc/sys/net/core/wmem_max",
            Self::RmemDefault => "/proc/sys/net/core/rmem_default",
            Self::WmemDefault => "/proc/sys/net/core/wmem_default",
            Self::NetdevMaxBacklog => "/proc/sys/net/core/netdev_max_backlog",
            Self::Somaxconn => "/proc/sys/net/core/somaxconn",
            Self::DefaultQdisc => "/proc/sys/net/core/default_qdisc",
        }
    }
}

// ============================================================================
// General IP Parameters
// ============================================================================

/// General IP sysctl parameters.
///
/// These have **separate paths** for IPv4 and IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Ip {
    /// Enable IP forwarding (0/1).
    ///
    /// - IPv4: `/proc/sys/net/ipv4/ip_forward`
    /// - IPv6: `/proc/sys/net/ipv6/conf/all/forwarding`
    Forwarding,

    /// Local port range for outgoing connections: "low high". Shared by both protocols.
    LocalPortRange,
}

impl SysctlParam for Ip {
    fn path(&self, protocol: Protocol) -> &'static str {
        match (self, protocol) {
            (Self::Forwarding, Protocol::V4) => "/proc/sys/net/ipv4/ip_forward",
            (Self::Forwarding, Protocol::V6) => "/proc/sys/net/ipv6/conf/all/forwarding",
            (Self::LocalPortRange, _) => "/proc/sys/net/ipv4/ip_local_port_range",
        }
    }
}

// ============================================================================
// Netfilter Parameters
// ============================================================================

/// Connection tracking parameters. Only present once `nf_conntrack` is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Netfilter {
    /// Maximum number of tracked connections.
    ConntrackMax,
    /// Timeout for established TCP entries (seconds).
    ///
    /// Default: 432000 (5 days)
    ConntrackTcpTimeoutEstablished,
}

impl SysctlParam for Netfilter {
    fn path(&self, _protocol: Protocol) -> &'static str {
        match self {
            Self::ConntrackMax => "/proc/sys/net/netfilter/nf_conntrack_max",
            Self::ConntrackTcpTimeoutEstablished => {
                "/proc/sys/net/netfilter/nf_conntrack_tcp_timeout_established"
            }
        }
    }
}

// ============================================================================
// Filesystem Parameters
// ============================================================================

/// File-descriptor ceilings under `/proc/sys/fs/*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Fs {
    /// System-wide open file limit.
    FileMax,
    /// Per-process ceiling for `RLIMIT_NOFILE`.
    NrOpen,
}

impl SysctlParam for Fs {
    fn path(&self, _protocol: Protocol) -> &'static str {
        match self {
            Self::FileMax => "/proc/sys/fs/file-max",
            Self::NrOpen => "/proc/sys/fs/nr_open",
        }
    }
}

/// Any of the parameter families above, so heterogeneous settings fit in one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// A [`Tcp`] parameter.
    Tcp(Tcp),
    /// A [`Core`] parameter.
    Core(Core),
    /// An [`Ip`] parameter.
    Ip(Ip),
    /// A [`Netfilter`] parameter.
    Netfilter(Netfilter),
    /// A [`Fs`] parameter.
    Fs(Fs),
}

impl SysctlParam for Param {
    fn path(&self, protocol: Protocol) -> &'static str {
        match self {
            Self::Tcp(p) => p.path(protocol),
            Self::Core(p) => p.path(protocol),
            Self::Ip(p) => p.path(protocol),
            Self::Netfilter(p) => p.path(protocol),
            Self::Fs(p) => p.path(protocol),
        }
    }
}

macro_rules! impl_from_param {
    ($($family:ident),*) => {
        $(impl From<$family> for Param {
            fn from(value: $family) -> Self {
                Self::$family(value)
            }
        })*
    };
}

impl_from_param!(Tcp, Core, Ip, Netfilter, Fs);
