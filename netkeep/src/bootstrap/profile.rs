//! Gateway sysctl profile.

use netkeep_sys::sysctl::{self, Core, Ip, Param, Protocol, Sysctl, SysctlParam, Tcp};

use super::{Outcome, Summary};

/// A desired sysctl value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    /// Parameter to write.
    pub param: Param,
    /// Protocol selecting the path of protocol-specific parameters.
    pub protocol: Protocol,
    /// Desired value, compared after whitespace normalization.
    pub value: &'static str,
}

impl Setting {
    /// A setting for an IPv4 or protocol-independent parameter.
    pub const fn new(param: Param, value: &'static str) -> Self {
        Self { param, protocol: Protocol::V4, value }
    }

    /// A setting for the IPv6 path of `param`.
    pub const fn v6(param: Param, value: &'static str) -> Self {
        Self { param, protocol: Protocol::V6, value }
    }

    /// Dotted `sysctl(8)` name.
    pub fn key(&self) -> String {
        self.param.key(self.protocol)
    }
}

/// Socket buffers, TCP windows, backlogs, forwarding and queueing defaults for a forwarding
/// gateway running BBR over fq.
pub const GATEWAY: &[Setting] = &[
    Setting::new(Param::Core(Core::RmemMax), "67108864"),
    Setting::new(Param::Core(Core::WmemMax), "67108864"),
    Setting::new(Param::Core(Core::RmemDefault), "262144"),
    Setting::new(Param::Core(Core::WmemDefault), "262144"),
    Setting::new(Param::Core(Core::NetdevMaxBacklog), "250000"),
    Setting::new(Param::Core(Core::Somaxconn), "65535"),
    Setting::new(Param::Core(Core::DefaultQdisc), "fq"),
    Setting::new(Param::Tcp(Tcp::Rmem), "4096 87380 67108864"),
    Setting::new(Param::Tcp(Tcp::Wmem), "4096 65536 67108864"),
    Setting::new(Param::Tcp(Tcp::NotsentLowat), "16384"),
    Setting::new(Param::Tcp(Tcp::MaxSynBacklog), "65535"),
    Setting::new(Param::Tcp(Tcp::Fastopen), "3"),
    Setting::new(Param::Tcp(Tcp::FinTimeout), "15"),
    Setting::new(Param::Tcp(Tcp::SlowStartAfterIdle), "0"),
    Setting::new(Param::Tcp(Tcp::MtuProbing), "1"),
    Setting::new(Param::Ip(Ip::LocalPortRange), "1024 65535"),
    Setting::new(Param::Ip(Ip::Forwarding), "1"),
    Setting::v6(Param::Ip(Ip::Forwarding), "1"),
];

/// Applies `settings` in order.
pub async fn apply(sysctl: &Sysctl, settings: &[Setting]) -> Summary {
    let mut summary = Summary::default();
    for setting in settings {
        summary.record(apply_one(sysctl, setting).await);
    }
    summary
}

/// Writes one setting unless the kernel already holds the value. Keys the running kernel
/// does not expose are skipped.
pub async fn apply_one(sysctl: &Sysctl, setting: &Setting) -> Outcome {
    let key = setting.key();

    if !sysctl.exists(&setting.param, setting.protocol) {
        tracing::info!(key, "sysctl not supported by this kernel, skipping");
        return Outcome::Skipped;
    }

    let current = match sysctl.read(&setting.param, setting.protocol).await {
        Ok(current) => current,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read sysctl");
            return Outcome::Failed;
        }
    };

    if sysctl::normalize(&current) == sysctl::normalize(setting.value) {
        tracing::debug!(key, value = setting.value, "sysctl already set");
        return Outcome::Unchanged;
    }

    match sysctl.write(&setting.param, setting.protocol, setting.value).await {
        Ok(()) => {
            tracing::info!(key, observed = %current, desired = setting.value, "sysctl updated");
            Outcome::Applied
        }
        Err(e) => {
            tracing::warn!(key, desired = setting.value, error = %e, "failed to write sysctl");
            Outcome::Failed
        }
    }
}
