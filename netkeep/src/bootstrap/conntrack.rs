//! Connection tracking capacity.

use netkeep_sys::{
    command::{self, Runner},
    module,
    sysctl::{Netfilter, Param, Sysctl},
};

use super::{profile, profile::Setting, Outcome, Summary};
use crate::options::BootstrapOptions;

/// Kernel module providing connection tracking.
pub const MODULE: &str = "nf_conntrack";

/// Raised table size and an established timeout of about two hours instead of five days.
pub const SETTINGS: &[Setting] = &[
    Setting::new(Param::Netfilter(Netfilter::ConntrackMax), "1048576"),
    Setting::new(Param::Netfilter(Netfilter::ConntrackTcpTimeoutEstablished), "7440"),
];

/// Loads [`MODULE`] and tunes it. A missing module or `modprobe` is skipped.
pub async fn apply(runner: &Runner, sysctl: &Sysctl, options: &BootstrapOptions) -> Summary {
    let mut summary = Summary::default();

    let loaded = if module::is_loaded(&options.module_root, MODULE) {
        Ok(())
    } else {
        module::load(runner, &options.tools.modprobe, MODULE).await
    };

    match loaded {
        Ok(()) => tracing::debug!(module = MODULE, "module present"),
        Err(e @ (command::Error::NonZero(_) | command::Error::Io(_))) => {
            tracing::info!(module = MODULE, error = %e, "conntrack unavailable, skipping");
            summary.record(Outcome::Skipped);
            return summary;
        }
        Err(e) => {
            tracing::warn!(module = MODULE, error = %e, "failed to load module");
            summary.record(Outcome::Failed);
            return summary;
        }
    }

    summary.merge(profile::apply(sysctl, SETTINGS).await);
    summary
}
