//! NIC offload features.

use netkeep_sys::{
    command::{self, Runner},
    ethtool::{self, Offload},
};

use super::{Outcome, Summary};
use crate::interface::Interface;

/// Desired offload states. Segmentation and receive coalescing stay on; LRO is turned off
/// because it rewrites forwarded packets.
pub const DESIRED: [(Offload, bool); 4] =
    [(Offload::Gro, true), (Offload::Gso, true), (Offload::Tso, true), (Offload::Lro, false)];

/// Toggles each feature of [`DESIRED`] separately on `iface` with the `ethtool` at
/// `program`.
pub async fn apply(runner: &Runner, program: &str, iface: &Interface) -> Summary {
    let mut summary = Summary::default();
    for (offload, enabled) in DESIRED {
        summary.record(toggle(runner, program, iface, offload, enabled).await);
    }
    summary
}

async fn toggle(
    runner: &Runner,
    program: &str,
    iface: &Interface,
    offload: Offload,
    enabled: bool,
) -> Outcome {
    match ethtool::set(runner, program, iface.name(), offload, enabled).await {
        Ok(()) => {
            tracing::info!(%iface, %offload, enabled, "offload set");
            Outcome::Applied
        }
        Err(e) if e.is_not_found() => {
            tracing::info!(%offload, "ethtool not installed, skipping");
            Outcome::Skipped
        }
        Err(e @ command::Error::NonZero(_)) => {
            tracing::info!(%iface, %offload, error = %e, "offload not supported, skipping");
            Outcome::Skipped
        }
        Err(e) => {
            tracing::warn!(%iface, %offload, error = %e, "failed to set offload");
            Outcome::Failed
        }
    }
}
