//! Best-effort observation of live kernel state.

use crate::{
    interface::Interface,
    kernel::NetKernel,
    snapshot::{RootQdisc, Snapshot},
};

/// Builds a fresh [`Snapshot`] for `iface`.
///
/// Never fails: every sub-query that cannot be answered is recorded as unknown and logged.
pub async fn probe<K>(kernel: &K, iface: &Interface) -> Snapshot
where
    K: NetKernel + ?Sized,
{
    let root_qdisc = match kernel.root_qdisc(iface).await {
        Ok(Some(info)) => RootQdisc::Attached(info.kind),
        Ok(None) => RootQdisc::Absent,
        Err(e) => {
            tracing::warn!(%iface, error = %e, "root qdisc unknown");
            RootQdisc::Unknown
        }
    };

    let congestion_control = kernel
        .congestion_control()
        .await
        .map_err(|e| tracing::warn!(error = %e, "congestion control unknown"))
        .ok();

    let available = kernel
        .available_congestion_control()
        .await
        .map_err(|e| tracing::warn!(error = %e, "available congestion control unknown"))
        .ok();

    let snapshot = Snapshot { root_qdisc, congestion_control, available };
    tracing::debug!(?snapshot, "probed");
    snapshot
}
