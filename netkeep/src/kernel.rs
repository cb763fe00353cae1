//! The seam between netkeep's decision logic and the live kernel.
//!
//! [`NetKernel`] lists every query and write the watchdog performs. [`LinuxKernel`] maps
//! them onto `netkeep-sys`; tests substitute an in-memory implementation.

use std::{collections::BTreeSet, io, net::IpAddr, path::PathBuf, time::Duration};

use async_trait::async_trait;
use netkeep_sys::{
    command::{self, Runner},
    link::{self, Device},
    sysctl::{self, Protocol, Sysctl, Tcp},
    tc::{self, Deletion, QdiscInfo},
};

use crate::{interface::Interface, policy::QdiscSpec};

/// Errors returned by kernel queries and writes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem access (`/proc/sys`, `/sys/class/net`) failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// An external tool failed.
    #[error("command error: {0}")]
    Command(#[from] command::Error),
    /// The call did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Result alias for kernel calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Kernel operations the resolver, prober and reconciler rely on.
#[async_trait]
pub trait NetKernel: Send + Sync {
    /// Root qdisc of `iface`; `Ok(None)` if none is listed.
    async fn root_qdisc(&self, iface: &Interface) -> Result<Option<QdiscInfo>>;

    /// Deletes the root qdisc of `iface`. Absence is success.
    async fn delete_root_qdisc(&self, iface: &Interface) -> Result<Deletion>;

    /// Attaches `spec` at the root of `iface`.
    async fn add_root_qdisc(&self, iface: &Interface, spec: &QdiscSpec) -> Result<()>;

    /// Active congestion-control algorithm.
    async fn congestion_control(&self) -> Result<String>;

    /// Algorithms the kernel offers.
    async fn available_congestion_control(&self) -> Result<BTreeSet<String>>;

    /// Switches the active congestion-control algorithm.
    async fn set_congestion_control(&self, name: &str) -> Result<()>;

    /// Device used to reach `destination`; `Ok(None)` if the route names none.
    async fn route_device(&self, destination: IpAddr) -> Result<Option<String>>;

    /// Devices in kernel enumeration order.
    async fn devices(&self) -> Result<Vec<Device>>;

    /// Returns `true` if `name` exists in the device table.
    fn device_exists(&self, name: &str) -> bool;
}

/// [`NetKernel`] backed by `/proc/sys`, `/sys/class/net`, `tc` and `ip`.
#[derive(Debug, Clone)]
pub struct LinuxKernel {
    runner: Runner,
    sysctl: Sysctl,
    sys_class_net: PathBuf,
}

impl LinuxKernel {
    /// Creates a kernel handle bounding every call by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: Runner::new(timeout),
            sysctl: Sysctl::default(),
            sys_class_net: PathBuf::from(link::SYS_CLASS_NET),
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = io::Result<T>>,
    {
        let timeout = self.runner.timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }
}

#[async_trait]
impl NetKernel for LinuxKernel {
    async fn root_qdisc(&self, iface: &Interface) -> Result<Option<QdiscInfo>> {
        Ok(tc::show_root(&self.runner, iface.name()).await?)
    }

    async fn delete_root_qdisc(&self, iface: &Interface) -> Result<Deletion> {
        Ok(tc::delete_root(&self.runner, iface.name()).await?)
    }

    async fn add_root_qdisc(&self, iface: &Interface, spec: &QdiscSpec) -> Result<()> {
        Ok(tc::add_root(&self.runner, iface.name(), spec.kind().name(), spec.params()).await?)
    }

    async fn congestion_control(&self) -> Result<String> {
        self.bounded(self.sysctl.read(&Tcp::CongestionControl, Protocol::V4)).await
    }

    async fn available_congestion_control(&self) -> Result<BTreeSet<String>> {
        let raw = self
            .bounded(self.sysctl.read(&Tcp::AvailableCongestionControl, Protocol::V4))
            .await?;
        Ok(sysctl::parse_list(&raw))
    }

    async fn set_congestion_control(&self, name: &str) -> Result<()> {
        self.bounded(self.sysctl.write(&Tcp::CongestionControl, Protocol::V4, name)).await
    }

    async fn route_device(&self, destination: IpAddr) -> Result<Option<String>> {
        Ok(link::route_dev(&self.runner, destination).await?)
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let path = self.sys_class_net.clone();
        let listing = tokio::task::spawn_blocking(move || link::devices(path));
        match tokio::time::timeout(self.runner.timeout(), listing).await {
            Ok(Ok(devices)) => Ok(devices?),
            Ok(Err(join)) => Err(Error::Io(io::Error::other(join))),
            Err(_) => Err(Error::Timeout(self.runner.timeout())),
        }
    }

    fn device_exists(&self, name: &str) -> bool {
        link::if_index(name).is_some()
    }
}
