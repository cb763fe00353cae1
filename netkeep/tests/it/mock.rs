//! In-memory kernel used to drive the resolver and reconciler.

use std::{collections::BTreeSet, io, net::IpAddr, sync::Arc};

use async_trait::async_trait;
use netkeep::{kernel, Interface, NetKernel, QdiscSpec};
use netkeep_sys::{
    link::Device,
    tc::{Deletion, QdiscInfo},
};
use parking_lot::Mutex;

/// Mutable kernel state plus failure switches and call counters.
#[derive(Debug, Default)]
pub(crate) struct State {
    /// Attached root qdisc kind, `None` if nothing is attached.
    pub(crate) root_qdisc: Option<String>,
    /// Parameters the root qdisc was added with.
    pub(crate) qdisc_params: Vec<(String, u64)>,
    pub(crate) congestion_control: String,
    /// `None` makes the availability read fail.
    pub(crate) available: Option<BTreeSet<String>>,
    pub(crate) route: Option<String>,
    /// Route lookups answer `None` until this many lookups have been made.
    pub(crate) route_ready_after: usize,
    pub(crate) devices: Vec<Device>,

    /// Number of upcoming qdisc adds that fail.
    pub(crate) fail_qdisc_adds: usize,
    pub(crate) fail_qdisc_query: bool,
    pub(crate) fail_cc_write: bool,

    pub(crate) probes: usize,
    pub(crate) qdisc_deletes: usize,
    pub(crate) qdisc_adds: usize,
    pub(crate) cc_writes: usize,
    pub(crate) route_lookups: usize,
}

impl State {
    /// Writes of any kind performed so far.
    pub(crate) fn writes(&self) -> usize {
        self.qdisc_deletes + self.qdisc_adds + self.cc_writes
    }
}

/// Cheaply cloneable handle; clones share state.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockKernel(Arc<Mutex<State>>);

impl MockKernel {
    /// A gateway with a single `eth0` uplink.
    pub(crate) fn gateway(qdisc: &str, current: &str, available: &[&str]) -> Self {
        let kernel = Self::default();
        kernel.update(|s| {
            s.root_qdisc = Some(qdisc.to_owned());
            s.congestion_control = current.to_owned();
            s.available = Some(set(available));
            s.route = Some("eth0".to_owned());
            s.devices = vec![Device::new("lo", 1), Device::new("eth0", 2)];
        });
        kernel
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut State)) {
        f(&mut self.0.lock());
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        f(&self.0.lock())
    }
}

pub(crate) fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn failure(what: &str) -> kernel::Error {
    kernel::Error::Io(io::Error::other(format!("injected {what} failure")))
}

#[async_trait]
impl NetKernel for MockKernel {
    async fn root_qdisc(&self, _iface: &Interface) -> kernel::Result<Option<QdiscInfo>> {
        let mut state = self.0.lock();
        state.probes += 1;
        if state.fail_qdisc_query {
            return Err(failure("qdisc query"));
        }
        Ok(state.root_qdisc.clone().map(|kind| QdiscInfo {
            kind,
            handle: "8001:".to_owned(),
            root: true,
        }))
    }

    async fn delete_root_qdisc(&self, _iface: &Interface) -> kernel::Result<Deletion> {
        let mut state = self.0.lock();
        state.qdisc_deletes += 1;
        state.qdisc_params.clear();
        Ok(match state.root_qdisc.take() {
            Some(_) => Deletion::Removed,
            None => Deletion::Absent,
        })
    }

    async fn add_root_qdisc(&self, _iface: &Interface, spec: &QdiscSpec) -> kernel::Result<()> {
        let mut state = self.0.lock();
        state.qdisc_adds += 1;
        if state.fail_qdisc_adds > 0 {
            state.fail_qdisc_adds -= 1;
            return Err(failure("qdisc add"));
        }
        if state.root_qdisc.is_some() {
            return Err(failure("exclusive qdisc add"));
        }
        state.root_qdisc = Some(spec.kind().name().to_owned());
        state.qdisc_params = spec.params().map(|(name, value)| (name.to_owned(), value)).collect();
        Ok(())
    }

    async fn congestion_control(&self) -> kernel::Result<String> {
        Ok(self.0.lock().congestion_control.clone())
    }

    async fn available_congestion_control(&self) -> kernel::Result<BTreeSet<String>> {
        self.0.lock().available.clone().ok_or_else(|| failure("availability read"))
    }

    async fn set_congestion_control(&self, name: &str) -> kernel::Result<()> {
        let mut state = self.0.lock();
        state.cc_writes += 1;
        if state.fail_cc_write {
            return Err(failure("congestion control write"));
        }
        state.congestion_control = name.to_owned();
        Ok(())
    }

    async fn route_device(&self, _destination: IpAddr) -> kernel::Result<Option<String>> {
        let mut state = self.0.lock();
        state.route_lookups += 1;
        if state.route_lookups < state.route_ready_after {
            return Ok(None);
        }
        Ok(state.route.clone())
    }

    async fn devices(&self) -> kernel::Result<Vec<Device>> {
        Ok(self.0.lock().devices.clone())
    }

    fn device_exists(&self, name: &str) -> bool {
        self.0.lock().devices.iter().any(|d| d.name == name)
    }
}
