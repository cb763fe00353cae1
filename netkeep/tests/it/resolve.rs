use std::time::Duration;

use netkeep::{ResolveError, Resolver};
use netkeep_sys::link::Device;
use tokio::time::Instant;

use crate::mock::MockKernel;

fn uplinks(kernel: &MockKernel, devices: Vec<Device>, route: Option<&str>) {
    let _ = tracing_subscriber::fmt::try_init();
    kernel.update(|s| {
        s.devices = devices;
        s.route = route.map(str::to_owned);
    });
}

#[tokio::test(start_paused = true)]
async fn route_device_is_used_first() {
    let kernel = MockKernel::default();
    let devices = vec![Device::new("lo", 1), Device::new("eth0", 2), Device::new("wg0", 3)];
    uplinks(&kernel, devices, Some("wg0"));

    let iface = Resolver::new(&kernel).resolve().await.unwrap();
    assert_eq!(iface.name(), "wg0");
    assert_eq!(kernel.read(|s| s.route_lookups), 1);
}

#[tokio::test(start_paused = true)]
async fn route_lookup_is_retried_until_the_route_appears() {
    let kernel = MockKernel::default();
    uplinks(&kernel, vec![Device::new("lo", 1), Device::new("eth0", 2)], Some("eth0"));
    kernel.update(|s| s.route_ready_after = 5);

    let start = Instant::now();
    let iface = Resolver::new(&kernel).resolve().await.unwrap();

    assert_eq!(iface.name(), "eth0");
    assert_eq!(kernel.read(|s| s.route_lookups), 5);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn falls_back_to_first_non_loopback_after_all_attempts() {
    let kernel = MockKernel::default();
    let devices = vec![Device::new("lo", 1), Device::new("ens3", 2), Device::new("ens4", 3)];
    uplinks(&kernel, devices, None);

    let start = Instant::now();
    let iface = Resolver::new(&kernel).resolve().await.unwrap();

    assert_eq!(iface.name(), "ens3");
    assert_eq!(kernel.read(|s| s.route_lookups), 30);
    assert_eq!(start.elapsed(), Duration::from_secs(29));
}

#[tokio::test(start_paused = true)]
async fn route_to_unknown_device_is_not_trusted() {
    let kernel = MockKernel::default();
    uplinks(&kernel, vec![Device::new("lo", 1), Device::new("eth0", 2)], Some("ppp0"));

    let iface = Resolver::new(&kernel).resolve().await.unwrap();
    assert_eq!(iface.name(), "eth0");
    assert_eq!(kernel.read(|s| s.route_lookups), 30);
}

#[tokio::test(start_paused = true)]
async fn loopback_only_host_has_no_interface() {
    let kernel = MockKernel::default();
    uplinks(&kernel, vec![Device::new("lo", 1)], None);

    let err = Resolver::new(&kernel).resolve().await.unwrap_err();
    assert_eq!(err, ResolveError::NoInterfaceFound { attempts: 30 });
}
