use std::{path::Path, time::Duration};

use netkeep::{
    bootstrap::{conntrack, limits, offload, profile},
    Bootstrap, BootstrapError, BootstrapOptions, ResolveError, ResolverOptions, Summary, Tools,
};
use netkeep_sys::{link::Device, sysctl::Sysctl};

use crate::mock::MockKernel;

const MISSING: &str = "/nonexistent/netkeep-tool";

/// Every path under `root`, every external program replaced by `tool`.
fn options(root: &Path, tool: &str) -> BootstrapOptions {
    let _ = tracing_subscriber::fmt::try_init();

    let tools = Tools { modprobe: tool.into(), ethtool: tool.into(), systemctl: tool.into() };
    BootstrapOptions::default()
        .with_sysctl_root(root.join("proc-root"))
        .with_module_root(root.join("sys-module"))
        .with_limits_path(root.join("limits.d/99-netkeep.conf"))
        .with_unit_dir(root.join("system"))
        .with_exec_path(root.join("bin/netkeepd"))
        .with_tools(tools)
        .with_resolver(ResolverOptions::default().with_route_retries(3, Duration::from_millis(10)))
}

#[tokio::test]
async fn missing_interface_still_runs_host_steps() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), MISSING);
    let kernel = MockKernel::default();
    kernel.update(|s| s.devices = vec![Device::new("lo", 1)]);

    let result = Bootstrap::new(options.clone()).run(&kernel).await;

    assert!(matches!(
        result,
        Err(BootstrapError::Resolve(ResolveError::NoInterfaceFound { attempts: 3 }))
    ));
    assert_eq!(kernel.read(|s| s.route_lookups), 3);
    assert!(options.limits_path.exists());
    assert!(options.unit_path().exists());
}

#[tokio::test]
async fn unavailable_tools_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), MISSING);
    let kernel = MockKernel::gateway("pfifo_fast", "cubic", &["bbr"]);

    let summary = Bootstrap::new(options).run(&kernel).await.unwrap();

    // Sysctls are absent from the empty root; modprobe, ethtool and systemctl are missing.
    let skipped = profile::GATEWAY.len() + limits::FS.len() + 1 + offload::DESIRED.len() + 1;
    assert_eq!(summary, Summary { applied: 2, unchanged: 0, skipped, failed: 0 });
}

#[tokio::test]
async fn unsupported_features_are_skipped_and_systemctl_errors_fail() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), "false");
    let kernel = MockKernel::gateway("fq", "bbr", &["bbr"]);

    let summary = Bootstrap::new(options).run(&kernel).await.unwrap();

    // modprobe and every `ethtool -K` exit non-zero and are skipped; a failing
    // `systemctl daemon-reload` is a real failure and stops the activation.
    let skipped = profile::GATEWAY.len() + limits::FS.len() + 1 + offload::DESIRED.len();
    assert_eq!(summary, Summary { applied: 2, unchanged: 0, skipped, failed: 1 });
}

#[tokio::test]
async fn second_run_only_reenables_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), "true");
    let kernel = MockKernel::gateway("fq", "bbr", &["bbr"]);
    let bootstrap = Bootstrap::new(options.clone());

    let first = bootstrap.run(&kernel).await.unwrap();
    // limits file, offloads, unit file, then daemon-reload, enable and restart.
    assert_eq!(first.applied, 1 + offload::DESIRED.len() + 1 + 3);
    assert_eq!(first.failed, 0);

    let second = bootstrap.run(&kernel).await.unwrap();
    // Offloads are toggled unconditionally; the unit is only `enable --now`ed.
    assert_eq!(second.applied, offload::DESIRED.len() + 1);
    assert_eq!(second.unchanged, 2);
    assert_eq!(second.failed, 0);

    let unit = std::fs::read_to_string(options.unit_path()).unwrap();
    let exec = format!("ExecStart={}", options.exec_path.display());
    assert!(unit.lines().any(|line| line == exec));
}

#[tokio::test]
async fn loaded_conntrack_is_tuned_without_modprobe() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), MISSING);
    std::fs::create_dir_all(options.module_root.join(conntrack::MODULE)).unwrap();

    let sysctl = Sysctl::with_root(&options.sysctl_root);
    let max = &conntrack::SETTINGS[0];
    let path = sysctl.resolve(&max.param, max.protocol);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "65536\n").unwrap();

    let kernel = MockKernel::gateway("fq", "bbr", &["bbr"]);
    let summary = Bootstrap::new(options).run(&kernel).await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), max.value);
    // limits file, unit file and the conntrack table size.
    assert_eq!(summary.applied, 3);
    assert_eq!(summary.failed, 0);
}
