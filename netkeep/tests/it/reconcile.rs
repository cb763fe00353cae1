use std::{io, time::Duration};

use netkeep::{
    reconcile::Outcome, shutdown, Interface, Policy, Reconciler, RootQdisc, WatchdogOptions,
};
use tokio::time::Instant;

use crate::mock::{set, MockKernel};

fn reconciler(kernel: &MockKernel) -> Reconciler<MockKernel> {
    let _ = tracing_subscriber::fmt::try_init();
    let iface = Interface::new("eth0").unwrap();
    Reconciler::new(kernel.clone(), iface, Policy::gateway_default().unwrap())
}

#[tokio::test]
async fn gateway_converges_in_one_cycle() {
    let kernel = MockKernel::gateway("pfifo_fast", "cubic", &["bbr"]);
    let reconciler = reconciler(&kernel);

    let report = reconciler.cycle().await;
    assert_eq!(report.snapshot.root_qdisc, RootQdisc::Attached("pfifo_fast".into()));
    assert_eq!(report.qdisc, Outcome::Corrected);
    assert_eq!(report.congestion, Outcome::Corrected);

    kernel.read(|s| {
        assert_eq!(s.root_qdisc.as_deref(), Some("fq"));
        assert_eq!(
            s.qdisc_params,
            [("flow_limit".to_string(), 200), ("limit".to_string(), 20_000)]
        );
        assert_eq!(s.congestion_control, "bbr");
    });

    let writes = kernel.read(|s| s.writes());
    let second = reconciler.cycle().await;
    assert_eq!(second.attempted_writes(), 0);
    assert_eq!(kernel.read(|s| s.writes()), writes);
}

#[tokio::test]
async fn converged_state_is_left_alone() {
    let kernel = MockKernel::gateway("fq", "bbr", &["bbr", "cubic"]);
    let reconciler = reconciler(&kernel);

    let first = reconciler.cycle().await;
    let second = reconciler.cycle().await;

    assert_eq!(first.snapshot, second.snapshot);
    assert_eq!(first.attempted_writes() + second.attempted_writes(), 0);
    assert_eq!(kernel.read(|s| s.writes()), 0);
}

#[tokio::test]
async fn external_changes_are_undone() {
    let kernel = MockKernel::gateway("fq", "bbr", &["bbr", "cubic"]);
    let reconciler = reconciler(&kernel);
    reconciler.cycle().await;

    kernel.update(|s| {
        s.root_qdisc = Some("fq_codel".into());
        s.congestion_control = "cubic".into();
    });

    let report = reconciler.cycle().await;
    assert_eq!(report.qdisc, Outcome::Corrected);
    assert_eq!(report.congestion, Outcome::Corrected);
    kernel.read(|s| {
        assert_eq!(s.root_qdisc.as_deref(), Some("fq"));
        assert_eq!(s.congestion_control, "bbr");
    });
}

#[tokio::test]
async fn top_preference_is_picked_up_when_it_appears() {
    let kernel = MockKernel::gateway("fq", "bbr", &["bbr", "cubic"]);
    let reconciler = reconciler(&kernel);
    assert_eq!(reconciler.cycle().await.attempted_writes(), 0);

    kernel.update(|s| s.available = Some(set(&["bbr", "bbrplus", "cubic"])));
    reconciler.cycle().await;
    assert_eq!(kernel.read(|s| s.congestion_control.clone()), "bbrplus");
}

#[tokio::test]
async fn unknown_availability_never_writes_congestion_control() {
    let kernel = MockKernel::gateway("fq", "cubic", &[]);
    let reconciler = reconciler(&kernel);

    let report = reconciler.cycle().await;
    assert_eq!(report.congestion, Outcome::Skipped);

    kernel.update(|s| s.available = None);
    let report = reconciler.cycle().await;
    assert_eq!(report.congestion, Outcome::Skipped);

    kernel.read(|s| {
        assert_eq!(s.cc_writes, 0);
        assert_eq!(s.congestion_control, "cubic");
    });
}

#[tokio::test]
async fn no_candidate_keeps_current_algorithm() {
    let kernel = MockKernel::gateway("fq", "cubic", &["cubic", "reno"]);
    let report = reconciler(&kernel).cycle().await;

    assert_eq!(report.congestion, Outcome::Skipped);
    assert_eq!(kernel.read(|s| s.cc_writes), 0);
}

#[tokio::test]
async fn missing_root_qdisc_is_added() {
    let kernel = MockKernel::gateway("fq", "bbr", &["bbr"]);
    kernel.update(|s| s.root_qdisc = None);

    let report = reconciler(&kernel).cycle().await;
    assert_eq!(report.snapshot.root_qdisc, RootQdisc::Absent);
    assert_eq!(report.qdisc, Outcome::Corrected);
    kernel.read(|s| {
        assert_eq!(s.qdisc_deletes, 1);
        assert_eq!(s.root_qdisc.as_deref(), Some("fq"));
    });
}

#[tokio::test]
async fn unreadable_qdisc_is_replaced() {
    let kernel = MockKernel::gateway("fq", "bbr", &["bbr"]);
    kernel.update(|s| s.fail_qdisc_query = true);

    let report = reconciler(&kernel).cycle().await;
    assert_eq!(report.snapshot.root_qdisc, RootQdisc::Unknown);
    assert_eq!(report.qdisc, Outcome::Corrected);
    assert_eq!(report.congestion, Outcome::Unchanged);
}

#[tokio::test]
async fn failed_qdisc_add_does_not_block_congestion_control() {
    let kernel = MockKernel::gateway("pfifo_fast", "cubic", &["bbr"]);
    kernel.update(|s| s.fail_qdisc_adds = 1);
    let reconciler = reconciler(&kernel);

    let report = reconciler.cycle().await;
    assert_eq!(report.qdisc, Outcome::Failed);
    assert_eq!(report.congestion, Outcome::Corrected);
    assert_eq!(kernel.read(|s| s.congestion_control.clone()), "bbr");

    let retry = reconciler.cycle().await;
    assert_eq!(retry.snapshot.root_qdisc, RootQdisc::Absent);
    assert_eq!(retry.qdisc, Outcome::Corrected);
    assert_eq!(kernel.read(|s| s.root_qdisc.clone()).as_deref(), Some("fq"));
}

#[tokio::test]
async fn failed_congestion_control_write_is_retried() {
    let kernel = MockKernel::gateway("fq", "cubic", &["bbr", "cubic"]);
    kernel.update(|s| s.fail_cc_write = true);
    let reconciler = reconciler(&kernel);

    assert_eq!(reconciler.cycle().await.congestion, Outcome::Failed);

    kernel.update(|s| s.fail_cc_write = false);
    assert_eq!(reconciler.cycle().await.congestion, Outcome::Corrected);
    assert_eq!(kernel.read(|s| s.cc_writes), 2);
}

#[tokio::test(start_paused = true)]
async fn run_cycles_on_interval_until_shutdown() {
    let kernel = MockKernel::gateway("pfifo_fast", "cubic", &["bbr"]);
    let reconciler = reconciler(&kernel)
        .with_options(WatchdogOptions::default().with_interval(Duration::from_secs(30)));

    let start = Instant::now();
    reconciler.run(tokio::time::sleep(Duration::from_secs(65))).await;

    assert_eq!(start.elapsed(), Duration::from_secs(65));
    kernel.read(|s| {
        // Cycles at 0s, 30s and 60s.
        assert_eq!(s.probes, 3);
        assert_eq!(s.qdisc_adds, 1);
        assert_eq!(s.cc_writes, 1);
    });
}

#[tokio::test(start_paused = true)]
async fn external_change_is_healed_by_the_loop() {
    let kernel = MockKernel::gateway("fq", "bbr", &["bbr"]);
    let reconciler = reconciler(&kernel);

    let tamper = kernel.clone();
    let shutdown = async move {
        tokio::time::sleep(Duration::from_secs(45)).await;
        tamper.update(|s| s.root_qdisc = Some("pfifo_fast".into()));
        tokio::time::sleep(Duration::from_secs(30)).await;
    };

    reconciler.run(shutdown).await;
    kernel.read(|s| {
        assert_eq!(s.probes, 3);
        assert_eq!(s.root_qdisc.as_deref(), Some("fq"));
        assert_eq!(s.qdisc_adds, 1);
    });
}

#[tokio::test(start_paused = true)]
async fn unavailable_signal_does_not_stop_the_loop() {
    let kernel = MockKernel::gateway("pfifo_fast", "cubic", &["bbr"]);
    let reconciler = reconciler(&kernel);

    let shutdown = shutdown::or_pending("SIGTERM", async { Err(io::Error::other("no driver")) });
    let run = tokio::time::timeout(Duration::from_secs(65), reconciler.run(shutdown)).await;

    assert!(run.is_err());
    kernel.read(|s| {
        assert_eq!(s.probes, 3);
        assert_eq!(s.root_qdisc.as_deref(), Some("fq"));
        assert_eq!(s.congestion_control, "bbr");
    });
}
