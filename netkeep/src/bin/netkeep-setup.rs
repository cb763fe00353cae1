//! One-shot host preparation: sysctl profile, limits, conntrack, offloads and the watchdog's
//! service unit. Safe to run repeatedly.

use std::process::ExitCode;

use netkeep::{telemetry, Bootstrap, BootstrapOptions, LinuxKernel, LOG_SOURCE};
use nix::unistd::Uid;
use tracing::Instrument as _;

fn main() -> ExitCode {
    telemetry::init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(source = LOG_SOURCE, error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run().instrument(tracing::info_span!("netkeep-setup", source = LOG_SOURCE)))
}

async fn run() -> ExitCode {
    if !Uid::effective().is_root() {
        tracing::warn!("not running as root, most steps will fail");
    }

    let options = BootstrapOptions::default();
    let kernel = LinuxKernel::new(options.command_timeout);

    match Bootstrap::new(options).run(&kernel).await {
        Ok(summary) => {
            tracing::info!(%summary, "host prepared");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "bootstrap incomplete");
            ExitCode::FAILURE
        }
    }
}
