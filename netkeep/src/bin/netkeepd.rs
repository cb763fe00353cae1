//! Watchdog keeping the egress root qdisc and TCP congestion control on policy.
//!
//! Takes no arguments. Exits non-zero only if the compiled-in policy is invalid or no egress
//! interface can be found; everything else is logged and retried on the next cycle.

use std::process::ExitCode;

use netkeep::{
    shutdown, telemetry, LinuxKernel, Policy, Reconciler, Resolver, ResolverOptions,
    WatchdogOptions, LOG_SOURCE,
};
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

    runtime.block_on(run().instrument(tracing::info_span!("netkeepd", source = LOG_SOURCE)))
}

async fn run() -> ExitCode {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting");

    if !Uid::effective().is_root() {
        tracing::warn!("not running as root, corrections will fail");
    }

    let policy = match Policy::gateway_default() {
        Ok(policy) => policy,
        Err(e) => {
            tracing::error!(error = %e, "invalid policy");
            return ExitCode::FAILURE;
        }
    };

    let options = WatchdogOptions::default();
    let kernel = LinuxKernel::new(options.call_timeout);

    let resolver = Resolver::new(&kernel).with_options(ResolverOptions::default());
    let iface = match resolver.resolve().await {
        Ok(iface) => iface,
        Err(e) => {
            tracing::error!(error = %e, "cannot resolve egress interface");
            return ExitCode::FAILURE;
        }
    };

    Reconciler::new(kernel, iface, policy).with_options(options).run(shutdown::signal()).await;

    ExitCode::SUCCESS
}
