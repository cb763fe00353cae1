//! The reconciliation loop.
//!
//! Level-triggered: each cycle probes, derives a [`Plan`] from scratch with [`plan`], applies
//! it, and sleeps. Nothing is remembered between cycles, so external changes to the qdisc or
//! congestion control are undone on the next cycle and an undisturbed cycle performs no
//! writes.

use std::future::Future;

use tokio::time::MissedTickBehavior;
use tracing::Instrument as _;

use crate::{
    interface::Interface,
    kernel::{self, NetKernel},
    options::WatchdogOptions,
    policy::Policy,
    probe,
    select::{self, Selection},
    snapshot::{RootQdisc, Snapshot},
};

/// What to do about the congestion-control algorithm this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CongestionStep {
    /// The selected candidate is already active.
    InPlace(String),
    /// Write `to`, replacing `from` (`None` when the current value is unknown).
    Switch {
        /// Currently active algorithm.
        from: Option<String>,
        /// Selected candidate.
        to: String,
        /// `true` if `to` is not the top preference.
        fallback: bool,
    },
    /// None of the candidates is available; leave the current value alone.
    NoCandidate,
    /// Availability could not be read; never write based on it.
    AvailabilityUnknown,
}

/// Corrections derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// `Some(observed)` if the root qdisc must be replaced.
    pub replace_qdisc: Option<RootQdisc>,
    /// Congestion-control decision.
    pub congestion: CongestionStep,
}

impl Plan {
    /// Returns `true` if the plan contains no write.
    pub fn is_noop(&self) -> bool {
        self.replace_qdisc.is_none() && !matches!(self.congestion, CongestionStep::Switch { .. })
    }
}

/// Compares `snapshot` to `policy`. Pure; performs no kernel access.
///
/// An unknown or absent root qdisc always needs replacing. Unknown or empty availability
/// never leads to a congestion-control write.
pub fn plan(snapshot: &Snapshot, policy: &Policy) -> Plan {
    let replace_qdisc = match snapshot.root_qdisc.kind() {
        Some(kind) if policy.qdisc.matches(kind) => None,
        _ => Some(snapshot.root_qdisc.clone()),
    };

    let congestion = match snapshot.known_available() {
        None => CongestionStep::AvailabilityUnknown,
        Some(available) => match select::select(available, policy.congestion.candidates()) {
            Selection::None => CongestionStep::NoCandidate,
            selection @ Selection::Candidate { name, .. } => {
                if snapshot.congestion_control.as_deref() == Some(name) {
                    CongestionStep::InPlace(name.to_owned())
                } else {
                    CongestionStep::Switch {
                        from: snapshot.congestion_control.clone(),
                        to: name.to_owned(),
                        fallback: selection.is_fallback(),
                    }
                }
            }
        },
    };

    Plan { replace_qdisc, congestion }
}

/// Result of one correction attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do.
    #[default]
    Unchanged,
    /// A correction was written.
    Corrected,
    /// A correction was attempted and failed; it will be retried next cycle.
    Failed,
    /// A correction may be needed but the data to decide was missing.
    Skipped,
}

impl Outcome {
    /// Returns `true` if a write was attempted.
    pub const fn attempted(self) -> bool {
        matches!(self, Self::Corrected | Self::Failed)
    }
}

/// Summary of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// State observed at the start of the cycle.
    pub snapshot: Snapshot,
    /// Root qdisc correction.
    pub qdisc: Outcome,
    /// Congestion-control correction.
    pub congestion: Outcome,
}

impl CycleReport {
    /// Number of writes attempted during the cycle.
    pub fn attempted_writes(&self) -> usize {
        usize::from(self.qdisc.attempted()) + usize::from(self.congestion.attempted())
    }
}

/// Keeps the policy applied to one interface.
#[derive(Debug)]
pub struct Reconciler<K> {
    kernel: K,
    iface: Interface,
    policy: Policy,
    options: WatchdogOptions,
}

impl<K: NetKernel> Reconciler<K> {
    /// Creates a reconciler with default options.
    pub fn new(kernel: K, iface: Interface, policy: Policy) -> Self {
        Self { kernel, iface, policy, options: WatchdogOptions::default() }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: WatchdogOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs one probe-plan-apply cycle. Failures are logged and reported, never returned.
    pub async fn cycle(&self) -> CycleReport {
        let snapshot = probe::probe(&self.kernel, &self.iface).await;
        let plan = plan(&snapshot, &self.policy);

        let qdisc = match &plan.replace_qdisc {
            None => Outcome::Unchanged,
            Some(observed) => self.replace_qdisc(observed).await,
        };
        let congestion = self.apply_congestion(&plan.congestion).await;

        CycleReport { snapshot, qdisc, congestion }
    }

    /// Runs cycles every [`WatchdogOptions::interval`] until `shutdown` completes. The first
    /// cycle starts immediately; a cycle in progress is finished before stopping.
    pub async fn run<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let span = tracing::info_span!("watchdog", iface = %self.iface);

        async move {
            tracing::info!(
                qdisc = %self.policy.qdisc,
                congestion = ?self.policy.congestion.candidates(),
                interval = ?self.options.interval,
                "watchdog started"
            );

            let mut ticker = tokio::time::interval(self.options.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tokio::pin!(shutdown);

            let mut n: u64 = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => {}
                }

                n += 1;
                let report = self.cycle().instrument(tracing::debug_span!("cycle", n)).await;
                if report.attempted_writes() > 0 {
                    tracing::debug!(
                        n,
                        qdisc = ?report.qdisc,
                        congestion = ?report.congestion,
                        "cycle applied corrections"
                    );
                }
            }

            tracing::info!(cycles = n, "shutdown requested, watchdog stopped");
        }
        .instrument(span)
        .await
    }

    async fn replace_qdisc(&self, observed: &RootQdisc) -> Outcome {
        let desired = &self.policy.qdisc;

        match self.try_replace_qdisc().await {
            Ok(()) => {
                tracing::info!(iface = %self.iface, %observed, %desired, "root qdisc replaced");
                Outcome::Corrected
            }
            Err(e) => {
                tracing::error!(
                    iface = %self.iface,
                    %observed,
                    %desired,
                    error = %e,
                    "failed to replace root qdisc"
                );
                Outcome::Failed
            }
        }
    }

    async fn try_replace_qdisc(&self) -> kernel::Result<()> {
        let deletion = self.kernel.delete_root_qdisc(&self.iface).await?;
        tracing::debug!(iface = %self.iface, ?deletion, "root qdisc cleared");
        self.kernel.add_root_qdisc(&self.iface, &self.policy.qdisc).await
    }

    async fn apply_congestion(&self, step: &CongestionStep) -> Outcome {
        match step {
            CongestionStep::InPlace(_) => Outcome::Unchanged,
            CongestionStep::AvailabilityUnknown => {
                tracing::warn!("available congestion control unknown, leaving current value");
                Outcome::Skipped
            }
            CongestionStep::NoCandidate => {
                tracing::warn!(
                    candidates = ?self.policy.congestion.candidates(),
                    "no preferred congestion control available, leaving current value"
                );
                Outcome::Skipped
            }
            CongestionStep::Switch { from, to, fallback } => {
                let from = from.as_deref().unwrap_or("<unknown>");
                match self.kernel.set_congestion_control(to).await {
                    Ok(()) => {
                        tracing::info!(
                            observed = from,
                            desired = %to,
                            fallback,
                            "congestion control switched"
                        );
                        Outcome::Corrected
                    }
                    Err(e) => {
                        tracing::error!(
                            observed = from,
                            desired = %to,
                            error = %e,
                            "failed to switch congestion control"
                        );
                        Outcome::Failed
                    }
                }
            }
        }
    }
}
