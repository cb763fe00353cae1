//! One-shot host preparation run by `netkeep-setup`.
//!
//! Every step converges the host towards a compiled-in desired state and is safe to run
//! repeatedly: values that already match are left alone and reported as unchanged. Steps
//! are independent; a failing step is logged and counted, and the next one still runs.

use std::{fmt, io, path::Path};

use netkeep_sys::{command::Runner, sysctl::Sysctl};
use thiserror::Error;
use tracing::Instrument as _;

use crate::{
    kernel::NetKernel,
    options::BootstrapOptions,
    resolve::{ResolveError, Resolver},
};

pub mod conntrack;
pub mod limits;
pub mod offload;
pub mod profile;
pub mod unit;

/// Fatal bootstrap errors. Everything else is counted in the [`Summary`].
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The egress interface could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Result of a single bootstrap action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The host was changed.
    Applied,
    /// The host already matched.
    Unchanged,
    /// The host does not support the action.
    Skipped,
    /// The action failed.
    Failed,
}

/// Outcome counts over one or more steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Actions that changed the host.
    pub applied: usize,
    /// Actions whose target already matched.
    pub unchanged: usize,
    /// Unsupported actions.
    pub skipped: usize,
    /// Failed actions.
    pub failed: usize,
}

impl Summary {
    /// Counts `outcome`.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// Adds the counts of `other`.
    pub fn merge(&mut self, other: Self) {
        self.applied += other.applied;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl FromIterator<Outcome> for Summary {
    fn from_iter<I: IntoIterator<Item = Outcome>>(iter: I) -> Self {
        let mut summary = Self::default();
        iter.into_iter().for_each(|outcome| summary.record(outcome));
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} unchanged, {} skipped, {} failed",
            self.applied, self.unchanged, self.skipped, self.failed
        )
    }
}

/// Whether [`write_if_changed`] touched the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    /// The file was created or its content replaced.
    Changed,
    /// The file already had the desired content.
    Unchanged,
}

impl From<Written> for Outcome {
    fn from(value: Written) -> Self {
        match value {
            Written::Changed => Self::Applied,
            Written::Unchanged => Self::Unchanged,
        }
    }
}

/// Writes `contents` to `path` unless it already holds exactly that. Missing parent
/// directories are created.
pub async fn write_if_changed(path: &Path, contents: &str) -> io::Result<Written> {
    match tokio::fs::read_to_string(path).await {
        Ok(current) if current == contents => return Ok(Written::Unchanged),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(Written::Changed)
}

/// Runs every bootstrap step once.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    options: BootstrapOptions,
    runner: Runner,
    sysctl: Sysctl,
}

impl Bootstrap {
    /// Creates a bootstrap from `options`.
    pub fn new(options: BootstrapOptions) -> Self {
        let runner = Runner::new(options.command_timeout);
        let sysctl = Sysctl::with_root(&options.sysctl_root);
        Self { options, runner, sysctl }
    }

    /// Resolves the interface, then applies the sysctl profile, limits, conntrack, offloads
    /// and the service unit.
    ///
    /// Only a failed interface resolution is returned as an error. The interface-independent
    /// steps still run in that case.
    pub async fn run<K>(&self, kernel: &K) -> Result<Summary, BootstrapError>
    where
        K: NetKernel + ?Sized,
    {
        let resolver = Resolver::new(kernel).with_options(self.options.resolver.clone());
        let iface = resolver.resolve().await;
        if let Err(e) = &iface {
            tracing::error!(error = %e, "interface resolution failed, offloads will be skipped");
        }

        let mut summary = Summary::default();

        summary.merge(
            profile::apply(&self.sysctl, profile::GATEWAY)
                .instrument(tracing::info_span!("step", name = "profile"))
                .await,
        );
        summary.merge(
            limits::apply(&self.options.limits_path, &self.sysctl)
                .instrument(tracing::info_span!("step", name = "limits"))
                .await,
        );
        summary.merge(
            conntrack::apply(&self.runner, &self.sysctl, &self.options)
                .instrument(tracing::info_span!("step", name = "conntrack"))
                .await,
        );
        if let Ok(iface) = &iface {
            summary.merge(
                offload::apply(&self.runner, &self.options.tools.ethtool, iface)
                    .instrument(tracing::info_span!("step", name = "offload", %iface))
                    .await,
            );
        }
        summary.merge(
            unit::apply(&self.runner, &self.options)
                .instrument(tracing::info_span!("step", name = "unit"))
                .await,
        );

        tracing::info!(
            applied = summary.applied,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            failed = summary.failed,
            "bootstrap finished"
        );

        iface?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_if_changed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/file.conf");

        assert_eq!(write_if_changed(&path, "a = 1\n").await.unwrap(), Written::Changed);
        assert_eq!(write_if_changed(&path, "a = 1\n").await.unwrap(), Written::Unchanged);
        assert_eq!(write_if_changed(&path, "a = 2\n").await.unwrap(), Written::Changed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a = 2\n");
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary: Summary =
            [Outcome::Applied, Outcome::Applied, Outcome::Skipped].into_iter().collect();
        summary.merge([Outcome::Failed, Outcome::Unchanged].into_iter().collect());

        assert_eq!(summary, Summary { applied: 2, unchanged: 1, skipped: 1, failed: 1 });
        assert_eq!(summary.to_string(), "2 applied, 1 unchanged, 1 skipped, 1 failed");
    }
}
