//! Keeps a gateway's egress queueing discipline and TCP congestion control on policy.
//!
//! The watchdog (`netkeepd`) resolves the egress interface once with a [`Resolver`], then
//! runs a level-triggered [`Reconciler`]: every cycle it probes the kernel into a
//! [`Snapshot`], derives corrections with [`plan`] and applies them. The
//! one-shot [`Bootstrap`] (`netkeep-setup`) prepares the host: sysctl profile, limits,
//! conntrack, offloads and the service unit.
//!
//! All kernel access goes through the [`NetKernel`] trait so that decision logic can be
//! driven without a live kernel.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod backoff;
pub mod bootstrap;
/// Validated device names.
pub mod interface;
pub mod kernel;
pub mod options;
pub mod policy;
pub mod probe;
pub mod reconcile;
pub mod resolve;
pub mod select;
pub mod shutdown;
/// Observed kernel state.
pub mod snapshot;
pub mod telemetry;

pub use bootstrap::{Bootstrap, BootstrapError, Summary};
pub use interface::Interface;
pub use kernel::{LinuxKernel, NetKernel};
pub use options::{BootstrapOptions, ResolverOptions, Tools, WatchdogOptions};
pub use policy::{CongestionPolicy, Policy, PolicyError, QdiscKind, QdiscSpec};
pub use reconcile::{plan, CycleReport, Plan, Reconciler};
pub use resolve::{ResolveError, Resolver};
pub use select::{select, Selection};
pub use snapshot::{RootQdisc, Snapshot};

/// Value of the `source` field carried by every log event, and the syslog identifier of
/// the service unit.
pub const LOG_SOURCE: &str = "netkeep";
