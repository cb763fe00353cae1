//! Typed access to the parts of the Linux networking configuration surface that `netkeep`
//! reads and writes: sysctl tunables, root qdiscs, devices and routes, offload flags and
//! kernel modules.
//!
//! Everything that shells out goes through [`command::Runner`], which bounds each call with
//! a timeout.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod command;
pub mod ethtool;
pub mod link;
pub mod module;
pub mod sysctl;
pub mod tc;
