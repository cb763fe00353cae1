//! Offload feature toggles through `ethtool -K`.

use std::fmt;

use crate::command::{self, Runner};

/// Default binary.
pub const ETHTOOL: &str = "ethtool";

/// Offload features that can be toggled per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Offload {
    /// Generic receive offload.
    Gro,
    /// Generic segmentation offload.
    Gso,
    /// TCP segmentation offload.
    Tso,
    /// Large receive offload. Breaks forwarding on most drivers.
    Lro,
}

impl Offload {
    /// The short flag name `ethtool -K` expects.
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Gro => "gro",
            Self::Gso => "gso",
            Self::Tso => "tso",
            Self::Lro => "lro",
        }
    }
}

impl fmt::Display for Offload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// Turns `offload` on or off for `dev` through the `ethtool` compatible `program`.
pub async fn set(
    runner: &Runner,
    program: &str,
    dev: &str,
    offload: Offload,
    enabled: bool,
) -> command::Result<()> {
    let state = if enabled { "on" } else { "off" };
    runner.run(program, ["-K", dev, offload.flag(), state]).await?;
    Ok(())
}
