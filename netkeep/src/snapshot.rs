use std::{collections::BTreeSet, fmt};

/// What the prober saw at the device root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootQdisc {
    /// A qdisc of this kind is attached.
    Attached(String),
    /// The kernel listed no root qdisc.
    Absent,
    /// The query failed.
    Unknown,
}

impl RootQdisc {
    /// The attached kind, if known.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Attached(kind) => Some(kind),
            Self::Absent | Self::Unknown => None,
        }
    }
}

impl fmt::Display for RootQdisc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attached(kind) => f.write_str(kind),
            Self::Absent => f.write_str("<absent>"),
            Self::Unknown => f.write_str("<unknown>"),
        }
    }
}

/// Observed kernel state for one reconciliation cycle. Built fresh by every probe and never
/// carried over to the next cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Root qdisc of the managed interface.
    pub root_qdisc: RootQdisc,
    /// Active congestion-control algorithm, `None` if the read failed.
    pub congestion_control: Option<String>,
    /// Algorithms the kernel offers, `None` if the read failed.
    pub available: Option<BTreeSet<String>>,
}

impl Snapshot {
    /// A snapshot where every query failed.
    pub const fn unknown() -> Self {
        Self { root_qdisc: RootQdisc::Unknown, congestion_control: None, available: None }
    }

    /// Available algorithms, treating an empty list the same as a failed read.
    pub fn known_available(&self) -> Option<&BTreeSet<String>> {
        self.available.as_ref().filter(|set| !set.is_empty())
    }
}
