//! Desired state: which root qdisc to keep attached and which congestion-control algorithms
//! to prefer.

use std::{collections::BTreeMap, fmt, str::FromStr};

use thiserror::Error;

/// Errors raised while building a [`Policy`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The qdisc algorithm is not one netkeep knows how to configure.
    #[error("unknown qdisc algorithm {0:?}")]
    UnknownQdisc(String),
    /// The parameter is not accepted by the chosen qdisc.
    #[error("qdisc {kind} does not accept parameter {name:?} (accepted: {accepted})")]
    UnknownParameter {
        /// Qdisc the parameter was given to.
        kind: QdiscKind,
        /// Offending parameter name.
        name: String,
        /// Comma-separated accepted names.
        accepted: String,
    },
    /// The congestion-control preference list is empty.
    #[error("congestion control preference list is empty")]
    NoCandidates,
    /// A candidate name is empty or contains whitespace.
    #[error("invalid congestion control name {0:?}")]
    InvalidCandidate(String),
    /// The same candidate is listed twice.
    #[error("congestion control {0:?} listed more than once")]
    DuplicateCandidate(String),
}

/// Queueing disciplines netkeep can attach at a device root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QdiscKind {
    /// Fair queueing with per-flow pacing. The usual companion of BBR.
    Fq,
    /// Fair queueing with CoDel AQM.
    FqCodel,
    /// Common Applications Kept Enhanced.
    Cake,
    /// Three-band priority FIFO, the historical default.
    PfifoFast,
}

impl QdiscKind {
    /// Every supported kind.
    pub const ALL: [Self; 4] = [Self::Fq, Self::FqCodel, Self::Cake, Self::PfifoFast];

    /// Name as understood by `tc`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fq => "fq",
            Self::FqCodel => "fq_codel",
            Self::Cake => "cake",
            Self::PfifoFast => "pfifo_fast",
        }
    }

    /// Integer-valued parameters the algorithm accepts.
    pub const fn accepted_parameters(self) -> &'static [&'static str] {
        match self {
            Self::Fq => {
                &["limit", "flow_limit", "quantum", "initial_quantum", "buckets", "orphan_mask"]
            }
            Self::FqCodel => &["limit", "flows", "quantum", "memory_limit", "drop_batch"],
            Self::Cake => &["overhead", "mpu", "memlimit"],
            Self::PfifoFast => &[],
        }
    }

    /// Returns `true` if `name` is an accepted parameter.
    pub fn accepts(self, name: &str) -> bool {
        self.accepted_parameters().contains(&name)
    }
}

impl fmt::Display for QdiscKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QdiscKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| PolicyError::UnknownQdisc(s.to_owned()))
    }
}

/// Desired root qdisc: an algorithm and its validated integer parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QdiscSpec {
    kind: QdiscKind,
    params: BTreeMap<String, u64>,
}

impl QdiscSpec {
    /// A spec for `kind` with kernel default parameters.
    pub fn new(kind: QdiscKind) -> Self {
        Self { kind, params: BTreeMap::new() }
    }

    /// Parses an algorithm name and its parameters, rejecting anything the algorithm does
    /// not accept.
    pub fn parse<'a, I>(kind: &str, params: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        params.into_iter().try_fold(Self::new(kind.parse()?), |spec, (name, value)| {
            spec.with_param(name, value)
        })
    }

    /// Sets parameter `name`. Unknown parameters are an error, never silently dropped.
    pub fn with_param(mut self, name: &str, value: u64) -> Result<Self, PolicyError> {
        if !self.kind.accepts(name) {
            return Err(PolicyError::UnknownParameter {
                kind: self.kind,
                name: name.to_owned(),
                accepted: self.kind.accepted_parameters().join(", "),
            });
        }
        self.params.insert(name.to_owned(), value);
        Ok(self)
    }

    /// The algorithm.
    pub const fn kind(&self) -> QdiscKind {
        self.kind
    }

    /// Parameters in name order.
    pub fn params(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.params.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Value of parameter `name`, if set.
    pub fn param(&self, name: &str) -> Option<u64> {
        self.params.get(name).copied()
    }

    /// Returns `true` if an observed qdisc kind satisfies this spec.
    pub fn matches(&self, observed: &str) -> bool {
        self.kind.name() == observed
    }
}

impl fmt::Display for QdiscSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.name())?;
        for (name, value) in self.params() {
            write!(f, " {name} {value}")?;
        }
        Ok(())
    }
}

/// Ordered congestion-control preference, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CongestionPolicy {
    candidates: Vec<String>,
}

impl CongestionPolicy {
    /// Builds a preference list. It must be non-empty, without blanks or duplicates.
    pub fn new<I, S>(candidates: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for candidate in candidates {
            let candidate = candidate.into();
            if candidate.is_empty() || candidate.contains(char::is_whitespace) {
                return Err(PolicyError::InvalidCandidate(candidate));
            }
            if list.contains(&candidate) {
                return Err(PolicyError::DuplicateCandidate(candidate));
            }
            list.push(candidate);
        }

        if list.is_empty() {
            return Err(PolicyError::NoCandidates);
        }

        Ok(Self { candidates: list })
    }

    /// Candidates in preference order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// The most preferred candidate.
    pub fn preferred(&self) -> &str {
        &self.candidates[0]
    }
}

/// Complete desired state. Immutable for the lifetime of the watchdog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Root qdisc to keep attached.
    pub qdisc: QdiscSpec,
    /// Congestion-control preference.
    pub congestion: CongestionPolicy,
}

impl Policy {
    /// Creates a policy from its parts.
    pub fn new(qdisc: QdiscSpec, congestion: CongestionPolicy) -> Self {
        Self { qdisc, congestion }
    }

    /// The compiled-in gateway policy: `fq limit 20000 flow_limit 200`, preferring
    /// `bbrplus` and falling back to `bbr`.
    pub fn gateway_default() -> Result<Self, PolicyError> {
        let qdisc = QdiscSpec::parse("fq", [("limit", 20_000), ("flow_limit", 200)])?;
        let congestion = CongestionPolicy::new(["bbrplus", "bbr"])?;
        Ok(Self::new(qdisc, congestion))
    }
}
