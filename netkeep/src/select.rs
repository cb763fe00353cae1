//! Ranked candidate selection.

use std::collections::BTreeSet;

/// Result of walking a preference list against what the kernel offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    /// The first available candidate and its rank (0 is the most preferred).
    Candidate {
        /// Candidate name.
        name: &'a str,
        /// Position in the preference list.
        rank: usize,
    },
    /// No candidate is available.
    None,
}

impl<'a> Selection<'a> {
    /// The selected name, if any.
    pub const fn name(self) -> Option<&'a str> {
        match self {
            Self::Candidate { name, .. } => Some(name),
            Self::None => None,
        }
    }

    /// Returns `true` if the selection is a fallback rather than the top preference.
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::Candidate { rank, .. } if rank > 0)
    }
}

/// Returns the first entry of `preference` present in `available`.
pub fn select<'a, S>(available: &BTreeSet<String>, preference: &'a [S]) -> Selection<'a>
where
    S: AsRef<str>,
{
    preference
        .iter()
        .map(AsRef::as_ref)
        .enumerate()
        .find(|(_, name)| available.contains(*name))
        .map_or(Selection::None, |(rank, name)| Selection::Candidate { name, rank })
}
