//! File-descriptor and process limits.

use std::path::Path;

use netkeep_sys::sysctl::{Fs, Param, Sysctl};

use super::{profile, profile::Setting, write_if_changed, Outcome, Summary};

/// Per-process open file limit granted to every user.
pub const NOFILE: u64 = 1_048_576;

/// Per-user process limit.
pub const NPROC: u64 = 65_535;

/// System-wide ceilings. `fs.nr_open` must stay at or above [`NOFILE`].
pub const FS: &[Setting] = &[
    Setting::new(Param::Fs(Fs::FileMax), "2097152"),
    Setting::new(Param::Fs(Fs::NrOpen), "2097152"),
];

/// Renders the `limits.d` drop-in.
pub fn render() -> String {
    let mut out = String::from("# Managed by netkeep-setup. Local edits are overwritten.\n");
    for domain in ["*", "root"] {
        for (item, value) in [("nofile", NOFILE), ("nproc", NPROC)] {
            for kind in ["soft", "hard"] {
                out.push_str(&format!("{domain:<6}{kind:<6}{item:<8}{value}\n"));
            }
        }
    }
    out
}

/// Writes the limits file at `path` when its content differs, then applies [`FS`].
pub async fn apply(path: &Path, sysctl: &Sysctl) -> Summary {
    let outcome = match write_if_changed(path, &render()).await {
        Ok(written) => {
            tracing::info!(path = %path.display(), ?written, "limits file");
            Outcome::from(written)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to write limits file");
            Outcome::Failed
        }
    };

    let mut summary = Summary::default();
    summary.record(outcome);
    summary.merge(profile::apply(sysctl, FS).await);
    summary
}
