//! Root queueing discipline management through `tc(8)`.
//!
//! Only the root qdisc of a device is handled here: showing it, deleting it and attaching a
//! new one with integer parameters.
//!
//! ```text
//! $ tc qdisc show dev eth0 root
//! qdisc fq 8001: root refcnt 2 limit 20000p flow_limit 200p buckets 1024 ...
//!       ^^ ^^^^^ ^^^^
//!     kind handle placement
//! ```

use crate::command::{self, Runner};

/// Binary used for every request.
pub const TC: &str = "tc";

/// Error messages `tc qdisc del` prints when there is no root qdisc to remove. The first
/// is printed by modern iproute2 for the implicit default qdisc (handle `0:`), the others
/// by netlink when nothing is attached.
const ABSENT_MARKERS: [&str; 3] =
    ["handle of zero", "No such file or directory", "Cannot find specified qdisc"];

/// A qdisc as listed by `tc qdisc show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QdiscInfo {
    /// Algorithm name, e.g. `fq`, `fq_codel`, `pfifo_fast`, `mq`, `noqueue`.
    pub kind: String,
    /// Handle in `major:` or `major:minor` form.
    pub handle: String,
    /// Whether the qdisc sits at the device root.
    pub root: bool,
}

/// Outcome of a root qdisc deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// A qdisc was attached and has been removed.
    Removed,
    /// Nothing deletable was attached. This counts as success.
    Absent,
}

/// Parses the output of `tc qdisc show dev <dev> root`.
///
/// Returns the root entry, or the first entry if none is marked as root. `None` if the
/// output lists no qdisc at all.
pub fn parse_show(output: &str) -> Option<QdiscInfo> {
    let entries = output.lines().filter_map(parse_line).collect::<Vec<_>>();
    let position = entries.iter().position(|q| q.root).unwrap_or(0);
    entries.into_iter().nth(position)
}

fn parse_line(line: &str) -> Option<QdiscInfo> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "qdisc" {
        return None;
    }
    let kind = tokens.next()?.to_owned();
    let handle = tokens.next()?.to_owned();
    let root = tokens.next() == Some("root");

    Some(QdiscInfo { kind, handle, root })
}

/// Returns `true` if a failed `tc qdisc del` only reported that nothing was attached.
pub fn is_absent(error: &command::Error) -> bool {
    error.stderr().is_some_and(|stderr| ABSENT_MARKERS.iter().any(|m| stderr.contains(m)))
}

/// Reads the root qdisc of `dev`.
pub async fn show_root(runner: &Runner, dev: &str) -> command::Result<Option<QdiscInfo>> {
    let output = runner.run(TC, ["qdisc", "show", "dev", dev, "root"]).await?;
    Ok(parse_show(&output.stdout))
}

/// Deletes the root qdisc of `dev`. A missing qdisc is reported as [`Deletion::Absent`],
/// not as an error.
pub async fn delete_root(runner: &Runner, dev: &str) -> command::Result<Deletion> {
    match runner.run(TC, ["qdisc", "del", "dev", dev, "root"]).await {
        Ok(_) => Ok(Deletion::Removed),
        Err(e) if is_absent(&e) => {
            tracing::debug!(dev, "no root qdisc to delete");
            Ok(Deletion::Absent)
        }
        Err(e) => Err(e),
    }
}

/// Builds the argument list of `tc qdisc add dev <dev> root <kind> [name value]...`.
pub fn add_root_args<'a, I>(dev: &str, kind: &str, params: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut args = ["qdisc", "add", "dev", dev, "root", kind].map(String::from).to_vec();
    for (name, value) in params {
        args.push(name.to_owned());
        args.push(value.to_string());
    }
    args
}

/// Attaches a `kind` qdisc with `params` at the root of `dev`. Fails if a non-default root
/// qdisc is already attached; callers delete first.
pub async fn add_root<'a, I>(
    runner: &Runner,
    dev: &str,
    kind: &str,
    params: I,
) -> command::Result<()>
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    runner.run(TC, add_root_args(dev, kind, params)).await?;
    Ok(())
}
