//! Reports catalogs and the outcome of applying them.
//!
//! As with any output that can interleave with log lines, the real [Reporter] locks stdout and
//! stderr just before writing and releases them as soon as it is done. The writing itself happens
//! in functions that accept any writers, which lets the tests capture the output.

use crate::apply::{Change, Outcome};
use crate::core::resource::Resource;
use crate::core::Catalog;
use std::io::{self, Write};
use std::ops::DerefMut;

/// Prints feedback about a run to stdout/stderr to keep the user informed.
pub trait Report {
    /// Lists the resources of a catalog.
    fn catalog(&mut self, catalog: &Catalog) -> io::Result<()>;

    /// Reports what a run changed and what failed.
    fn outcome(&mut self, outcome: &Outcome, noop: bool) -> io::Result<()>;
}

/// The real, production-ready [Report] implementation. Uses the real stdout/stderr.
#[derive(Clone, Debug)]
pub struct Reporter;

impl Report for Reporter {
    fn catalog(&mut self, catalog: &Catalog) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        _catalog(&mut stdout, catalog)
    }

    fn outcome(&mut self, outcome: &Outcome, noop: bool) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        let mut stderr = io::stderr().lock();
        _outcome(&mut stdout, &mut stderr, outcome, noop)
    }
}

/// Generates a one-line identifier for a [Resource], suitable for use as its title in user
/// output.
pub fn title(resource: &Resource) -> String {
    use Resource::*;
    match resource {
        User { login, ensure, .. } => format!("user ({ensure}): {login}"),
        Directory { path, mode, .. } => format!("directory ({mode}): {}", path.display()),
        File { path, mode, .. } => format!("file ({mode}): {}", path.display()),
        Concat { path, mode, .. } => format!("concat ({mode}): {}", path.display()),
        Fragment(fragment) => format!(
            "fragment ({:02}): {} -> {}",
            fragment.order,
            fragment.name,
            fragment.target.display(),
        ),
        AuthorizedKey {
            member,
            comment,
            user,
            key_type,
            ..
        } => format!("authorized_key ({user}): {member} {key_type} {comment}")
            .trim_end()
            .to_string(),
        SshdSetting { keyword, value } => format!("sshd_config: {keyword} {value}"),
        SshdAcceptEnv { name } => format!("sshd_config: AcceptEnv {name}"),
        PurgeAuthorizedKeys { target, keep } => format!(
            "purge_authorized_keys ({} kept): {}",
            keep.len(),
            target.display(),
        ),
    }
}

/// A testable function containing the logic for listing a [Catalog].
pub fn _catalog<OT: Write, O: DerefMut<Target = OT>>(
    mut stdout: O,
    catalog: &Catalog,
) -> io::Result<()> {
    for resource in catalog {
        writeln!(&mut stdout, "{}", title(resource))?;
    }
    Ok(())
}

/// A testable function containing the logic for reporting an [Outcome].
pub fn _outcome<OT: Write, ET: Write, O: DerefMut<Target = OT>, E: DerefMut<Target = ET>>(
    mut stdout: O,
    mut stderr: E,
    outcome: &Outcome,
    noop: bool,
) -> io::Result<()> {
    let verb = if noop { "Would change" } else { "Changed" };
    for Change { resource, message } in &outcome.changes {
        writeln!(&mut stdout, "{verb} {resource}: {message}")?;
    }

    for (resource, error) in &outcome.failures {
        writeln!(&mut stderr, "Failed {resource}: {error:#}")?;
    }

    match (outcome.changes.len(), outcome.failures.len()) {
        (0, 0) => writeln!(&mut stdout, "Nothing to do.")?,
        (changes, 0) => writeln!(&mut stdout, "{changes} change(s).")?,
        (changes, failures) => writeln!(
            &mut stderr,
            "{changes} change(s), {failures} failure(s).",
        )?,
    }
    Ok(())
}

#[cfg(test)]
mod test;
