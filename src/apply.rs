//! Converges a host to match a [Catalog].
//!
//! Every resource is compared against what is actually on the host, and only the differences are
//! acted upon. Running [apply] twice with the same catalog makes no changes the second time.
//!
//! Files are written below [Options::root], which is `/` in production. The account database,
//! ownership, and services are reached through the [System] trait, so that the same logic can run
//! against a scratch directory and a fake account database.

pub mod line_in_file;

use crate::client;
use crate::core::fragment::assemble;
use crate::core::resource::{Ensure, Mode, Resource};
use crate::core::Catalog;
use crate::facts::Profile;
use crate::sysadmin::ATTRIBUTION_VAR;
use anyhow::{anyhow, bail, Context};
use line_in_file::LineInFile;
use regex::Regex;
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, Permissions};
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// The mode of every `authorized_keys` file. `sshd` refuses keys in files others can write.
const AUTHORIZED_KEYS_MODE: Mode = Mode::new(0o600);

/// Matches the start of an `sshd_config` Match block. Settings must be inserted above it, or they
/// would only apply within the block.
const SSHD_MATCH_BLOCK: &str = r"(?i)^\s*Match\s";

/// An account as recorded in the host's account database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub home: PathBuf,
    pub shell: String,

    /// Supplementary groups. The primary group is not listed.
    pub groups: Vec<String>,
}

impl Account {
    /// Whether `self` and `other` list the same groups, in any order.
    fn same_groups(&self, other: &Account) -> bool {
        let mut mine = self.groups.clone();
        let mut theirs = other.groups.clone();
        mine.sort();
        mine.dedup();
        theirs.sort();
        theirs.dedup();
        mine == theirs
    }
}

/// The host facilities that [apply] cannot reach through the filesystem alone.
pub trait System {
    /// Looks up an account. Returns [None] if there is no such account.
    fn account(&self, login: &str) -> anyhow::Result<Option<Account>>;

    /// Creates an account with a primary group of the same name.
    fn add_account(&mut self, login: &str, account: &Account) -> anyhow::Result<()>;

    /// Makes an existing account match `account`.
    fn modify_account(&mut self, login: &str, account: &Account) -> anyhow::Result<()>;

    /// Removes an account. Its home directory must be left in place.
    fn remove_account(&mut self, login: &str) -> anyhow::Result<()>;

    /// Returns the owner and group of `path`.
    fn owner(&self, path: &Path) -> anyhow::Result<(String, String)>;

    fn chown(&mut self, path: &Path, owner: &str, group: &str) -> anyhow::Result<()>;

    /// Tells a service to reread its configuration.
    fn reload_service(&mut self, name: &str) -> anyhow::Result<()>;
}

/// The real [System], driven by the standard account utilities.
#[derive(Clone, Debug, Default)]
pub struct LocalSystem;

impl LocalSystem {
    /// Queries a `getent` database. Returns [None] if `key` is not in it.
    fn getent(database: &str, key: Option<&str>) -> anyhow::Result<Option<String>> {
        let mut command = Command::new("getent");
        command.arg(database);
        command.args(key);
        let output = command
            .output()
            .with_context(|| format!("failed to start command: getent {database}"))?;
        match output.status.code() {
            Some(0) => Ok(Some(String::from_utf8(output.stdout)?)),
            // getent's exit code for a key that was not found.
            Some(2) => Ok(None),
            _ => bail!(
                "getent {database} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            ),
        }
    }
}

impl System for LocalSystem {
    fn account(&self, login: &str) -> anyhow::Result<Option<Account>> {
        let Some(passwd) = Self::getent("passwd", Some(login))? else {
            return Ok(None);
        };
        // name:password:uid:gid:gecos:home:shell
        let fields: Vec<&str> = passwd.trim_end().split(':').collect();
        if fields.len() != 7 {
            bail!("unexpected passwd entry for {login}: {passwd}");
        }

        // name:password:gid:member,member
        let groups = Self::getent("group", None)?.unwrap_or_default();
        let groups = groups
            .lines()
            .filter_map(|line| {
                let mut fields = line.split(':');
                let name = fields.next()?;
                let members = fields.nth(2)?;
                members
                    .split(',')
                    .any(|member| member == login)
                    .then(|| name.to_string())
            })
            .collect();

        Ok(Some(Account {
            home: PathBuf::from(fields[5]),
            shell: fields[6].to_string(),
            groups,
        }))
    }

    fn add_account(&mut self, login: &str, account: &Account) -> anyhow::Result<()> {
        let home = account.home.to_string_lossy();
        let groups = account.groups.join(",");
        let mut args = vec![
            "--create-home",
            "--user-group",
            "--home-dir",
            home.as_ref(),
            "--shell",
            account.shell.as_str(),
        ];
        if !groups.is_empty() {
            args.extend(["--groups", groups.as_str()]);
        }
        args.push(login);
        client::run("useradd", &args)
    }

    fn modify_account(&mut self, login: &str, account: &Account) -> anyhow::Result<()> {
        let home = account.home.to_string_lossy();
        let groups = account.groups.join(",");
        client::run(
            "usermod",
            &[
                "--home",
                home.as_ref(),
                "--shell",
                account.shell.as_str(),
                "--groups",
                groups.as_str(),
                login,
            ],
        )
    }

    fn remove_account(&mut self, login: &str) -> anyhow::Result<()> {
        // Never --remove: the home directory outlives the account.
        client::run("userdel", &[login])
    }

    fn owner(&self, path: &Path) -> anyhow::Result<(String, String)> {
        let output = client::output(
            "stat",
            &[OsStr::new("-c"), OsStr::new("%U:%G"), path.as_os_str()],
        )?;
        let (owner, group) = output
            .trim_end()
            .split_once(':')
            .ok_or_else(|| anyhow!("unexpected output from stat: {output}"))?;
        Ok((owner.to_string(), group.to_string()))
    }

    fn chown(&mut self, path: &Path, owner: &str, group: &str) -> anyhow::Result<()> {
        let spec = format!("{owner}:{group}");
        client::run("chown", &[OsStr::new(&spec), path.as_os_str()])
    }

    fn reload_service(&mut self, name: &str) -> anyhow::Result<()> {
        client::run("systemctl", &["reload", name])
    }
}

/// How [apply] reaches and treats the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Prefix for every path in the catalog.
    pub root: PathBuf,

    /// Report what would change without changing anything.
    pub noop: bool,

    pub sshd_config: PathBuf,
    pub sshd_service: String,
}

impl Options {
    /// Options for converging the running host.
    pub fn new(profile: &Profile) -> Self {
        Options {
            root: PathBuf::from("/"),
            noop: false,
            sshd_config: PathBuf::from(profile.sshd_config),
            sshd_service: profile.sshd_service.to_string(),
        }
    }
}

/// One difference that [apply] found and fixed (or, in no-op mode, would have fixed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    /// The [Resource::id] of the changed resource.
    pub resource: String,
    pub message: String,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.message)
    }
}

/// What happened during one [apply] run.
#[derive(Debug, Default)]
pub struct Outcome {
    pub changes: Vec<Change>,

    /// Resources that failed or were skipped because something they depend on failed, with the
    /// reason.
    pub failures: Vec<(String, anyhow::Error)>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Converges the host to match `catalog`.
///
/// Resources are applied in declaration order. If the account itself cannot be converged,
/// nothing else is attempted. Otherwise, a failed resource causes every later resource below the
/// same path to be skipped, while unrelated resources are still applied. If any `sshd_config`
/// line changed, the SSH service is reloaded once at the end.
pub fn apply<S: System>(catalog: &Catalog, system: &mut S, options: &Options) -> Outcome {
    let mut converger = Converger {
        catalog,
        system,
        options,
        changes: Vec::new(),
        sshd_changed: false,
    };
    let mut failures = Vec::new();
    let mut failed_paths: Vec<PathBuf> = Vec::new();

    for resource in catalog {
        let id = resource.id();

        if let Some(path) = resource.path() {
            if let Some(failed) = failed_paths.iter().find(|f| path.starts_with(f)) {
                warn!(resource = %id, "skipped");
                failures.push((id, anyhow!("skipped because {} failed", failed.display())));
                continue;
            }
        }

        if let Err(error) = converger.resource(&id, resource) {
            warn!(resource = %id, "{error:#}");
            failures.push((id, error));
            match resource.path() {
                Some(path) => failed_paths.push(path.to_path_buf()),
                None if matches!(resource, Resource::User { .. }) => {
                    return Outcome {
                        changes: converger.changes,
                        failures,
                    };
                }
                None => {}
            }
        }
    }

    if converger.sshd_changed {
        let service = &options.sshd_service;
        let id = format!("service:{service}");
        if let Err(error) = converger.change(&id, "reloaded".into(), |s| s.reload_service(service))
        {
            failures.push((id, error));
        }
    }

    Outcome {
        changes: converger.changes,
        failures,
    }
}

/// The state of one [apply] run.
struct Converger<'a, S: System> {
    catalog: &'a Catalog,
    system: &'a mut S,
    options: &'a Options,
    changes: Vec<Change>,
    sshd_changed: bool,
}

impl<S: System> Converger<'_, S> {
    /// Where `path` lives below [Options::root].
    fn host_path(&self, path: &Path) -> PathBuf {
        self.options
            .root
            .join(path.strip_prefix("/").unwrap_or(path))
    }

    /// Records a change, performing it unless this is a no-op run.
    fn change(
        &mut self,
        id: &str,
        message: String,
        action: impl FnOnce(&mut S) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        if !self.options.noop {
            action(&mut *self.system)?;
        }
        debug!(resource = id, "{message}");
        self.changes.push(Change {
            resource: id.to_string(),
            message,
        });
        Ok(())
    }

    fn resource(&mut self, id: &str, resource: &Resource) -> anyhow::Result<()> {
        use Resource::*;
        match resource {
            User {
                login,
                ensure,
                groups,
                home,
                shell,
            } => {
                let desired = Account {
                    home: home.clone(),
                    shell: shell.clone(),
                    groups: groups.clone(),
                };
                self.user(id, login, *ensure, &desired)
            }
            Directory {
                path,
                owner,
                group,
                mode,
                recurse,
                force,
            } => self.directory(id, path, owner, group, *mode, *recurse, *force),
            File {
                path,
                owner,
                group,
                mode,
                content,
            } => self.file(id, path, owner, group, *mode, content),
            Concat {
                path,
                owner,
                group,
                mode,
            } => {
                let content = assemble(self.catalog.fragments_for(path));
                self.file(id, path, owner, group, *mode, &content)
            }
            // Fragments are written by their Concat.
            Fragment(_) => Ok(()),
            AuthorizedKey {
                user, target, key, ..
            } => {
                let line = resource
                    .authorized_keys_line()
                    .ok_or_else(|| anyhow!("not an authorized key: {id}"))?;
                self.authorized_key(id, user, target, key, &line)
            }
            SshdSetting { keyword, value } => {
                let pattern = Regex::new(&format!(r"(?i)^\s*{}\b", regex::escape(keyword)))?;
                let line = format!("{keyword} {value}");
                self.sshd_line(id, &line, Some(&pattern))
            }
            SshdAcceptEnv { name } => self.accept_env(id, name),
            PurgeAuthorizedKeys { target, keep } => self.purge_authorized_keys(id, target, keep),
        }
    }

    fn user(
        &mut self,
        id: &str,
        login: &str,
        ensure: Ensure,
        desired: &Account,
    ) -> anyhow::Result<()> {
        let current = self
            .system
            .account(login)
            .with_context(|| format!("could not look up account {login}"))?;
        match (ensure, current) {
            (Ensure::Present, None) => {
                self.change(id, "created".into(), |s| s.add_account(login, desired))
            }
            (Ensure::Present, Some(current)) => {
                let mut differences = Vec::new();
                if current.home != desired.home {
                    differences.push(format!(
                        "home {} -> {}",
                        current.home.display(),
                        desired.home.display()
                    ));
                }
                if current.shell != desired.shell {
                    differences.push(format!("shell {} -> {}", current.shell, desired.shell));
                }
                if !current.same_groups(desired) {
                    differences.push(format!(
                        "groups [{}] -> [{}]",
                        current.groups.join(","),
                        desired.groups.join(",")
                    ));
                }
                if differences.is_empty() {
                    return Ok(());
                }
                self.change(id, differences.join(", "), |s| {
                    s.modify_account(login, desired)
                })
            }
            (Ensure::Absent, Some(_)) => self.change(
                id,
                "removed; home directory left in place".into(),
                |s| s.remove_account(login),
            ),
            (Ensure::Absent, None) => Ok(()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn directory(
        &mut self,
        id: &str,
        path: &Path,
        owner: &str,
        group: &str,
        mode: Mode,
        recurse: bool,
        force: bool,
    ) -> anyhow::Result<()> {
        let host_path = self.host_path(path);
        let create = |s: &mut S| -> anyhow::Result<()> {
            fs::create_dir(&host_path)
                .with_context(|| format!("could not create {}", host_path.display()))?;
            fs::set_permissions(&host_path, Permissions::from_mode(mode.bits()))?;
            s.chown(&host_path, owner, group)
        };

        match fs::symlink_metadata(&host_path) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) if force => {
                return self.change(id, format!("replaced non-directory, mode {mode}"), |s| {
                    fs::remove_file(&host_path)
                        .with_context(|| format!("could not remove {}", host_path.display()))?;
                    create(s)
                });
            }
            Ok(_) => bail!("{} exists and is not a directory", host_path.display()),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return self.change(id, format!("created, mode {mode}"), create);
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("could not inspect {}", host_path.display()));
            }
        }

        self.ensure_mode(id, &host_path, mode)?;
        self.ensure_owner(id, &host_path, owner, group)?;

        if recurse {
            for entry in WalkDir::new(&host_path).min_depth(1).follow_links(false) {
                let entry =
                    entry.with_context(|| format!("could not walk {}", host_path.display()))?;
                if entry.file_type().is_dir() {
                    self.ensure_mode(id, entry.path(), mode)?;
                }
                if !entry.file_type().is_symlink() {
                    self.ensure_owner(id, entry.path(), owner, group)?;
                }
            }
        }
        Ok(())
    }

    fn file(
        &mut self,
        id: &str,
        path: &Path,
        owner: &str,
        group: &str,
        mode: Mode,
        content: &str,
    ) -> anyhow::Result<()> {
        let host_path = self.host_path(path);
        match fs::read(&host_path) {
            Ok(current) if current == content.as_bytes() => {}
            Ok(_) => {
                self.change(id, "content changed".into(), |_| {
                    fs::write(&host_path, content)
                        .with_context(|| format!("could not write {}", host_path.display()))
                })?;
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return self.change(id, format!("created, mode {mode}"), |s| {
                    fs::write(&host_path, content)
                        .with_context(|| format!("could not write {}", host_path.display()))?;
                    fs::set_permissions(&host_path, Permissions::from_mode(mode.bits()))?;
                    s.chown(&host_path, owner, group)
                });
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("could not read {}", host_path.display()));
            }
        }

        self.ensure_mode(id, &host_path, mode)?;
        self.ensure_owner(id, &host_path, owner, group)
    }

    fn authorized_key(
        &mut self,
        id: &str,
        user: &str,
        target: &Path,
        key: &str,
        line: &str,
    ) -> anyhow::Result<()> {
        let host_path = self.host_path(target);
        let contents = match fs::read_to_string(&host_path) {
            Ok(contents) => Some(contents),
            Err(error) if error.kind() == ErrorKind::NotFound => None,
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("could not read {}", host_path.display()));
            }
        };

        // The key material identifies the entry, so a changed comment or option replaces the
        // existing line instead of adding another.
        let pattern = Regex::new(&format!(r"(?:^|\s){}(?:\s|$)", regex::escape(key)))?;
        let edit = LineInFile {
            line,
            pattern: Some(&pattern),
            before: None,
        };

        let Some(contents) = contents else {
            let new = edit.apply("").unwrap_or_default();
            return self.change(id, "added to new authorized_keys".into(), |s| {
                fs::write(&host_path, new)
                    .with_context(|| format!("could not write {}", host_path.display()))?;
                fs::set_permissions(
                    &host_path,
                    Permissions::from_mode(AUTHORIZED_KEYS_MODE.bits()),
                )?;
                s.chown(&host_path, user, user)
            });
        };

        if let Some(new) = edit.apply(&contents) {
            self.change(id, "key entry written".into(), |_| {
                fs::write(&host_path, new)
                    .with_context(|| format!("could not write {}", host_path.display()))
            })?;
        }
        self.ensure_mode(id, &host_path, AUTHORIZED_KEYS_MODE)?;
        self.ensure_owner(id, &host_path, user, user)
    }

    /// Drops the member entries of `target` whose key material is not in `keep`.
    fn purge_authorized_keys(
        &mut self,
        id: &str,
        target: &Path,
        keep: &[String],
    ) -> anyhow::Result<()> {
        let host_path = self.host_path(target);
        let contents = match fs::read_to_string(&host_path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(()),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("could not read {}", host_path.display()));
            }
        };

        let marker = format!(r#"environment="{ATTRIBUTION_VAR}="#);
        let stale = |line: &str| {
            line.contains(&marker)
                && !line
                    .split_whitespace()
                    .any(|field| keep.iter().any(|key| key == field))
        };
        let mut removed = 0;
        let mut kept = String::with_capacity(contents.len());
        for line in contents.lines() {
            if stale(line) {
                removed += 1;
            } else {
                kept.push_str(line);
                kept.push('\n');
            }
        }
        if removed == 0 {
            return Ok(());
        }

        self.change(id, format!("removed {removed} stale key(s)"), |_| {
            fs::write(&host_path, kept)
                .with_context(|| format!("could not write {}", host_path.display()))
        })
    }

    fn read_sshd_config(&self) -> anyhow::Result<(PathBuf, String)> {
        let host_path = self.host_path(&self.options.sshd_config);
        let contents = fs::read_to_string(&host_path).with_context(|| {
            format!(
                "could not read {}; is the SSH server installed?",
                host_path.display()
            )
        })?;
        Ok((host_path, contents))
    }

    /// Ensures `line` is in `sshd_config`, above any Match block.
    fn sshd_line(&mut self, id: &str, line: &str, pattern: Option<&Regex>) -> anyhow::Result<()> {
        let (host_path, contents) = self.read_sshd_config()?;
        let before = Regex::new(SSHD_MATCH_BLOCK)?;
        let edit = LineInFile {
            line,
            pattern,
            before: Some(&before),
        };
        if let Some(new) = edit.apply(&contents) {
            self.change(id, format!("set '{line}'"), |_| {
                fs::write(&host_path, new)
                    .with_context(|| format!("could not write {}", host_path.display()))
            })?;
            self.sshd_changed = true;
        }
        Ok(())
    }

    /// Ensures `name` is accepted from clients. An existing `AcceptEnv` line that already lists it
    /// is good enough.
    fn accept_env(&mut self, id: &str, name: &str) -> anyhow::Result<()> {
        let (_, contents) = self.read_sshd_config()?;
        let listed = Regex::new(&format!(
            r"(?im)^\s*AcceptEnv\s(?:.*\s)?{}(?:\s|$)",
            regex::escape(name)
        ))?;
        if listed.is_match(&contents) {
            return Ok(());
        }
        self.sshd_line(id, &format!("AcceptEnv {name}"), None)
    }

    fn ensure_mode(&mut self, id: &str, path: &Path, mode: Mode) -> anyhow::Result<()> {
        let current = fs::metadata(path)
            .with_context(|| format!("could not inspect {}", path.display()))?
            .permissions()
            .mode()
            & 0o7777;
        if current == mode.bits() {
            return Ok(());
        }
        self.change(
            id,
            format!("{}: mode {current:04o} -> {mode}", path.display()),
            |_| {
                fs::set_permissions(path, Permissions::from_mode(mode.bits()))
                    .with_context(|| format!("could not chmod {}", path.display()))
            },
        )
    }

    fn ensure_owner(
        &mut self,
        id: &str,
        path: &Path,
        owner: &str,
        group: &str,
    ) -> anyhow::Result<()> {
        let (current_owner, current_group) = self.system.owner(path)?;
        if current_owner == owner && current_group == group {
            return Ok(());
        }
        self.change(
            id,
            format!(
                "{}: owner {current_owner}:{current_group} -> {owner}:{group}",
                path.display()
            ),
            |s| s.chown(path, owner, group),
        )
    }
}
