//! Facts about the managed host: which operating system it runs, and what that implies.

use crate::error::{Error, Result};
use anyhow::Context;
use std::fs;
use std::path::Path;

/// Where the running operating system describes itself.
pub const OS_RELEASE: &str = "/etc/os-release";

/// The module name reported in platform errors.
const MODULE: &str = "sysadmin";

/// The operating system families the shared account can be provisioned on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OsFamily {
    /// Debian and Ubuntu.
    Debian,

    /// Red Hat, Fedora, and CentOS.
    RedHat,
}

impl OsFamily {
    /// Classifies an operating system name, e.g. `ubuntu` or `CentOS`.
    ///
    /// # Errors
    ///
    /// Returns [Error::UnsupportedOs] naming `os` if it is not in a known family.
    pub fn classify(os: &str) -> Result<Self> {
        match os.trim().to_ascii_lowercase().as_str() {
            "debian" | "ubuntu" => Ok(OsFamily::Debian),
            "redhat" | "fedora" | "centos" => Ok(OsFamily::RedHat),
            _ => Err(Error::UnsupportedOs {
                module: MODULE,
                os: os.to_string(),
            }),
        }
    }

    /// The values that differ between families.
    ///
    /// Both families currently provision the account identically; only the name of the SSH
    /// daemon's service differs, and that is used when converging, not when declaring.
    pub fn profile(self) -> Profile {
        let common = Profile {
            shell: "/bin/bash",
            sshd_config: "/etc/ssh/sshd_config",
            sshd_service: "sshd",
        };
        match self {
            OsFamily::Debian => Profile {
                sshd_service: "ssh",
                ..common
            },
            OsFamily::RedHat => common,
        }
    }
}

/// OS-specific values used while declaring and converging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    /// The shared account's login shell.
    pub shell: &'static str,

    /// The SSH daemon's configuration file.
    pub sshd_config: &'static str,

    /// The service to reload after changing [Self::sshd_config].
    pub sshd_service: &'static str,
}

/// Extracts the operating system name from the contents of an `os-release` file.
///
/// Returns the `ID` field, except that `rhel` is reported as `redhat`. `ID_LIKE` is deliberately
/// ignored: derivatives are not supported just because they resemble a supported system.
pub fn operating_system(os_release: &str) -> Option<String> {
    let id = os_release.lines().find_map(|line| {
        let value = line.trim().strip_prefix("ID=")?;
        // shlex strips the optional quoting used by os-release.
        let mut words = shlex::Shlex::new(value);
        words.next()
    })?;

    match id.as_str() {
        "rhel" => Some("redhat".to_string()),
        "" => None,
        _ => Some(id),
    }
}

/// Reads the running operating system's name from [OS_RELEASE].
pub fn detect() -> anyhow::Result<String> {
    detect_from(OS_RELEASE)
}

/// Like [detect], but reads an arbitrary `os-release` file.
pub fn detect_from(path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
    operating_system(&contents)
        .with_context(|| format!("no operating system ID found in {}", path.display()))
}
