//! Parameters for the shared account, and where to find them.

use crate::core::resource::Mode;
use crate::error::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The name of the parameters file within [config_dir].
pub const PARAMS_FILE: &str = "sysadmin.yaml";

/// Returns a [PathBuf] to the directory where the parameters file should live.
///
/// When compiled for testing, this returns `CARGO_MANIFEST_DIR` plus `resources/etc/sysadmin`.
/// Otherwise, it returns `/etc/sysadmin`.
pub fn config_dir() -> PathBuf {
    // Omit the leading slash so that PathBuf::push appends instead of replacing.
    const CONFIG_DIR: &str = "etc/sysadmin";

    let mut path = PathBuf::from("/");

    #[cfg(test)]
    {
        path.push(env!("CARGO_MANIFEST_DIR"));
        path.push("resources");
    }

    path.push(CONFIG_DIR);
    path
}

/// The default parameters file.
pub fn params_file() -> PathBuf {
    config_dir().join(PARAMS_FILE)
}

/// An SSH public key that lets a member log in as the shared account.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SshKey {
    /// Usually `user@host`. Written at the end of the `authorized_keys` line, or the member's
    /// user name when empty.
    #[serde(default)]
    pub comment: String,

    /// The key algorithm, e.g. `ssh-ed25519`.
    #[serde(rename = "type")]
    pub key_type: String,

    /// The base64 key material.
    pub key: String,
}

/// What is known about a member beyond their user name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct MemberInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub firstname: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub lastname: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sshkeys: Vec<SshKey>,

    /// Position of the member's section in the config file. Defaults to the middle of the body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u8>,
}

/// The parameters of one run, constructed once and never modified afterwards.
///
/// Every field has a default, so an empty parameters file is valid.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Params {
    /// The name of the shared account.
    pub login: String,

    /// Supplementary groups of the shared account.
    pub groups: IndexSet<String>,

    /// Real people allowed to use the shared account.
    pub members: IndexSet<String>,

    /// `present` or `absent`.
    ///
    /// Kept as a string so that a bad value is reported by the account policy, with the rest of
    /// the parameter validation, rather than as a parse error.
    pub ensure: String,

    /// The directory that holds the shared account's home.
    pub homebasedir: PathBuf,

    /// The name of the config file in the shared account's home.
    pub configfilename: String,

    pub dirmode: Mode,

    pub filemode: Mode,

    /// Details for entries in [Self::members]. Entries for people who are not members are ignored.
    pub users: IndexMap<String, MemberInfo>,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            login: "localuser".to_string(),
            groups: IndexSet::new(),
            members: IndexSet::from(["svarrette".to_string(), "hcartiaux".to_string()]),
            ensure: "present".to_string(),
            homebasedir: PathBuf::from("/home"),
            configfilename: ".sysadminrc".to_string(),
            dirmode: Mode::new(0o755),
            filemode: Mode::new(0o644),
            users: IndexMap::new(),
        }
    }
}

impl Params {
    /// Parses parameters from YAML. Missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> serde_yaml::Result<Self> {
        // An empty document deserializes as null rather than as an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Params::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Loads parameters from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |source: anyhow::Error| Error::Config {
            path: path.to_path_buf(),
            source,
        };
        let yaml = fs::read_to_string(path).map_err(|e| config_error(e.into()))?;
        Params::from_yaml(&yaml).map_err(|e| config_error(e.into()))
    }

    /// The shared account's home directory.
    pub fn homedir(&self) -> PathBuf {
        self.homebasedir.join(&self.login)
    }

    /// The path of the assembled config file.
    pub fn configfile(&self) -> PathBuf {
        self.homedir().join(&self.configfilename)
    }
}
