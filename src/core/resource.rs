//! Types for representing individual desired-state declarations.

#[cfg(doc)]
use crate::core::catalog::Catalog;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Whether a declared resource should exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

impl FromStr for Ensure {
    type Err = Error;

    /// Accepts exactly `present` or `absent`. Anything else, including different capitalization,
    /// is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Ensure::Present),
            "absent" => Ok(Ensure::Absent),
            _ => Err(Error::InvalidEnsure(s.to_string())),
        }
    }
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ensure::Present => f.write_str("present"),
            Ensure::Absent => f.write_str("absent"),
        }
    }
}

/// Unix permission bits, written and parsed as an octal string such as `0755`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mode(u32);

impl Mode {
    /// The largest mode we accept: setuid, setgid, sticky, and rwx for everyone.
    const MAX: u32 = 0o7777;

    /// Creates a [Mode] from raw permission bits.
    ///
    /// # Panics
    ///
    /// Panics if `bits` has anything set beyond `0o7777`.
    pub const fn new(bits: u32) -> Self {
        assert!(bits <= Self::MAX, "mode out of range");
        Mode(bits)
    }

    /// The raw permission bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return Err(Error::InvalidMode(s.to_string()));
        }
        match u32::from_str_radix(digits, 8) {
            Ok(bits) if bits <= Self::MAX => Ok(Mode(bits)),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

/// A named chunk of text destined for a [Resource::Concat] target.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Fragment {
    /// The path of the [Resource::Concat] this fragment belongs to.
    pub target: PathBuf,

    /// Unique among all fragments in a [Catalog]. Breaks ties between equal [Self::order]s.
    pub name: String,

    /// Position within the target. Lower orders come first.
    pub order: u8,

    /// The rendered text, copied verbatim into the target.
    pub content: String,
}

/// The types of resources a [Catalog] can declare.
///
/// # (De)serialization
///
/// Like any enum with struct variants, [serde_yaml] writes these with YAML tag notation when used
/// on their own. [Catalog] applies `serde_yaml::with::singleton_map_recursive` to its resource
/// list so that the catalog reads as plain YAML maps instead.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// An entry in the host's account database.
    User {
        login: String,
        ensure: Ensure,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        groups: Vec<String>,
        home: PathBuf,
        shell: String,
    },

    Directory {
        path: PathBuf,
        owner: String,
        group: String,
        mode: Mode,

        /// Enforce ownership on everything below [Self::Directory::path], and the mode on every
        /// directory below it.
        #[serde(skip_serializing_if = "is_false", default)]
        recurse: bool,

        /// Replace whatever non-directory occupies the path.
        #[serde(skip_serializing_if = "is_false", default)]
        force: bool,
    },

    /// A file whose entire content is known up front.
    File {
        path: PathBuf,
        owner: String,
        group: String,
        mode: Mode,
        content: String,
    },

    /// A file whose content is the ordered concatenation of every [Resource::Fragment] targeting
    /// it.
    Concat {
        path: PathBuf,
        owner: String,
        group: String,
        mode: Mode,
    },

    Fragment(Fragment),

    /// One line in an `authorized_keys` file, identified by its key material.
    AuthorizedKey {
        /// The member the key belongs to.
        member: String,

        /// Free text written at the end of the line. Not part of the key's identity.
        #[serde(skip_serializing_if = "String::is_empty", default)]
        comment: String,

        /// The account the key grants access to.
        user: String,

        /// The `authorized_keys` file to edit.
        target: PathBuf,

        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        options: Vec<String>,

        #[serde(rename = "type")]
        key_type: String,
        key: String,
    },

    /// An `sshd_config` keyword that may appear only once, e.g. `PermitUserEnvironment yes`.
    SshdSetting { keyword: String, value: String },

    /// One variable name added to the `AcceptEnv` list of `sshd_config`.
    SshdAcceptEnv { name: String },

    /// Removes the member lines of an `authorized_keys` file whose key material is not in
    /// `keep`. Lines without a member attribution are left alone.
    PurgeAuthorizedKeys {
        target: PathBuf,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        keep: Vec<String>,
    },
}

fn is_false(b: &bool) -> bool {
    !b
}

impl Resource {
    /// Identifies the thing on the host that this resource manages. Two resources with the same
    /// id cannot coexist in one [Catalog].
    ///
    /// Directories, files, and concat targets share a namespace, because they all manage a path.
    pub fn id(&self) -> String {
        use Resource::*;
        match self {
            User { login, .. } => format!("user:{login}"),
            Directory { path, .. } | File { path, .. } | Concat { path, .. } => {
                format!("file:{}", path.display())
            }
            Fragment(fragment) => format!("fragment:{}", fragment.name),
            AuthorizedKey { user, key, .. } => format!("authorized_key:{user}:{key}"),
            SshdSetting { keyword, .. } => format!("sshd_setting:{keyword}"),
            SshdAcceptEnv { name } => format!("sshd_accept_env:{name}"),
            PurgeAuthorizedKeys { target, .. } => {
                format!("purge_authorized_keys:{}", target.display())
            }
        }
    }

    /// The path on the host that this resource writes to, if any.
    pub fn path(&self) -> Option<&Path> {
        use Resource::*;
        match self {
            Directory { path, .. } | File { path, .. } | Concat { path, .. } => Some(path),
            Fragment(fragment) => Some(&fragment.target),
            AuthorizedKey { target, .. } | PurgeAuthorizedKeys { target, .. } => Some(target),
            User { .. } | SshdSetting { .. } | SshdAcceptEnv { .. } => None,
        }
    }

    /// Renders an [Resource::AuthorizedKey] as its `authorized_keys` line. Returns [None] for
    /// every other variant.
    pub fn authorized_keys_line(&self) -> Option<String> {
        match self {
            Resource::AuthorizedKey {
                member,
                comment,
                options,
                key_type,
                key,
                ..
            } => {
                let mut line = String::new();
                if !options.is_empty() {
                    line.push_str(&options.join(","));
                    line.push(' ');
                }
                let comment = if comment.is_empty() { member } else { comment };
                line.push_str(&format!("{key_type} {key} {comment}"));
                Some(line)
            }
            _ => None,
        }
    }
}
