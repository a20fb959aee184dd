//! Errors raised while declaring the sysadmin account.
//!
//! These are the cheap, up-front failures: bad parameters, an unsupported platform, or a catalog
//! that contradicts itself. Nothing has been touched on the host when one of these is returned.
//! Failures that happen while converging the host are reported by [crate::apply] instead.

use std::path::PathBuf;

/// A declaration-time failure. Every variant is fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `ensure` was something other than `present` or `absent`.
    #[error("sysadmin 'ensure' parameter must be set to either 'absent' or 'present', not '{0}'")]
    InvalidEnsure(String),

    /// The operating system does not belong to a supported family.
    #[error("module {module} is not supported on {os}")]
    UnsupportedOs { module: &'static str, os: String },

    /// A login or member name that the account database would reject.
    #[error("invalid {kind} name: '{name}'")]
    InvalidName { kind: &'static str, name: String },

    /// A file mode that is not an octal permission string such as `0755`.
    #[error("invalid file mode '{0}': expected an octal string such as 0755")]
    InvalidMode(String),

    /// Two declarations resolved to the same resource.
    #[error("duplicate declaration: {0} is already declared")]
    DuplicateResource(String),

    /// A fragment was placed outside the range reserved for it.
    #[error("fragment {name} has order {order}, but must be within {min}..={max}")]
    FragmentOrder {
        name: String,
        order: u8,
        min: u8,
        max: u8,
    },

    /// A member's record file could not be rendered.
    #[error("could not render the record of member {member}")]
    Record {
        member: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The parameters file could not be read or parsed.
    #[error("could not load parameters from {}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
