//! Declares the shared system administrator account.
//!
//! # Program flow
//!
//! 1. [declare] logs the resolved login and `ensure`, then validates the parameters. Nothing is
//!    declared if they are invalid.
//!
//! 2. The operating system is classified into an [OsFamily]. Every family provisions the account
//!    through [common::declare], parameterized by the family's [Profile](crate::facts::Profile).
//!
//! 3. If the account is present, each member is registered through [user::declare_members].
//!
//! 4. The resulting [Catalog] is handed to [crate::apply] to converge the host.

pub mod common;
pub mod user;

use crate::config::Params;
use crate::core::resource::Ensure;
use crate::core::Catalog;
use crate::error::{Error, Result};
use crate::facts::OsFamily;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

/// The environment variable that carries the real member's name through an SSH session.
pub const ATTRIBUTION_VAR: &str = "SYSADMIN_USER";

/// Builds the [Catalog] for the shared account on a host running `os`.
///
/// # Errors
///
/// Fails before declaring anything if `ensure` is not `present` or `absent`, if the login or a
/// member name is not a valid account name, or if `os` is not a supported operating system.
pub fn declare(params: &Params, os: &str) -> Result<Catalog> {
    info!(login = %params.login, ensure = %params.ensure, "configuring sysadmin account");

    let ensure: Ensure = params.ensure.parse()?;
    check_name("login", &params.login)?;
    let family = OsFamily::classify(os)?;
    debug!(?family, os, "classified operating system");

    let mut catalog = family.declare(params, ensure)?;
    if ensure == Ensure::Present {
        user::declare_members(&mut catalog, params)?;
    }
    debug!(resources = catalog.len(), "declared sysadmin account");
    Ok(catalog)
}

impl OsFamily {
    /// Provisions the account the way this family does it.
    pub fn declare(self, params: &Params, ensure: Ensure) -> Result<Catalog> {
        common::declare(params, ensure, &self.profile())
    }
}

/// Checks that `name` would be accepted as an account name by `useradd` on any supported system.
pub(crate) fn check_name(kind: &'static str, name: &str) -> Result<()> {
    static NAME: OnceLock<Regex> = OnceLock::new();

    let regex = NAME.get_or_init(|| {
        Regex::new(r"^[a-z_][a-z0-9_-]{0,30}\$?$").expect("account name regex is valid")
    });
    if regex.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}
