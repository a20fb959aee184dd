//! The provisioning plan shared by every operating system family.

use super::ATTRIBUTION_VAR;
use crate::config::Params;
use crate::core::fragment::{FOOTER_ORDER, HEADER_ORDER};
use crate::core::resource::{Ensure, Fragment, Resource};
use crate::core::template::{self, render};
use crate::core::Catalog;
use crate::error::Result;
use crate::facts::Profile;
use indexmap::IndexMap;
use std::path::PathBuf;

/// Declares the shared account and, if it is present, its home directory tree.
///
/// When `ensure` is [Ensure::Absent], only the account's removal is declared. The home directory
/// is left alone: removing the account removes the identity, not its data.
pub fn declare(params: &Params, ensure: Ensure, profile: &Profile) -> Result<Catalog> {
    let login = &params.login;
    let homedir = params.homedir();
    let mut catalog = Catalog::new();

    catalog.add(Resource::User {
        login: login.clone(),
        ensure,
        groups: params.groups.iter().cloned().collect(),
        home: homedir.clone(),
        shell: profile.shell.to_string(),
    })?;

    if ensure == Ensure::Absent {
        return Ok(catalog);
    }

    let vars = IndexMap::from([
        ("login".to_string(), login.clone()),
        ("homedir".to_string(), homedir.display().to_string()),
        ("configfilename".to_string(), params.configfilename.clone()),
    ]);

    let directory = |path: PathBuf, recurse: bool| Resource::Directory {
        path,
        owner: login.clone(),
        group: login.clone(),
        mode: params.dirmode,
        recurse,
        force: recurse,
    };

    catalog.add(directory(homedir.clone(), false))?;
    catalog.add(Resource::File {
        path: homedir.join(".profile"),
        owner: login.clone(),
        group: login.clone(),
        mode: params.filemode,
        content: render(template::PROFILE, &vars),
    })?;
    catalog.add(directory(homedir.join(".ssh"), true))?;
    catalog.add(directory(homedir.join("bin"), false))?;

    let configfile = params.configfile();
    catalog.add(Resource::Concat {
        path: configfile.clone(),
        owner: login.clone(),
        group: login.clone(),
        mode: params.filemode,
    })?;
    catalog.add(Resource::Fragment(Fragment {
        target: configfile.clone(),
        name: format!("{login}_sysadminrc_header"),
        order: HEADER_ORDER,
        content: render(template::SYSADMINRC_HEADER, &vars),
    }))?;
    catalog.add(Resource::Fragment(Fragment {
        target: configfile,
        name: format!("{login}_sysadminrc_footer"),
        order: FOOTER_ORDER,
        content: render(template::SYSADMINRC_FOOTER, &vars),
    }))?;

    catalog.add(Resource::SshdSetting {
        keyword: "PermitUserEnvironment".to_string(),
        value: "yes".to_string(),
    })?;
    catalog.add(Resource::SshdAcceptEnv {
        name: ATTRIBUTION_VAR.to_string(),
    })?;

    Ok(catalog)
}
