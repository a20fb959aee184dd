//! Registers the real people who use the shared account.
//!
//! Each member gets a record file under `~/.sysadmin/`, a section in the sysadmin config file,
//! and one `authorized_keys` entry per SSH key. The key entry sets [ATTRIBUTION_VAR] for the
//! session, which is how the config file knows who logged in.

use super::{check_name, ATTRIBUTION_VAR};
use crate::config::{MemberInfo, Params, SshKey};
use crate::core::fragment::check_body_order;
use crate::core::resource::{Fragment, Resource};
use crate::core::template::{self, render};
use crate::core::Catalog;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::PathBuf;

/// The order of a member's config file section unless [MemberInfo::order] says otherwise.
pub const DEFAULT_ORDER: u8 = 50;

/// The directory, relative to the shared account's home, that holds member records.
pub const MEMBERS_DIR: &str = ".sysadmin";

/// What a member's record file contains.
#[derive(Debug, Serialize)]
struct Record<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    firstname: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    lastname: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    email: &'a str,
}

/// Registers every entry of [Params::members], in order, using details from [Params::users].
///
/// Finishes with a [Resource::PurgeAuthorizedKeys], so a member dropped from the list, or a key
/// dropped from a member, loses its `authorized_keys` entry. Only lines that set
/// [ATTRIBUTION_VAR] are purged; keys added to the file by hand stay.
pub fn declare_members(catalog: &mut Catalog, params: &Params) -> Result<()> {
    let default = MemberInfo::default();
    let mut keep = Vec::new();
    for username in &params.members {
        let info = params.users.get(username).unwrap_or(&default);
        declare(catalog, params, username, info)?;
        keep.extend(info.sshkeys.iter().map(|key| key.key.clone()));
    }
    catalog.add(Resource::PurgeAuthorizedKeys {
        target: authorized_keys(params),
        keep,
    })
}

fn authorized_keys(params: &Params) -> PathBuf {
    params.homedir().join(".ssh").join("authorized_keys")
}

/// Registers one member.
///
/// Declares the members directory the first time it is needed, so members can be registered in
/// any number of calls.
pub fn declare(
    catalog: &mut Catalog,
    params: &Params,
    username: &str,
    info: &MemberInfo,
) -> Result<()> {
    check_name("member", username)?;
    let login = &params.login;
    let members_dir = params.homedir().join(MEMBERS_DIR);

    let directory = Resource::Directory {
        path: members_dir.clone(),
        owner: login.clone(),
        group: login.clone(),
        mode: params.dirmode,
        recurse: false,
        force: false,
    };
    if !catalog.contains(&directory.id()) {
        catalog.add(directory)?;
    }

    let record = Record {
        username,
        firstname: &info.firstname,
        lastname: &info.lastname,
        email: &info.email,
    };
    catalog.add(Resource::File {
        path: members_dir.join(format!("{username}.yaml")),
        owner: login.clone(),
        group: login.clone(),
        mode: params.filemode,
        content: serde_yaml::to_string(&record).map_err(|source| Error::Record {
            member: username.to_string(),
            source,
        })?,
    })?;

    let name = format!("{login}_sysadminrc_{username}");
    let order = info.order.unwrap_or(DEFAULT_ORDER);
    check_body_order(&name, order)?;

    let fullname = match (info.firstname.as_str(), info.lastname.as_str()) {
        ("", "") => username.to_string(),
        (first, "") => first.to_string(),
        ("", last) => last.to_string(),
        (first, last) => format!("{first} {last}"),
    };
    let vars = IndexMap::from([
        ("username".to_string(), username.to_string()),
        ("fullname".to_string(), shell_quotable(&fullname)),
        ("email".to_string(), shell_quotable(&info.email)),
    ]);
    catalog.add(Resource::Fragment(Fragment {
        target: params.configfile(),
        name,
        order,
        content: render(template::SYSADMINRC_MEMBER, &vars),
    }))?;

    for key in &info.sshkeys {
        declare_sshkey(catalog, params, username, key)?;
    }
    Ok(())
}

/// Lets `username` log in as the shared account with `key`.
///
/// The key material identifies the entry, so one member may hold several keys with the same
/// comment, or none. The same key declared twice, even for two members, is a
/// [Error::DuplicateResource].
pub fn declare_sshkey(
    catalog: &mut Catalog,
    params: &Params,
    username: &str,
    key: &SshKey,
) -> Result<()> {
    // Keys become single lines of authorized_keys; anything that would break the line apart or
    // shift its fields is refused.
    for (field, value) in [("type", &key.key_type), ("key", &key.key)] {
        if value.is_empty() || value.contains(char::is_whitespace) {
            return Err(Error::InvalidName {
                kind: if field == "type" { "ssh key type" } else { "ssh key" },
                name: value.clone(),
            });
        }
    }
    if key.comment.contains(|c: char| c == '\n' || c == '\r') {
        return Err(Error::InvalidName {
            kind: "ssh key comment",
            name: key.comment.clone(),
        });
    }

    catalog.add(Resource::AuthorizedKey {
        member: username.to_string(),
        comment: key.comment.clone(),
        user: params.login.clone(),
        target: authorized_keys(params),
        options: vec![format!(r#"environment="{ATTRIBUTION_VAR}={username}""#)],
        key_type: key.key_type.clone(),
        key: key.key.clone(),
    })
}

/// Makes `value` safe to place between double quotes in a shell script.
fn shell_quotable(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        if c != '\n' && c != '\r' {
            quoted.push(c);
        }
    }
    quoted
}
