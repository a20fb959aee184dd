//! Declarative provisioning of a shared system administrator account.
//!
//! Several people administer a host through one local account. Each of them logs in with their
//! own SSH key, and the key tells the account who is at the keyboard, so that commits and other
//! actions can be attributed to the real person.
//!
//! # Program flow
//!
//! 1. [config::Params] are loaded from a YAML file, by default `/etc/sysadmin/sysadmin.yaml`.
//!
//! 2. [sysadmin::declare] validates them and declares a [core::Catalog]: the account, its home
//!    tree, a config file assembled from ordered fragments, one `authorized_keys` entry per member
//!    key, and the `sshd_config` lines that let the member's name through.
//!
//! 3. [apply::apply] converges the host to match the catalog, changing only what differs, and
//!    [report] tells the user what happened.

pub mod apply;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod facts;
pub mod report;
pub mod sysadmin;

#[doc(inline)]
pub use error::{Error, Result};
