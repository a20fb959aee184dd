//! Types for representing an ordered list of declared resources.

use crate::core::resource::{Fragment, Resource};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Everything one run wants the host to look like, in the order it should be applied.
///
/// Declaration order is dependency order: a resource may rely on every resource declared before
/// it. [crate::apply] walks the catalog front to back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Catalog {
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    resources: Vec<Resource>,

    #[serde(skip)]
    ids: HashSet<String>,
}

impl Catalog {
    /// Creates an empty [Catalog].
    pub fn new() -> Self {
        Catalog {
            resources: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Appends a resource.
    ///
    /// # Errors
    ///
    /// Returns [Error::DuplicateResource] if a resource with the same [Resource::id] was already
    /// added. Declarations never merge.
    pub fn add(&mut self, resource: Resource) -> Result<()> {
        let id = resource.id();
        if !self.ids.insert(id.clone()) {
            return Err(Error::DuplicateResource(id));
        }
        self.resources.push(resource);
        Ok(())
    }

    /// Appends every resource in `resources`, stopping at the first duplicate.
    pub fn extend(&mut self, resources: impl IntoIterator<Item = Resource>) -> Result<()> {
        for resource in resources {
            self.add(resource)?;
        }
        Ok(())
    }

    /// Whether a resource with the given id has been declared.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Returns the fragments that target `path`, in declaration order.
    pub fn fragments_for<'c>(&'c self, path: &'c Path) -> impl Iterator<Item = &'c Fragment> {
        self.resources.iter().filter_map(move |resource| match resource {
            Resource::Fragment(fragment) if fragment.target == path => Some(fragment),
            _ => None,
        })
    }

    /// Rebuilds the duplicate index after deserialization.
    ///
    /// # Errors
    ///
    /// Returns [Error::DuplicateResource] if the deserialized list contained duplicates.
    pub fn reindex(self) -> Result<Self> {
        let mut catalog = Catalog::new();
        catalog.extend(self.resources)?;
        Ok(catalog)
    }
}

impl<'c> IntoIterator for &'c Catalog {
    type Item = &'c Resource;
    type IntoIter = std::slice::Iter<'c, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::{Ensure, Mode};

    fn user(login: &str) -> Resource {
        Resource::User {
            login: login.into(),
            ensure: Ensure::Present,
            groups: vec![],
            home: Path::new("/home").join(login),
            shell: "/bin/bash".into(),
        }
    }

    fn fragment(target: &str, name: &str, order: u8) -> Resource {
        Resource::Fragment(Fragment {
            target: target.into(),
            name: name.into(),
            order,
            content: name.into(),
        })
    }

    #[test]
    fn preserves_declaration_order() {
        let mut catalog = Catalog::new();
        catalog.add(user("b")).unwrap();
        catalog.add(user("a")).unwrap();
        catalog.add(user("c")).unwrap();
        let logins: Vec<_> = catalog
            .iter()
            .map(|r| match r {
                Resource::User { login, .. } => login.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(vec!["b", "a", "c"], logins);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut catalog = Catalog::new();
        catalog.add(user("localadmin")).unwrap();
        let mut changed = user("localadmin");
        if let Resource::User { groups, .. } = &mut changed {
            groups.push("wheel".into());
        }
        let error = catalog.add(changed).unwrap_err();
        assert!(matches!(error, Error::DuplicateResource(id) if id == "user:localadmin"));
        assert_eq!(1, catalog.len());
    }

    #[test]
    fn a_file_cannot_be_declared_as_a_directory_too() {
        let mut catalog = Catalog::new();
        catalog
            .add(Resource::Directory {
                path: "/home/a/bin".into(),
                owner: "a".into(),
                group: "a".into(),
                mode: Mode::new(0o755),
                recurse: false,
                force: false,
            })
            .unwrap();
        let error = catalog
            .add(Resource::Concat {
                path: "/home/a/bin".into(),
                owner: "a".into(),
                group: "a".into(),
                mode: Mode::new(0o644),
            })
            .unwrap_err();
        assert!(matches!(error, Error::DuplicateResource(_)));
    }

    #[test]
    fn fragments_for_filters_by_target() {
        let mut catalog = Catalog::new();
        catalog
            .extend([
                fragment("/x", "x1", 1),
                fragment("/y", "y1", 1),
                fragment("/x", "x2", 99),
            ])
            .unwrap();
        let names: Vec<_> = catalog
            .fragments_for(Path::new("/x"))
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(vec!["x1", "x2"], names);
        assert_eq!(0, catalog.fragments_for(Path::new("/z")).count());
    }

    #[test]
    fn yaml_reads_as_plain_maps() {
        let mut catalog = Catalog::new();
        catalog
            .add(Resource::SshdAcceptEnv {
                name: "SYSADMIN_USER".into(),
            })
            .unwrap();
        let yaml = serde_yaml::to_string(&catalog).unwrap();
        assert_eq!(
            "resources:\n- sshd_accept_env:\n    name: SYSADMIN_USER\n",
            yaml
        );

        let parsed: Catalog = serde_yaml::from_str(&yaml).unwrap();
        let parsed = parsed.reindex().unwrap();
        assert_eq!(catalog, parsed);
    }

    #[test]
    fn reindex_finds_duplicates() {
        let yaml = "resources:\n\
            - sshd_accept_env:\n    name: A\n\
            - sshd_accept_env:\n    name: A\n";
        let parsed: Catalog = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(parsed.reindex(), Err(Error::DuplicateResource(_))));
    }
}
