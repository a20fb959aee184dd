//! Verifies (de)serialization of parameters and catalogs to/from YAML.
//!
//! Parameters are written by people, so these tests focus on what a hand-written file may leave
//! out or get wrong. Catalogs are written by `sysadmin plan --yaml`, so they must survive a round
//! trip through the same format.

use indexmap::{IndexMap, IndexSet};
use std::path::PathBuf;
use sysadmin::config::{MemberInfo, Params, SshKey};
use sysadmin::core::resource::Mode;
use sysadmin::core::{Catalog, Resource};

mod params {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        assert_eq!(Params::default(), Params::from_yaml("").unwrap());
        assert_eq!(Params::default(), Params::from_yaml("\n\n").unwrap());
    }

    #[test]
    fn defaults() {
        let params = Params::default();
        assert_eq!("localuser", params.login);
        assert_eq!("present", params.ensure);
        assert_eq!(
            IndexSet::from(["svarrette".to_string(), "hcartiaux".to_string()]),
            params.members,
        );
        assert!(params.groups.is_empty());
        assert_eq!(PathBuf::from("/home/localuser"), params.homedir());
        assert_eq!(PathBuf::from("/home/localuser/.sysadminrc"), params.configfile());
        assert_eq!(Mode::new(0o755), params.dirmode);
        assert_eq!(Mode::new(0o644), params.filemode);
    }

    #[test]
    fn full_file() {
        let yaml = r#"
login: ops
ensure: absent
groups: [wheel, adm]
members: [carol]
homebasedir: /srv/home
configfilename: .opsrc
dirmode: "0750"
filemode: "0640"
users:
  carol:
    firstname: Carol
    email: carol@example.org
    order: 10
    sshkeys:
      - comment: carol@desk
        type: ssh-rsa
        key: AAAAB3NzaC1yc2E
"#;
        let expected = Params {
            login: "ops".to_string(),
            ensure: "absent".to_string(),
            groups: IndexSet::from(["wheel".to_string(), "adm".to_string()]),
            members: IndexSet::from(["carol".to_string()]),
            homebasedir: PathBuf::from("/srv/home"),
            configfilename: ".opsrc".to_string(),
            dirmode: Mode::new(0o750),
            filemode: Mode::new(0o640),
            users: IndexMap::from([(
                "carol".to_string(),
                MemberInfo {
                    firstname: "Carol".to_string(),
                    lastname: String::new(),
                    email: "carol@example.org".to_string(),
                    sshkeys: vec![SshKey {
                        comment: "carol@desk".to_string(),
                        key_type: "ssh-rsa".to_string(),
                        key: "AAAAB3NzaC1yc2E".to_string(),
                    }],
                    order: Some(10),
                },
            )]),
        };
        assert_eq!(expected, Params::from_yaml(yaml).unwrap());
    }

    #[test]
    fn group_order_is_kept() {
        let params = Params::from_yaml("groups: [wheel, adm, docker]\n").unwrap();
        assert_eq!(
            vec!["wheel", "adm", "docker"],
            params.groups.iter().map(String::as_str).collect::<Vec<_>>(),
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = Params::from_yaml("login: ops\nhomedir: /root\n").unwrap_err();
        assert!(error.to_string().contains("unknown field `homedir`"), "{error}");
    }

    #[test]
    fn bad_mode_is_rejected() {
        let error = Params::from_yaml("dirmode: rwxr-xr-x\n").unwrap_err();
        assert!(error.to_string().contains("rwxr-xr-x"), "{error}");
    }
}

mod catalog {
    use super::*;

    #[test]
    fn declared_catalog_survives_a_round_trip() {
        let params = Params::from_yaml(
            "login: localadmin\nmembers: [alice]\nusers:\n  alice:\n    sshkeys:\n      \
                - {comment: a, type: ssh-ed25519, key: AAAA}\n",
        )
        .unwrap();
        let catalog = sysadmin::sysadmin::declare(&params, "debian").unwrap();

        let yaml = serde_yaml::to_string(&catalog).unwrap();
        let parsed: Catalog = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(catalog, parsed.reindex().unwrap());
    }

    #[test]
    fn key_type_is_spelled_type() {
        let mut catalog = Catalog::new();
        catalog
            .add(Resource::AuthorizedKey {
                member: "alice".to_string(),
                comment: String::new(),
                user: "localadmin".to_string(),
                target: PathBuf::from("/home/localadmin/.ssh/authorized_keys"),
                options: vec![],
                key_type: "ssh-ed25519".to_string(),
                key: "AAAA".to_string(),
            })
            .unwrap();
        let yaml = serde_yaml::to_string(&catalog).unwrap();
        assert!(yaml.starts_with("resources:\n- authorized_key:\n"), "{yaml}");
        assert!(yaml.contains("    type: ssh-ed25519\n"), "{yaml}");
        assert!(!yaml.contains("options"), "{yaml}");
        assert!(!yaml.contains("comment"), "{yaml}");
    }
}
