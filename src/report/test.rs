use super::*;
use crate::core::resource::{Ensure, Fragment, Mode};
use anyhow::anyhow;
use std::path::PathBuf;

fn change(resource: &str, message: &str) -> Change {
    Change {
        resource: resource.to_string(),
        message: message.to_string(),
    }
}

mod title {
    use super::*;

    #[test]
    fn user() {
        assert_eq!(
            "user (absent): localadmin",
            title(&Resource::User {
                login: "localadmin".to_string(),
                ensure: Ensure::Absent,
                groups: vec![],
                home: PathBuf::from("/home/localadmin"),
                shell: "/bin/bash".to_string(),
            }),
        );
    }

    #[test]
    fn paths() {
        assert_eq!(
            "directory (0755): /home/localadmin/.ssh",
            title(&Resource::Directory {
                path: PathBuf::from("/home/localadmin/.ssh"),
                owner: "localadmin".to_string(),
                group: "localadmin".to_string(),
                mode: Mode::new(0o755),
                recurse: true,
                force: true,
            }),
        );
        assert_eq!(
            "concat (0644): /home/localadmin/.sysadminrc",
            title(&Resource::Concat {
                path: PathBuf::from("/home/localadmin/.sysadminrc"),
                owner: "localadmin".to_string(),
                group: "localadmin".to_string(),
                mode: Mode::new(0o644),
            }),
        );
    }

    #[test]
    fn fragment() {
        assert_eq!(
            "fragment (01): localadmin_sysadminrc_header -> /home/localadmin/.sysadminrc",
            title(&Resource::Fragment(Fragment {
                target: PathBuf::from("/home/localadmin/.sysadminrc"),
                name: "localadmin_sysadminrc_header".to_string(),
                order: 1,
                content: String::new(),
            })),
        );
    }

    #[test]
    fn authorized_keys() {
        let key = |comment: &str| Resource::AuthorizedKey {
            member: "alice".to_string(),
            comment: comment.to_string(),
            user: "localadmin".to_string(),
            target: PathBuf::from("/home/localadmin/.ssh/authorized_keys"),
            options: vec![],
            key_type: "ssh-ed25519".to_string(),
            key: "AAAAC3Nz".to_string(),
        };
        assert_eq!(
            "authorized_key (localadmin): alice ssh-ed25519 alice@laptop",
            title(&key("alice@laptop")),
        );
        assert_eq!("authorized_key (localadmin): alice ssh-ed25519", title(&key("")));
        assert_eq!(
            "purge_authorized_keys (1 kept): /home/localadmin/.ssh/authorized_keys",
            title(&Resource::PurgeAuthorizedKeys {
                target: PathBuf::from("/home/localadmin/.ssh/authorized_keys"),
                keep: vec!["AAAAC3Nz".to_string()],
            }),
        );
    }

    #[test]
    fn sshd() {
        assert_eq!(
            "sshd_config: PermitUserEnvironment yes",
            title(&Resource::SshdSetting {
                keyword: "PermitUserEnvironment".to_string(),
                value: "yes".to_string(),
            }),
        );
        assert_eq!(
            "sshd_config: AcceptEnv SYSADMIN_USER",
            title(&Resource::SshdAcceptEnv {
                name: "SYSADMIN_USER".to_string(),
            }),
        );
    }
}

mod _catalog {
    use super::*;

    #[test]
    fn one_title_per_line() {
        let mut catalog = Catalog::new();
        catalog
            .add(Resource::SshdAcceptEnv {
                name: "SYSADMIN_USER".to_string(),
            })
            .unwrap();
        catalog
            .add(Resource::SshdSetting {
                keyword: "PermitUserEnvironment".to_string(),
                value: "yes".to_string(),
            })
            .unwrap();

        let mut stdout = vec![];
        _catalog(&mut stdout, &catalog).unwrap();
        assert_eq!(
            "sshd_config: AcceptEnv SYSADMIN_USER\nsshd_config: PermitUserEnvironment yes\n",
            String::from_utf8_lossy(&stdout),
        );
    }
}

mod _outcome {
    use super::*;

    #[test]
    fn nothing_to_do() {
        let (mut stdout, mut stderr) = (vec![], vec![]);
        _outcome(&mut stdout, &mut stderr, &Outcome::default(), false).unwrap();
        assert_eq!("Nothing to do.\n", String::from_utf8_lossy(&stdout));
        assert!(stderr.is_empty());
    }

    #[test]
    fn changes() {
        let outcome = Outcome {
            changes: vec![change("user:localadmin", "created")],
            failures: vec![],
        };

        let (mut stdout, mut stderr) = (vec![], vec![]);
        _outcome(&mut stdout, &mut stderr, &outcome, false).unwrap();
        assert_eq!(
            "Changed user:localadmin: created\n1 change(s).\n",
            String::from_utf8_lossy(&stdout),
        );
        assert!(stderr.is_empty());

        let (mut stdout, mut stderr) = (vec![], vec![]);
        _outcome(&mut stdout, &mut stderr, &outcome, true).unwrap();
        assert_eq!(
            "Would change user:localadmin: created\n1 change(s).\n",
            String::from_utf8_lossy(&stdout),
        );
        assert!(stderr.is_empty());
    }

    #[test]
    fn failures_go_to_stderr() {
        let outcome = Outcome {
            changes: vec![change("file:/home/localadmin", "created, mode 0755")],
            failures: vec![(
                "file:/home/localadmin/.ssh".to_string(),
                anyhow!("permission denied").context("could not create /home/localadmin/.ssh"),
            )],
        };

        let (mut stdout, mut stderr) = (vec![], vec![]);
        _outcome(&mut stdout, &mut stderr, &outcome, false).unwrap();
        assert_eq!(
            "Changed file:/home/localadmin: created, mode 0755\n",
            String::from_utf8_lossy(&stdout),
        );
        assert_eq!(
            "Failed file:/home/localadmin/.ssh: could not create /home/localadmin/.ssh: \
                permission denied\n\
                1 change(s), 1 failure(s).\n",
            String::from_utf8_lossy(&stderr),
        );
    }
}
