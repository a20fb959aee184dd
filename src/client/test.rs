use super::*;
use std::io;

mod run {
    use super::*;

    #[test]
    fn empty_cmd_or_failure_to_start() {
        let error = run("", &["a", "b", "c"]).unwrap_err();
        assert!(
            error
                .to_string()
                .contains("failed to start command: '' a b c")
        );
        let error: io::Error = error.downcast().unwrap();
        assert_eq!(io::ErrorKind::NotFound, error.kind());
    }

    #[test]
    fn empty_args() -> anyhow::Result<()> {
        run::<&str, &str>("true", &[])
    }

    #[test]
    fn exit_failure() {
        let error = run("bash", &["-c", "exit 3"]).unwrap_err();
        assert!(
            error
                .to_string()
                .contains("command exited with exit code 3: bash -c 'exit 3'")
        );
    }

    #[test]
    fn exit_success() -> anyhow::Result<()> {
        run("bash", &["-c", "true"])
    }
}

mod output {
    use super::*;

    #[test]
    fn captures_stdout() -> anyhow::Result<()> {
        assert_eq!("root:x\n", output("echo", &["root:x"])?);
        Ok(())
    }

    #[test]
    fn failure_includes_stderr() {
        let error = output("bash", &["-c", "echo nope >&2; false"]).unwrap_err();
        let message = format!("{error:#}");
        assert!(message.contains("captured stderr: nope"), "{message}");
        assert!(message.contains("exit code 1"), "{message}");
    }
}

mod describe {
    use super::*;

    #[test]
    fn quotes_only_when_needed() {
        // Test cases, in format: (cmd, args, expected_output).
        let cases = [
            ("usermod", ["-G", "adm,sudo"], "usermod -G adm,sudo"),
            ("bash", ["-c", "echo hi"], "bash -c 'echo hi'"),
        ];
        for (cmd, args, expected) in cases {
            assert_eq!(expected, describe(cmd, &args));
        }
    }
}
