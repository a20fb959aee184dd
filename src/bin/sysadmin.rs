//! Manages the shared system administrator account on this host.
//!
//! ```text
//! # sysadmin plan           # list what the account should look like
//! # sysadmin apply --noop   # show what would change
//! # sysadmin apply          # converge the host
//! ```
//!
//! Parameters are read from `/etc/sysadmin/sysadmin.yaml` unless `--config` says otherwise.
//! Set `RUST_LOG=debug` to see every command that runs.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sysadmin::apply::{self, LocalSystem, Options};
use sysadmin::config::{self, Params};
use sysadmin::facts::{self, OsFamily};
use sysadmin::report::{Report, Reporter};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Manages a shared system administrator account")]
struct Cli {
    /// Parameters file.
    #[arg(short, long, value_name = "FILE", default_value_os_t = config::params_file())]
    config: PathBuf,

    /// Operating system to provision for, instead of the one in /etc/os-release.
    #[arg(long, value_name = "NAME")]
    os: Option<String>,

    /// Log at debug level. RUST_LOG takes precedence.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lists the resources that make up the account.
    Plan {
        /// Print the full catalog as YAML.
        #[arg(long)]
        yaml: bool,
    },

    /// Converges this host to match the parameters.
    Apply {
        /// Prefix for every managed path.
        #[arg(long, value_name = "DIR", default_value = "/")]
        root: PathBuf,

        /// Report what would change without changing anything.
        #[arg(short = 'n', long)]
        noop: bool,
    },

    /// Prints the operating system and what it implies.
    Facts,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let os = match cli.os {
        Some(os) => os,
        None => facts::detect()?,
    };

    match cli.command {
        Command::Facts => {
            let profile = OsFamily::classify(&os)?.profile();
            println!("operatingsystem: {os}");
            println!("shell: {}", profile.shell);
            println!("sshd_config: {}", profile.sshd_config);
            println!("sshd_service: {}", profile.sshd_service);
            Ok(())
        }
        Command::Plan { yaml } => {
            let params = Params::load(&cli.config)?;
            let catalog = sysadmin::sysadmin::declare(&params, &os)?;
            if yaml {
                print!("{}", serde_yaml::to_string(&catalog)?);
            } else {
                Reporter.catalog(&catalog)?;
            }
            Ok(())
        }
        Command::Apply { root, noop } => {
            let params = Params::load(&cli.config)?;
            let catalog = sysadmin::sysadmin::declare(&params, &os)?;
            let profile = OsFamily::classify(&os)?.profile();
            let options = Options {
                root,
                noop,
                ..Options::new(&profile)
            };

            let outcome = apply::apply(&catalog, &mut LocalSystem, &options);
            Reporter
                .outcome(&outcome, noop)
                .context("could not report the outcome")?;
            if !outcome.is_success() {
                bail!("{} resource(s) could not be converged", outcome.failures.len());
            }
            Ok(())
        }
    }
}
