//! Subcommand handlers. [`dispatch`] routes a parsed [`Cli`] to one of them.

pub mod health;
pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::RelayError;

const WELCOME: &str = "\
  No command provided. To get started:

    hostrelay run -u https://api.example.com   Forward :8080 to one origin
    hostrelay init -u https://api.example.com  Generate a starter config
    hostrelay run                              Start with ./hostrelay.yaml
    hostrelay --help                           See all commands and options
";

pub async fn dispatch(cli: Cli) -> Result<(), RelayError> {
    let Some(command) = cli.command else {
        println!(
            "\n  hostrelay v{} \u{2014} single-upstream HTTP reverse proxy\n\n{WELCOME}",
            env!("CARGO_PKG_VERSION")
        );
        return Ok(());
    };

    match command {
        Commands::Run(args) => run::execute(*args).await,
        Commands::Init(args) => init::execute(&args),
        Commands::Validate(args) => validate::execute(&args),
        Commands::Health(args) => health::execute(args).await,
    }
}
