//! armory - package manager CLI

use std::process::ExitCode;

use anyhow::Result;
use armory_core::Reporter;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use armory_cli::cmd;
use armory_cli::ui::Output;
use armory_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Output::new().error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let global = cli.global;

    let Some(command) = cli.command else {
        return cmd::list::list(&global).await;
    };

    match command {
        Commands::Install {
            name,
            force,
            armory,
        } => cmd::install::install(&global, &name, force, armory.as_deref()).await,
        Commands::Update { armory } => cmd::update::update(&global, armory.as_deref()).await,
        Commands::Search { pattern } => cmd::search::search(&global, &pattern).await,
        Commands::Info { name } => cmd::info::info(&global, name.as_deref()).await,
        Commands::Add {
            name,
            url,
            pubkey,
            auth,
            authcmd,
            no_save,
        } => {
            let armory = cmd::add::NewArmory {
                name,
                url,
                pubkey,
                auth,
                authcmd,
            };
            cmd::add::add(&global, armory, !no_save).await
        }
        Commands::Rm { name } => cmd::remove::remove(&global, &name),
        Commands::Enable { name } => cmd::enable::set_enabled(&global, &name, true).await,
        Commands::Disable { name } => cmd::enable::set_enabled(&global, &name, false).await,
        Commands::Modify {
            name,
            new_name,
            url,
            pubkey,
            auth,
            authcmd,
            no_save,
        } => {
            let changes = armory_core::ArmoryChanges {
                name: new_name,
                repo_url: url,
                public_key: pubkey,
                authorization: auth,
                authorization_cmd: authcmd,
            };
            cmd::modify::modify(&global, &name, &changes, !no_save).await
        }
        Commands::Refresh => cmd::refresh::refresh(&global).await,
        Commands::Reset => cmd::reset::reset(&global).await,
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
