use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

mod cli;
mod config_cmd;
mod render;
mod run;

use cli::*;
use config_cmd::show_config;
use datachat_config::{Config, ServerConfig};
use run::{run_chat, ChatArgs};

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("datachat")
        .join("log")
}

fn apply_overrides(
    config: &mut Config,
    server: Option<String>,
    model: Option<String>,
    context: Option<String>,
) {
    config.merge(Config {
        server: server.map(|base_url| ServerConfig {
            base_url: Some(base_url),
            ..Default::default()
        }),
        model,
        data_context: context,
        ..Default::default()
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let current_dir = std::env::current_dir()?;
    let mut config = datachat_config::load_config(&current_dir)
        .with_context(|| format!("Failed to load config for {}", current_dir.display()))?;

    let _logging =
        datachat_util::init_tracing(config.log_level.as_deref(), Some(log_dir()), cli.print_logs);

    match cli.command {
        Commands::Chat {
            message,
            server,
            model,
            context,
            session,
            format,
        } => {
            apply_overrides(&mut config, server, model, context);
            run_chat(
                &config,
                ChatArgs {
                    message,
                    session,
                    format,
                },
            )
            .await?;
        }
        Commands::Config => {
            show_config(&config, &current_dir)?;
        }
    }

    Ok(())
}
