use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "datachat")]
#[command(about = "DataChat - streaming data-analysis chat client", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Log to stderr instead of the log file.
    #[arg(long, global = true, default_value_t = false)]
    pub(crate) print_logs: bool,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    #[command(about = "Ask a question, or start an interactive chat without one")]
    Chat {
        #[arg(value_name = "MESSAGE")]
        message: Vec<String>,
        #[arg(long, value_name = "URL")]
        server: Option<String>,
        #[arg(short = 'm', long)]
        model: Option<String>,
        #[arg(short = 'c', long, value_name = "DATA_SOURCE")]
        context: Option<String>,
        #[arg(short = 's', long)]
        session: Option<String>,
        #[arg(long, default_value = "default")]
        format: OutputFormat,
    },
    #[command(about = "Print the resolved configuration")]
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Default,
    Json,
}
