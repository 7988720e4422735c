pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use autouw_core::config::{AppConfig, ConfigOverrides, LoadOptions};

use crate::commands::batch::BatchArgs;
use crate::commands::docs::DocsCommand;
use crate::commands::guidelines::GuidelinesArgs;
use crate::commands::quote::QuoteArgs;
use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "autouw",
    about = "Small-business insurance underwriting assistant",
    long_about = "Rate small-business policy requests, ask the risk model for a qualitative \
                  assessment, render quote reports and maintain the underwriting document store.",
    after_help = "Examples:\n  \
                  autouw quote --business-name \"Joe's Diner\" --business-type restaurant \
                  --annual-revenue 750000 --employee-count 25 --state CA \
                  --city \"San Francisco\" --years-in-business 5 \
                  --business-description \"Family diner\"\n  \
                  autouw batch-quote requests.json --output-dir quotes\n  \
                  autouw guidelines restaurant --state CA\n  \
                  autouw config"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Path to an autouw.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override storage.documents_dir")]
    documents_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Override storage.reports_dir")]
    reports_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Override llm.model")]
    model: Option<String>,
}

impl GlobalArgs {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                log_level: self.log_level.clone(),
                llm_model: self.model.clone(),
                documents_dir: self.documents_dir.clone(),
                reports_dir: self.reports_dir.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Generate one quote and its report from business facts given as flags")]
    Quote(QuoteArgs),
    #[command(about = "Generate quotes for every request in a JSON array file")]
    BatchQuote(BatchArgs),
    #[command(about = "List stored underwriting guidelines for a business type")]
    Guidelines(GuidelinesArgs),
    #[command(about = "Maintain the underwriting document store")]
    Docs {
        #[command(subcommand)]
        command: DocsCommand,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Quote(_) => commands::quote::COMMAND,
            Self::BatchQuote(_) => commands::batch::COMMAND,
            Self::Guidelines(_) => commands::guidelines::COMMAND,
            Self::Docs { command } => command.name(),
            Self::Config => "config",
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let result = execute(cli);

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

pub fn execute(cli: Cli) -> CommandResult {
    let options = cli.global.load_options();
    let name = cli.command.name();

    match cli.command {
        Command::Config => commands::config::run(options),
        Command::Quote(args) => {
            with_config(name, options, |config| commands::quote::run(config, &args))
        }
        Command::BatchQuote(args) => {
            with_config(name, options, |config| commands::batch::run(config, &args))
        }
        Command::Guidelines(args) => {
            with_config(name, options, |config| commands::guidelines::run(config, &args))
        }
        Command::Docs { command } => {
            with_config(name, options, |config| commands::docs::run(config, command))
        }
    }
}

fn with_config(
    command: &str,
    options: LoadOptions,
    run: impl FnOnce(&AppConfig) -> CommandResult,
) -> CommandResult {
    match AppConfig::load(options) {
        Ok(config) => {
            logging::init(&config.logging);
            run(&config)
        }
        Err(error) => CommandResult::failure(command, "configuration", error.to_string(), 2),
    }
}
