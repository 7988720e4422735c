use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use rust_decimal::Decimal;

use autouw_agent::UnderwritingAgent;
use autouw_core::config::AppConfig;
use autouw_core::domain::profile::{ClaimRecord, PolicyRequest};
use autouw_core::domain::quote::Quote;
use autouw_core::errors::{ApplicationError, ValidationError};
use autouw_core::format::format_money;

use crate::commands::{block_on, build_agent, to_pretty_json, CommandResult};

pub const COMMAND: &str = "quote";

#[derive(Debug, Clone, Args)]
pub struct QuoteArgs {
    #[arg(long)]
    pub business_name: String,
    #[arg(long)]
    pub business_type: String,
    #[arg(long)]
    pub annual_revenue: Decimal,
    #[arg(long)]
    pub employee_count: i64,
    #[arg(long)]
    pub state: String,
    #[arg(long)]
    pub city: String,
    #[arg(long)]
    pub years_in_business: i64,
    #[arg(long)]
    pub business_description: String,
    #[arg(long = "claims", value_name = "FILE", help = "JSON array of {date, type, amount}")]
    pub claims_file: Option<PathBuf>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long, value_name = "FILE", help = "Write the quote JSON here instead of stdout")]
    pub output: Option<PathBuf>,
}

impl QuoteArgs {
    pub fn to_request(&self) -> Result<PolicyRequest, ApplicationError> {
        let claims_history = match &self.claims_file {
            Some(path) => read_claims(path)?,
            None => Vec::new(),
        };

        Ok(PolicyRequest {
            business_name: self.business_name.clone(),
            business_type: self.business_type.clone(),
            annual_revenue: self.annual_revenue,
            employee_count: self.employee_count,
            state: self.state.clone(),
            city: self.city.clone(),
            years_in_business: self.years_in_business,
            business_description: self.business_description.clone(),
            claims_history,
            additional_notes: self.notes.clone(),
        })
    }
}

pub fn run(config: &AppConfig, args: &QuoteArgs) -> CommandResult {
    let outcome = block_on(COMMAND, async {
        let agent = build_agent(config).await?;
        generate(&agent, args).await
    });
    finish(outcome, args)
}

/// Same as [`run`] with an already wired agent.
pub fn run_with(agent: &UnderwritingAgent, args: &QuoteArgs) -> CommandResult {
    let outcome = block_on(COMMAND, generate(agent, args));
    finish(outcome, args)
}

async fn generate(
    agent: &UnderwritingAgent,
    args: &QuoteArgs,
) -> Result<Quote, ApplicationError> {
    let request = args.to_request()?;
    agent.quote(&request).await
}

fn finish(
    outcome: Result<Result<Quote, ApplicationError>, CommandResult>,
    args: &QuoteArgs,
) -> CommandResult {
    let quote = match outcome {
        Ok(Ok(quote)) => quote,
        Ok(Err(error)) => return CommandResult::from_error(COMMAND, &error),
        Err(result) => return result,
    };

    let Some(output) = &args.output else {
        return to_pretty_json(COMMAND, &quote);
    };

    let written = serde_json::to_string_pretty(&quote)
        .map_err(|error| CommandResult::failure(COMMAND, "serialization", error.to_string(), 3))
        .and_then(|json| {
            fs::write(output, json).map_err(|error| {
                let error =
                    ApplicationError::io(format!("could not write {}", output.display()), error);
                CommandResult::from_error(COMMAND, &error)
            })
        });

    match written {
        Ok(()) => CommandResult::success(
            COMMAND,
            format!(
                "quote {} ({}) written to {}; report at {}",
                quote.id(),
                format_money(quote.premium()),
                output.display(),
                quote.report_path.display()
            ),
        ),
        Err(result) => result,
    }
}

fn read_claims(path: &Path) -> Result<Vec<ClaimRecord>, ApplicationError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        ApplicationError::io(format!("could not read claims file {}", path.display()), error)
    })?;
    serde_json::from_str::<Vec<ClaimRecord>>(&raw).map_err(|error| {
        ValidationError::new(
            "claims_history",
            format!("{} must contain a JSON array of claims: {error}", path.display()),
        )
        .into()
    })
}
