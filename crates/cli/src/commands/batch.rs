use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use autouw_agent::UnderwritingAgent;
use autouw_core::config::AppConfig;
use autouw_core::domain::profile::PolicyRequest;
use autouw_core::domain::quote::Quote;
use autouw_core::errors::{ApplicationError, ValidationError};
use autouw_core::format::slugify;

use crate::commands::{block_on, build_agent, CommandResult};

pub const COMMAND: &str = "batch-quote";

#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    #[arg(value_name = "INPUT", help = "JSON file holding an array of quote requests")]
    pub input: PathBuf,
    #[arg(long, value_name = "DIR", help = "Write one JSON file per successful quote here")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ItemFailure<'a> {
    index: usize,
    business_name: &'a str,
    error_class: &'a str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ItemWritten<'a> {
    index: usize,
    quote_id: &'a str,
    file: String,
}

#[derive(Debug, Serialize)]
struct BatchSummary {
    processed: usize,
    succeeded: usize,
    failed: usize,
}

pub fn run(config: &AppConfig, args: &BatchArgs) -> CommandResult {
    let items = match read_items(&args.input) {
        Ok(items) => items,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };
    let outcome = block_on(COMMAND, async {
        let agent = build_agent(config).await?;
        Ok::<_, ApplicationError>(quote_items(&agent, &items).await)
    });

    match outcome {
        Ok(Ok(outcomes)) => report(&items, outcomes, args.output_dir.as_deref()),
        Ok(Err(error)) => CommandResult::from_error(COMMAND, &error),
        Err(result) => result,
    }
}

/// Same as [`run`] with an already wired agent.
pub fn run_with(agent: &UnderwritingAgent, args: &BatchArgs) -> CommandResult {
    let items = match read_items(&args.input) {
        Ok(items) => items,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };

    match block_on(COMMAND, quote_items(agent, &items)) {
        Ok(outcomes) => report(&items, outcomes, args.output_dir.as_deref()),
        Err(result) => result,
    }
}

fn read_items(path: &Path) -> Result<Vec<Value>, ApplicationError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        ApplicationError::io(format!("could not read batch input {}", path.display()), error)
    })?;
    let message = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(items)) => return Ok(items),
        Ok(_) => "must be a JSON array of quote requests".to_string(),
        Err(error) => format!("is not valid JSON: {error}"),
    };
    Err(ValidationError::new("input", message).into())
}

/// Items that do not deserialize fail on their own; the rest go through the
/// agent's batch path. Results come back in input order.
async fn quote_items(
    agent: &UnderwritingAgent,
    items: &[Value],
) -> Vec<Result<Quote, ApplicationError>> {
    let parsed: Vec<Result<PolicyRequest, ApplicationError>> = items
        .iter()
        .map(|item| {
            serde_json::from_value::<PolicyRequest>(item.clone()).map_err(|error| {
                ValidationError::new("request", format!("malformed quote request: {error}")).into()
            })
        })
        .collect();

    let requests: Vec<PolicyRequest> =
        parsed.iter().filter_map(|item| item.as_ref().ok().cloned()).collect();
    let mut quoted = agent.quote_batch(&requests).await.into_iter();

    parsed
        .into_iter()
        .map(|item| match item {
            Ok(_) => quoted.next().unwrap_or_else(|| {
                Err(ApplicationError::Integration("batch result missing".to_string()))
            }),
            Err(error) => Err(error),
        })
        .collect()
}

fn report(
    items: &[Value],
    outcomes: Vec<Result<Quote, ApplicationError>>,
    output_dir: Option<&Path>,
) -> CommandResult {
    if let Some(dir) = output_dir {
        if let Err(error) = fs::create_dir_all(dir) {
            let error = ApplicationError::io(format!("could not create {}", dir.display()), error);
            return CommandResult::from_error(COMMAND, &error);
        }
    }

    let mut lines = Vec::with_capacity(outcomes.len() + 1);
    let mut failed = 0;
    for (index, outcome) in outcomes.iter().enumerate() {
        let business_name =
            items.get(index).and_then(|item| item.get("business_name")).and_then(Value::as_str);
        let written = outcome
            .as_ref()
            .map_err(|error| error.to_string())
            .and_then(|quote| emit(index, quote, business_name.unwrap_or_default(), output_dir));

        match (outcome, written) {
            (_, Ok(line)) => lines.push(line),
            (Err(error), Err(message)) => {
                failed += 1;
                lines.push(json_line(&ItemFailure {
                    index,
                    business_name: business_name.unwrap_or_default(),
                    error_class: error.error_class(),
                    message,
                }));
            }
            (Ok(_), Err(message)) => {
                failed += 1;
                lines.push(json_line(&ItemFailure {
                    index,
                    business_name: business_name.unwrap_or_default(),
                    error_class: "io",
                    message,
                }));
            }
        }
    }

    let summary =
        BatchSummary { processed: outcomes.len(), succeeded: outcomes.len() - failed, failed };
    info!(
        event_name = "cli.batch.completed",
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "batch finished"
    );
    lines.push(json_line(&summary));

    CommandResult { exit_code: if failed == 0 { 0 } else { 3 }, output: lines.join("\n") }
}

/// One stdout line per successful item: the quote itself, or a pointer to the
/// file it was written to.
fn emit(
    index: usize,
    quote: &Quote,
    business_name: &str,
    output_dir: Option<&Path>,
) -> Result<String, String> {
    let Some(dir) = output_dir else {
        return serde_json::to_string(quote).map_err(|error| error.to_string());
    };

    let path = dir.join(format!("quote_{}_{}.json", slugify(business_name), index + 1));
    let json = serde_json::to_string_pretty(quote).map_err(|error| error.to_string())?;
    fs::write(&path, json).map_err(|error| format!("could not write {}: {error}", path.display()))?;

    Ok(json_line(&ItemWritten {
        index,
        quote_id: &quote.id().0,
        file: path.display().to_string(),
    }))
}

fn json_line<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}"))
}
