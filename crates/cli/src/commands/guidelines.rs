use clap::Args;

use autouw_core::config::AppConfig;
use autouw_core::domain::document::Document;
use autouw_core::domain::profile::normalize_state;
use autouw_core::errors::ApplicationError;

use crate::commands::{block_on, open_store, to_pretty_json, CommandResult};

pub const COMMAND: &str = "guidelines";

#[derive(Debug, Clone, Args)]
pub struct GuidelinesArgs {
    #[arg(value_name = "BUSINESS_TYPE")]
    pub business_type: String,
    #[arg(long, help = "Only guidelines that apply in this state")]
    pub state: Option<String>,
    #[arg(long, help = "Emit machine-readable JSON output")]
    pub json: bool,
}

pub fn run(config: &AppConfig, args: &GuidelinesArgs) -> CommandResult {
    let outcome = block_on(COMMAND, async {
        let state = args.state.as_deref().map(normalize_state).transpose()?;
        let store = open_store(config).await?;
        let documents = store.guidelines_for(&args.business_type, state.as_deref()).await;
        Ok::<_, ApplicationError>((state, documents))
    });

    let (state, documents) = match outcome {
        Ok(Ok(found)) => found,
        Ok(Err(error)) => return CommandResult::from_error(COMMAND, &error),
        Err(result) => return result,
    };

    if args.json {
        return to_pretty_json(COMMAND, &documents);
    }
    CommandResult::output(render_human(&args.business_type, state.as_deref(), &documents))
}

fn render_human(business_type: &str, state: Option<&str>, documents: &[Document]) -> String {
    let scope = match state {
        Some(state) => format!("{business_type} in {state}"),
        None => business_type.to_string(),
    };
    if documents.is_empty() {
        return format!("no guidelines found for {scope}");
    }

    let mut lines = vec![format!("{} guideline(s) for {scope}:", documents.len())];
    for document in documents {
        lines.push(format!(
            "- {} | {} (states: {}; updated {})",
            document.doc_id,
            document.title,
            document.applicable_states.join(", "),
            document.last_updated.format("%Y-%m-%d")
        ));
    }
    lines.join("\n")
}
