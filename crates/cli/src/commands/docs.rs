use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde_json::{Map, Value};

use autouw_core::config::AppConfig;
use autouw_core::domain::document::{DocType, Document};
use autouw_core::errors::{ApplicationError, ValidationError};
use autouw_db::DocumentStore;

use crate::commands::{block_on, open_store, to_pretty_json, CommandResult};

#[derive(Debug, Clone, Subcommand)]
pub enum DocsCommand {
    #[command(about = "List stored documents, optionally narrowed by type and state")]
    List {
        #[arg(long, value_name = "TYPE")]
        doc_type: Option<String>,
        #[arg(long)]
        state: Option<String>,
    },
    #[command(about = "Print one document as JSON")]
    Show { doc_id: String },
    #[command(about = "Case-insensitive substring search over document content")]
    Search {
        query: String,
        #[arg(long, help = "Also search the metadata JSON")]
        metadata: bool,
    },
    #[command(about = "Add a document, replacing any document with the same id")]
    Add(AddArgs),
    #[command(about = "Merge a JSON object of fields into an existing document")]
    Update {
        doc_id: String,
        #[arg(long, value_name = "JSON")]
        fields: String,
    },
    #[command(about = "Delete a document")]
    Delete { doc_id: String },
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    #[arg(long = "id")]
    pub doc_id: String,
    #[arg(long)]
    pub title: String,
    #[arg(long, conflicts_with = "content_file", required_unless_present = "content_file")]
    pub content: Option<String>,
    #[arg(long, value_name = "FILE")]
    pub content_file: Option<PathBuf>,
    #[arg(long, help = "guideline|regulation|assessment|policy, defaults to the metadata type")]
    pub doc_type: Option<String>,
    #[arg(long, value_name = "JSON", help = "JSON object such as business_type, applicable_states")]
    pub metadata: Option<String>,
}

impl DocsCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "docs list",
            Self::Show { .. } => "docs show",
            Self::Search { .. } => "docs search",
            Self::Add(_) => "docs add",
            Self::Update { .. } => "docs update",
            Self::Delete { .. } => "docs delete",
        }
    }
}

enum DocsOutput {
    Documents(Vec<Document>),
    Document(Document),
    Message(String),
}

pub fn run(config: &AppConfig, command: DocsCommand) -> CommandResult {
    let name = command.name();
    let outcome = block_on(name, async {
        let store = open_store(config).await?;
        execute(&store, command).await
    });

    match outcome {
        Ok(Ok(DocsOutput::Documents(documents))) => to_pretty_json(name, &documents),
        Ok(Ok(DocsOutput::Document(document))) => to_pretty_json(name, &document),
        Ok(Ok(DocsOutput::Message(message))) => CommandResult::success(name, message),
        Ok(Err(error)) => CommandResult::from_error(name, &error),
        Err(result) => result,
    }
}

async fn execute(
    store: &DocumentStore,
    command: DocsCommand,
) -> Result<DocsOutput, ApplicationError> {
    match command {
        DocsCommand::List { doc_type, state } => {
            let mut documents = match doc_type {
                Some(doc_type) => store.by_type(doc_type.parse::<DocType>()?).await,
                None => store.list().await,
            };
            if let Some(state) = state {
                documents.retain(|document| document.applies_to_state(&state));
            }
            Ok(DocsOutput::Documents(documents))
        }
        DocsCommand::Show { doc_id } => Ok(DocsOutput::Document(store.get(&doc_id).await?)),
        DocsCommand::Search { query, metadata } => {
            Ok(DocsOutput::Documents(store.search(&query, metadata).await))
        }
        DocsCommand::Add(args) => {
            let content = match (&args.content, &args.content_file) {
                (Some(content), _) => content.clone(),
                (None, Some(path)) => fs::read_to_string(path).map_err(|error| {
                    ApplicationError::io(format!("could not read {}", path.display()), error)
                })?,
                (None, None) => {
                    return Err(ValidationError::new("content", "cannot be empty").into())
                }
            };
            let mut metadata = parse_object("metadata", args.metadata.as_deref())?;
            apply_doc_type(&mut metadata, args.doc_type.as_deref())?;

            let document =
                store.add(&args.doc_id, &args.title, &content, Value::Object(metadata)).await?;
            Ok(DocsOutput::Message(format!(
                "stored {} `{}` as {}",
                document.doc_type,
                document.doc_id,
                store.root().join(format!("{}.json", document.doc_id)).display()
            )))
        }
        DocsCommand::Update { doc_id, fields } => {
            let fields = parse_object("fields", Some(fields.as_str()))?;
            Ok(DocsOutput::Document(store.update(&doc_id, fields).await?))
        }
        DocsCommand::Delete { doc_id } => {
            store.delete(&doc_id).await?;
            Ok(DocsOutput::Message(format!("deleted `{doc_id}`")))
        }
    }
}

/// Folds `--doc-type` into the metadata. Without the flag the metadata's own
/// `doc_type` or `type` decides; a flag that disagrees with it is rejected.
fn apply_doc_type(
    metadata: &mut Map<String, Value>,
    flag: Option<&str>,
) -> Result<(), ValidationError> {
    let Some(flag) = flag else {
        return Ok(());
    };
    let doc_type = flag.parse::<DocType>()?;
    let declared =
        metadata.get("doc_type").or_else(|| metadata.get("type")).and_then(Value::as_str);
    if let Some(declared) = declared {
        if declared.parse::<DocType>().ok() != Some(doc_type) {
            return Err(ValidationError::new(
                "doc_type",
                format!("--doc-type {doc_type} conflicts with metadata type `{declared}`"),
            ));
        }
    }
    metadata.insert("doc_type".to_string(), Value::String(doc_type.to_string()));
    Ok(())
}

fn parse_object(field: &str, raw: Option<&str>) -> Result<Map<String, Value>, ValidationError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(ValidationError::new(field, "must be a JSON object")),
        Err(error) => Err(ValidationError::new(field, format!("is not valid JSON: {error}"))),
    }
}
