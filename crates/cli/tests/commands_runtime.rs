use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use clap::Parser;
use rust_decimal::Decimal;
use serde_json::Value;

use autouw_agent::llm::{GenerationRequest, LlmClient};
use autouw_agent::{ClaudeContext, ModelParameters, RiskNarrativeClient, UnderwritingAgent};
use autouw_cli::commands::batch::{self, BatchArgs};
use autouw_cli::commands::quote::{self, QuoteArgs};
use autouw_cli::{execute, Cli};
use autouw_core::errors::ApplicationError;
use autouw_report::QuoteReportRenderer;

const MEDIUM_REPLY: &str = "{\"risk_profile\": \"medium\", \"risk_factors\": \
[\"Recent property claim\"], \"risk_score\": 65, \"recommendations\": []}";

struct CannedLlm;

#[async_trait]
impl LlmClient for CannedLlm {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ApplicationError> {
        Ok(MEDIUM_REPLY.to_string())
    }
}

fn agent(reports_dir: &Path) -> UnderwritingAgent {
    let context = ClaudeContext::new(ModelParameters {
        model: "claude-3-sonnet-20240229".to_string(),
        max_tokens: 1000,
        temperature: 0.7,
        top_p: None,
    });
    let renderer = QuoteReportRenderer::new(reports_dir).expect("renderer").html_only();
    UnderwritingAgent::new(
        RiskNarrativeClient::new(Arc::new(CannedLlm), Arc::new(context)),
        Arc::new(renderer),
    )
}

fn quote_args(claims_file: Option<PathBuf>, output: Option<PathBuf>) -> QuoteArgs {
    QuoteArgs {
        business_name: "Joe's Diner".to_string(),
        business_type: "restaurant".to_string(),
        annual_revenue: Decimal::from(750_000),
        employee_count: 25,
        state: "CA".to_string(),
        city: "San Francisco".to_string(),
        years_in_business: 5,
        business_description: "Family-owned restaurant".to_string(),
        claims_file,
        notes: None,
        output,
    }
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("autouw").chain(args.iter().copied()))
        .expect("arguments should parse")
}

fn write_claims(dir: &Path) -> PathBuf {
    let path = dir.join("claims.json");
    fs::write(&path, r#"[{"date": "2023-01-15", "type": "property", "amount": 5000}]"#)
        .expect("write claims");
    path
}

#[test]
fn quote_prints_the_quote_as_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    let claims = write_claims(temp.path());

    let reports = temp.path().join("reports");

    let result = quote::run_with(&agent(&reports), &quote_args(Some(claims), None));

    assert_eq!(result.exit_code, 0, "{}", result.output);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["premium"], "7200");
    assert_eq!(payload["risk"]["risk_profile"], "medium");
    assert_eq!(payload["conditions"].as_array().map(Vec::len), Some(5));
    let report = payload["report_path"].as_str().expect("report path");
    assert!(Path::new(report).exists());
}

#[test]
fn quote_with_output_writes_the_file_and_reports_success() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = temp.path().join("quote.json");

    let reports = temp.path().join("reports");

    let result = quote::run_with(&agent(&reports), &quote_args(None, Some(output.clone())));

    assert_eq!(result.exit_code, 0, "{}", result.output);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "quote");
    assert_eq!(payload["status"], "ok");
    let written = parse_payload(&fs::read_to_string(output).expect("quote file"));
    assert_eq!(written["premium"], "5400");
}

#[test]
fn quote_with_invalid_state_fails_validation() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut args = quote_args(None, None);
    args.state = "XX".to_string();

    let result = quote::run_with(&agent(temp.path()), &args);

    assert_eq!(result.exit_code, 2);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "validation");
}

#[test]
fn quote_with_malformed_claims_file_fails_validation() {
    let temp = tempfile::tempdir().expect("tempdir");
    let claims = temp.path().join("claims.json");
    fs::write(&claims, r#"{"date": "2023-01-15"}"#).expect("write claims");

    let result = quote::run_with(&agent(temp.path()), &quote_args(Some(claims), None));

    assert_eq!(result.exit_code, 2);
    assert_eq!(parse_payload(&result.output)["error_class"], "validation");
}

#[test]
fn quote_without_api_key_is_a_configuration_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let documents = temp.path().join("data");
    let documents = documents.to_str().expect("utf-8 path");

    with_env(&[], || {
        let result = execute(cli(&[
            "--documents-dir",
            documents,
            "quote",
            "--business-name",
            "Joe's Diner",
            "--business-type",
            "restaurant",
            "--annual-revenue",
            "750000",
            "--employee-count",
            "25",
            "--state",
            "CA",
            "--city",
            "San Francisco",
            "--years-in-business",
            "5",
            "--business-description",
            "Family-owned restaurant",
        ]));

        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "configuration");
        assert!(payload["message"].as_str().unwrap_or_default().contains("llm.api_key"));
    });
}

#[test]
fn batch_isolates_failures_and_writes_one_file_per_quote() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("requests.json");
    let output_dir = temp.path().join("quotes");
    fs::write(
        &input,
        r#"[
            {"business_name": "Joe's Diner", "business_type": "restaurant",
             "annual_revenue": 750000, "employee_count": 25, "state": "CA",
             "city": "San Francisco", "years_in_business": 5,
             "business_description": "Family-owned restaurant"},
            {"business_name": "Broken Co", "business_type": "retail"},
            {"business_name": "Nowhere Shop", "business_type": "retail",
             "annual_revenue": 300000, "employee_count": 4, "state": "QQ",
             "city": "Nowhere", "years_in_business": 1,
             "business_description": "Corner shop"}
        ]"#,
    )
    .expect("write batch input");

    let result = batch::run_with(
        &agent(&temp.path().join("reports")),
        &BatchArgs { input, output_dir: Some(output_dir.clone()) },
    );

    assert_eq!(result.exit_code, 3);
    let lines: Vec<Value> = result.output.lines().map(parse_payload).collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["index"], 0);
    assert!(lines[0]["file"].as_str().unwrap_or_default().ends_with("quote_joes_diner_1.json"));
    assert_eq!(lines[1]["business_name"], "Broken Co");
    assert_eq!(lines[1]["error_class"], "validation");
    assert_eq!(lines[2]["business_name"], "Nowhere Shop");
    assert_eq!(lines[2]["error_class"], "validation");
    assert_eq!(lines[3]["processed"], 3);
    assert_eq!(lines[3]["succeeded"], 1);
    assert_eq!(lines[3]["failed"], 2);
    assert!(output_dir.join("quote_joes_diner_1.json").exists());
}

#[test]
fn batch_rejects_input_that_is_not_an_array() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("requests.json");
    fs::write(&input, r#"{"business_name": "Joe's Diner"}"#).expect("write batch input");

    let result = batch::run_with(&agent(temp.path()), &BatchArgs { input, output_dir: None });

    assert_eq!(result.exit_code, 2);
    assert_eq!(parse_payload(&result.output)["error_class"], "validation");
}

#[test]
fn docs_round_trip_through_the_store() {
    let temp = tempfile::tempdir().expect("tempdir");
    let documents = temp.path().join("data");
    let documents = documents.to_str().expect("utf-8 path");

    with_env(&[], || {
        let added = execute(cli(&[
            "--documents-dir",
            documents,
            "docs",
            "add",
            "--id",
            "gl-restaurant",
            "--title",
            "Restaurant Fire Safety",
            "--content",
            "Hood suppression systems are required for open flame cooking.",
            "--metadata",
            r#"{"business_type": "restaurant", "applicable_states": ["CA", "NV"]}"#,
        ]));
        assert_eq!(added.exit_code, 0, "{}", added.output);
        assert_eq!(parse_payload(&added.output)["status"], "ok");

        let shown = execute(cli(&["--documents-dir", documents, "docs", "show", "gl-restaurant"]));
        assert_eq!(shown.exit_code, 0);
        let document = parse_payload(&shown.output);
        assert_eq!(document["title"], "Restaurant Fire Safety");
        assert_eq!(document["doc_type"], "guideline");

        let found = execute(cli(&["--documents-dir", documents, "docs", "search", "HOOD"]));
        assert_eq!(parse_payload(&found.output).as_array().map(Vec::len), Some(1));

        let listed =
            execute(cli(&["--documents-dir", documents, "docs", "list", "--state", "TX"]));
        assert_eq!(parse_payload(&listed.output).as_array().map(Vec::len), Some(0));

        let updated = execute(cli(&[
            "--documents-dir",
            documents,
            "docs",
            "update",
            "gl-restaurant",
            "--fields",
            r#"{"title": "Kitchen Fire Safety"}"#,
        ]));
        assert_eq!(parse_payload(&updated.output)["title"], "Kitchen Fire Safety");

        let guidelines = execute(cli(&[
            "--documents-dir",
            documents,
            "guidelines",
            "Restaurant",
            "--state",
            "ca",
        ]));
        assert_eq!(guidelines.exit_code, 0);
        assert!(guidelines.output.starts_with("1 guideline(s) for Restaurant in CA:"));
        assert!(guidelines.output.contains("gl-restaurant | Kitchen Fire Safety"));

        let deleted =
            execute(cli(&["--documents-dir", documents, "docs", "delete", "gl-restaurant"]));
        assert_eq!(deleted.exit_code, 0);

        let missing =
            execute(cli(&["--documents-dir", documents, "docs", "show", "gl-restaurant"]));
        assert_eq!(missing.exit_code, 4);
        assert_eq!(parse_payload(&missing.output)["error_class"], "not_found");
    });
}

#[test]
fn docs_add_keeps_the_metadata_type_and_rejects_a_conflicting_flag() {
    let temp = tempfile::tempdir().expect("tempdir");
    let documents = temp.path().join("data");
    let documents = documents.to_str().expect("utf-8 path");
    let add = |doc_id: &str, extra: &[&str]| {
        let mut args = vec![
            "--documents-dir",
            documents,
            "docs",
            "add",
            "--id",
            doc_id,
            "--title",
            "Health code",
            "--content",
            "Kitchens are inspected twice a year.",
            "--metadata",
            r#"{"type": "regulation"}"#,
        ];
        args.extend_from_slice(extra);
        execute(cli(&args))
    };

    with_env(&[], || {
        let added = add("reg-health", &[]);
        assert_eq!(added.exit_code, 0, "{}", added.output);
        let shown = execute(cli(&["--documents-dir", documents, "docs", "show", "reg-health"]));
        assert_eq!(parse_payload(&shown.output)["doc_type"], "regulation");

        let conflicting = add("reg-conflict", &["--doc-type", "guideline"]);
        assert_eq!(conflicting.exit_code, 2);
        assert_eq!(parse_payload(&conflicting.output)["error_class"], "validation");
        let missing =
            execute(cli(&["--documents-dir", documents, "docs", "show", "reg-conflict"]));
        assert_eq!(missing.exit_code, 4);
    });
}

#[test]
fn guidelines_json_is_an_empty_array_for_unknown_types() {
    let temp = tempfile::tempdir().expect("tempdir");
    let documents = temp.path().join("data");
    let documents = documents.to_str().expect("utf-8 path");

    with_env(&[], || {
        let result =
            execute(cli(&["--documents-dir", documents, "guidelines", "aquarium", "--json"]));

        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output), serde_json::json!([]));
    });
}

#[test]
fn config_redacts_the_api_key_and_names_sources() {
    with_env(&[("ANTHROPIC_API_KEY", "sk-ant-secret"), ("AUTOUW_SERVER_PORT", "9100")], || {
        let result = execute(cli(&["--model", "claude-3-haiku-20240307", "config"]));

        assert_eq!(result.exit_code, 0, "{}", result.output);
        assert!(!result.output.contains("sk-ant-secret"));
        assert!(result
            .output
            .contains("- llm.api_key = <redacted> (source: env (ANTHROPIC_API_KEY))"));
        assert!(result.output.contains("- server.port = 9100 (source: env (AUTOUW_SERVER_PORT))"));
        assert!(result.output.contains("- llm.model = claude-3-haiku-20240307 (source: flag)"));
        assert!(result.output.contains("- storage.templates_dir = <embedded> (source: default)"));
    });
}

#[test]
fn invalid_env_value_fails_config_loading() {
    let temp = tempfile::tempdir().expect("tempdir");
    let documents = temp.path().join("data");
    let documents = documents.to_str().expect("utf-8 path");

    with_env(&[("AUTOUW_LLM_TEMPERATURE", "hot")], || {
        let result = execute(cli(&["--documents-dir", documents, "docs", "list"]));

        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "docs list");
        assert_eq!(payload["error_class"], "configuration");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "AUTOUW_LLM_API_KEY",
        "ANTHROPIC_API_KEY",
        "AUTOUW_LLM_BASE_URL",
        "AUTOUW_LLM_MODEL",
        "CLAUDE_MODEL",
        "AUTOUW_LLM_TIMEOUT_SECS",
        "AUTOUW_LLM_MAX_TOKENS",
        "AUTOUW_LLM_TEMPERATURE",
        "AUTOUW_STORAGE_DOCUMENTS_DIR",
        "AUTOUW_STORAGE_REPORTS_DIR",
        "AUTOUW_STORAGE_TEMPLATES_DIR",
        "AUTOUW_SERVER_BIND_ADDRESS",
        "AUTOUW_SERVER_PORT",
        "AUTOUW_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "AUTOUW_LOGGING_LEVEL",
        "AUTOUW_LOGGING_FORMAT",
        "AUTOUW_LOG_LEVEL",
        "AUTOUW_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
