use std::env;
use std::fs;
use std::path::Path;

use toml::Value;

use autouw_core::config::{resolve_config_path, AppConfig, LoadOptions};

use crate::commands::CommandResult;

pub const COMMAND: &str = "config";

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
    overridden: bool,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let overrides = options.overrides.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure(COMMAND, "configuration", error.to_string(), 2),
    };
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields = [
        Field {
            key: "llm.api_key",
            value: redacted(config.llm.api_key.is_some()),
            env_keys: &["AUTOUW_LLM_API_KEY", "ANTHROPIC_API_KEY"],
            overridden: false,
        },
        Field {
            key: "llm.base_url",
            value: config.llm.base_url.clone(),
            env_keys: &["AUTOUW_LLM_BASE_URL"],
            overridden: false,
        },
        Field {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["AUTOUW_LLM_MODEL", "CLAUDE_MODEL"],
            overridden: overrides.llm_model.is_some(),
        },
        Field {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["AUTOUW_LLM_TIMEOUT_SECS"],
            overridden: false,
        },
        Field {
            key: "llm.max_tokens",
            value: config.llm.max_tokens.to_string(),
            env_keys: &["AUTOUW_LLM_MAX_TOKENS"],
            overridden: false,
        },
        Field {
            key: "llm.temperature",
            value: config.llm.temperature.to_string(),
            env_keys: &["AUTOUW_LLM_TEMPERATURE"],
            overridden: false,
        },
        Field {
            key: "storage.documents_dir",
            value: config.storage.documents_dir.display().to_string(),
            env_keys: &["AUTOUW_STORAGE_DOCUMENTS_DIR"],
            overridden: overrides.documents_dir.is_some(),
        },
        Field {
            key: "storage.reports_dir",
            value: config.storage.reports_dir.display().to_string(),
            env_keys: &["AUTOUW_STORAGE_REPORTS_DIR"],
            overridden: overrides.reports_dir.is_some(),
        },
        Field {
            key: "storage.templates_dir",
            value: config
                .storage
                .templates_dir
                .as_ref()
                .map_or_else(|| "<embedded>".to_string(), |dir| dir.display().to_string()),
            env_keys: &["AUTOUW_STORAGE_TEMPLATES_DIR"],
            overridden: false,
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["AUTOUW_SERVER_BIND_ADDRESS"],
            overridden: overrides.bind_address.is_some(),
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["AUTOUW_SERVER_PORT"],
            overridden: overrides.port.is_some(),
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["AUTOUW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            overridden: false,
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["AUTOUW_LOGGING_LEVEL", "AUTOUW_LOG_LEVEL"],
            overridden: overrides.log_level.is_some(),
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            env_keys: &["AUTOUW_LOGGING_FORMAT", "AUTOUW_LOG_FORMAT"],
            overridden: false,
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::output(lines.join("\n"))
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if field.overridden {
        return "flag".to_string();
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redacted(present: bool) -> String {
    let label = if present { "<redacted>" } else { "<unset>" };
    label.to_string()
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
