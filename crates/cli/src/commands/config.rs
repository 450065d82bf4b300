use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadline_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut push = |key_path: &str, value: &str, env_key: &str| {
        lines.push(render_line(
            key_path,
            value,
            field_source(
                key_path,
                Some(env_key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    };

    push("database.url", &config.database.url, "LEADLINE_DATABASE_URL");
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        "LEADLINE_DATABASE_MAX_CONNECTIONS",
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        "LEADLINE_DATABASE_TIMEOUT_SECS",
    );

    let bot_token = redact_token(config.telegram.bot_token.expose_secret());
    push("telegram.bot_token", &bot_token, "LEADLINE_TELEGRAM_BOT_TOKEN");
    push(
        "telegram.poll_timeout_secs",
        &config.telegram.poll_timeout_secs.to_string(),
        "LEADLINE_TELEGRAM_POLL_TIMEOUT_SECS",
    );

    push("llm.provider", &format!("{:?}", config.llm.provider), "LEADLINE_LLM_PROVIDER");
    push("llm.model", &config.llm.model, "LEADLINE_LLM_MODEL");
    push("llm.base_url", &config.llm.base_url, "LEADLINE_LLM_BASE_URL");
    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    push("llm.api_key", llm_api_key, "LEADLINE_LLM_API_KEY");

    let tracker_api_key = if config.tracker.api_key.is_some() { "<redacted>" } else { "<unset>" };
    push("tracker.api_key", tracker_api_key, "LEADLINE_TRACKER_API_KEY");
    push(
        "tracker.list_id",
        config.tracker.list_id.as_deref().unwrap_or("<unset>"),
        "LEADLINE_TRACKER_LIST_ID",
    );
    push("tracker.base_url", &config.tracker.base_url, "LEADLINE_TRACKER_BASE_URL");

    push("server.bind_address", &config.server.bind_address, "LEADLINE_SERVER_BIND_ADDRESS");
    push("server.port", &config.server.port.to_string(), "LEADLINE_SERVER_PORT");

    push("logging.level", &config.logging.level, "LEADLINE_LOGGING_LEVEL");
    push("logging.format", &format!("{:?}", config.logging.format), "LEADLINE_LOGGING_FORMAT");

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("leadline.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/leadline.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    // Bot tokens look like "<numeric id>:<secret>"; keep the public id part.
    if let Some((prefix, _)) = trimmed.split_once(':') {
        return format!("{prefix}:***");
    }

    "<redacted>".to_string()
}
