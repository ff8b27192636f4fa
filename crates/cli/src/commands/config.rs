use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use compline_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

const CONFIG_CANDIDATES: [&str; 2] = ["compline.toml", "config/compline.toml"];

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let dispatch = &config.dispatch;
    let endpoints = if dispatch.endpoints.is_empty() {
        "<none>".to_string()
    } else {
        dispatch
            .endpoints
            .iter()
            .map(|(reference_type, url)| format!("{reference_type} -> {url}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let auth_token = dispatch
        .auth_token
        .as_ref()
        .map_or_else(|| "<unset>".to_string(), |token| redact_token(token.expose_secret()));

    vec![
        Field::new("database.url", &config.database.url, &["COMPLINE_DATABASE_URL"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["COMPLINE_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["COMPLINE_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["COMPLINE_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["COMPLINE_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["COMPLINE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["COMPLINE_LOGGING_LEVEL", "COMPLINE_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["COMPLINE_LOGGING_FORMAT", "COMPLINE_LOG_FORMAT"],
        ),
        Field::new("dispatch.enabled", dispatch.enabled.to_string(), &["COMPLINE_DISPATCH_ENABLED"]),
        Field::new(
            "dispatch.default_endpoint",
            dispatch.default_endpoint.as_deref().unwrap_or("<unset>"),
            &["COMPLINE_DISPATCH_DEFAULT_ENDPOINT"],
        ),
        Field::new("dispatch.endpoints", endpoints, &[]),
        Field::new("dispatch.auth_token", auth_token, &["COMPLINE_DISPATCH_AUTH_TOKEN"]),
        Field::new(
            "dispatch.timeout_secs",
            dispatch.timeout_secs.to_string(),
            &["COMPLINE_DISPATCH_TIMEOUT_SECS"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    CONFIG_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &Field, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() < 12 {
        return "<redacted>".to_string();
    }

    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
