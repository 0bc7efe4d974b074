use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crmlite_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

/// Lists every effective setting with where it came from. Exits 2 when the
/// configuration does not validate.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key_path: "database.url",
            env_keys: &["CRMLITE_DATABASE_URL"],
            value: redact_url_credentials(&config.database.url),
        },
        Field {
            key_path: "database.max_connections",
            env_keys: &["CRMLITE_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key_path: "database.timeout_secs",
            env_keys: &["CRMLITE_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Field {
            key_path: "server.bind_address",
            env_keys: &["CRMLITE_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key_path: "server.port",
            env_keys: &["CRMLITE_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key_path: "server.health_check_port",
            env_keys: &["CRMLITE_SERVER_HEALTH_CHECK_PORT"],
            value: config.server.health_check_port.to_string(),
        },
        Field {
            key_path: "server.graceful_shutdown_secs",
            env_keys: &["CRMLITE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        Field {
            key_path: "auth.session_ttl_secs",
            env_keys: &["CRMLITE_AUTH_SESSION_TTL_SECS"],
            value: config.auth.session_ttl_secs.to_string(),
        },
        Field {
            key_path: "auth.cookie_name",
            env_keys: &["CRMLITE_AUTH_COOKIE_NAME"],
            value: config.auth.cookie_name.clone(),
        },
        Field {
            key_path: "auth.cookie_secure",
            env_keys: &["CRMLITE_AUTH_COOKIE_SECURE"],
            value: config.auth.cookie_secure.to_string(),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["CRMLITE_LOGGING_LEVEL", "CRMLITE_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["CRMLITE_LOGGING_FORMAT", "CRMLITE_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("crmlite.toml"), PathBuf::from("config/crmlite.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
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

/// Masks `user:password@` in a connection URL.
fn redact_url_credentials(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => url.to_string(),
    }
}
