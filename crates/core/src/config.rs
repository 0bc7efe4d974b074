use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 14 * 24 * 60 * 60;

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthConfig {
    pub session_ttl_secs: u64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub session_ttl_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://crmlite.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            auth: AuthConfig {
                session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
                cookie_name: "crmlite_session".to_string(),
                cookie_secure: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("crmlite.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        let ConfigPatch { database, server, auth, logging } = patch;

        if let Some(database) = database {
            replace(&mut self.database.url, database.url);
            replace(&mut self.database.max_connections, database.max_connections);
            replace(&mut self.database.timeout_secs, database.timeout_secs);
        }
        if let Some(server) = server {
            replace(&mut self.server.bind_address, server.bind_address);
            replace(&mut self.server.port, server.port);
            replace(&mut self.server.health_check_port, server.health_check_port);
            replace(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }
        if let Some(auth) = auth {
            replace(&mut self.auth.session_ttl_secs, auth.session_ttl_secs);
            replace(&mut self.auth.cookie_name, auth.cookie_name);
            replace(&mut self.auth.cookie_secure, auth.cookie_secure);
        }
        if let Some(logging) = logging {
            replace(&mut self.logging.level, logging.level);
            replace(&mut self.logging.format, logging.format);
        }
    }

    /// `CRMLITE_<SECTION>_<FIELD>` variables; blank values are ignored.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        replace(&mut self.database.url, read_env("CRMLITE_DATABASE_URL"));
        replace(&mut self.database.max_connections, env_value("CRMLITE_DATABASE_MAX_CONNECTIONS")?);
        replace(&mut self.database.timeout_secs, env_value("CRMLITE_DATABASE_TIMEOUT_SECS")?);

        replace(&mut self.server.bind_address, read_env("CRMLITE_SERVER_BIND_ADDRESS"));
        replace(&mut self.server.port, env_value("CRMLITE_SERVER_PORT")?);
        replace(
            &mut self.server.health_check_port,
            env_value("CRMLITE_SERVER_HEALTH_CHECK_PORT")?,
        );
        replace(
            &mut self.server.graceful_shutdown_secs,
            env_value("CRMLITE_SERVER_GRACEFUL_SHUTDOWN_SECS")?,
        );

        replace(&mut self.auth.session_ttl_secs, env_value("CRMLITE_AUTH_SESSION_TTL_SECS")?);
        replace(&mut self.auth.cookie_name, read_env("CRMLITE_AUTH_COOKIE_NAME"));
        replace(&mut self.auth.cookie_secure, env_value("CRMLITE_AUTH_COOKIE_SECURE")?);

        // The shorter LOG_* spellings are accepted as aliases.
        let level = read_env("CRMLITE_LOGGING_LEVEL").or_else(|| read_env("CRMLITE_LOG_LEVEL"));
        replace(&mut self.logging.level, level);
        let format = read_env("CRMLITE_LOGGING_FORMAT").or_else(|| read_env("CRMLITE_LOG_FORMAT"));
        replace(&mut self.logging.format, format.map(|raw| raw.parse()).transpose()?);

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(session_ttl_secs) = overrides.session_ttl_secs {
            self.auth.session_ttl_secs = session_ttl_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_auth(&self.auth)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("crmlite.toml"), PathBuf::from("config/crmlite.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${VAR}` references from the process environment.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &tail[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &tail[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn require(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_string()))
    }
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    require(
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:",
        "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
    )?;
    require(database.max_connections > 0, "database.max_connections must be greater than zero")?;
    require(
        (1..=300).contains(&database.timeout_secs),
        "database.timeout_secs must be in range 1..=300",
    )
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    require(server.port > 0, "server.port must be greater than zero")?;
    require(server.health_check_port > 0, "server.health_check_port must be greater than zero")?;
    require(
        server.health_check_port != server.port,
        "server.health_check_port must differ from server.port",
    )?;
    require(
        server.graceful_shutdown_secs > 0,
        "server.graceful_shutdown_secs must be greater than zero",
    )
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    require(auth.session_ttl_secs > 0, "auth.session_ttl_secs must be greater than zero")?;

    let name = auth.cookie_name.trim();
    require(
        !name.is_empty()
            && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'),
        "auth.cookie_name must be non-empty and contain only [A-Za-z0-9_-]",
    )
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    require(
        matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error"),
        "logging.level must be one of trace|debug|info|warn|error",
    )
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    read_env(key)
        .map(|value| {
            value.parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    auth: Option<AuthPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    session_ttl_secs: Option<u64>,
    cookie_name: Option<String>,
    cookie_secure: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_any_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.port == 8000, "default port should be 8000")?;
        ensure(config.auth.cookie_name == "crmlite_session", "default cookie name")?;
        ensure(
            config.auth.session_ttl_secs == super::DEFAULT_SESSION_TTL_SECS,
            "default session ttl should be two weeks",
        )?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "default format is compact")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CRMLITE_DB_PATH", "/var/lib/crmlite/data.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("crmlite.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://${TEST_CRMLITE_DB_PATH}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite:///var/lib/crmlite/data.db",
                "database url should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_CRMLITE_DB_PATH"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("crmlite.toml");
        fs::write(&path, "[auth]\ncookie_name = \"${CRMLITE_TEST_UNSET_VARIABLE}\"\n")
            .map_err(|err| err.to_string())?;

        let result =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(
                result,
                Err(ConfigError::MissingEnvInterpolation { ref var })
                    if var == "CRMLITE_TEST_UNSET_VARIABLE"
            ),
            "unset interpolation variable should fail",
        )
    }

    #[test]
    fn unterminated_interpolation_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("crmlite.toml");
        fs::write(&path, "[database]\nurl = \"sqlite://${CRMLITE_TEST_OPEN\"\n")
            .map_err(|err| err.to_string())?;

        let result =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(result, Err(ConfigError::UnterminatedInterpolation)),
            "missing closing brace should fail",
        )
    }

    #[test]
    fn boolean_env_override_sets_secure_cookie() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CRMLITE_AUTH_COOKIE_SECURE", "true");
        let secure = AppConfig::load(LoadOptions::default());
        env::set_var("CRMLITE_AUTH_COOKIE_SECURE", "yes");
        let malformed = AppConfig::load(LoadOptions::default());
        clear_vars(&["CRMLITE_AUTH_COOKIE_SECURE"]);

        let secure = secure.map_err(|err| format!("config load failed: {err}"))?;
        ensure(secure.auth.cookie_secure, "cookie_secure should be read from env")?;
        ensure(
            matches!(
                malformed,
                Err(ConfigError::InvalidEnvOverride { ref value, .. }) if value == "yes"
            ),
            "non-boolean value should be an invalid override",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CRMLITE_LOG_LEVEL", "warn");
        env::set_var("CRMLITE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CRMLITE_LOG_LEVEL", "CRMLITE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CRMLITE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("CRMLITE_AUTH_COOKIE_NAME", "env_cookie");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("crmlite.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 9000

[auth]
cookie_name = "file_cookie"
session_ttl_secs = 600

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.auth.cookie_name == "env_cookie", "env cookie name should beat file")?;
            ensure(config.auth.session_ttl_secs == 600, "file session ttl should beat default")?;
            ensure(config.server.port == 9000, "file port should beat default")?;
            Ok(())
        })();

        clear_vars(&["CRMLITE_DATABASE_URL", "CRMLITE_AUTH_COOKIE_NAME"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CRMLITE_DATABASE_URL", "postgres://localhost/crm");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("database.url")
            );
            ensure(has_message, "validation failure should mention database.url")
        })();

        clear_vars(&["CRMLITE_DATABASE_URL"]);
        result
    }

    #[test]
    fn malformed_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CRMLITE_SERVER_PORT", "eighty");

        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["CRMLITE_SERVER_PORT"]);

        ensure(
            matches!(
                result,
                Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "CRMLITE_SERVER_PORT"
            ),
            "non-numeric port should be an invalid override",
        )
    }

    #[test]
    fn zero_session_ttl_is_invalid() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { session_ttl_secs: Some(0), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        });

        ensure(
            matches!(
                result,
                Err(ConfigError::Validation(ref message)) if message.contains("session_ttl_secs")
            ),
            "zero ttl should fail validation",
        )
    }
}
