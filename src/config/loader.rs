//! Configuration loading from disk and the process environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, overlay the process
/// environment, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_from(path, |var| std::env::var(var).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_from<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// Empty values are treated as unset.
pub fn apply_env<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("UPSTREAM_BASE_URL") {
        config.upstream.base_url = url;
    }
    if let Some(key) = get("UPSTREAM_API_KEY") {
        config.upstream.api_key = Some(key);
    }
    if let Some(key) = get("STATIC_API_KEY") {
        config.auth.static_api_key = Some(key);
    }
    if let Some(key) = get("SERVICE_API_KEY") {
        config.auth.service_api_key = Some(key);
    }

    if let Some(v) = get("CONNECT_TIMEOUT") {
        config.timeouts.connect_secs = parse("CONNECT_TIMEOUT", v)?;
    }
    if let Some(v) = get("READ_TIMEOUT") {
        config.timeouts.read_secs = parse("READ_TIMEOUT", v)?;
    }
    if let Some(v) = get("MAX_KEEPALIVE") {
        config.pool.max_idle_per_host = parse("MAX_KEEPALIVE", v)?;
    }
    if let Some(v) = get("MAX_CONNECTIONS") {
        config.pool.max_connections = parse("MAX_CONNECTIONS", v)?;
    }
    if let Some(v) = get("RETRY_TIMES") {
        config.retries.max_retries = parse("RETRY_TIMES", v)?;
    }

    if let Some(v) = get("PORT") {
        let port: u16 = parse("PORT", v)?;
        config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr.to_string()
            }
            Err(_) => format!("0.0.0.0:{}", port),
        };
    }

    Ok(())
}

fn parse<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = GatewayConfig::default();
        apply_env(
            &mut config,
            env(&[
                ("UPSTREAM_BASE_URL", "http://upstream:9000/v1"),
                ("STATIC_API_KEY", "sk-abc"),
                ("SERVICE_API_KEY", "secret"),
                ("CONNECT_TIMEOUT", "2.5"),
                ("RETRY_TIMES", "0"),
                ("MAX_CONNECTIONS", "8"),
                ("PORT", "9999"),
            ]),
        )
        .unwrap();

        assert_eq!(config.upstream.base_url, "http://upstream:9000/v1");
        assert_eq!(config.auth.static_api_key.as_deref(), Some("sk-abc"));
        assert_eq!(config.auth.service_api_key.as_deref(), Some("secret"));
        assert_eq!(config.timeouts.connect_secs, 2.5);
        assert_eq!(config.retries.max_retries, 0);
        assert_eq!(config.pool.max_connections, 8);
        assert_eq!(config.listener.bind_address, "0.0.0.0:9999");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = GatewayConfig::default();
        apply_env(&mut config, env(&[("STATIC_API_KEY", "")])).unwrap();
        assert_eq!(config.auth.static_api_key, None);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let mut config = GatewayConfig::default();
        let err = apply_env(&mut config, env(&[("RETRY_TIMES", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "RETRY_TIMES", .. }));
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[upstream]
base_url = "https://api.example.com/v1"

[auth]
service_api_key = "secret"
static_api_key = "sk-token"

[retries]
max_retries = 4
"#
        )
        .unwrap();

        let config = load_from(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.upstream.base_url, "https://api.example.com/v1");
        assert_eq!(config.retries.max_retries, 4);
        assert_eq!(config.pool.max_connections, 200);

        let overridden =
            load_from(Some(file.path()), env(&[("RETRY_TIMES", "1"), ("SERVICE_API_KEY", "other")]))
                .unwrap();
        assert_eq!(overridden.retries.max_retries, 1);
        assert_eq!(overridden.auth.service_api_key.as_deref(), Some("other"));
    }

    #[test]
    fn file_errors_are_reported() {
        let missing = load_from(Some(Path::new("/nonexistent/gateway.toml")), env(&[]));
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retries\nmax_retries = ").unwrap();
        assert!(matches!(load_from(Some(file.path()), env(&[])), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn environment_alone_must_name_the_upstream() {
        let err = load_from(None, env(&[("SERVICE_API_KEY", "secret"), ("STATIC_API_KEY", "sk-x")]))
            .unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors, vec![ValidationError::MissingBaseUrl]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let config = load_from(
            None,
            env(&[
                ("SERVICE_API_KEY", "secret"),
                ("STATIC_API_KEY", "sk-x"),
                ("UPSTREAM_BASE_URL", "http://upstream/v1"),
            ]),
        )
        .unwrap();
        assert_eq!(config.upstream.base_url, "http://upstream/v1");
    }
}
