use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Method;
use tracing::info;

use crate::client::ClientConfig;
use crate::errors::ConfigurationError;
use crate::utils::parse_duration_string;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to build a [`Requester`](crate::requester::Requester).
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    pub url_template: String,
    pub method: Method,
    pub template_file: Option<PathBuf>,
    pub values_file: Option<PathBuf>,
    pub plugin_path: Option<PathBuf>,
    pub verbose: bool,
    pub dry_run: bool,
}

impl RequesterConfig {
    /// A plain GET of `url_template` with no template, dataset or plugin.
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            method: Method::GET,
            template_file: None,
            values_file: None,
            plugin_path: None,
            verbose: false,
            dry_run: false,
        }
    }
}

/// Full process configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub requester: RequesterConfig,
    pub client: ClientConfig,
    pub num_iterations: usize,
    pub num_concurrent_tasks: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let url_template = env::var("TARGET_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigurationError::MissingSetting("TARGET_URL"))?;

        let method = parse_method(&env_or("REQUEST_TYPE", "GET"))?;

        let requester = RequesterConfig {
            url_template,
            method,
            template_file: env_path("TEMPLATE_FILE"),
            values_file: env_path("VALUES_FILE"),
            plugin_path: env_path("PLUGIN_PATH"),
            verbose: env_bool("VERBOSE")?,
            dry_run: env_bool("DRY_RUN")?,
        };

        let timeout_str = env_or("REQUEST_TIMEOUT", "30s");
        let timeout = parse_duration_string(&timeout_str).map_err(|reason| {
            ConfigurationError::InvalidSetting {
                name: "REQUEST_TIMEOUT",
                value: timeout_str.clone(),
                reason,
            }
        })?;

        let client = ClientConfig {
            timeout: Some(timeout),
            skip_tls_verify: env_bool("SKIP_TLS_VERIFY")?,
            resolve_target_addr: env::var("RESOLVE_TARGET_ADDR").ok(),
            client_cert_path: env::var("CLIENT_CERT_PATH").ok(),
            client_key_path: env::var("CLIENT_KEY_PATH").ok(),
            custom_headers: env::var("CUSTOM_HEADERS").ok(),
        };

        Ok(Config {
            requester,
            client,
            num_iterations: env_positive("NUM_ITERATIONS", 1)?,
            num_concurrent_tasks: env_positive("NUM_CONCURRENT_TASKS", 1)?,
        })
    }

    /// Logs the effective configuration.
    pub fn print_summary(&self) {
        info!(
            url = %self.requester.url_template,
            method = %self.requester.method,
            template_file = ?self.requester.template_file,
            values_file = ?self.requester.values_file,
            plugin = ?self.requester.plugin_path,
            verbose = self.requester.verbose,
            dry_run = self.requester.dry_run,
            "Requester configuration"
        );
        info!(
            iterations = self.num_iterations,
            concurrent_tasks = self.num_concurrent_tasks,
            timeout = ?self.client.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            skip_tls_verify = self.client.skip_tls_verify,
            mtls = self.client.client_cert_path.is_some() && self.client.client_key_path.is_some(),
            dns_override = ?self.client.resolve_target_addr,
            "Run configuration"
        );
    }
}

/// Parses an HTTP method name, case-insensitively.
pub fn parse_method(raw: &str) -> Result<Method, ConfigurationError> {
    Method::from_str(&raw.trim().to_uppercase())
        .map_err(|_| ConfigurationError::InvalidMethod(raw.to_string()))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn env_bool(name: &'static str) -> Result<bool, ConfigurationError> {
    let Ok(value) = env::var(name) else {
        return Ok(false);
    };
    match value.trim().to_lowercase().as_str() {
        "" | "false" | "0" | "no" => Ok(false),
        "true" | "1" | "yes" => Ok(true),
        _ => Err(ConfigurationError::InvalidSetting {
            name,
            value,
            reason: "Expected true or false".to_string(),
        }),
    }
}

fn env_positive(name: &'static str, default: usize) -> Result<usize, ConfigurationError> {
    let Ok(value) = env::var(name) else {
        return Ok(default);
    };
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigurationError::InvalidSetting {
            name,
            value,
            reason: "Must be a positive integer".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_case_insensitive() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method(" Post ").unwrap(), Method::POST);
        assert_eq!(parse_method("PURGE").unwrap().as_str(), "PURGE");
    }

    #[test]
    fn test_parse_method_invalid() {
        assert!(matches!(
            parse_method("NOT A METHOD"),
            Err(ConfigurationError::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_requester_config_defaults() {
        let config = RequesterConfig::new("http://localhost/{{id}}");
        assert_eq!(config.method, Method::GET);
        assert!(config.template_file.is_none());
        assert!(!config.verbose);
        assert!(!config.dry_run);
    }
}
