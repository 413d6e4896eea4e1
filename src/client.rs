use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::ConfigurationError;
use crate::utils::parse_headers_with_escapes;

/// Configuration for building the shared HTTP client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub timeout: Option<Duration>,
    pub skip_tls_verify: bool,
    pub resolve_target_addr: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
    pub custom_headers: Option<String>,
}

/// Builds the one `reqwest::Client` used by every iteration of a run.
///
/// The system proxy settings are honoured (reqwest's default).
pub fn build_client(config: &ClientConfig) -> Result<reqwest::Client, ConfigurationError> {
    let mut client_builder = reqwest::Client::builder();

    if let Some(timeout) = config.timeout {
        client_builder = client_builder.timeout(timeout);
    }

    if let Some(resolve_str) = config.resolve_target_addr.as_deref() {
        if resolve_str.is_empty() {
            warn!("RESOLVE_TARGET_ADDR is set but empty, no DNS override will be applied");
        } else {
            let (host, addr) = parse_dns_override(resolve_str)?;
            info!(host = %host, addr = %addr, "Configured DNS override");
            client_builder = client_builder.resolve(&host, addr);
        }
    }

    if let Some(identity) = load_identity(
        config.client_cert_path.as_deref(),
        config.client_key_path.as_deref(),
    )? {
        client_builder = client_builder.identity(identity);
        info!("Configured mTLS client identity");
    }

    let default_headers = parse_custom_headers(config.custom_headers.as_deref())?;
    if !default_headers.is_empty() {
        info!(count = default_headers.len(), "Configured custom default headers");
        client_builder = client_builder.default_headers(default_headers);
    }

    if config.skip_tls_verify {
        warn!("Skipping TLS certificate verification");
        client_builder = client_builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    client_builder
        .build()
        .map_err(|e| ConfigurationError::Client(e.to_string()))
}

/// Parses `hostname:ip:port` into the override target.
fn parse_dns_override(resolve_str: &str) -> Result<(String, SocketAddr), ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidSetting {
        name: "RESOLVE_TARGET_ADDR",
        value: resolve_str.to_string(),
        reason: format!("{}. Format: 'hostname:ip:port'", reason),
    };

    let parts: Vec<&str> = resolve_str.split(':').map(str::trim).collect();
    let [host, ip, port] = parts.as_slice() else {
        return Err(invalid("Expected three ':'-separated parts"));
    };

    if host.is_empty() {
        return Err(invalid("Hostname part cannot be empty"));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| invalid("Port must be a valid u16"))?;
    let addr: SocketAddr = format!("{}:{}", ip, port)
        .parse()
        .map_err(|_| invalid("IP address is not valid"))?;

    Ok((host.to_string(), addr))
}

/// Loads a PEM certificate + PKCS#8 key pair as a client identity.
fn load_identity(
    cert_path: Option<&str>,
    key_path: Option<&str>,
) -> Result<Option<reqwest::Identity>, ConfigurationError> {
    let (cert_path, key_path) = match (cert_path, key_path) {
        (Some(cert), Some(key)) => (cert, key),
        (Some(_), None) => return Err(ConfigurationError::MissingSetting("CLIENT_KEY_PATH")),
        (None, Some(_)) => return Err(ConfigurationError::MissingSetting("CLIENT_CERT_PATH")),
        (None, None) => return Ok(None),
    };

    let read = |kind: &'static str, path: &str| {
        fs::read(path).map_err(|source| ConfigurationError::FileRead {
            kind,
            path: path.into(),
            source,
        })
    };
    let cert_pem = read("client certificate", cert_path)?;
    let key_pem = read("client key", key_path)?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigurationError::Client(format!("Invalid certificate PEM in '{}': {}", cert_path, e)))?;
    if certs.is_empty() {
        return Err(ConfigurationError::Client(format!(
            "No PEM certificates found in '{}'",
            cert_path
        )));
    }

    let keys = rustls_pemfile::pkcs8_private_keys(&mut key_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigurationError::Client(format!("Invalid PKCS#8 key in '{}': {}", key_path, e)))?;
    if keys.is_empty() {
        return Err(ConfigurationError::Client(format!(
            "No PKCS#8 private keys found in '{}'",
            key_path
        )));
    }

    let mut combined = cert_pem;
    if !combined.ends_with(b"\n") {
        combined.push(b'\n');
    }
    combined.extend_from_slice(&key_pem);

    reqwest::Identity::from_pem(&combined)
        .map(Some)
        .map_err(|e| ConfigurationError::Client(format!("Invalid client identity: {}", e)))
}

/// Parses `Name:Value,Name:Value` (with `\,` escapes) into default headers.
pub fn parse_custom_headers(custom_headers: Option<&str>) -> Result<HeaderMap, ConfigurationError> {
    let mut parsed_headers = HeaderMap::new();

    let headers_str = match custom_headers {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(parsed_headers),
    };

    for pair in parse_headers_with_escapes(headers_str) {
        let pair = pair.trim();
        let invalid = |reason: String| ConfigurationError::InvalidSetting {
            name: "CUSTOM_HEADERS",
            value: pair.to_string(),
            reason,
        };

        let Some((name, value)) = pair.split_once(':') else {
            return Err(invalid("Expected 'Name:Value'".to_string()));
        };

        let header_name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| invalid(format!("Invalid header name: {}", e)))?;
        let header_value = HeaderValue::from_str(value.trim())
            .map_err(|e| invalid(format!("Invalid header value: {}", e)))?;

        parsed_headers.append(header_name, header_value);
    }

    Ok(parsed_headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_override_valid() {
        let (host, addr) = parse_dns_override("example.com:127.0.0.1:8080").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_dns_override_wrong_part_count() {
        let err = parse_dns_override("example.com:8080").unwrap_err();
        assert!(err.to_string().contains("three"), "error was: {}", err);
    }

    #[test]
    fn test_dns_override_bad_port() {
        let err = parse_dns_override("example.com:127.0.0.1:http").unwrap_err();
        assert!(err.to_string().contains("u16"), "error was: {}", err);
    }

    #[test]
    fn test_dns_override_empty_host() {
        let err = parse_dns_override(":127.0.0.1:80").unwrap_err();
        assert!(err.to_string().contains("Hostname"), "error was: {}", err);
    }

    #[test]
    fn test_custom_headers_with_escaped_comma() {
        let headers =
            parse_custom_headers(Some("Accept:text/html\\,application/json,X-Env: test")).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["accept"], "text/html,application/json");
        assert_eq!(headers["x-env"], "test");
    }

    #[test]
    fn test_custom_headers_missing_colon() {
        let err = parse_custom_headers(Some("NoColonHere")).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidSetting { .. }));
    }

    #[test]
    fn test_custom_headers_none_or_empty() {
        assert!(parse_custom_headers(None).unwrap().is_empty());
        assert!(parse_custom_headers(Some("")).unwrap().is_empty());
    }

    #[test]
    fn test_mtls_requires_both_paths() {
        assert!(matches!(
            load_identity(Some("cert.pem"), None),
            Err(ConfigurationError::MissingSetting("CLIENT_KEY_PATH"))
        ));
        assert!(matches!(
            load_identity(None, Some("key.pem")),
            Err(ConfigurationError::MissingSetting("CLIENT_CERT_PATH"))
        ));
        assert!(matches!(load_identity(None, None), Ok(None)));
    }

    #[test]
    fn test_mtls_rejects_unreadable_and_empty_pem() {
        use std::io::Write;

        let mut not_pem = tempfile::NamedTempFile::new().unwrap();
        not_pem.write_all(b"just some text\n").unwrap();
        not_pem.flush().unwrap();
        let path = not_pem.path().to_str().unwrap();

        assert!(matches!(
            load_identity(Some("/nonexistent/cert.pem"), Some(path)),
            Err(ConfigurationError::FileRead {
                kind: "client certificate",
                ..
            })
        ));
        match load_identity(Some(path), Some(path)) {
            Err(ConfigurationError::Client(msg)) => {
                assert!(msg.contains("No PEM certificates"), "error was: {}", msg)
            }
            _ => panic!("expected a client identity error"),
        }
    }

    #[test]
    fn test_build_default_client() {
        let config = ClientConfig {
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        assert!(build_client(&config).is_ok());
    }
}
