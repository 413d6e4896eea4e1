//! Request template files.
//!
//! A request template supplies the headers (and optionally a body) sent with
//! every request. Values are `{{name}}` templates rendered per iteration.
//!
//! Two formats are accepted. The default is raw-HTTP style:
//!
//! ```text
//! # comment
//! Accept: application/json
//! X-Trace: {{id}}
//!
//! {"user": "{{username}}"}
//! ```
//!
//! Header lines run until the first blank line; the rest of the file is the
//! body. Files ending in `.yaml`/`.yml` are read as YAML instead:
//!
//! ```yaml
//! headers:
//!   Accept: application/json
//!   X-Trace: "{{id}}"
//! body: '{"user": "{{username}}"}'
//! ```

use std::fs;
use std::path::Path;

use reqwest::header::HeaderName;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::ConfigurationError;
use crate::template::TokenisedTemplate;

/// Parsed header and body templates, shared read-only by every iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTemplate {
    headers: Vec<(String, TokenisedTemplate)>,
    body: Option<TokenisedTemplate>,
}

#[derive(Debug, Deserialize)]
struct YamlTemplate {
    #[serde(default)]
    headers: serde_yaml::Mapping,
    #[serde(default)]
    body: Option<String>,
}

impl RequestTemplate {
    /// Read and parse a template file, choosing the format by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigurationError::FileRead {
            kind: "template",
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let template = if is_yaml {
            Self::parse_yaml(&raw)?
        } else {
            Self::parse(&raw)?
        };

        info!(
            path = ?path,
            headers = template.headers.len(),
            has_body = template.body.is_some(),
            "Request template loaded"
        );
        Ok(template)
    }

    /// Parse raw-HTTP style template text.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let mut headers = Vec::new();
        let mut body = None;
        let mut lines = raw.split_inclusive('\n').enumerate();

        while let Some((idx, line)) = lines.next() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                let rest: String = lines.by_ref().map(|(_, l)| l).collect();
                if !rest.is_empty() {
                    body = Some(TokenisedTemplate::parse(&rest));
                }
                break;
            }
            if trimmed.starts_with('#') {
                continue;
            }

            let Some((name, value)) = trimmed.split_once(':') else {
                return Err(ConfigurationError::MalformedTemplateLine {
                    line: idx + 1,
                    content: trimmed.to_string(),
                });
            };
            headers.push(Self::header(name.trim(), value.trim())?);
        }

        debug!(headers = headers.len(), "Parsed request template");
        Ok(Self { headers, body })
    }

    /// Parse a YAML template document.
    pub fn parse_yaml(raw: &str) -> Result<Self, ConfigurationError> {
        let doc: YamlTemplate = serde_yaml::from_str(raw)?;

        let mut headers = Vec::with_capacity(doc.headers.len());
        for (name, value) in &doc.headers {
            let name = yaml_scalar(name)
                .ok_or_else(|| ConfigurationError::InvalidHeaderName(format!("{:?}", name)))?;
            let value = yaml_scalar(value).unwrap_or_default();
            headers.push(Self::header(&name, &value)?);
        }

        Ok(Self {
            headers,
            body: doc.body.as_deref().map(TokenisedTemplate::parse),
        })
    }

    fn header(name: &str, value: &str) -> Result<(String, TokenisedTemplate), ConfigurationError> {
        // Names are not templated, so they can be validated once here.
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigurationError::InvalidHeaderName(name.to_string()))?;
        Ok((name.to_string(), TokenisedTemplate::parse(value)))
    }

    /// Header templates in declaration order.
    pub fn headers(&self) -> &[(String, TokenisedTemplate)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&TokenisedTemplate> {
        self.body.as_ref()
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ValueMapping;
    use serde_json::json;

    fn names(t: &RequestTemplate) -> Vec<&str> {
        t.headers().iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn test_parse_headers_in_order() {
        let t = RequestTemplate::parse("Accept: application/json\nX-Trace: {{id}}\nB: 2\n").unwrap();
        assert_eq!(names(&t), vec!["Accept", "X-Trace", "B"]);
        assert!(t.body().is_none());

        let values = ValueMapping::from([("id".to_string(), json!("7"))]);
        assert_eq!(t.headers()[1].1.render(&values), "7");
    }

    #[test]
    fn test_value_keeps_colons() {
        let t = RequestTemplate::parse("Referer: http://host:8080/{{p}}").unwrap();
        assert_eq!(t.headers()[0].1.raw(), "http://host:8080/{{p}}");
    }

    #[test]
    fn test_body_after_blank_line() {
        let raw = "Content-Type: application/json\r\n\r\n{\"u\": \"{{user}}\"}\nline2";
        let t = RequestTemplate::parse(raw).unwrap();
        assert_eq!(names(&t), vec!["Content-Type"]);

        let values = ValueMapping::from([("user".to_string(), json!("bob"))]);
        assert_eq!(t.body().unwrap().render(&values), "{\"u\": \"bob\"}\nline2");
    }

    #[test]
    fn test_comments_skipped() {
        let t = RequestTemplate::parse("# auth\nAuthorization: Bearer {{token}}\n").unwrap();
        assert_eq!(names(&t), vec!["Authorization"]);
    }

    #[test]
    fn test_malformed_line() {
        let err = RequestTemplate::parse("Accept: */*\nnot a header\n").unwrap_err();
        match err {
            ConfigurationError::MalformedTemplateLine { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "not a header");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_header_name() {
        let err = RequestTemplate::parse("Bad Name: x\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidHeaderName(_)));
    }

    #[test]
    fn test_empty_template() {
        let t = RequestTemplate::parse("").unwrap();
        assert!(t.headers().is_empty());
        assert!(t.body().is_none());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = "headers:\n  Zeta: \"{{id}}\"\n  Alpha: 1\nbody: 'id={{id}}'\n";
        let t = RequestTemplate::parse_yaml(yaml).unwrap();
        assert_eq!(names(&t), vec!["Zeta", "Alpha"]);
        assert_eq!(t.headers()[1].1.raw(), "1");

        let values = ValueMapping::from([("id".to_string(), json!("9"))]);
        assert_eq!(t.body().unwrap().render(&values), "id=9");
    }

    #[test]
    fn test_parse_yaml_rejects_nested_header_name() {
        let yaml = "headers:\n  ? [a, b]\n  : x\n";
        let err = RequestTemplate::parse_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidHeaderName(_)));
    }
}
