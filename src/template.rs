//! Tokenised `{{name}}` templates.
//!
//! A template string is split once into literal and placeholder segments.
//! Rendering walks the segments in order and looks each placeholder up in a
//! [`ValueMapping`], so the raw string is never re-scanned per iteration.
//!
//! Placeholders whose name is absent from the mapping render as the empty
//! string. A missing optional value degrades the request rather than failing
//! it.

use std::borrow::Cow;
use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("placeholder regex is valid");
}

/// Named values available to templates for one iteration.
pub type ValueMapping = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A pre-parsed template string. Immutable after [`TokenisedTemplate::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenisedTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl TokenisedTemplate {
    /// Split `raw` into literal and placeholder segments.
    ///
    /// Whitespace inside the braces is ignored, so `{{ id }}` and `{{id}}` are
    /// the same placeholder. An unterminated `{{` stays literal text.
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(raw) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(raw[last..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder(name.as_str().to_string()));
            last = whole.end();
        }

        if last < raw.len() {
            segments.push(Segment::Literal(raw[last..].to_string()));
        }

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// Substitute `values` into the template.
    pub fn render(&self, values: &ValueMapping) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = values.get(name) {
                        out.push_str(&value_as_text(value));
                    }
                }
            }
        }
        out
    }

    /// The template source, as given to [`TokenisedTemplate::parse`].
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in order of appearance (duplicates included).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// True when the template has no placeholders and always renders to `raw`.
    pub fn is_static(&self) -> bool {
        self.placeholders().next().is_none()
    }
}

/// String form of a mapping value: strings verbatim, `null` empty, anything
/// else as compact JSON.
pub fn value_as_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(pairs: &[(&str, Value)]) -> ValueMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_url_placeholder() {
        let t = TokenisedTemplate::parse("http://host/users/{{id}}");
        let values = mapping(&[("id", json!("42"))]);
        assert_eq!(t.render(&values), "http://host/users/42");
    }

    #[test]
    fn test_missing_placeholder_renders_empty() {
        let t = TokenisedTemplate::parse("{{missing}}/x");
        assert_eq!(t.render(&ValueMapping::new()), "/x");
    }

    #[test]
    fn test_placeholders_are_case_sensitive() {
        let t = TokenisedTemplate::parse("{{Id}}-{{id}}");
        let values = mapping(&[("id", json!("lower"))]);
        assert_eq!(t.render(&values), "-lower");
    }

    #[test]
    fn test_whitespace_inside_braces_is_trimmed() {
        let t = TokenisedTemplate::parse("/a/{{ id }}/b/{{id}}");
        let values = mapping(&[("id", json!("7"))]);
        assert_eq!(t.render(&values), "/a/7/b/7");
        assert_eq!(t.placeholders().collect::<Vec<_>>(), vec!["id", "id"]);
    }

    #[test]
    fn test_unterminated_placeholder_is_literal() {
        let t = TokenisedTemplate::parse("/a/{{id");
        assert!(t.is_static());
        assert_eq!(t.render(&mapping(&[("id", json!("1"))])), "/a/{{id");
    }

    #[test]
    fn test_no_placeholders_passes_through() {
        let t = TokenisedTemplate::parse("http://example.com/static?q=1");
        assert!(t.is_static());
        assert_eq!(t.render(&ValueMapping::new()), "http://example.com/static?q=1");
        assert_eq!(t.raw(), "http://example.com/static?q=1");
    }

    #[test]
    fn test_structured_values() {
        let t = TokenisedTemplate::parse("n={{n}}&b={{b}}&z={{z}}&o={{o}}");
        let values = mapping(&[
            ("n", json!(12)),
            ("b", json!(true)),
            ("z", Value::Null),
            ("o", json!({"k": "v"})),
        ]);
        assert_eq!(t.render(&values), r#"n=12&b=true&z=&o={"k":"v"}"#);
    }

    #[test]
    fn test_render_is_deterministic() {
        let t = TokenisedTemplate::parse("{{a}}:{{b}}:{{a}}");
        let values = mapping(&[("a", json!("x")), ("b", json!("y"))]);
        assert_eq!(t.render(&values), t.render(&values));
        assert_eq!(t.render(&values), "x:y:x");
    }

    #[test]
    fn test_adjacent_placeholders() {
        let t = TokenisedTemplate::parse("{{a}}{{b}}");
        let values = mapping(&[("a", json!("1")), ("b", json!("2"))]);
        assert_eq!(t.render(&values), "12");
    }
}
