//! Per-iteration request construction.
//!
//! [`RequestBuilder::build_request`] turns an iteration index into a
//! [`RequestDescriptor`] without touching the network, which is what lets the
//! template logic be tested on its own.

use std::sync::Arc;

use reqwest::Method;
use tracing::debug;

use crate::template::{TokenisedTemplate, ValueMapping};
use crate::template_parser::RequestTemplate;
use crate::value_provider::ValueProvider;

/// A fully resolved request for one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    /// Rendered headers in template declaration order.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestDescriptor {
    /// First header with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Combines the value provider with the URL and request templates.
pub struct RequestBuilder {
    method: Method,
    url: TokenisedTemplate,
    template: Option<Arc<RequestTemplate>>,
    provider: Arc<dyn ValueProvider>,
}

impl RequestBuilder {
    pub fn new(
        method: Method,
        url: TokenisedTemplate,
        template: Option<Arc<RequestTemplate>>,
        provider: Arc<dyn ValueProvider>,
    ) -> Self {
        Self {
            method,
            url,
            template,
            provider,
        }
    }

    /// Build the descriptor for iteration `iteration`.
    pub fn build_request(&self, iteration: usize) -> RequestDescriptor {
        let values = self.provider.get_values(iteration);
        let descriptor = self.render(&values);
        debug!(
            iteration,
            method = %descriptor.method,
            url = %descriptor.url,
            "Built request"
        );
        descriptor
    }

    /// Render a descriptor from an explicit mapping.
    pub fn render(&self, values: &ValueMapping) -> RequestDescriptor {
        let mut descriptor = RequestDescriptor {
            method: self.method.clone(),
            url: self.url.render(values),
            headers: Vec::new(),
            body: None,
        };

        if let Some(template) = &self.template {
            descriptor.headers = template
                .headers()
                .iter()
                .map(|(name, value)| (name.clone(), value.render(values)))
                .collect();
            descriptor.body = template.body().map(|b| b.render(values));
        }

        descriptor
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url_template(&self) -> &TokenisedTemplate {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::CsvDataSource;
    use crate::value_provider::EmptyValueProvider;

    fn builder(url: &str, template: Option<&str>, provider: Arc<dyn ValueProvider>) -> RequestBuilder {
        RequestBuilder::new(
            Method::GET,
            TokenisedTemplate::parse(url),
            template.map(|t| Arc::new(RequestTemplate::parse(t).unwrap())),
            provider,
        )
    }

    #[test]
    fn test_build_from_dataset() {
        let data = CsvDataSource::from_string("id\n42\n43").unwrap();
        let b = builder("http://host/users/{{id}}", Some("X-Trace: {{id}}\n"), Arc::new(data));

        let req = b.build_request(0);
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.url, "http://host/users/42");
        assert_eq!(req.header("x-trace"), Some("42"));
        assert_eq!(req.body, None);

        let req = b.build_request(3);
        assert_eq!(req.url, "http://host/users/43");
    }

    #[test]
    fn test_build_is_repeatable() {
        let data = CsvDataSource::from_string("id,name\n1,a\n2,b").unwrap();
        let b = builder(
            "http://host/{{id}}",
            Some("A: {{name}}\nB: x\n\nbody-{{id}}"),
            Arc::new(data),
        );
        assert_eq!(b.build_request(1), b.build_request(1));
        assert_eq!(b.build_request(1).body.as_deref(), Some("body-2"));
    }

    #[test]
    fn test_header_order_preserved() {
        let b = builder(
            "http://host/",
            Some("Zeta: 1\nAlpha: 2\nMid: 3\n"),
            Arc::new(EmptyValueProvider),
        );
        let req = b.build_request(0);
        let names: Vec<&str> = req.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_no_template_means_no_headers() {
        let b = builder("http://host/{{missing}}x", None, Arc::new(EmptyValueProvider));
        let req = b.build_request(9);
        assert_eq!(req.url, "http://host/x");
        assert!(req.headers.is_empty());
    }
}
