//! Sending built requests.
//!
//! The [`Dispatcher`] is the per-iteration isolation boundary: whatever goes
//! wrong while a request is sent or its body read, [`Dispatcher::execute`]
//! returns an [`Outcome`] and never an `Err`. Status codes are not inspected;
//! a 500 is a completed request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use tracing::debug;

use crate::diagnostics::DiagnosticSink;
use crate::errors::{ErrorCategory, IterationError};
use crate::request::RequestDescriptor;

/// What came back from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body_bytes: usize,
    /// Present only when the caller asked for the body text.
    pub body: Option<String>,
}

/// Sends a descriptor over the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &RequestDescriptor,
        capture_body: bool,
    ) -> Result<TransportResponse, IterationError>;
}

/// [`Transport`] over a shared `reqwest::Client`.
///
/// The client (and with it the connection pool) is created once per run and
/// cloned into here; clones share the pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn to_wire(&self, request: &RequestDescriptor) -> Result<reqwest::RequestBuilder, IterationError> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| IterationError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = self.client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| IterationError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| IterationError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            builder = builder.header(header_name, header_value);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        capture_body: bool,
    ) -> Result<TransportResponse, IterationError> {
        let mut response = self.to_wire(request)?.send().await?;
        let status = response.status().as_u16();

        if capture_body {
            let body = response.text().await?;
            return Ok(TransportResponse {
                status,
                body_bytes: body.len(),
                body: Some(body),
            });
        }

        // Read the body to completion chunk by chunk without buffering it.
        let mut body_bytes = 0;
        while let Some(chunk) = response.chunk().await? {
            body_bytes += chunk.len();
        }

        Ok(TransportResponse {
            status,
            body_bytes,
            body: None,
        })
    }
}

/// Result of one iteration, for whoever aggregates statistics.
#[derive(Debug)]
pub enum Outcome {
    Completed {
        status: u16,
        body_bytes: usize,
        elapsed: Duration,
    },
    Failed {
        error: IterationError,
        elapsed: Duration,
    },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Completed { status, .. } => Some(*status),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Outcome::Completed { elapsed, .. } | Outcome::Failed { elapsed, .. } => *elapsed,
        }
    }

    pub fn error(&self) -> Option<&IterationError> {
        match self {
            Outcome::Failed { error, .. } => Some(error),
            Outcome::Completed { .. } => None,
        }
    }

    pub fn error_category(&self) -> Option<ErrorCategory> {
        self.error().map(IterationError::category)
    }
}

/// Diagnostic switches, fixed for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Trace `METHOD URL` before sending and report failures.
    pub verbose: bool,
    /// Emit each response body after it is received.
    pub dry_run: bool,
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    trace_sink: Arc<dyn DiagnosticSink>,
    dry_run_sink: Arc<dyn DiagnosticSink>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        trace_sink: Arc<dyn DiagnosticSink>,
        dry_run_sink: Arc<dyn DiagnosticSink>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            transport,
            trace_sink,
            dry_run_sink,
            options,
        }
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Send `request` and wait for the full response body.
    pub async fn execute(&self, request: &RequestDescriptor) -> Outcome {
        if self.options.verbose {
            self.trace_sink
                .emit(&format!("{} {}", request.method, request.url));
        }

        let start = Instant::now();
        let result = self.transport.send(request, self.options.dry_run).await;
        let elapsed = start.elapsed();

        match result {
            Ok(response) => {
                if self.options.dry_run {
                    if let Some(body) = &response.body {
                        self.dry_run_sink.emit(body);
                    }
                }
                debug!(
                    method = %request.method,
                    url = %request.url,
                    status_code = response.status,
                    body_bytes = response.body_bytes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request completed"
                );
                Outcome::Completed {
                    status: response.status,
                    body_bytes: response.body_bytes,
                    elapsed,
                }
            }
            Err(error) => {
                if self.options.verbose {
                    self.trace_sink.emit(&error.to_string());
                }
                debug!(
                    method = %request.method,
                    url = %request.url,
                    error = %error,
                    error_category = %error.category(),
                    "Request failed"
                );
                Outcome::Failed { error, elapsed }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::BufferSink;
    use reqwest::Method;

    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn send(
            &self,
            _request: &RequestDescriptor,
            _capture_body: bool,
        ) -> Result<TransportResponse, IterationError> {
            Err(IterationError::Runtime("connection reset".to_string()))
        }
    }

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(
            &self,
            request: &RequestDescriptor,
            capture_body: bool,
        ) -> Result<TransportResponse, IterationError> {
            let text = format!("echo {}", request.url);
            Ok(TransportResponse {
                status: 503,
                body_bytes: text.len(),
                body: capture_body.then_some(text),
            })
        }
    }

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor {
            method: Method::POST,
            url: "http://host/x".to_string(),
            headers: vec![],
            body: None,
        }
    }

    fn dispatcher(
        transport: Arc<dyn Transport>,
        options: DispatchOptions,
    ) -> (Dispatcher, Arc<BufferSink>, Arc<BufferSink>) {
        let trace = Arc::new(BufferSink::new());
        let dry = Arc::new(BufferSink::new());
        let d = Dispatcher::new(transport, trace.clone(), dry.clone(), options);
        (d, trace, dry)
    }

    #[tokio::test]
    async fn test_failure_absorbed_silently() {
        let (d, trace, dry) = dispatcher(Arc::new(FailingTransport), DispatchOptions::default());
        let outcome = d.execute(&descriptor()).await;

        assert!(!outcome.is_completed());
        assert_eq!(outcome.error_category(), Some(ErrorCategory::OtherError));
        assert!(trace.lines().is_empty());
        assert!(dry.lines().is_empty());
    }

    #[tokio::test]
    async fn test_failure_traced_when_verbose() {
        let options = DispatchOptions {
            verbose: true,
            dry_run: false,
        };
        let (d, trace, _dry) = dispatcher(Arc::new(FailingTransport), options);
        d.execute(&descriptor()).await;

        let lines = trace.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "POST http://host/x");
        assert!(lines[1].contains("connection reset"));
    }

    #[tokio::test]
    async fn test_non_2xx_is_completed() {
        let (d, _trace, _dry) = dispatcher(Arc::new(EchoTransport), DispatchOptions::default());
        let outcome = d.execute(&descriptor()).await;
        assert!(outcome.is_completed());
        assert_eq!(outcome.status(), Some(503));
    }

    #[tokio::test]
    async fn test_dry_run_emits_body() {
        let options = DispatchOptions {
            verbose: false,
            dry_run: true,
        };
        let (d, trace, dry) = dispatcher(Arc::new(EchoTransport), options);
        d.execute(&descriptor()).await;

        assert!(trace.lines().is_empty());
        assert_eq!(dry.lines(), vec!["echo http://host/x"]);
    }

    #[tokio::test]
    async fn test_invalid_url_is_iteration_error() {
        let transport = ReqwestTransport::new(reqwest::Client::new());
        let (d, _trace, _dry) = dispatcher(Arc::new(transport), DispatchOptions::default());

        let mut req = descriptor();
        req.url = "/relative/only".to_string();
        let outcome = d.execute(&req).await;
        assert_eq!(outcome.error_category(), Some(ErrorCategory::RequestError));
    }

    #[tokio::test]
    async fn test_invalid_header_value_is_iteration_error() {
        let transport = ReqwestTransport::new(reqwest::Client::new());
        let (d, _trace, _dry) = dispatcher(Arc::new(transport), DispatchOptions::default());

        let mut req = descriptor();
        req.headers = vec![("X-Bad".to_string(), "line\nbreak".to_string())];
        let outcome = d.execute(&req).await;
        assert!(matches!(
            outcome.error(),
            Some(IterationError::InvalidHeader { .. })
        ));
    }
}
