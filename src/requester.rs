//! The per-iteration entry point.
//!
//! A [`Requester`] is built once per run from a [`RequesterConfig`] and then
//! driven by an external scheduler, usually as `Arc<Requester>` shared by
//! many tasks. Each call builds the request for one iteration index, sends
//! it, and returns an [`Outcome`]. No call ever returns an error: failures of
//! a single iteration are contained here so the rest of the run goes on.
//!
//! ```rust,no_run
//! use rust_reqgen::config::RequesterConfig;
//! use rust_reqgen::requester::Requester;
//!
//! # async fn run() -> Result<(), rust_reqgen::errors::ConfigurationError> {
//! let requester = Requester::from_config(&RequesterConfig::new("http://localhost:8080/users/{{id}}"))?;
//! for i in 0..10 {
//!     requester.next_async(i).await;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, OnceLock};

use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::{debug, info};

use crate::client::{build_client, ClientConfig};
use crate::config::RequesterConfig;
use crate::diagnostics::{DiagnosticSink, StdoutSink};
use crate::dispatcher::{DispatchOptions, Dispatcher, Outcome, ReqwestTransport, Transport};
use crate::errors::{ConfigurationError, IterationError};
use crate::request::{RequestBuilder, RequestDescriptor};
use crate::template::TokenisedTemplate;
use crate::template_parser::RequestTemplate;
use crate::value_provider::{select_value_provider, ValueProvider};

// Backs `next` outside any Tokio runtime. Lives for the whole process so a
// requester can be dropped from async code after a blocking call.
static BLOCKING_RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn blocking_runtime() -> Result<&'static Runtime, IterationError> {
    if let Some(runtime) = BLOCKING_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| IterationError::Runtime(format!("Failed to start runtime: {}", e)))?;
    // A racing caller may have won; the losing runtime is dropped here,
    // outside any runtime.
    Ok(BLOCKING_RUNTIME.get_or_init(|| runtime))
}

pub struct Requester {
    builder: RequestBuilder,
    dispatcher: Dispatcher,
}

impl Requester {
    /// Build a requester with a fresh client and stdout diagnostics.
    pub fn from_config(config: &RequesterConfig) -> Result<Self, ConfigurationError> {
        let client = build_client(&ClientConfig::default())?;
        RequesterBuilder::new(config.clone()).client(client).build()
    }

    pub fn builder(config: RequesterConfig) -> RequesterBuilder {
        RequesterBuilder::new(config)
    }

    /// The request iteration `iteration` would send. No network I/O.
    pub fn build_request(&self, iteration: usize) -> RequestDescriptor {
        self.builder.build_request(iteration)
    }

    /// Build and send the request for `iteration`, suspending on network I/O.
    pub async fn next_async(&self, iteration: usize) -> Outcome {
        let request = self.builder.build_request(iteration);
        let outcome = self.dispatcher.execute(&request).await;
        debug!(
            iteration,
            completed = outcome.is_completed(),
            status = ?outcome.status(),
            "Iteration finished"
        );
        outcome
    }

    /// Blocking form of [`Requester::next_async`].
    ///
    /// Inside a multi-threaded Tokio runtime the current worker is handed
    /// over with `block_in_place`. Outside any runtime a private
    /// current-thread runtime, shared process-wide, is created on first use. A current-thread
    /// runtime cannot be blocked on, so in that case the iteration fails.
    pub fn next(&self, iteration: usize) -> Outcome {
        match Handle::try_current() {
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::MultiThread => tokio::task::block_in_place(|| {
                    handle.block_on(self.next_async(iteration))
                }),
                _ => Outcome::Failed {
                    error: IterationError::Runtime(
                        "Blocking next() called from a current-thread runtime; use next_async()"
                            .to_string(),
                    ),
                    elapsed: Default::default(),
                },
            },
            Err(_) => match blocking_runtime() {
                Ok(runtime) => runtime.block_on(self.next_async(iteration)),
                Err(error) => Outcome::Failed {
                    error,
                    elapsed: Default::default(),
                },
            },
        }
    }
}

/// Assembles a [`Requester`], letting callers inject the client, transport,
/// value provider and diagnostic sinks.
pub struct RequesterBuilder {
    config: RequesterConfig,
    client: Option<reqwest::Client>,
    transport: Option<Arc<dyn Transport>>,
    provider: Option<Arc<dyn ValueProvider>>,
    trace_sink: Arc<dyn DiagnosticSink>,
    dry_run_sink: Arc<dyn DiagnosticSink>,
}

impl RequesterBuilder {
    pub fn new(config: RequesterConfig) -> Self {
        Self {
            config,
            client: None,
            transport: None,
            provider: None,
            trace_sink: Arc::new(StdoutSink),
            dry_run_sink: Arc::new(StdoutSink),
        }
    }

    /// Shared HTTP client. Ignored when a transport is injected.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use this provider instead of the one selected from the config paths.
    pub fn value_provider(mut self, provider: Arc<dyn ValueProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn trace_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.trace_sink = sink;
        self
    }

    pub fn dry_run_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.dry_run_sink = sink;
        self
    }

    /// Load templates and the value provider. All configuration errors surface here.
    pub fn build(self) -> Result<Requester, ConfigurationError> {
        let config = self.config;
        if config.url_template.trim().is_empty() {
            return Err(ConfigurationError::EmptyUrlTemplate);
        }
        let url = TokenisedTemplate::parse(config.url_template.trim());

        let template = config
            .template_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(RequestTemplate::from_file)
            .transpose()?
            .map(Arc::new);

        let provider = match self.provider {
            Some(provider) => provider,
            None => select_value_provider(
                config.plugin_path.as_deref(),
                config.values_file.as_deref(),
            )?,
        };

        let transport: Arc<dyn Transport> = match (self.transport, self.client) {
            (Some(transport), _) => transport,
            (None, Some(client)) => Arc::new(ReqwestTransport::new(client)),
            (None, None) => Arc::new(ReqwestTransport::new(build_client(&ClientConfig::default())?)),
        };

        let options = DispatchOptions {
            verbose: config.verbose,
            dry_run: config.dry_run,
        };

        info!(
            method = %config.method,
            url = %url.raw(),
            headers = template.as_ref().map_or(0, |t| t.headers().len()),
            verbose = options.verbose,
            dry_run = options.dry_run,
            "Requester ready"
        );

        Ok(Requester {
            builder: RequestBuilder::new(config.method, url, template, provider),
            dispatcher: Dispatcher::new(transport, self.trace_sink, self.dry_run_sink, options),
        })
    }
}
