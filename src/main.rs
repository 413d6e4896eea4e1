use std::sync::Arc;

use tracing::{error, info};

use rust_reqgen::client::build_client;
use rust_reqgen::config::Config;
use rust_reqgen::diagnostics::{StderrSink, StdoutSink};
use rust_reqgen::logging::init_logging;
use rust_reqgen::requester::Requester;

/// Prints helpful configuration documentation.
fn print_config_help() {
    eprintln!("Required environment variables:");
    eprintln!("  TARGET_URL              - URL template, e.g. http://host/users/{{{{id}}}}");
    eprintln!();
    eprintln!("Optional environment variables:");
    eprintln!("  REQUEST_TYPE            - HTTP method (default: GET)");
    eprintln!("  TEMPLATE_FILE           - Header/body template file (.yaml/.yml for YAML)");
    eprintln!("  VALUES_FILE             - CSV file, one row of values per iteration");
    eprintln!("  PLUGIN_PATH             - Shared library exporting a value provider");
    eprintln!("  VERBOSE                 - Trace each request and failure (default: false)");
    eprintln!("  DRY_RUN                 - Print each response body (default: false)");
    eprintln!("  NUM_ITERATIONS          - Number of requests to send (default: 1)");
    eprintln!("  NUM_CONCURRENT_TASKS    - Number of concurrent tasks (default: 1)");
    eprintln!();
    eprintln!("Client configuration:");
    eprintln!("  REQUEST_TIMEOUT         - Per-request timeout: 500ms, 30s, 1m (default: 30s)");
    eprintln!("  SKIP_TLS_VERIFY         - Skip TLS certificate verification (default: false)");
    eprintln!("  CLIENT_CERT_PATH        - Path to client certificate for mTLS");
    eprintln!("  CLIENT_KEY_PATH         - Path to client key for mTLS");
    eprintln!("  RESOLVE_TARGET_ADDR     - DNS override: hostname:ip:port");
    eprintln!("  CUSTOM_HEADERS          - Comma-separated headers (use \\, for literal commas)");
    eprintln!();
    eprintln!("Logging:");
    eprintln!("  RUST_REQGEN_LOG / RUST_LOG - tracing filter (default: info)");
    eprintln!("  LOG_FORMAT              - 'json' for JSON log lines");
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}\n", e);
            print_config_help();
            std::process::exit(1);
        }
    };

    init_logging(config.requester.verbose);
    config.print_summary();

    let requester = match build_client(&config.client).and_then(|client| {
        Requester::builder(config.requester.clone())
            .client(client)
            .trace_sink(Arc::new(StderrSink))
            .dry_run_sink(Arc::new(StdoutSink))
            .build()
    }) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            error!(error = %e, "Configuration error");
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Iteration i runs on task i % tasks.
    let tasks = config.num_concurrent_tasks.min(config.num_iterations);
    let mut handles = Vec::with_capacity(tasks);
    for task_id in 0..tasks {
        let requester = Arc::clone(&requester);
        let num_iterations = config.num_iterations;
        handles.push(tokio::spawn(async move {
            let mut completed = 0usize;
            for i in (task_id..num_iterations).step_by(tasks) {
                if requester.next_async(i).await.is_completed() {
                    completed += 1;
                }
            }
            completed
        }));
    }

    let mut completed = 0;
    for handle in handles {
        match handle.await {
            Ok(n) => completed += n,
            Err(e) => error!(error = %e, "Task panicked"),
        }
    }

    info!(
        iterations = config.num_iterations,
        completed,
        failed = config.num_iterations - completed,
        "Run finished"
    );
}
