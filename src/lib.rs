//! Parameterized HTTP request generation for load testing.
//!
//! Given an iteration index, a [`requester::Requester`] fetches a value
//! mapping from a [`value_provider::ValueProvider`], renders the URL, header
//! and body templates with it, sends the request over a shared client and
//! reports an [`dispatcher::Outcome`]. Scheduling (how many iterations, how
//! fast, how parallel) is left to the caller.

pub mod client;
pub mod config;
pub mod data_source;
pub mod diagnostics;
pub mod dispatcher;
pub mod errors;
pub mod logging;
pub mod plugin;
pub mod request;
pub mod requester;
pub mod template;
pub mod template_parser;
pub mod utils;
pub mod value_provider;
