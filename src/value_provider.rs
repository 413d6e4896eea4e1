//! Per-iteration value sources.
//!
//! Every request is built from a [`ValueMapping`] obtained from a
//! [`ValueProvider`]. Three providers exist:
//!
//! - [`EmptyValueProvider`]: no values; templates render with placeholders
//!   blanked out.
//! - [`CsvDataSource`]: row `i % rows` of a CSV file.
//! - [`LoadedPlugin`]: a provider compiled into a shared library and loaded
//!   at startup.
//!
//! The rest of the crate only sees `Arc<dyn ValueProvider>`.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::data_source::CsvDataSource;
use crate::errors::ConfigurationError;
use crate::plugin::LoadedPlugin;
use crate::template::ValueMapping;

/// Source of the named values used to render iteration `i`.
///
/// Implementations are shared across concurrently running iterations.
pub trait ValueProvider: Send + Sync {
    fn get_values(&self, iteration: usize) -> ValueMapping;
}

/// Provider used when neither a plugin nor a dataset is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyValueProvider;

impl ValueProvider for EmptyValueProvider {
    fn get_values(&self, _iteration: usize) -> ValueMapping {
        ValueMapping::new()
    }
}

impl<T: ValueProvider + ?Sized> ValueProvider for Arc<T> {
    fn get_values(&self, iteration: usize) -> ValueMapping {
        (**self).get_values(iteration)
    }
}

impl<T: ValueProvider + ?Sized> ValueProvider for Box<T> {
    fn get_values(&self, iteration: usize) -> ValueMapping {
        (**self).get_values(iteration)
    }
}

/// Pick the provider for a run: plugin first, then dataset, then empty.
///
/// Empty paths are treated as unset.
pub fn select_value_provider(
    plugin_path: Option<&Path>,
    values_file: Option<&Path>,
) -> Result<Arc<dyn ValueProvider>, ConfigurationError> {
    let plugin_path = plugin_path.filter(|p| !p.as_os_str().is_empty());
    let values_file = values_file.filter(|p| !p.as_os_str().is_empty());

    if let Some(path) = plugin_path {
        if values_file.is_some() {
            info!(plugin = ?path, "Both plugin and values file configured, using plugin");
        }
        return Ok(Arc::new(LoadedPlugin::load(path)?));
    }

    if let Some(path) = values_file {
        return Ok(Arc::new(CsvDataSource::from_file(path)?));
    }

    info!("No plugin or values file configured, using empty value provider");
    Ok(Arc::new(EmptyValueProvider))
}
