//! Value providers loaded from shared libraries.
//!
//! A plugin is a `cdylib` that depends on this crate, implements
//! [`ValueProvider`] for one of its types and exports a declaration with
//! [`declare_value_provider!`](crate::declare_value_provider):
//!
//! ```rust,ignore
//! use rust_reqgen::plugin::PluginRegistrar;
//! use rust_reqgen::template::ValueMapping;
//! use rust_reqgen::value_provider::ValueProvider;
//!
//! struct Counter;
//!
//! impl ValueProvider for Counter {
//!     fn get_values(&self, iteration: usize) -> ValueMapping {
//!         ValueMapping::from([("n".to_string(), iteration.into())])
//!     }
//! }
//!
//! fn register(registrar: &mut dyn PluginRegistrar) {
//!     registrar.register_value_provider(Box::new(Counter));
//! }
//!
//! rust_reqgen::declare_value_provider!(register);
//! ```
//!
//! The declaration goes through the Rust ABI, so the loader rejects plugins
//! built by a different compiler or against a different version of this
//! crate. A plugin must register exactly one provider.

use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::{debug, info};

use crate::errors::ConfigurationError;
use crate::template::ValueMapping;
use crate::value_provider::ValueProvider;

/// Version of this crate, baked into every plugin declaration.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compiler that built this crate, baked into every plugin declaration.
pub const RUSTC_VERSION: &str = env!("RUST_REQGEN_RUSTC_VERSION");

/// Name of the exported declaration static, NUL-terminated for the loader.
pub const DECLARATION_SYMBOL: &[u8] = b"rust_reqgen_plugin_declaration\0";

/// Receives the providers a plugin offers.
pub trait PluginRegistrar {
    fn register_value_provider(&mut self, provider: Box<dyn ValueProvider>);
}

/// What a plugin exports under [`DECLARATION_SYMBOL`].
#[derive(Clone, Copy)]
pub struct PluginDeclaration {
    pub rustc_version: &'static str,
    pub core_version: &'static str,
    pub register: fn(&mut dyn PluginRegistrar),
}

/// Export a [`PluginDeclaration`] from a plugin crate.
///
/// Takes the path of a `fn(&mut dyn PluginRegistrar)`.
#[macro_export]
macro_rules! declare_value_provider {
    ($register:path) => {
        #[doc(hidden)]
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static rust_reqgen_plugin_declaration: $crate::plugin::PluginDeclaration =
            $crate::plugin::PluginDeclaration {
                rustc_version: $crate::plugin::RUSTC_VERSION,
                core_version: $crate::plugin::CORE_VERSION,
                register: $register,
            };
    };
}

#[derive(Default)]
struct ProviderCollector {
    providers: Vec<Box<dyn ValueProvider>>,
}

impl PluginRegistrar for ProviderCollector {
    fn register_value_provider(&mut self, provider: Box<dyn ValueProvider>) {
        self.providers.push(provider);
    }
}

impl PluginDeclaration {
    /// Check compatibility and run the registration, requiring exactly one
    /// provider. `path` is only used in error messages.
    pub fn instantiate(&self, path: &Path) -> Result<Box<dyn ValueProvider>, ConfigurationError> {
        if self.rustc_version != RUSTC_VERSION || self.core_version != CORE_VERSION {
            return Err(ConfigurationError::PluginIncompatible {
                path: path.to_path_buf(),
                expected: format!("{} / rust_reqgen {}", RUSTC_VERSION, CORE_VERSION),
                found: format!("{} / rust_reqgen {}", self.rustc_version, self.core_version),
            });
        }

        let mut collector = ProviderCollector::default();
        (self.register)(&mut collector);

        let count = collector.providers.len();
        match collector.providers.pop() {
            Some(provider) if count == 1 => Ok(provider),
            _ => Err(ConfigurationError::PluginProviderCount {
                path: path.to_path_buf(),
                count,
            }),
        }
    }
}

/// A value provider living inside a loaded shared library.
pub struct LoadedPlugin {
    // Declared before `_library` so it is dropped while the code backing its
    // vtable is still mapped.
    provider: Box<dyn ValueProvider>,
    _library: Library,
    path: PathBuf,
}

impl LoadedPlugin {
    /// Load the library at `path` and instantiate its single provider.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        info!(path = ?path, "Loading value provider plugin");

        let load_error = |source| ConfigurationError::PluginLoad {
            path: path.to_path_buf(),
            source,
        };

        // SAFETY: loading runs the library's initialisers. Pointing the
        // requester at a plugin is a statement of trust in that library.
        let library = unsafe { Library::new(path) }.map_err(load_error)?;

        // SAFETY: the symbol is the static exported by `declare_value_provider!`,
        // whose type is `PluginDeclaration`; the compiler and crate versions
        // are checked in `PluginDeclaration::instantiate` before any function pointer is called.
        let declaration = unsafe {
            library
                .get::<*const PluginDeclaration>(DECLARATION_SYMBOL)
                .map_err(load_error)?
                .read()
        };
        debug!(
            path = ?path,
            rustc_version = declaration.rustc_version,
            core_version = declaration.core_version,
            "Found plugin declaration"
        );

        let provider = declaration.instantiate(path)?;
        info!(path = ?path, "Value provider plugin loaded");

        Ok(Self {
            provider,
            _library: library,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ValueProvider for LoadedPlugin {
    fn get_values(&self, iteration: usize) -> ValueMapping {
        self.provider.get_values(iteration)
    }
}
