//! A value provider plugin.
//!
//! Build with `cargo build --example tenant_plugin` and point `PLUGIN_PATH`
//! at the resulting shared library. Iteration `i` gets `id = plug-<i>`.

use rust_reqgen::plugin::PluginRegistrar;
use rust_reqgen::template::ValueMapping;
use rust_reqgen::value_provider::ValueProvider;

struct TenantIds;

impl ValueProvider for TenantIds {
    fn get_values(&self, iteration: usize) -> ValueMapping {
        ValueMapping::from([("id".to_string(), format!("plug-{}", iteration).into())])
    }
}

fn register(registrar: &mut dyn PluginRegistrar) {
    registrar.register_value_provider(Box::new(TenantIds));
}

rust_reqgen::declare_value_provider!(register);
