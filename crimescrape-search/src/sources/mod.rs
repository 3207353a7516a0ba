//! Built-in source modules.
//!
//! - [`InterpolModule`]: Interpol red and UN notices over the light engine.
//! - [`FbiModule`]: FBI wanted lists, rendered by the stealth engine.

pub mod fbi;
pub mod interpol;

pub use fbi::FbiModule;
pub use interpol::InterpolModule;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::source::ModuleRegistry;

/// Registry with every built-in module that can run in this build.
///
/// The FBI module needs the `chromium` feature.
///
/// # Errors
///
/// Returns an error if an engine cannot be constructed from `config`.
pub fn default_registry(config: &SearchConfig) -> Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    registry.register(InterpolModule::from_config(config)?)?;
    #[cfg(feature = "chromium")]
    registry.register(FbiModule::from_config(config)?)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtin_modules() {
        let registry = default_registry(&SearchConfig::default()).expect("registry");
        assert!(registry.contains("interpol"));
        #[cfg(feature = "chromium")]
        assert!(registry.contains("fbi"));
    }
}
