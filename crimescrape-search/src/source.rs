//! The contract every data-source module implements, and the registry the
//! orchestrator runs them from.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, SearchError};
use crate::types::{Query, SourceResult};

/// One upstream lookup (a wanted list, a sanctions list, a local database).
///
/// Implementors:
///
/// - perform I/O only through their [`FetchEngine`](crate::fetch::FetchEngine)
/// - do not cache and do not log; failures are reported as errors and the
///   orchestrator records them
/// - fail only with [`SearchError::Schema`], [`SearchError::Captcha`] or
///   [`SearchError::Module`]
/// - combine multiple sub-searches with [`merge`](crate::merge::merge)
///   before returning
///
/// All implementations must be `Send + Sync` for concurrent module runs.
#[async_trait]
pub trait SourceModule: Send + Sync {
    /// Stable identifier used as this module's key in an
    /// [`AggregateResult`](crate::types::AggregateResult).
    fn name(&self) -> &str;

    /// Look the person up. `Ok(None)` means the source has nothing on them.
    async fn search(&self, query: &Query) -> Result<Option<SourceResult>>;
}

/// The set of modules an orchestrator fans out to.
#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn SourceModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the name is empty or already registered.
    pub fn register(&mut self, module: impl SourceModule + 'static) -> Result<&mut Self> {
        self.register_arc(Arc::new(module))
    }

    /// Add an already shared module.
    ///
    /// # Errors
    ///
    /// Same as [`ModuleRegistry::register`].
    pub fn register_arc(&mut self, module: Arc<dyn SourceModule>) -> Result<&mut Self> {
        let name = module.name();
        if name.is_empty() {
            return Err(SearchError::Config("module name must not be empty".into()));
        }
        if self.contains(name) {
            return Err(SearchError::Config(format!(
                "module {name:?} is already registered"
            )));
        }
        self.modules.push(module);
        Ok(self)
    }

    /// Builder-style [`ModuleRegistry::register`].
    ///
    /// # Errors
    ///
    /// Same as [`ModuleRegistry::register`].
    pub fn with(mut self, module: impl SourceModule + 'static) -> Result<Self> {
        self.register(module)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name() == name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SourceModule>> {
        self.modules.iter()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
