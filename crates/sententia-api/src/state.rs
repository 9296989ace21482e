//! Shared application state.

use std::{path::Path, sync::Arc};

use sententia_core::{
    Config, RenderContext, RequirementService, TemplateError, Templates,
    storage::{StorageError, directory},
};

/// Everything a handler needs, cheap to clone into each request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The requirement service. It serialises its own writers.
    pub service: Arc<RequirementService>,
    /// Built-in and custom document templates.
    pub templates: Arc<Templates>,
}

/// Errors raised while assembling the state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The requirements could not be loaded.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A custom template could not be loaded.
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl AppState {
    /// Wrap a service and a template set.
    #[must_use]
    pub fn new(service: RequirementService, templates: Templates) -> Self {
        Self {
            service: Arc::new(service),
            templates: Arc::new(templates),
        }
    }

    /// An empty in-memory store with the built-in templates.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self::new(RequirementService::in_memory(config), Templates::builtin())
    }

    /// A store backed by the project at `root`, with its custom templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a requirement file or custom template cannot be
    /// loaded.
    pub fn open(root: &Path, config: Config) -> Result<Self, StateError> {
        let service = RequirementService::open(root, config)?;
        let templates = Templates::load(&directory::templates_dir(root))?;
        Ok(Self::new(service, templates))
    }

    /// The render context for documents exported by this server.
    #[must_use]
    pub fn render_context(&self) -> RenderContext {
        RenderContext::new(self.service.config().project.clone().unwrap_or_default())
    }
}
