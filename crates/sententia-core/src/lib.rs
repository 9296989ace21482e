//! Requirements management core.
//!
//! Requirements are validated against a closed vocabulary, held in a store
//! (optionally backed by a directory of markdown files), rendered through
//! declarative templates and converted into deliverable formats.

pub mod domain;
pub use domain::{Candidate, Config, Patch, Registry, Requirement, RequirementId, ValidationError};

/// Persistence of requirements in memory and on disk.
pub mod storage;
pub use storage::{NotFoundError, Store};

/// Validated create/read/update/delete over a store.
pub mod service;
pub use service::{RequirementService, ServiceError};

pub mod render;
pub use render::{RenderContext, Template, TemplateError, Templates, render};

pub mod convert;
pub use convert::{Artifact, ConvertError, Format, UnsupportedFormatError, convert};
