pub mod directory;
/// Markdown serialization for requirements.
pub mod markdown;
pub mod store;

pub use directory::DirectoryLoadError;
pub use markdown::{LoadError, MarkdownRequirement};
pub use store::{DuplicateIdError, NotFoundError, Put, StorageError, Store, StoreError};
