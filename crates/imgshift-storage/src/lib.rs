//! imgshift Storage Library
//!
//! Request-scoped scratch storage for uploaded images. Uploads are spooled to a
//! single injected directory under random names, copied into a private staging file
//! for the transcoder, and released on every exit path.

pub mod error;
pub mod scope;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use scope::ScratchScope;
pub use store::{ReleaseReport, ScratchHandle, ScratchKind, ScratchStore, UploadedAsset};
