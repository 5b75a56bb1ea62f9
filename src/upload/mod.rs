//! Chunked Upload Module
//!
//! Media arrives as a ZIP archive split into numbered chunks:
//! - Each chunk is staged on disk under its upload's title
//! - When the staged count reaches the declared total, the chunks are
//!   concatenated in index order into `<title>.zip`
//! - The archive is expanded into the media directory and then removed

pub mod chunk_store;
pub mod extract;
pub mod types;

pub use chunk_store::ChunkAssembler;
pub use extract::{extract_archive, ExtractError, ExtractStats};
pub use types::*;
