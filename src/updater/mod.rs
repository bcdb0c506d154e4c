pub mod engine;
pub mod safe_write;

pub use engine::{apply_image, CellEncoding, CellUpdate, UpdateEngine, UpdateProgress, UpdateReport};
pub use safe_write::{rewrite_legacy_metadata, SafeWriter};
