pub mod engine;
pub mod image_format;

pub use engine::{ExportedImage, ExtractionProgress, ExtractionReport, Extractor};
pub use image_format::{ImageFormat, ImageWriter, SavedImage};
