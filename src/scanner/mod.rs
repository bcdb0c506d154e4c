pub mod file_filter;
pub mod image_scanner;
pub mod source_scanner;

pub use file_filter::ExtensionFilter;
pub use image_scanner::{ImageFile, ImageScanner};
pub use source_scanner::{SourceFile, SourceScanner};
