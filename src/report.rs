use crate::error::DbImagesError;
use serde::Serialize;

/// An item that was passed over while the rest of the run continued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    /// File name, cell address or source path the failure refers to.
    pub item: String,
    /// Error variant name, e.g. `UnresolvedAddress`.
    pub kind: String,
    pub message: String,
}

impl SkippedItem {
    pub fn new<S: Into<String>>(item: S, error: &DbImagesError) -> Self {
        Self {
            item: item.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
