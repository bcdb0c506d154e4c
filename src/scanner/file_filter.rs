use std::path::Path;

/// Case-insensitive file extension allow-list.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new(extensions: &[String]) -> Self {
        let mut filter = Self {
            extensions: Vec::with_capacity(extensions.len()),
        };
        for ext in extensions {
            filter.add_extension(ext.as_str());
        }
        filter
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    pub fn add_extension<S: Into<String>>(&mut self, extension: S) {
        let ext = extension.into().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !self.extensions.contains(&ext) {
            self.extensions.push(ext);
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}
