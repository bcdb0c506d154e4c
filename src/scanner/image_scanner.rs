use crate::error::{DbImagesError, Result};
use crate::scanner::file_filter::ExtensionFilter;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub path: PathBuf,
    /// File name without its extension.
    pub stem: String,
    pub extension: String,
    pub size: u64,
}

impl ImageFile {
    pub fn new(path: PathBuf, size: u64) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        Self {
            path,
            stem,
            extension,
            size,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Collects image files below a folder, subfolders included.
pub struct ImageScanner {
    filter: ExtensionFilter,
}

impl ImageScanner {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            filter: ExtensionFilter::new(extensions),
        }
    }

    /// Returns every allowed image below `root`, sorted by path.
    pub fn scan_directory<P: AsRef<Path>>(&self, root: P) -> Result<Vec<ImageFile>> {
        let root_path = root.as_ref();

        if !root_path.is_dir() {
            return Err(DbImagesError::InvalidPath {
                path: format!("{} is not a directory", root_path.display()),
            });
        }

        let mut images = Vec::new();

        let walker = WalkDir::new(root_path).follow_links(false).into_iter();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.filter.matches(entry.path()) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            images.push(ImageFile::new(entry.into_path(), size));
        }

        images.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!(
            root = %root_path.display(),
            count = images.len(),
            "image scan complete"
        );
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn default_scanner() -> ImageScanner {
        let exts: Vec<String> = ["jpg", "jpeg", "png", "gif", "bmp", "tiff"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        ImageScanner::new(&exts)
    }

    #[test]
    fn test_image_file_creation() {
        let image = ImageFile::new(PathBuf::from("dir/Products_Image_01.PNG"), 42);
        assert_eq!(image.stem, "Products_Image_01");
        assert_eq!(image.extension, "png");
        assert_eq!(image.file_name(), "Products_Image_01.PNG");
        assert_eq!(image.size, 42);
    }

    #[test]
    fn test_scan_is_recursive_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();

        fs::write(root.join("T_C_02.png"), b"x").unwrap();
        fs::write(root.join("T_C_01.JPG"), b"x").unwrap();
        fs::write(root.join("nested/deeper/T_C_03.gif"), b"x").unwrap();
        fs::write(root.join("readme.txt"), b"x").unwrap();
        fs::write(root.join("nested/T_C_04.webp"), b"x").unwrap();

        let images = default_scanner().scan_directory(root).unwrap();
        let stems: Vec<&str> = images.iter().map(|i| i.stem.as_str()).collect();

        assert_eq!(stems, vec!["T_C_01", "T_C_02", "T_C_03"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = default_scanner().scan_directory(temp_dir.path().join("absent"));
        assert!(result.is_err());
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let images = default_scanner().scan_directory(temp_dir.path()).unwrap();
        assert!(images.is_empty());
    }
}
