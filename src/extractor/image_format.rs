use crate::error::{DbImagesError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    Icon,
    Emf,
    Wmf,
    Webp,
}

impl ImageFormat {
    /// Detects the container format from the leading bytes of `data`.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(ImageFormat::Png);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(ImageFormat::Gif);
        }
        // BITMAPFILEHEADER is 14 bytes
        if data.len() >= 14 && data.starts_with(b"BM") {
            return Some(ImageFormat::Bmp);
        }
        if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
            return Some(ImageFormat::Tiff);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::Webp);
        }
        if data.len() >= 6 && data.starts_with(&[0x00, 0x00, 0x01, 0x00]) && data[4] != 0 {
            return Some(ImageFormat::Icon);
        }
        // EMR_HEADER record with the " EMF" signature at offset 40
        if data.len() >= 44 && data.starts_with(&[0x01, 0x00, 0x00, 0x00]) && &data[40..44] == b" EMF"
        {
            return Some(ImageFormat::Emf);
        }
        // placeable metafile key
        if data.starts_with(&[0xD7, 0xCD, 0xC6, 0x9A]) {
            return Some(ImageFormat::Wmf);
        }
        None
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Icon => "ico",
            ImageFormat::Emf => "emf",
            ImageFormat::Wmf => "wmf",
            ImageFormat::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SavedImage {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub size: u64,
}

/// Writes blobs to disk as image files, naming them after their content.
#[derive(Debug, Default)]
pub struct ImageWriter;

impl ImageWriter {
    pub fn new() -> Self {
        Self
    }

    /// Saves `data` as `<folder>/<stem>.<ext>`, where the extension follows
    /// the detected format. The folder is created on demand and existing
    /// files are replaced.
    pub fn save(&self, data: &[u8], folder: &Path, stem: &str) -> Result<SavedImage> {
        let format =
            ImageFormat::sniff(data).ok_or_else(|| DbImagesError::UnrecognizedImageContent {
                item: stem.to_string(),
            })?;

        self.validate_stem(stem)?;
        fs::create_dir_all(folder)?;

        let path = folder.join(format!("{}.{}", stem, format.extension()));
        fs::write(&path, data)?;

        Ok(SavedImage {
            path,
            format,
            size: data.len() as u64,
        })
    }

    fn validate_stem(&self, stem: &str) -> Result<()> {
        let invalid_chars = ['<', '>', ':', '"', '|', '?', '*', '/', '\\'];
        if stem.is_empty()
            || stem
                .chars()
                .any(|c| invalid_chars.contains(&c) || c.is_control())
        {
            return Err(DbImagesError::InvalidPath {
                path: format!("File name contains invalid characters: {}", stem),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_sniff_formats() {
        assert_eq!(ImageFormat::sniff(&PNG_HEADER), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::sniff(b"GIF89a\x01\x00"), Some(ImageFormat::Gif));
        assert_eq!(
            ImageFormat::sniff(b"BM\x3a\x00\x00\x00\x00\x00\x00\x00\x36\x00\x00\x00"),
            Some(ImageFormat::Bmp)
        );
        assert_eq!(ImageFormat::sniff(b"II*\0\x08\0\0\0"), Some(ImageFormat::Tiff));
        assert_eq!(ImageFormat::sniff(b"MM\0*\0\0\0\x08"), Some(ImageFormat::Tiff));
        assert_eq!(
            ImageFormat::sniff(b"RIFF\x24\0\0\0WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
        assert_eq!(
            ImageFormat::sniff(&[0x00, 0x00, 0x01, 0x00, 0x01, 0x00]),
            Some(ImageFormat::Icon)
        );
        assert_eq!(
            ImageFormat::sniff(&[0xD7, 0xCD, 0xC6, 0x9A, 0x00]),
            Some(ImageFormat::Wmf)
        );

        let mut emf = vec![0u8; 48];
        emf[0] = 0x01;
        emf[40..44].copy_from_slice(b" EMF");
        assert_eq!(ImageFormat::sniff(&emf), Some(ImageFormat::Emf));
    }

    #[test]
    fn test_sniff_rejects_unknown() {
        assert_eq!(ImageFormat::sniff(b""), None);
        assert_eq!(ImageFormat::sniff(b"hello world"), None);
        assert_eq!(ImageFormat::sniff(b"BM"), None);
        assert_eq!(ImageFormat::sniff(b"%PDF-1.4"), None);
    }

    #[test]
    fn test_save_appends_extension() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("DB_x.xml_Images");

        let saved = ImageWriter::new()
            .save(&PNG_HEADER, &folder, "T.v2_Image_01")
            .unwrap();
        assert_eq!(saved.format, ImageFormat::Png);
        assert_eq!(saved.size, 8);
        assert_eq!(
            saved.path,
            temp_dir.path().join("DB_x.xml_Images").join("T.v2_Image_01.png")
        );
        assert_eq!(fs::read(&saved.path).unwrap(), PNG_HEADER);
    }

    #[test]
    fn test_save_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("A_B_01.png"), b"old").unwrap();

        ImageWriter::new()
            .save(&PNG_HEADER, temp_dir.path(), "A_B_01")
            .unwrap();
        assert_eq!(fs::read(temp_dir.path().join("A_B_01.png")).unwrap(), PNG_HEADER);
    }

    #[test]
    fn test_save_rejects_unrecognized_content() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("out");

        let err = ImageWriter::new()
            .save(b"plain text", &folder, "A_B_01")
            .unwrap_err();
        assert_eq!(err.kind(), "UnrecognizedImageContent");
        assert!(!temp_dir.path().join("out").exists());
    }

    #[test]
    fn test_save_rejects_invalid_names() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ImageWriter::new();

        for stem in ["A:B_C_01", "dir/T_C_01", "..\\T_C_01"] {
            let err = writer.save(&PNG_HEADER, temp_dir.path(), stem).unwrap_err();
            assert_eq!(err.kind(), "InvalidPath");
        }
        assert!(!temp_dir.path().join("dir").exists());
    }
}
