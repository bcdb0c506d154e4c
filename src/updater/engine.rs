use crate::config::UpdateConfig;
use crate::error::{DbImagesError, Result};
use crate::naming::{self, DecodedName};
use crate::report::SkippedItem;
use crate::scanner::{ImageFile, ImageScanner};
use crate::source::{CellValue, ColumnKind, RoundTripSource, TabularSource, XmlDataSet};
use crate::updater::safe_write::SafeWriter;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellEncoding {
    /// Bytes stored as-is in a binary column.
    Raw,
    /// Bytes stored as standard base64 text in a text column.
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellUpdate {
    pub file: PathBuf,
    pub table: String,
    pub column: String,
    /// Zero-based row position.
    pub row: usize,
    pub encoding: CellEncoding,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub source: PathBuf,
    pub images_dir: PathBuf,
    pub files_found: usize,
    pub updates: Vec<CellUpdate>,
    pub skipped: Vec<SkippedItem>,
    pub backup_path: Option<PathBuf>,
    pub persisted: bool,
    pub duration: Duration,
    pub updated_at: DateTime<Utc>,
}

impl UpdateReport {
    pub fn new(source: &Path, images_dir: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            images_dir: images_dir.to_path_buf(),
            files_found: 0,
            updates: Vec::new(),
            skipped: Vec::new(),
            backup_path: None,
            persisted: false,
            duration: Duration::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn updated_count(&self) -> usize {
        self.updates.len()
    }

    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct UpdateProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub current_file: Option<String>,
    pub start_time: Instant,
}

impl UpdateProgress {
    pub fn new(total_files: usize) -> Self {
        Self {
            files_processed: 0,
            total_files,
            current_file: None,
            start_time: Instant::now(),
        }
    }

    pub fn update_file(&mut self, file_name: String) {
        self.files_processed += 1;
        self.current_file = Some(file_name);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Writes image files back into the cells they were exported from.
pub struct UpdateEngine {
    scanner: ImageScanner,
    legacy_rewrite: bool,
}

impl UpdateEngine {
    pub fn new(config: &UpdateConfig) -> Self {
        Self {
            scanner: ImageScanner::new(&config.image_extensions),
            legacy_rewrite: config.legacy_schema_rewrite,
        }
    }

    /// Updates an XML DataSet file from the images below `images_dir`.
    ///
    /// A copy of the file is kept at `<source>.backup`. Files that cannot
    /// be matched to a cell are reported as skipped; only a failed save
    /// fails the whole run.
    pub fn update_from_directory(
        &self,
        source_path: &Path,
        images_dir: &Path,
        progress_callback: Option<&dyn Fn(&UpdateProgress)>,
    ) -> Result<UpdateReport> {
        if !source_path.is_file() {
            return Err(DbImagesError::source_unavailable(source_path, "file not found"));
        }
        if !images_dir.is_dir() {
            return Err(DbImagesError::source_unavailable(
                images_dir,
                "images folder not found",
            ));
        }

        let writer = SafeWriter::new(source_path).with_legacy_rewrite(self.legacy_rewrite);
        writer.create_backup()?;

        let mut dataset = XmlDataSet::load(source_path)?;
        self.update_loaded(&mut dataset, &writer, images_dir, progress_callback)
    }

    /// Applies the images to an already loaded source and persists it
    /// through `writer`, whose backup must already exist.
    pub fn update_loaded<S: RoundTripSource>(
        &self,
        store: &mut S,
        writer: &SafeWriter,
        images_dir: &Path,
        progress_callback: Option<&dyn Fn(&UpdateProgress)>,
    ) -> Result<UpdateReport> {
        let started = Instant::now();
        let mut report = UpdateReport::new(writer.target(), images_dir);
        report.backup_path = Some(writer.backup_path().to_path_buf());

        if store.source().is_empty() {
            tracing::warn!(path = %writer.target().display(), "no tables found, nothing to update");
            report.duration = started.elapsed();
            return Ok(report);
        }

        let images = self.scanner.scan_directory(images_dir)?;
        report.files_found = images.len();
        tracing::info!(count = images.len(), dir = %images_dir.display(), "image files found");

        self.apply_images(store.source_mut(), &images, &mut report, progress_callback);

        writer.commit(|| store.serialize())?;
        report.persisted = true;
        report.duration = started.elapsed();
        Ok(report)
    }

    /// Applies every image to `source`, recording each as an update or a skip.
    pub fn apply_images(
        &self,
        source: &mut TabularSource,
        images: &[ImageFile],
        report: &mut UpdateReport,
        progress_callback: Option<&dyn Fn(&UpdateProgress)>,
    ) {
        let mut progress = UpdateProgress::new(images.len());

        for image in images {
            match apply_image(source, image) {
                Ok(update) => {
                    tracing::debug!(
                        file = %image.file_name(),
                        table = %update.table,
                        column = %update.column,
                        row = update.row,
                        "cell updated"
                    );
                    report.updates.push(update);
                }
                Err(e) => {
                    tracing::warn!(file = %image.file_name(), error = %e, "image skipped");
                    report.skipped.push(SkippedItem::new(image.file_name(), &e));
                }
            }

            progress.update_file(image.file_name());
            if let Some(callback) = progress_callback {
                callback(&progress);
            }
        }
    }
}

/// Resolves the cell an image file names and stores its bytes there.
pub fn apply_image(source: &mut TabularSource, image: &ImageFile) -> Result<CellUpdate> {
    let (decoded, row) = resolve(source, &image.stem)?;
    let bytes = fs::read(&image.path)?;
    let size = bytes.len() as u64;
    let encoding = store_bytes(source, &decoded, row, bytes)?;

    Ok(CellUpdate {
        file: image.path.clone(),
        table: decoded.table,
        column: decoded.column,
        row,
        encoding,
        size,
    })
}

fn resolve(source: &TabularSource, stem: &str) -> Result<(DecodedName, usize)> {
    let decoded = naming::decode(stem, source)?;

    let row_count = source
        .table(&decoded.table)
        .map(|t| t.row_count())
        .unwrap_or(0);

    match decoded.row_position() {
        Some(row) if row < row_count => Ok((decoded, row)),
        _ => Err(DbImagesError::UnresolvedAddress {
            name: stem.to_string(),
            reason: format!(
                "row {} out of range for table '{}' ({} rows)",
                decoded.index, decoded.table, row_count
            ),
        }),
    }
}

fn store_bytes(
    source: &mut TabularSource,
    decoded: &DecodedName,
    row: usize,
    bytes: Vec<u8>,
) -> Result<CellEncoding> {
    let table = source
        .table_mut(&decoded.table)
        .ok_or_else(|| DbImagesError::UnresolvedAddress {
            name: decoded.table.clone(),
            reason: "table disappeared".to_string(),
        })?;

    let col = table
        .column_index(&decoded.column)
        .ok_or_else(|| DbImagesError::UnresolvedAddress {
            name: decoded.column.clone(),
            reason: "column disappeared".to_string(),
        })?;

    let (value, encoding) = match table.columns[col].kind {
        Some(ColumnKind::Binary) => (CellValue::Bytes(bytes), CellEncoding::Raw),
        Some(ColumnKind::Text) => (CellValue::Text(STANDARD.encode(&bytes)), CellEncoding::Base64),
        kind => {
            return Err(DbImagesError::unsupported_column(
                &table.name,
                &table.columns[col].name,
                kind,
            ))
        }
    };

    table.set_cell(row, col, value);
    Ok(encoding)
}
