use crate::extractor::image_format::{ImageFormat, ImageWriter};
use crate::naming::{image_folder, Address};
use crate::report::SkippedItem;
use crate::source::{SourceShape, TabularSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    pub cells_processed: usize,
    pub total_cells: usize,
    pub bytes_written: u64,
    pub current_item: Option<String>,
    pub start_time: Instant,
}

impl ExtractionProgress {
    pub fn new(total_cells: usize) -> Self {
        Self {
            cells_processed: 0,
            total_cells,
            bytes_written: 0,
            current_item: None,
            start_time: Instant::now(),
        }
    }

    pub fn update_item(&mut self, item: String, bytes: u64) {
        self.cells_processed += 1;
        self.bytes_written += bytes;
        self.current_item = Some(item);
    }

    pub fn percentage(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            (self.cells_processed as f64 / self.total_cells as f64) * 100.0
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedImage {
    pub address: Address,
    pub path: PathBuf,
    pub format: ImageFormat,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub source: String,
    pub shape: SourceShape,
    pub image_folder: PathBuf,
    pub exported: Vec<ExportedImage>,
    pub skipped: Vec<SkippedItem>,
    pub bytes_written: u64,
    pub duration: Duration,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionReport {
    pub fn new(source: &TabularSource, prefix: &Path) -> Self {
        Self {
            source: source.name().to_string(),
            shape: source.shape(),
            image_folder: image_folder(prefix, source.name()),
            exported: Vec::new(),
            skipped: Vec::new(),
            bytes_written: 0,
            duration: Duration::ZERO,
            extracted_at: Utc::now(),
        }
    }

    pub fn exported_count(&self) -> usize {
        self.exported.len()
    }

    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Walks every binary cell of a source and writes it out as an image file.
pub struct Extractor {
    writer: ImageWriter,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            writer: ImageWriter::new(),
        }
    }

    /// Number of cells the extraction will visit.
    pub fn count_blobs(source: &TabularSource) -> usize {
        source
            .tables()
            .iter()
            .map(|table| {
                table
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(col, column)| {
                        table
                            .rows
                            .iter()
                            .filter(|row| {
                                row.get(col)
                                    .and_then(|value| column.binary_value(value))
                                    .is_some()
                            })
                            .count()
                    })
                    .sum::<usize>()
            })
            .sum()
    }

    /// Exports every non-null blob of `source` below `prefix`.
    ///
    /// Occurrence indices restart at 1 for every table and column and
    /// only advance on non-null blobs. A cell that cannot be written is
    /// recorded as skipped; the remaining cells are still exported.
    pub fn extract(
        &self,
        source: &TabularSource,
        prefix: &Path,
        progress_callback: Option<&dyn Fn(&ExtractionProgress)>,
    ) -> ExtractionReport {
        let mut report = ExtractionReport::new(source, prefix);
        let mut progress = ExtractionProgress::new(Self::count_blobs(source));

        for table in source.tables() {
            tracing::info!(
                source = source.name(),
                table = %table.name,
                folder = %report.image_folder.display(),
                "saving images"
            );

            for (col, column) in table.columns.iter().enumerate() {
                let mut occurrence: u32 = 0;

                for row in &table.rows {
                    let Some(bytes) = row.get(col).and_then(|value| column.binary_value(value))
                    else {
                        continue;
                    };

                    occurrence += 1;
                    let address = Address::new(source.name(), &table.name, &column.name, occurrence);
                    let stem = address.file_stem(source.shape().index_width());
                    match self.writer.save(bytes, &report.image_folder, &stem) {
                        Ok(saved) => {
                            tracing::debug!(path = %saved.path.display(), size = saved.size, "image saved");
                            report.bytes_written += saved.size;
                            progress.update_item(stem, saved.size);
                            report.exported.push(ExportedImage {
                                address,
                                path: saved.path,
                                format: saved.format,
                                size: saved.size,
                            });
                        }
                        Err(e) => {
                            tracing::warn!(item = %stem, error = %e, "image not saved");
                            report.skipped.push(SkippedItem::new(stem.clone(), &e));
                            progress.update_item(stem, 0);
                        }
                    }

                    if let Some(callback) = progress_callback {
                        callback(&progress);
                    }
                }
            }
        }

        report.duration = progress.elapsed();
        report
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}
