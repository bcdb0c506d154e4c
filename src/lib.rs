pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod naming;
pub mod report;
pub mod scanner;
pub mod source;
pub mod ui;
pub mod updater;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, OutputConfig, ScanConfig, UpdateConfig};
pub use error::{DbImagesError, Result, UserFriendlyError};

// Core functionality re-exports
pub use extractor::{ExtractionProgress, ExtractionReport, Extractor, ImageFormat, ImageWriter};
pub use naming::{decode, Address, DecodedName};
pub use report::SkippedItem;
pub use scanner::{ImageFile, ImageScanner, SourceFile, SourceScanner};
pub use source::{SourceAdapter, SourceShape, TabularSource};
pub use ui::{OutputFormatter, OutputMode, ProgressManager};
pub use updater::{SafeWriter, UpdateEngine, UpdateReport};

use std::path::{Path, PathBuf};

/// Outcome of extracting every source found in a set of directories.
#[derive(Debug, Default)]
pub struct ExtractionBatch {
    pub reports: Vec<ExtractionReport>,
    /// Sources that could not be opened; the rest of the batch still ran.
    pub unavailable: Vec<SkippedItem>,
}

impl ExtractionBatch {
    pub fn image_count(&self) -> usize {
        self.reports.iter().map(|r| r.exported_count()).sum()
    }
}

/// Main library interface for DBImages functionality
pub struct DbImages {
    config: Config,
    adapters: Vec<Box<dyn SourceAdapter>>,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl DbImages {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let adapters = source::default_adapters(&config.scan);
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);

        Self {
            config,
            adapters,
            output_formatter,
            progress_manager,
        }
    }

    /// Create DbImages instance from CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Ok(Self::new(
            config,
            output_mode,
            cli_args.verbose,
            cli_args.quiet,
        ))
    }

    /// Extracts the images of every source found directly inside each
    /// directory. Missing directories are skipped, and a source that cannot
    /// be opened is reported without stopping the batch.
    pub fn extract_directories(&self, directories: &[PathBuf]) -> ExtractionBatch {
        let mut batch = ExtractionBatch::default();
        let scanner = SourceScanner::new(&self.adapters);

        for dir in directories {
            let sources = scanner.scan_directory(dir);
            if sources.is_empty() {
                self.output_formatter
                    .debug(&format!("No data sources in {}", dir.display()));
                continue;
            }

            self.output_formatter
                .start_operation(&format!("Scanning {}", dir.display()));
            let prefix = self.config.output.prefix.as_deref().unwrap_or(dir.as_path());

            for file in &sources {
                let adapter = scanner.adapter(file);
                match self.extract_source(&file.path, adapter, prefix) {
                    Ok(report) => {
                        self.output_formatter.print_extraction_report(&report);
                        batch.reports.push(report);
                    }
                    Err(e) => {
                        tracing::warn!(path = %file.path.display(), error = %e, "source skipped");
                        self.handle_error(&e);
                        batch
                            .unavailable
                            .push(SkippedItem::new(file.path.display().to_string(), &e));
                    }
                }
            }
        }

        self.output_formatter
            .print_batch_summary(&batch.reports, batch.unavailable.len());
        batch
    }

    /// Loads one source and writes its images below `prefix`.
    pub fn extract_source(
        &self,
        path: &Path,
        adapter: &dyn SourceAdapter,
        prefix: &Path,
    ) -> Result<ExtractionReport> {
        tracing::info!(path = %path.display(), format = adapter.format_name(), "loading source");
        let source = adapter.load(path)?;
        self.output_formatter.info(&format!(
            "{}: {} table(s) ({})",
            source.name(),
            source.tables().len(),
            adapter.format_name()
        ));

        let extractor = Extractor::new();
        let cell_progress = self
            .progress_manager
            .create_cell_progress(Extractor::count_blobs(&source) as u64);
        let progress_callback = {
            let pb = cell_progress.clone();
            move |progress: &ExtractionProgress| {
                ui::progress::update_cell_progress(&pb, progress);
            }
        };

        let report = extractor.extract(&source, prefix, Some(&progress_callback));

        ui::progress::finish_progress_with_summary(
            &cell_progress,
            &format!("Saved {} images", report.exported_count()),
            report.duration,
        );
        self.progress_manager.clear();

        Ok(report)
    }

    /// Writes the images in `images_dir` back into the XML DataSet at
    /// `source_path`.
    pub fn update_xml(&self, source_path: &Path, images_dir: &Path) -> Result<UpdateReport> {
        self.output_formatter.start_operation(&format!(
            "Updating {} from {}",
            source_path.display(),
            images_dir.display()
        ));

        let engine = UpdateEngine::new(&self.config.update);
        let file_progress = self.progress_manager.create_file_progress(0);
        let progress_callback = {
            let pb = file_progress.clone();
            move |progress: &updater::UpdateProgress| {
                pb.set_length(progress.total_files as u64);
                ui::progress::update_file_progress(&pb, progress);
            }
        };

        let result =
            engine.update_from_directory(source_path, images_dir, Some(&progress_callback));

        match result {
            Ok(report) => {
                ui::progress::finish_progress_with_summary(
                    &file_progress,
                    &format!("Applied {} images", report.updated_count()),
                    report.duration,
                );
                self.progress_manager.clear();
                self.output_formatter.print_update_report(&report);
                Ok(report)
            }
            Err(e) => {
                file_progress.abandon();
                self.progress_manager.clear();
                Err(e)
            }
        }
    }

    /// Prints the sources that would be processed without writing anything.
    pub fn dry_run(&self, directories: &[PathBuf]) -> usize {
        let formatter = &self.output_formatter;
        formatter.info("DRY RUN MODE - No files will be written");
        formatter.print_separator();

        let scanner = SourceScanner::new(&self.adapters);
        let mut found = 0;
        for dir in directories {
            for file in scanner.scan_directory(dir) {
                let prefix = self.config.output.prefix.as_deref().unwrap_or(dir.as_path());
                formatter.print_source_listing(&file.path, scanner.adapter(&file).format_name());
                formatter.debug(&format!(
                    "would write to {}",
                    naming::image_folder(prefix, &source::source_name(&file.path)).display()
                ));
                found += 1;
            }
        }

        formatter.print_separator();
        formatter.success(&format!("Dry run completed: {} data source(s) found", found));
        found
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &DbImagesError) {
        self.progress_manager
            .suspend(|| self.output_formatter.print_user_friendly_error(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::xml_dataset::XmlDataSet;
    use crate::source::{CellValue, ColumnKind, Table};
    use std::fs;
    use tempfile::TempDir;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const GIF: [u8; 6] = *b"GIF89a";

    fn quiet_instance(config: Config) -> DbImages {
        DbImages::new(config, OutputMode::Plain, 0, true)
    }

    fn write_dataset(path: &Path) {
        let mut table = Table::new("Products")
            .with_column("Name", Some(ColumnKind::Text))
            .with_column("Image", Some(ColumnKind::Binary));
        table.push_row(vec![
            CellValue::Text("lamp".into()),
            CellValue::Bytes(PNG.to_vec()),
        ]);
        table.push_row(vec![
            CellValue::Text("desk".into()),
            CellValue::Bytes(GIF.to_vec()),
        ]);
        let mut source = TabularSource::new("shop.xml", SourceShape::SchemaTyped);
        source.add_table(table).unwrap();
        fs::write(path, XmlDataSet::new("NewDataSet", source).to_xml_string()).unwrap();
    }

    #[test]
    fn test_extract_directories() {
        let temp_dir = TempDir::new().unwrap();
        write_dataset(&temp_dir.path().join("shop.xml"));
        fs::write(temp_dir.path().join("broken.xml"), "no markup here").unwrap();

        let dbimages = quiet_instance(Config::default());
        let batch = dbimages.extract_directories(&[
            temp_dir.path().to_path_buf(),
            temp_dir.path().join("missing"),
        ]);

        assert_eq!(batch.reports.len(), 1);
        assert_eq!(batch.image_count(), 2);
        assert_eq!(batch.unavailable.len(), 1);
        assert_eq!(batch.unavailable[0].kind, "SourceUnavailable");

        let folder = temp_dir.path().join("DB_shop.xml_Images");
        assert_eq!(fs::read(folder.join("Products_Image_01.png")).unwrap(), PNG);
        assert_eq!(fs::read(folder.join("Products_Image_02.gif")).unwrap(), GIF);
    }

    #[test]
    fn test_output_prefix_override() {
        let temp_dir = TempDir::new().unwrap();
        let exports = temp_dir.path().join("exports");
        write_dataset(&temp_dir.path().join("shop.xml"));

        let mut config = Config::default();
        config.output.prefix = Some(exports.clone());
        let batch = quiet_instance(config).extract_directories(&[temp_dir.path().to_path_buf()]);

        assert_eq!(batch.image_count(), 2);
        assert!(exports
            .join("DB_shop.xml_Images")
            .join("Products_Image_01.png")
            .exists());
    }

    #[test]
    fn test_extract_then_update_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let source_path = temp_dir.path().join("shop.xml");
        write_dataset(&source_path);

        let dbimages = quiet_instance(Config::default());
        dbimages.extract_directories(&[temp_dir.path().to_path_buf()]);

        let folder = temp_dir.path().join("DB_shop.xml_Images");
        fs::write(folder.join("Products_Image_01.png"), GIF).unwrap();
        fs::remove_file(folder.join("Products_Image_02.gif")).unwrap();

        let report = dbimages.update_xml(&source_path, &folder).unwrap();
        assert!(report.persisted);
        assert_eq!(report.updated_count(), 1);

        let reloaded = XmlDataSet::load(&source_path).unwrap().into_source();
        let table = reloaded.table("Products").unwrap();
        assert_eq!(table.cell(0, 1), Some(&CellValue::Bytes(GIF.to_vec())));
        assert_eq!(table.cell(1, 1), Some(&CellValue::Bytes(GIF.to_vec())));
        assert!(temp_dir.path().join("shop.xml.backup").exists());
    }

    #[test]
    fn test_update_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let dbimages = quiet_instance(Config::default());

        let err = dbimages
            .update_xml(&temp_dir.path().join("absent.xml"), temp_dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), "SourceUnavailable");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        write_dataset(&temp_dir.path().join("shop.xml"));

        let found = quiet_instance(Config::default()).dry_run(&[temp_dir.path().to_path_buf()]);

        assert_eq!(found, 1);
        assert!(!temp_dir.path().join("DB_shop.xml_Images").exists());
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        DbImages::generate_sample_config(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[scan]"));
        assert!(content.contains("[update]"));
    }
}
