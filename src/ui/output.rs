use crate::error::{DbImagesError, UserFriendlyError};
use crate::extractor::ExtractionReport;
use crate::report::{format_bytes, SkippedItem};
use crate::ui::progress::format_duration;
use crate::updater::UpdateReport;
use console::{style, Emoji, Term};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

impl OutputMode {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputMode::Json,
            "plain" => OutputMode::Plain,
            _ => OutputMode::Human,
        }
    }
}

static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let term = Term::stdout();
        let use_colors = match mode {
            OutputMode::Human => term.features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &DbImagesError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    eprintln!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    pub fn print_extraction_report(&self, report: &ExtractionReport) {
        match self.mode {
            OutputMode::Human => {
                if self.quiet {
                    return;
                }
                let line = format!(
                    "{}: {} image(s) saved to {} ({}, {})",
                    report.source,
                    report.exported_count(),
                    report.image_folder.display(),
                    format_bytes(report.bytes_written),
                    format_duration(report.duration)
                );
                if report.exported_count() > 0 {
                    self.print_human_message(MessageType::Success, &line);
                } else {
                    self.print_human_message(
                        MessageType::Info,
                        &format!("{}: no images found", report.source),
                    );
                }
                self.print_skipped(&report.skipped);
            }
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "extraction_report",
                "report": report,
            })),
            OutputMode::Plain => {
                if self.quiet {
                    return;
                }
                println!(
                    "EXTRACTED: {} images={} skipped={} bytes={} folder={}",
                    report.source,
                    report.exported_count(),
                    report.skipped.len(),
                    report.bytes_written,
                    report.image_folder.display()
                );
                self.print_skipped(&report.skipped);
            }
        }
    }

    pub fn print_update_report(&self, report: &UpdateReport) {
        match self.mode {
            OutputMode::Human => {
                if self.quiet {
                    return;
                }
                let source = report.source.display();
                if report.persisted {
                    self.print_human_message(
                        MessageType::Success,
                        &format!(
                            "{}: {} of {} image(s) applied ({})",
                            source,
                            report.updated_count(),
                            report.files_found,
                            format_duration(report.duration)
                        ),
                    );
                } else {
                    self.warning(&format!("{}: no tables found, file left unchanged", source));
                }
                if let Some(ref backup) = report.backup_path {
                    println!("  Backup: {}", backup.display());
                }
                self.print_skipped(&report.skipped);
            }
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "update_report",
                "report": report,
            })),
            OutputMode::Plain => {
                if self.quiet {
                    return;
                }
                println!(
                    "UPDATED: {} applied={} found={} skipped={} persisted={}",
                    report.source.display(),
                    report.updated_count(),
                    report.files_found,
                    report.skipped.len(),
                    report.persisted
                );
                self.print_skipped(&report.skipped);
            }
        }
    }

    /// Totals over every source handled in one directory batch.
    pub fn print_batch_summary(&self, reports: &[ExtractionReport], failed_sources: usize) {
        if self.quiet || (reports.is_empty() && failed_sources == 0) {
            return;
        }

        let images: usize = reports.iter().map(|r| r.exported_count()).sum();
        let skipped: usize = reports.iter().map(|r| r.skipped.len()).sum();
        let bytes: u64 = reports.iter().map(|r| r.bytes_written).sum();

        match self.mode {
            OutputMode::Human => {
                self.print_separator();
                let summary = format!(
                    "{} source(s), {} image(s), {} written",
                    reports.len(),
                    images,
                    format_bytes(bytes)
                );
                if self.use_colors {
                    println!("{}", style(summary).bold());
                } else {
                    println!("{}", summary);
                }
                if skipped > 0 {
                    println!("  Skipped items:       {}", skipped);
                }
                if failed_sources > 0 {
                    println!("  Unavailable sources: {}", failed_sources);
                }
            }
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "summary",
                "sources": reports.len(),
                "images": images,
                "skipped": skipped,
                "unavailable_sources": failed_sources,
                "bytes_written": bytes,
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
            OutputMode::Plain => {
                println!(
                    "SUMMARY: sources={} images={} skipped={} unavailable={} bytes={}",
                    reports.len(),
                    images,
                    skipped,
                    failed_sources,
                    bytes
                );
            }
        }
    }

    pub fn print_source_listing(&self, path: &Path, format_name: &str) {
        match self.mode {
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "source",
                "path": path.display().to_string(),
                "format": format_name,
            })),
            OutputMode::Plain => println!("SOURCE: {} ({})", path.display(), format_name),
            OutputMode::Human => println!("  {} ({})", path.display(), format_name),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    fn print_skipped(&self, skipped: &[SkippedItem]) {
        for item in skipped {
            match self.mode {
                OutputMode::Human => {
                    let line = format!("  skipped {}: {}", item.item, item.message);
                    if self.use_colors {
                        println!("{}{}", WARNING, style(line).yellow());
                    } else {
                        println!("! {}", line.trim_start());
                    }
                }
                OutputMode::Plain => {
                    println!("SKIPPED: {} [{}] {}", item.item, item.kind, item.message)
                }
                OutputMode::Json => {}
            }
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}
