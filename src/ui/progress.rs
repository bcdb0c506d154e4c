use crate::extractor::ExtractionProgress;
use crate::updater::UpdateProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    pub fn create_cell_progress(&self, total_cells: u64) -> ProgressBar {
        self.create_counted_progress(total_cells, "images", "Saving images...")
    }

    pub fn create_file_progress(&self, total_files: u64) -> ProgressBar {
        self.create_counted_progress(total_files, "files", "Applying images...")
    }

    fn create_counted_progress(&self, total: u64, unit: &str, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new(total));
        let template = format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos:>5}}/{{len:5}} {} {{msg}}",
            unit
        );
        pb.set_style(
            ProgressStyle::with_template(&template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.enabled {
            self.multi_progress.suspend(f)
        } else {
            f()
        }
    }

    pub fn clear(&self) {
        if self.enabled {
            self.multi_progress.clear().ok();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new(true)
    }
}

pub fn update_cell_progress(pb: &ProgressBar, progress: &ExtractionProgress) {
    pb.set_position(progress.cells_processed as u64);

    match progress.current_item {
        Some(ref item) => pb.set_message(format!("Saved {}", item)),
        None => pb.set_message("Saving images..."),
    }
}

pub fn update_file_progress(pb: &ProgressBar, progress: &UpdateProgress) {
    pb.set_position(progress.files_processed as u64);

    if let Some(ref current_file) = progress.current_file {
        pb.set_message(format!("Applied {}", current_file));
    }
}

pub fn finish_progress_with_summary(pb: &ProgressBar, message: &str, duration: Duration) {
    let final_message = format!("{} (completed in {})", message, format_duration(duration));
    pb.finish_with_message(final_message);
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_manager_creation() {
        let manager = ProgressManager::new(true);
        assert!(manager.is_enabled());

        let disabled_manager = ProgressManager::new(false);
        assert!(!disabled_manager.is_enabled());
    }

    #[test]
    fn test_disabled_progress_bars() {
        let manager = ProgressManager::new(false);

        assert!(manager.create_cell_progress(10).is_hidden());
        assert!(manager.create_file_progress(10).is_hidden());
    }

    #[test]
    fn test_progress_updates() {
        let manager = ProgressManager::new(false);
        let pb = manager.create_cell_progress(4);

        let mut progress = ExtractionProgress::new(4);
        progress.update_item("Products_Image_01".to_string(), 10);
        update_cell_progress(&pb, &progress);
        assert_eq!(pb.position(), 1);

        let file_pb = manager.create_file_progress(2);
        let mut progress = UpdateProgress::new(2);
        progress.update_file("Products_Image_01.png".to_string());
        progress.update_file("Products_Image_02.png".to_string());
        update_file_progress(&file_pb, &progress);
        assert_eq!(file_pb.position(), 2);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "61m 1s");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }
}
