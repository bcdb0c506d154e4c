use crate::source::SourceAdapter;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A data file found in a scanned directory, paired with the adapter that reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Position of the matching adapter in the scanner's adapter list.
    pub adapter: usize,
}

pub struct SourceScanner<'a> {
    adapters: &'a [Box<dyn SourceAdapter>],
}

impl<'a> SourceScanner<'a> {
    pub fn new(adapters: &'a [Box<dyn SourceAdapter>]) -> Self {
        Self { adapters }
    }

    /// Lists the data files directly inside `dir`; subdirectories are not
    /// searched. Files are grouped by adapter, in adapter order, and sorted
    /// by name within a group. A missing directory yields nothing.
    pub fn scan_directory<P: AsRef<Path>>(&self, dir: P) -> Vec<SourceFile> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "directory not found, skipping");
            return Vec::new();
        }

        let mut candidates: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => candidates.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "skipping unreadable entry"),
            }
        }
        candidates.sort();

        let mut files = Vec::new();
        for (index, adapter) in self.adapters.iter().enumerate() {
            for path in candidates.iter().filter(|p| adapter.handles(p)) {
                files.push(SourceFile {
                    path: path.clone(),
                    adapter: index,
                });
            }
        }

        tracing::debug!(dir = %dir.display(), count = files.len(), "source scan complete");
        files
    }

    pub fn adapter(&self, file: &SourceFile) -> &dyn SourceAdapter {
        self.adapters[file.adapter].as_ref()
    }
}
