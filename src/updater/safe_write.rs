use crate::error::{DbImagesError, Result};
use regex::Regex;
use std::borrow::Cow;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const LEGACY_CORELIB_REFERENCE: &str =
    "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089";

fn corelib_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"System\.Private\.CoreLib, Version=\d+\.\d+\.\d+\.\d+, Culture=neutral, PublicKeyToken=7cec85d7bea7798e",
        )
        .expect("corelib pattern compiles")
    })
}

/// Replaces modern core library assembly references in serialized schema
/// text with the `mscorlib` reference older readers expect.
pub fn rewrite_legacy_metadata(text: &str) -> Cow<'_, str> {
    corelib_pattern().replace_all(text, LEGACY_CORELIB_REFERENCE)
}

/// Backup, temp-file and restore protocol around rewriting a source file.
///
/// The backup is taken before the source is loaded and stays on disk after
/// the run, whatever the outcome.
#[derive(Debug, Clone)]
pub struct SafeWriter {
    target: PathBuf,
    backup: PathBuf,
    temp: PathBuf,
    legacy_rewrite: bool,
}

impl SafeWriter {
    pub fn new<P: Into<PathBuf>>(target: P) -> Self {
        let target = target.into();
        let backup = with_suffix(&target, ".backup");
        let temp = with_suffix(&target, ".temp");
        Self {
            target,
            backup,
            temp,
            legacy_rewrite: true,
        }
    }

    pub fn with_legacy_rewrite(mut self, enabled: bool) -> Self {
        self.legacy_rewrite = enabled;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Copies the target to `<target>.backup`, replacing an older backup.
    pub fn create_backup(&self) -> Result<u64> {
        let bytes = fs::copy(&self.target, &self.backup).map_err(|e| {
            DbImagesError::source_unavailable(&self.target, format!("cannot create backup: {}", e))
        })?;
        tracing::info!(backup = %self.backup.display(), "backup created");
        Ok(bytes)
    }

    /// Serializes through the temp file and replaces the target.
    ///
    /// On any failure the backup is copied back over the target and the
    /// error is reported as `PersistenceFailure`.
    pub fn commit<F>(&self, serialize: F) -> Result<()>
    where
        F: FnOnce() -> Result<String>,
    {
        match self.write_through(serialize) {
            Ok(()) => {
                tracing::info!(path = %self.target.display(), "source saved");
                Ok(())
            }
            Err(e) => {
                let restored = match self.restore() {
                    Ok(()) => true,
                    Err(restore_err) => {
                        tracing::error!(error = %restore_err, "restoring backup failed");
                        false
                    }
                };
                if self.temp.is_file() {
                    let _ = fs::remove_file(&self.temp);
                }
                tracing::error!(path = %self.target.display(), error = %e, restored, "save failed");
                Err(DbImagesError::PersistenceFailure {
                    path: self.target.display().to_string(),
                    message: e.to_string(),
                    restored,
                })
            }
        }
    }

    pub fn restore(&self) -> Result<()> {
        fs::copy(&self.backup, &self.target)?;
        Ok(())
    }

    fn write_through<F>(&self, serialize: F) -> Result<()>
    where
        F: FnOnce() -> Result<String>,
    {
        let serialized = serialize()?;
        fs::write(&self.temp, serialized)?;

        let written = fs::read_to_string(&self.temp)?;
        let output = if self.legacy_rewrite {
            rewrite_legacy_metadata(&written)
        } else {
            Cow::Borrowed(written.as_str())
        };

        fs::write(&self.target, output.as_bytes())?;
        fs::remove_file(&self.temp)?;
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
