use crate::naming::DecodeError;
use crate::source::ColumnKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbImagesError {
    #[error("Source unavailable: {path} ({reason})")]
    SourceUnavailable { path: String, reason: String },

    #[error("Unrecognized image content in {item}")]
    UnrecognizedImageContent { item: String },

    #[error("Could not resolve {name}: {reason}")]
    UnresolvedAddress { name: String, reason: String },

    #[error("Unsupported column type for '{table}.{column}': {kind}")]
    UnsupportedColumnKind {
        table: String,
        column: String,
        kind: String,
    },

    #[error("Failed to persist {path}: {message}")]
    PersistenceFailure {
        path: String,
        message: String,
        restored: bool,
    },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl DbImagesError {
    /// Short, stable name of the error class, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DbImagesError::SourceUnavailable { .. } => "SourceUnavailable",
            DbImagesError::UnrecognizedImageContent { .. } => "UnrecognizedImageContent",
            DbImagesError::UnresolvedAddress { .. } => "UnresolvedAddress",
            DbImagesError::UnsupportedColumnKind { .. } => "UnsupportedColumnKind",
            DbImagesError::PersistenceFailure { .. } => "PersistenceFailure",
            DbImagesError::Io(_) => "Io",
            DbImagesError::Config { .. } => "Config",
            DbImagesError::InvalidPath { .. } => "InvalidPath",
            DbImagesError::Xml(_) => "Xml",
            DbImagesError::Sqlite(_) => "Sqlite",
            DbImagesError::Base64(_) => "Base64",
        }
    }

    pub fn source_unavailable<P: AsRef<std::path::Path>, S: ToString>(path: P, reason: S) -> Self {
        DbImagesError::SourceUnavailable {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported_column(table: &str, column: &str, kind: Option<ColumnKind>) -> Self {
        DbImagesError::UnsupportedColumnKind {
            table: table.to_string(),
            column: column.to_string(),
            kind: kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "undeclared".to_string()),
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for DbImagesError {
    fn user_message(&self) -> String {
        match self {
            DbImagesError::SourceUnavailable { path, reason } => {
                format!("Cannot open data source {}: {}", path, reason)
            }
            DbImagesError::UnrecognizedImageContent { item } => {
                format!("Not a recognized image: {}", item)
            }
            DbImagesError::UnresolvedAddress { name, reason } => {
                format!("Skipping {}: {}", name, reason)
            }
            DbImagesError::UnsupportedColumnKind {
                table,
                column,
                kind,
            } => {
                format!(
                    "Unsupported column type for '{}.{}': {} (expected binary or text)",
                    table, column, kind
                )
            }
            DbImagesError::PersistenceFailure {
                path,
                message,
                restored,
            } => {
                if *restored {
                    format!(
                        "Error saving {}: {}. Restored from backup.",
                        path, message
                    )
                } else {
                    format!("Error saving {}: {}", path, message)
                }
            }
            DbImagesError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            DbImagesError::InvalidPath { path } => {
                format!("Invalid file path: {}", path)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            DbImagesError::SourceUnavailable { .. } => Some(
                "Check that the file exists, is readable, and is a supported XML DataSet or SQLite database.".to_string()
            ),
            DbImagesError::UnresolvedAddress { .. } => Some(
                "Image files must be named <table>_<column>_<index>.<ext>, as produced by extraction.".to_string()
            ),
            DbImagesError::PersistenceFailure { restored: false, .. } => Some(
                "The original file may be damaged. A copy is kept next to it with the .backup suffix.".to_string()
            ),
            DbImagesError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for DbImagesError {
    fn from(error: toml::de::Error) -> Self {
        DbImagesError::Config {
            message: error.to_string(),
        }
    }
}

impl From<DecodeError> for DbImagesError {
    fn from(error: DecodeError) -> Self {
        DbImagesError::UnresolvedAddress {
            name: error.file_stem().to_string(),
            reason: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbImagesError>;
