use crate::error::{DbImagesError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub update: UpdateConfig,
}

/// Which files in a scanned directory are treated as data sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub xml_extensions: Vec<String>,
    pub sqlite_extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory the `DB_<name>_Images` folders are created in. Defaults to
    /// the directory each source was found in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub image_extensions: Vec<String>,
    pub legacy_schema_rewrite: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            xml_extensions: vec!["xml".to_string()],
            sqlite_extensions: vec!["sqlite3".to_string(), "db".to_string()],
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            image_extensions: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "gif".to_string(),
                "bmp".to_string(),
                "tiff".to_string(),
            ],
            legacy_schema_rewrite: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbImagesError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DbImagesError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| DbImagesError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["dbimages.toml", ".dbimages.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref prefix) = cli_args.output_prefix {
            self.output.prefix = Some(prefix.clone());
        }

        if let Some(ref extensions) = cli_args.image_extensions {
            self.update.image_extensions = split_extensions(extensions);
        }

        if let Some(rewrite) = cli_args.legacy_schema_rewrite {
            self.update.legacy_schema_rewrite = rewrite;
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_extensions("scan.xml_extensions", &self.scan.xml_extensions)?;
        validate_extensions("scan.sqlite_extensions", &self.scan.sqlite_extensions)?;
        validate_extensions("update.image_extensions", &self.update.image_extensions)?;

        if let Some(ref prefix) = self.output.prefix {
            if prefix.as_os_str().is_empty() {
                return Err(DbImagesError::Config {
                    message: "output.prefix must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        let body = toml::to_string_pretty(&sample_config).unwrap_or_default();
        format!(
            "# dbimages configuration\n\
             # [output] prefix = \"/path/to/exports\" overrides the export directory.\n\n{}",
            body
        )
    }
}

fn validate_extensions(field: &str, extensions: &[String]) -> Result<()> {
    if extensions.is_empty() {
        return Err(DbImagesError::Config {
            message: format!("{} must list at least one extension", field),
        });
    }

    for ext in extensions {
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(DbImagesError::Config {
                message: format!(
                    "{}: invalid extension '{}' (use a bare name such as \"png\")",
                    field, ext
                ),
            });
        }
    }

    Ok(())
}

fn split_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub output_prefix: Option<PathBuf>,
    pub image_extensions: Option<String>,
    pub legacy_schema_rewrite: Option<bool>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_prefix(mut self, prefix: Option<PathBuf>) -> Self {
        self.output_prefix = prefix;
        self
    }

    pub fn with_image_extensions(mut self, extensions: Option<String>) -> Self {
        self.image_extensions = extensions;
        self
    }

    pub fn with_legacy_schema_rewrite(mut self, rewrite: Option<bool>) -> Self {
        self.legacy_schema_rewrite = rewrite;
        self
    }
}
