use crate::config::{CliOverrides, Config};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

const UPDATE_FLAG: &str = "--update-xml";

#[derive(Parser, Debug)]
#[command(name = "dbimages")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract images stored in database tables, and write them back")]
#[command(
    long_about = "DBImages scans directories for XML DataSet files and SQLite databases, \
                  saves every image stored in a binary column as a file named \
                  <table>_<column>_<index>, and can write an edited image folder back \
                  into an XML DataSet."
)]
#[command(before_help = "🖼  DBImages - Database Image Extraction Tool")]
#[command(after_help = "EXAMPLES:\n  \
    dbimages ./data\n  \
    dbimages ./data ./archive --output exports --verbose\n  \
    dbimages --update-xml ./data/shop.xml ./data/DB_shop.xml_Images\n  \
    dbimages ./data --config my-config.toml --output-format json")]
pub struct Cli {
    /// Directories to scan for data sources
    pub directories: Vec<PathBuf>,

    /// Write the images in a folder back into an XML DataSet
    #[arg(
        long,
        num_args = 0..,
        value_name = "PATH",
        help = "Update <SOURCE> from the images in <IMAGES_DIR>"
    )]
    pub update_xml: Option<Vec<PathBuf>>,

    /// Directory the DB_<name>_Images folders are created in
    #[arg(short, long, help = "Export directory (defaults to each scanned directory)")]
    pub output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Image extensions picked up by --update-xml (comma-separated)
    #[arg(long, help = "Image extensions to read back (e.g., png,jpg,gif)")]
    pub image_extensions: Option<String>,

    /// Keep modern core library references in the saved schema
    #[arg(long, help = "Do not rewrite assembly references for older readers")]
    pub no_legacy_rewrite: bool,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "List the data sources that would be processed")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_output_prefix(self.output.clone())
            .with_image_extensions(self.image_extensions.clone())
            .with_legacy_schema_rewrite(self.no_legacy_rewrite.then_some(false))
    }

    /// The `(source, images_dir)` pair of `--update-xml`, when exactly two
    /// values were given.
    pub fn update_args(&self) -> Option<(PathBuf, PathBuf)> {
        match self.update_xml.as_deref() {
            Some([source, images]) => Some((source.clone(), images.clone())),
            _ => None,
        }
    }

    pub fn is_update_mode(&self) -> bool {
        self.update_xml.is_some()
    }
}

/// Spells any case variant of `--update-xml` the way the parser expects it.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some(flag) if flag != UPDATE_FLAG && flag.eq_ignore_ascii_case(UPDATE_FLAG) => {
                OsString::from(UPDATE_FLAG)
            }
            _ => arg,
        })
        .collect()
}

pub fn usage() -> &'static str {
    "Usage:\n  \
     dbimages [DIRECTORY ...]\n  \
     dbimages --update-xml <SOURCE> <IMAGES_DIR>"
}
