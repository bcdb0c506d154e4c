use clap::Parser;
use dbimages::cli::{normalize_args, usage};
use dbimages::{Cli, DbImages, DbImagesError, OutputFormatter, OutputMode, UserFriendlyError};
use std::path::Path;
use std::process;

fn main() {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    init_tracing(&cli);

    let exit_code = run(&cli);
    process::exit(exit_code);
}

fn init_tracing(cli: &Cli) {
    // --quiet silences everything; -v enables our own diagnostics unless
    // RUST_LOG says otherwise; the default keeps stderr for progress bars.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose > 0 {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "dbimages=debug".into())
    } else {
        tracing_subscriber::EnvFilter::new("off")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> i32 {
    // Handle special commands first
    if cli.generate_config {
        return handle_generate_config(cli);
    }

    if cli.is_update_mode() && cli.update_args().is_none() {
        println!("{}", usage());
        return 0;
    }

    let dbimages = match DbImages::from_cli(cli) {
        Ok(dbimages) => dbimages,
        Err(e) => {
            print_startup_error(&e);
            return 1;
        }
    };

    if let Some((source, images)) = cli.update_args() {
        return handle_update(&dbimages, &source, &images);
    }

    if cli.dry_run {
        dbimages.dry_run(&cli.directories);
        return 0;
    }

    if cli.directories.is_empty() {
        dbimages
            .output_formatter()
            .info("No directories given, nothing to do");
        return 0;
    }

    // Unreadable sources are reported in the batch; they do not fail the run.
    dbimages.extract_directories(&cli.directories);
    0
}

fn handle_update(dbimages: &DbImages, source: &Path, images: &Path) -> i32 {
    match dbimages.update_xml(source, images) {
        Ok(_) => 0,
        Err(e) => {
            tracing::error!(error = %e, "update failed");
            dbimages.handle_error(&e);
            1
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "dbimages.toml".to_string());

    match DbImages::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  dbimages <directory> --config {}", config_path);
            0
        }
        Err(e) => {
            eprintln!(
                "Failed to generate configuration file: {}",
                e.user_message()
            );
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn print_startup_error(error: &DbImagesError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}
