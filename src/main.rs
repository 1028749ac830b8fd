//! docreport command line entry point

use docreport::cli::Cli;
use docreport::{ReportAssembler, ReportConfig};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Load .env before reading DOCREPORT_* variables
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    // RUST_LOG wins over -v / -q
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.apply_to(ReportConfig::from_env());

    if !cli.quiet {
        println!("Processing files in '{}'...", cli.input.display());
    }

    match ReportAssembler::new(config).run(&cli.input, &cli.output) {
        Ok(summary) => {
            if cli.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: failed to serialize summary: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else if !cli.quiet {
                for issue in &summary.issues {
                    eprintln!("Warning: {}: {}", issue.label, issue.reason);
                }
                println!(
                    "Processed {} files ({} with issues)",
                    summary.total_files, summary.failure_count
                );
                println!("Report generated at: {}", summary.output.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
