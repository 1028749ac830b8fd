//! Command-line interface
//!
//! Flags override the configuration loaded from defaults and `DOCREPORT_*`
//! environment variables.
//!
//! ```bash
//! docreport -i ./contracts -o contracts.docx
//! docreport -i ./inbox --max-text-lines 20 --no-office-fallback
//! docreport -i ./inbox --json -q
//! ```

use crate::config::ReportConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docreport")]
#[command(about = "Build one Word report with a preview of every file in a directory tree")]
#[command(version)]
pub struct Cli {
    /// Directory to scan
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,

    /// Report destination (replaced if it exists)
    #[arg(short, long, value_name = "FILE", default_value = "report.docx")]
    pub output: PathBuf,

    /// Lines shown for text files and Word documents
    #[arg(long, value_name = "N")]
    pub max_text_lines: Option<usize>,

    /// Characters kept per line
    #[arg(long, value_name = "N")]
    pub max_line_chars: Option<usize>,

    /// Rows shown for spreadsheets and CSV files (header included)
    #[arg(long, value_name = "N")]
    pub max_rows: Option<usize>,

    /// Columns shown for spreadsheets and CSV files
    #[arg(long, value_name = "N")]
    pub max_columns: Option<usize>,

    /// Largest width or height of embedded images, in pixels
    #[arg(long, value_name = "PX")]
    pub max_image_dimension: Option<u32>,

    /// Resolution for rendering the first PDF page
    #[arg(long, value_name = "DPI")]
    pub pdf_dpi: Option<u32>,

    /// Directory levels shown next to each file name
    #[arg(long, value_name = "N")]
    pub path_context_levels: Option<usize>,

    /// Do not convert Word/Excel files to PDF when native reading fails
    #[arg(long)]
    pub no_office_fallback: bool,

    /// Seconds before a LibreOffice conversion is abandoned
    #[arg(long, value_name = "SECS")]
    pub office_timeout: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply flag overrides on top of `config`
    pub fn apply_to(&self, mut config: ReportConfig) -> ReportConfig {
        if let Some(n) = self.max_text_lines {
            config.max_text_lines = n;
        }
        if let Some(n) = self.max_line_chars {
            config.max_line_chars = n;
        }
        if let Some(n) = self.max_rows {
            config.max_rows = n;
        }
        if let Some(n) = self.max_columns {
            config.max_columns = n;
        }
        if let Some(px) = self.max_image_dimension {
            config.max_image_dimension = px;
        }
        if let Some(dpi) = self.pdf_dpi {
            config.pdf_dpi = dpi;
        }
        if let Some(n) = self.path_context_levels {
            config.path_context_levels = n;
        }
        if let Some(secs) = self.office_timeout {
            config.office_timeout_secs = secs;
        }
        if self.no_office_fallback {
            config.office_fallback = false;
        }
        config.clamp()
    }

    /// Default log filter for the verbosity flags, used when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "warn,docreport=info",
            (false, 1) => "warn,docreport=debug",
            (false, _) => "warn,docreport=trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["docreport", "-i", "in"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("in"));
        assert_eq!(cli.output, PathBuf::from("report.docx"));
        assert_eq!(cli.apply_to(ReportConfig::default()), ReportConfig::default());
        assert_eq!(cli.log_filter(), "warn,docreport=info");
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "docreport",
            "--input",
            "in",
            "--output",
            "out.docx",
            "--max-text-lines",
            "3",
            "--max-rows",
            "5",
            "--pdf-dpi",
            "72",
            "--no-office-fallback",
            "--office-timeout",
            "45",
            "-vv",
        ])
        .unwrap();

        let config = cli.apply_to(ReportConfig::default());
        assert_eq!(config.max_text_lines, 3);
        assert_eq!(config.max_rows, 5);
        assert_eq!(config.pdf_dpi, 72);
        assert!(!config.office_fallback);
        assert_eq!(config.office_timeout_secs, 45);
        assert_eq!(cli.log_filter(), "warn,docreport=trace");
    }

    #[test]
    fn test_input_is_required() {
        assert!(Cli::try_parse_from(["docreport"]).is_err());
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        let cli = Cli::try_parse_from(["docreport", "-i", "in", "-q", "-v"]).unwrap();
        assert_eq!(cli.log_filter(), "warn");
    }
}
