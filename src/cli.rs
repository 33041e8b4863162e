use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "strata",
    version,
    about = "Configuration management with resolver support"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate configuration files against a schema
    Validate {
        /// Configuration file(s) to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Path to the schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Resolve interpolations before validating
        #[arg(short, long)]
        resolve: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Only output errors
        #[arg(short, long)]
        quiet: bool,
    },

    /// Export configuration in various formats
    Dump {
        /// Configuration file(s) to dump
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Resolve interpolations
        #[arg(short, long)]
        resolve: bool,

        /// Don't redact sensitive values (use with caution)
        #[arg(long)]
        no_redact: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = DumpFormat::Yaml)]
        format: DumpFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Get a specific value from the configuration
    Get {
        /// Configuration file(s) followed by the value path (e.g. database.host)
        #[arg(required = true, value_names = ["FILE", "PATH"])]
        args: Vec<String>,

        /// Resolve interpolations
        #[arg(short, long)]
        resolve: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = GetFormat::Text)]
        format: GetFormat,

        /// Default value if the path is not found
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Quick syntax check without full validation
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum DumpFormat {
    Yaml,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum GetFormat {
    Text,
    Json,
    Yaml,
}
