use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use plandoc_core::VerifierOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogFormatArg {
    #[default]
    Human,
    Json,
}

impl From<LogFormatArg> for logutil::LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Human => logutil::LogFormat::HumanReadable,
            LogFormatArg::Json => logutil::LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
pub struct InspectArgs {
    /// Path to the plan document.
    pub file: PathBuf,

    /// Verify the whole document before printing anything.
    #[clap(long)]
    pub verify: bool,

    /// Output format.
    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct VerifyArgs {
    /// Path to the plan document.
    pub file: PathBuf,

    /// Maximum table nesting depth.
    #[clap(long)]
    pub max_depth: Option<usize>,

    /// Maximum number of tables.
    #[clap(long)]
    pub max_tables: Option<usize>,

    /// Maximum number of bytes visited, counting shared objects once per
    /// reference.
    #[clap(long)]
    pub max_size: Option<usize>,

    /// Require strings to be nul terminated.
    #[clap(long)]
    pub require_nul: bool,
}

impl VerifyArgs {
    pub fn verifier_options(&self) -> VerifierOptions {
        let defaults = VerifierOptions::default();
        VerifierOptions {
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            max_tables: self.max_tables.unwrap_or(defaults.max_tables),
            max_apparent_size: self.max_size.unwrap_or(defaults.max_apparent_size),
            require_null_terminator: self.require_nul,
            ..defaults
        }
    }
}

#[derive(Debug, Parser)]
pub struct CheckVersionArgs {
    /// Path to the plan document.
    pub file: PathBuf,

    /// Accepted plan versions.
    #[clap(long, required = true, num_args = 1..)]
    pub accept: Vec<String>,
}
