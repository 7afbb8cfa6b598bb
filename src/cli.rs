use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::aggregate::Reducer;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Summarize country-level indicators by region and year",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Aggregate indicator values into one row per (region, year)
    Summarize(SummarizeArgs),
    /// List every matched row with the region it was assigned to
    Classify(ClassifyArgs),
    /// Inspect the region catalog or look up a single country
    Catalog(CatalogArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Input CSV with a country column, a date or year column and numeric indicators (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// YAML engine configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// YAML region catalog (defaults to the built-in catalog)
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Name of the country column
    #[arg(long = "country-column")]
    pub country_column: Option<String>,
    /// Name of the date or year column (auto-detected when omitted)
    #[arg(long = "date-column")]
    pub date_column: Option<String>,
    /// Restrict to these regions; repeatable or comma-separated
    #[arg(short = 'r', long = "region", action = clap::ArgAction::Append)]
    pub regions: Vec<String>,
    /// First year to include
    #[arg(long = "from-year")]
    pub from_year: Option<i32>,
    /// Last year to include
    #[arg(long = "to-year")]
    pub to_year: Option<i32>,
    /// Token marking a missing value; repeatable, replaces the defaults
    #[arg(long = "missing-value", action = clap::ArgAction::Append)]
    pub missing_values: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// CSV delimiter for csv output
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub engine: EngineArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    /// Indicator to aggregate as `name` or `name=sum|mean`; repeatable
    #[arg(short = 'I', long = "indicator", action = clap::ArgAction::Append)]
    pub indicators: Vec<String>,
    /// Reducer for indicators given without one
    #[arg(long, value_enum)]
    pub reducer: Option<Reducer>,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub engine: EngineArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// YAML region catalog (defaults to the built-in catalog)
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Print the region for this exact country name
    #[arg(long)]
    pub lookup: Option<String>,
    /// List every country under each region
    #[arg(long)]
    pub countries: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
