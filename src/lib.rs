pub mod aggregate;
pub mod catalog;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod io_utils;
pub mod pipeline;
pub mod region;
pub mod summary;
pub mod table;
pub mod validate;

use std::{env, io::Write, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use encoding_rs::Encoding;
use log::{LevelFilter, debug, info, warn};

use crate::{
    aggregate::IndicatorSpec,
    catalog::RegionCatalog,
    cli::{Cli, Commands, InputArgs, OutputArgs, OutputFormat},
    config::EngineConfig,
    dataset::RawTable,
    pipeline::Engine,
    validate::ValidationReport,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("region_summary", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Summarize(args) => handle_summarize(&args),
        Commands::Classify(args) => handle_classify(&args),
        Commands::Catalog(args) => handle_catalog(&args),
    }
}

fn load_config(args: &cli::EngineArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.merge_cli(args);
    debug!("Effective engine config: {config:?}");
    Ok(config)
}

fn read_input(args: &InputArgs) -> Result<RawTable> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Reading '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    RawTable::read_csv(&args.input, delimiter, encoding)
}

fn handle_summarize(args: &cli::SummarizeArgs) -> Result<()> {
    let mut config = load_config(&args.engine)?;
    if let Some(reducer) = args.reducer {
        config.default_reducer = reducer;
    }
    if !args.indicators.is_empty() {
        config.indicators = args
            .indicators
            .iter()
            .map(|raw| IndicatorSpec::parse(raw, config.default_reducer))
            .collect::<Result<Vec<_>, _>>()?;
    }
    let engine = Engine::from_config(&config)?;
    let table = read_input(&args.input)?;
    let output = engine
        .run(&table)
        .with_context(|| format!("Summarizing {:?}", args.input.input))?;
    report_exclusions(&output.validation, &output.unmatched);

    let summary = &output.summary;
    emit(
        &args.output,
        &summary.headers(),
        &summary.render_rows(),
        || summary.render_table(),
        || summary.to_json(),
    )?;
    info!(
        "Wrote {} summary row(s) using catalog {}",
        summary.len(),
        &engine.catalog().fingerprint()[..12]
    );
    Ok(())
}

fn handle_classify(args: &cli::ClassifyArgs) -> Result<()> {
    let config = load_config(&args.engine)?;
    let engine = Engine::from_config(&config)?;
    let table = read_input(&args.input)?;
    let view = engine
        .classify(&table)
        .with_context(|| format!("Classifying {:?}", args.input.input))?;
    report_exclusions(&view.validation, &view.unmatched);

    let headers = view.headers();
    let rows = view.render_rows();
    emit(
        &args.output,
        &headers,
        &rows,
        || table::render_table(&headers, &rows),
        || view.to_json(),
    )?;
    info!("Wrote {} classified row(s)", view.records.len());
    Ok(())
}

fn handle_catalog(args: &cli::CatalogArgs) -> Result<()> {
    let catalog = match &args.catalog {
        Some(path) => RegionCatalog::load(path)?,
        None => RegionCatalog::builtin()?,
    };

    if let Some(country) = &args.lookup {
        match catalog.classify(country) {
            Some(region) => println!("{country}\t{region}"),
            None => println!("{country}\tnot in catalog"),
        }
        return Ok(());
    }

    let headers = vec!["region".to_string(), "countries".to_string()];
    let rows = catalog
        .entries()
        .iter()
        .map(|entry| {
            let listing = if args.countries {
                entry.countries.join("; ")
            } else {
                entry.countries.len().to_string()
            };
            vec![entry.region.to_string(), listing]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    println!();
    println!(
        "{} countries across {} regions; fingerprint {}",
        catalog.country_count(),
        catalog.entries().len(),
        catalog.fingerprint()
    );
    Ok(())
}

fn emit(
    output: &OutputArgs,
    headers: &[String],
    rows: &[Vec<String>],
    render_table: impl FnOnce() -> String,
    render_json: impl FnOnce() -> serde_json::Value,
) -> Result<()> {
    let encoding = io_utils::resolve_encoding(output.output_encoding.as_deref())?;
    let path = output.output.as_deref();
    match output.format {
        OutputFormat::Csv => {
            let delimiter = io_utils::resolve_output_delimiter(
                path,
                output.output_delimiter,
                io_utils::DEFAULT_CSV_DELIMITER,
            );
            let mut writer = io_utils::open_csv_writer(path, delimiter, encoding)?;
            writer.write_record(headers).context("Writing header")?;
            for (idx, row) in rows.iter().enumerate() {
                writer
                    .write_record(row)
                    .with_context(|| format!("Writing row {}", idx + 1))?;
            }
            writer.flush().context("Flushing output")?;
        }
        OutputFormat::Table => write_text(path, encoding, &render_table())?,
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&render_json())?;
            write_text(path, encoding, &format!("{json}\n"))?;
        }
    }
    Ok(())
}

fn write_text(
    path: Option<&std::path::Path>,
    encoding: &'static Encoding,
    contents: &str,
) -> Result<()> {
    let mut writer = io_utils::open_output(path, encoding)?;
    writer
        .write_all(contents.as_bytes())
        .context("Writing output")?;
    writer.flush().context("Flushing output")?;
    Ok(())
}

fn report_exclusions(validation: &ValidationReport, unmatched: &[String]) {
    for row in &validation.dropped {
        debug!(
            "Dropped line {} ({:?}): '{}'",
            row.line, row.reason, row.value
        );
    }
    for cell in &validation.flagged {
        warn!(
            "Line {}: '{}' in column '{}' is not numeric; treated as missing",
            cell.line, cell.value, cell.column
        );
    }
    if !validation.dropped.is_empty() {
        info!("Dropped {} row(s) during validation", validation.dropped.len());
    }
    if !unmatched.is_empty() {
        info!("{} country name(s) had no region", unmatched.len());
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
