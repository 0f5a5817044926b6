//! OBD Decoder - Main Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use obd_cli::{init_logging, parse_line, render, unescape, CliConfig, LogFormat, OutputFormat};
use obd_decoder::{Decoder, RawExchange};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "obd-decode")]
#[command(author, version, about = "Decode OBD-II adapter responses")]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "OBD_DECODER_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Request command, e.g. 010C. Lines are read from stdin when omitted.
    command: Option<String>,

    /// Raw adapter response; `\r` and `\n` escapes are expanded
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    response: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = CliConfig::load(cli.config.as_deref())?.with_overrides(
        cli.log_level,
        cli.log_format,
        cli.output,
    );
    init_logging(&config.log_level, config.log_format)?;

    info!("=== OBD Decoder v{} ===", env!("CARGO_PKG_VERSION"));

    let decoder = Decoder::new(&config.normalizer);

    if let Some(command) = cli.command {
        let raw = unescape(&cli.response.join(" "));
        let result = decoder.decode(&RawExchange::new(command, raw));
        println!("{}", render(&result, config.output)?);
        return Ok(if result.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (mut decoded, mut failed) = (0usize, 0usize);
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let Some((command, raw)) = parse_line(&line) else {
            continue;
        };
        let result = decoder.decode(&RawExchange::new(command, raw));
        if !result.is_success() {
            debug!(command = result.command(), status = ?result.status(), "Decode did not succeed");
            failed += 1;
        }
        decoded += 1;
        println!("{}", render(&result, config.output)?);
    }

    info!(decoded, failed, "Finished decoding input");
    Ok(ExitCode::SUCCESS)
}
