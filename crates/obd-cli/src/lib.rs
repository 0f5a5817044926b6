//! OBD Decoder Command-Line Front End
//!
//! Configuration loading, logging setup, input parsing and output rendering
//! for the `obd-decode` binary.

use anyhow::{Context, Result};
use clap::ValueEnum;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use obd_decoder::{DecodedResult, NormalizerConfig, Payload};
use serde::Deserialize;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Environment variable prefix, e.g. `OBD_DECODER__LOG_LEVEL=debug`
pub const ENV_PREFIX: &str = "OBD_DECODER";

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Result output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable summary line
    Text,
}

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub output: OutputFormat,
    pub normalizer: NormalizerConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
            output: OutputFormat::Json,
            normalizer: NormalizerConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load from an optional TOML file, then `OBD_DECODER__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        Self::from_builder(builder.add_source(environment()))
            .with_context(|| match path {
                Some(path) => format!("Failed to load configuration from {}", path.display()),
                None => "Failed to load configuration from environment".to_string(),
            })
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config = builder.build().context("Failed to read configuration sources")?;
        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Apply command-line flags on top of file and environment values
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        log_format: Option<LogFormat>,
        output: Option<OutputFormat>,
    ) -> Self {
        if let Some(level) = log_level {
            self.log_level = level;
        }
        if let Some(format) = log_format {
            self.log_format = format;
        }
        if let Some(output) = output {
            self.output = output;
        }
        self
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("normalizer.extra_noise_tokens")
        .with_list_parse_key("normalizer.extra_sentinels")
}

/// Initialize logging to stderr so stdout carries only results
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let level: Level = level
        .parse()
        .with_context(|| format!("Invalid log level: {level}"))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
    .context("Failed to set tracing subscriber")
}

/// Split an input line into `(command, response)`.
///
/// The first whitespace-separated token is the command; the rest of the line
/// is the raw response. Literal `\r` and `\n` escapes are expanded so
/// captured adapter traffic can be replayed. Blank lines and `#` comments
/// yield `None`.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (command, response) = match line.split_once(char::is_whitespace) {
        Some((command, response)) => (command, response.trim_start()),
        None => (line, ""),
    };
    Some((command.to_string(), unescape(response)))
}

/// Expand literal `\r`, `\n` and `\t` escapes
pub fn unescape(text: &str) -> String {
    text.replace("\\r", "\r")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
}

/// Render one result in the configured format
pub fn render(result: &DecodedResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(result).context("Failed to serialize result"),
        OutputFormat::Text => Ok(render_text(result)),
    }
}

fn render_text(result: &DecodedResult) -> String {
    let detail = match result.payload() {
        Some(Payload::Reading(reading)) if reading.unit.is_empty() => {
            format!("{} ({})", reading.value, reading.description)
        }
        Some(Payload::Reading(reading)) => {
            format!("{} {} ({})", reading.value, reading.unit, reading.description)
        }
        Some(Payload::Dtcs { dtcs }) if dtcs.is_empty() => "no trouble codes".to_string(),
        Some(Payload::Dtcs { dtcs }) => dtcs
            .iter()
            .map(|dtc| match dtc.description() {
                Some(description) => format!("{dtc} ({description})"),
                None => dtc.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(Payload::Cleared { cleared: true }) => "codes cleared".to_string(),
        Some(Payload::Cleared { cleared: false }) => "codes not cleared".to_string(),
        Some(Payload::Vin { vin }) => format!("VIN {vin}"),
        Some(Payload::RawHex { raw_hex }) => format!("raw {raw_hex}"),
        None => result.error_message().unwrap_or_default().to_string(),
    };
    let status = format!("{:?}", result.status());
    format!("{:<6} {:<11} {}", result.command(), status, detail)
}
