//! ASN.1 codec module
//!
//! Consumes UPER-encoded messages from a Kafka topic and republishes them as
//! XER on another topic.

mod logging;

use acm_config::{ConfigOverrides, PipelineConfig, StartOffset};
use acm_processor::{runner, spawn_signal_listener, OctetStringCodec, ShutdownSignal};
use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use crate::logging::LogOptions;

#[derive(Parser, Debug)]
#[command(
    name = "acm",
    version,
    about = "ASN.1 codec module - transcodes UPER messages from Kafka into XER"
)]
struct Cli {
    /// Configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: PathBuf,

    /// Print the effective configuration and exit
    #[arg(short = 'C', long = "config-check")]
    config_check: bool,

    /// Topic that receives the XML output
    #[arg(short = 't', long = "produce-topic", value_name = "TOPIC")]
    produce_topic: Option<String>,

    /// Partition for produced messages
    #[arg(short = 'p', long, value_name = "PARTITION")]
    partition: Option<i32>,

    /// Consumer group ID
    #[arg(short = 'g', long, value_name = "GROUP")]
    group: Option<String>,

    /// Kafka brokers (comma-separated)
    #[arg(short = 'b', long, value_name = "BROKERS")]
    broker: Option<String>,

    /// Start offset: beginning, end, stored or an explicit offset
    #[arg(short = 'o', long, value_name = "OFFSET")]
    offset: Option<StartOffset>,

    /// Exit once every partition reaches its end
    #[arg(short = 'x', long = "exit")]
    exit_on_eof: bool,

    /// librdkafka debug contexts
    #[arg(short = 'd', long, value_name = "CONTEXTS")]
    debug: Option<String>,

    /// Log level: trace, debug, info, warning, error, critical or off
    #[arg(short = 'v', long = "log-level", default_value = "trace")]
    log_level: String,

    /// Directory for the log files
    #[arg(short = 'D', long = "log-dir", default_value = "logs")]
    log_dir: PathBuf,

    /// Remove existing log files before starting
    #[arg(short = 'R', long = "log-rm")]
    log_rm: bool,

    /// Information log file name
    #[arg(short = 'i', long = "ilog", default_value = "log.info")]
    info_log: String,

    /// Error log file name
    #[arg(short = 'e', long = "elog", default_value = "log.error")]
    error_log: String,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            brokers: self.broker.clone(),
            group_id: self.group.clone(),
            producer_topic: self.produce_topic.clone(),
            partition: self.partition,
            offset: self.offset,
            exit_on_eof: self.exit_on_eof.then_some(true),
            debug: self.debug.clone(),
            ..Default::default()
        }
    }

    fn log_options(&self) -> LogOptions {
        LogOptions {
            dir: self.log_dir.clone(),
            info_file: self.info_log.clone(),
            error_file: self.error_log.clone(),
            level: self.log_level.clone(),
            remove_existing: self.log_rm,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let _guards = logging::init(&cli.log_options())?;

    let config = PipelineConfig::load(&cli.config, cli.overrides()).with_context(|| {
        format!("Failed to load configuration from {}", cli.config.display())
    })?;

    if cli.config_check {
        for (key, value) in config.describe() {
            println!("{} = {}", key, value);
        }
        config.validate()?;
        return Ok(());
    }

    config.validate()?;

    info!(
        config = %cli.config.display(),
        brokers = %config.brokers,
        "Starting ASN.1 codec module"
    );

    let shutdown = ShutdownSignal::new();
    let listener = spawn_signal_listener(shutdown.clone());

    let result = runner::run(&config, OctetStringCodec::new(config.skip_bytes), &shutdown).await;
    listener.abort();

    let counters = result?;
    eprintln!("{}", counters);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["acm", "-c", "config/example.properties"]).unwrap();

        assert_eq!(cli.log_level, "trace");
        assert_eq!(cli.log_dir, PathBuf::from("logs"));
        assert_eq!(cli.info_log, "log.info");
        assert_eq!(cli.error_log, "log.error");
        assert!(!cli.config_check);
        assert_eq!(cli.overrides(), ConfigOverrides::default());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "acm", "-c", "acm.properties", "-b", "kafka:9092", "-g", "codec", "-t", "out", "-p",
            "2", "-o", "end", "-x", "-d", "all",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.brokers.as_deref(), Some("kafka:9092"));
        assert_eq!(overrides.group_id.as_deref(), Some("codec"));
        assert_eq!(overrides.producer_topic.as_deref(), Some("out"));
        assert_eq!(overrides.partition, Some(2));
        assert_eq!(overrides.offset, Some(StartOffset::End));
        assert_eq!(overrides.exit_on_eof, Some(true));
        assert_eq!(overrides.debug.as_deref(), Some("all"));
    }

    #[test]
    fn test_config_is_required() {
        assert!(Cli::try_parse_from(["acm", "-x"]).is_err());
    }

    #[test]
    fn test_invalid_offset_rejected() {
        assert!(Cli::try_parse_from(["acm", "-c", "a.properties", "-o", "middle"]).is_err());
    }

    #[test]
    fn test_log_options() {
        let cli = Cli::try_parse_from([
            "acm", "-c", "a.properties", "-v", "warning", "-D", "/tmp/acm", "-R", "-i", "info.log",
        ])
        .unwrap();

        let options = cli.log_options();
        assert_eq!(options.level, "warning");
        assert_eq!(options.dir, PathBuf::from("/tmp/acm"));
        assert_eq!(options.info_file, "info.log");
        assert!(options.remove_existing);
    }
}
