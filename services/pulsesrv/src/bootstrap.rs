//! Startup helpers: command line, configuration layering, logging

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use common::logging::{self, LogConfig};
use common::service_bootstrap::ServiceInfo;
use figment::providers::Serialized;
use serde::Serialize;
use tracing::Level;

use crate::config::PulseSrvConfig;
use crate::error::Result;
use crate::{DEFAULT_PORT, SERVICE_NAME};

/// Command line arguments
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "pulsesrv", version, about = "Pulse counter service")]
pub struct Args {
    /// Pulse counter serial device (default: /dev/ttyACM0)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Path to persistent state file (default: pulse_counter.state)
    #[arg(long = "state", value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Port for the REST API to listen on (default: 8000)
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Log file (default: pulse_counter.log)
    #[arg(long = "logfile", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Configuration file (default: config/pulsesrv.yaml, if present)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Console log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Disable colored console output
    #[arg(long)]
    pub no_color: bool,

    /// Validate configuration, print it and exit
    #[arg(long)]
    pub validate: bool,
}

/// Flags that override configuration; unset flags leave lower layers alone
#[derive(Debug, Serialize)]
struct CliOverrides<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_file: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_file: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
}

impl Args {
    fn overrides(&self) -> CliOverrides<'_> {
        CliOverrides {
            device: self.device.as_deref(),
            state_file: self.state_file.as_ref(),
            log_file: self.log_file.as_ref(),
            port: self.port,
        }
    }
}

const BANNER: &str = r#"
 ██████╗ ██╗   ██╗██╗     ███████╗███████╗███████╗██████╗ ██╗   ██╗
 ██╔══██╗██║   ██║██║     ██╔════╝██╔════╝██╔════╝██╔══██╗██║   ██║
 ██████╔╝██║   ██║██║     ███████╗█████╗  ███████╗██████╔╝██║   ██║
 ██╔═══╝ ██║   ██║██║     ╚════██║██╔══╝  ╚════██║██╔══██╗╚██╗ ██╔╝
 ██║     ╚██████╔╝███████╗███████║███████╗███████║██║  ██║ ╚████╔╝
 ╚═╝      ╚═════╝ ╚══════╝╚══════╝╚══════╝╚══════╝╚═╝  ╚═╝  ╚═══╝
"#;

/// Service metadata for the banner and log setup
pub fn service_info() -> ServiceInfo {
    ServiceInfo::new(
        SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        "S0 pulse counter service",
        DEFAULT_PORT,
    )
    .with_banner(BANNER)
}

/// Resolve configuration: defaults, file, environment, then flags
pub fn load_config(args: &Args) -> Result<PulseSrvConfig> {
    let figment = PulseSrvConfig::figment(args.config.as_deref())?
        .merge(Serialized::defaults(args.overrides()));
    PulseSrvConfig::from_figment(&figment)
}

/// Console at `--log-level`, file at INFO with size rotation
pub fn initialize_logging(
    args: &Args,
    config: &PulseSrvConfig,
    service_info: &ServiceInfo,
) -> common::Result<()> {
    logging::init_with_config(LogConfig {
        service_name: service_info.name.clone(),
        log_file: config.log_file.clone(),
        console_level: logging::parse_log_level(&args.log_level),
        file_level: Level::INFO,
        ansi: !args.no_color && std::io::stdout().is_terminal(),
        ..LogConfig::default()
    })
}
