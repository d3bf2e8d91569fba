//! Command line interface.
//!
//! Every flag can also be set through an environment variable. Flags
//! override values from the config file; the merged result is validated
//! once and then treated as immutable.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{read_config, validate_config, ConfigError, EchoConfig, LogFormat, TraceExporter};

#[derive(Debug, Clone, Parser)]
#[command(name = "echoserver", version)]
#[command(about = "Diagnostic echo server for proxies, load balancers and service meshes", long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "ECHOSERVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP listen address, e.g. `0.0.0.0:8080` or `:8080`.
    #[arg(long, env = "ADDRESS")]
    pub address: Option<String>,

    /// gRPC listen address. Setting it enables the gRPC server.
    #[arg(long, env = "GRPC_ADDRESS")]
    pub grpc_address: Option<String>,

    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// `console` or `json`.
    #[arg(long, env = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// `none` or `otlp`.
    #[arg(long, env = "TRACER_EXPORTER")]
    pub trace_exporter: Option<TraceExporter>,
}

impl Cli {
    /// Config file (or defaults) with flag overrides applied, validated.
    pub fn load(&self) -> Result<EchoConfig, ConfigError> {
        let config = match &self.config {
            Some(path) => read_config(path)?,
            None => EchoConfig::default(),
        };
        let config = self.apply(config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn apply(&self, mut config: EchoConfig) -> EchoConfig {
        if let Some(address) = &self.address {
            config.listener.bind_address = normalize_address(address);
        }
        if let Some(address) = &self.grpc_address {
            config.grpc.bind_address = normalize_address(address);
            config.grpc.enabled = true;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if let Some(exporter) = self.trace_exporter {
            config.observability.trace_exporter = exporter;
        }
        config
    }
}

/// `:8080` → `0.0.0.0:8080`.
fn normalize_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address.to_string()
    }
}
