//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CheckArgs, CliArgs, Command, ServeArgs, ServeOverrides, StorageOverrides};

use crate::application::jobs::{DEFAULT_QUEUE_CAPACITY, ShutdownPolicy};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "scoreprint";
const ENV_PREFIX: &str = "SCOREPRINT";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_RESULTS_DIR: &str = "temp";
const DEFAULT_TESTS_FILE: &str = "test-questions.json";
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_INTERVAL_MS: u64 = 2_000;
const DEFAULT_SPOOL_DIR: &str = "spool";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub jobs: JobsSettings,
    pub printer: PrinterSettings,
    pub http: HttpSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub results_dir: PathBuf,
    pub tests_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub queue_capacity: NonZeroUsize,
    pub max_attempts: NonZeroU32,
    pub retry_interval: Duration,
    pub attempt_timeout: Option<Duration>,
    pub shutdown_policy: ShutdownPolicy,
}

#[derive(Debug, Clone)]
pub struct PrinterSettings {
    pub backend: PrinterBackend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterBackend {
    /// Jobs are committed as files into a spool directory.
    Spool { directory: PathBuf },
    /// Jobs are streamed to a raw TCP (port 9100) printer.
    Socket { address: String },
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub cors_origin: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Check(args)) => raw.apply_storage_overrides(&args.storage),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    jobs: RawJobsSettings,
    printer: RawPrinterSettings,
    http: RawHttpSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(capacity) = overrides.jobs_queue_capacity {
            self.jobs.queue_capacity = Some(capacity);
        }
        if let Some(attempts) = overrides.jobs_max_attempts {
            self.jobs.max_attempts = Some(attempts);
        }
        if let Some(interval) = overrides.jobs_retry_interval_ms {
            self.jobs.retry_interval_ms = Some(interval);
        }
        if let Some(timeout) = overrides.jobs_attempt_timeout_seconds {
            self.jobs.attempt_timeout_seconds = Some(timeout);
        }
        if let Some(policy) = overrides.jobs_shutdown_policy.as_ref() {
            self.jobs.shutdown_policy = Some(policy.clone());
        }
        if let Some(backend) = overrides.printer_backend.as_ref() {
            self.printer.backend = Some(backend.clone());
        }
        if let Some(directory) = overrides.printer_spool_dir.as_ref() {
            self.printer.spool_dir = Some(directory.clone());
        }
        if let Some(address) = overrides.printer_address.as_ref() {
            self.printer.address = Some(address.clone());
        }
        if let Some(origin) = overrides.http_cors_origin.as_ref() {
            self.http.cors_origin = Some(origin.clone());
        }

        self.apply_storage_overrides(&overrides.storage);
    }

    fn apply_storage_overrides(&mut self, overrides: &StorageOverrides) {
        if let Some(directory) = overrides.results_dir.as_ref() {
            self.storage.results_dir = Some(directory.clone());
        }
        if let Some(file) = overrides.tests_file.as_ref() {
            self.storage.tests_file = Some(file.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            jobs,
            printer,
            http,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            storage: build_storage_settings(storage)?,
            jobs: build_jobs_settings(jobs)?,
            printer: build_printer_settings(printer)?,
            http: build_http_settings(http)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let results_dir = storage
        .results_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR));
    if results_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.results_dir",
            "path must not be empty",
        ));
    }

    let tests_file = storage
        .tests_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TESTS_FILE));
    if tests_file.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.tests_file",
            "path must not be empty",
        ));
    }

    Ok(StorageSettings {
        results_dir,
        tests_file,
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let queue_capacity = jobs.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
    let queue_capacity = NonZeroUsize::new(queue_capacity)
        .ok_or_else(|| LoadError::invalid("jobs.queue_capacity", "must be greater than zero"))?;

    let max_attempts = jobs.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
    let max_attempts = NonZeroU32::new(max_attempts)
        .ok_or_else(|| LoadError::invalid("jobs.max_attempts", "must be greater than zero"))?;

    let retry_interval =
        Duration::from_millis(jobs.retry_interval_ms.unwrap_or(DEFAULT_RETRY_INTERVAL_MS));

    let attempt_timeout = match jobs.attempt_timeout_seconds {
        Some(0) => {
            return Err(LoadError::invalid(
                "jobs.attempt_timeout_seconds",
                "must be greater than zero when set",
            ));
        }
        Some(seconds) => Some(Duration::from_secs(seconds)),
        None => None,
    };

    let shutdown_policy = match jobs.shutdown_policy.as_deref().map(str::trim) {
        None | Some("drain") => ShutdownPolicy::Drain,
        Some("abandon") => ShutdownPolicy::Abandon,
        Some(other) => {
            return Err(LoadError::invalid(
                "jobs.shutdown_policy",
                format!("expected `drain` or `abandon`, got `{other}`"),
            ));
        }
    };

    Ok(JobsSettings {
        queue_capacity,
        max_attempts,
        retry_interval,
        attempt_timeout,
        shutdown_policy,
    })
}

fn build_printer_settings(printer: RawPrinterSettings) -> Result<PrinterSettings, LoadError> {
    let backend = match printer.backend.as_deref().map(str::trim) {
        None | Some("spool") => {
            let directory = printer
                .spool_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SPOOL_DIR));
            if directory.as_os_str().is_empty() {
                return Err(LoadError::invalid(
                    "printer.spool_dir",
                    "path must not be empty",
                ));
            }
            PrinterBackend::Spool { directory }
        }
        Some("socket") => {
            let address = printer
                .address
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    LoadError::invalid(
                        "printer.address",
                        "required when printer.backend is `socket`",
                    )
                })?;
            PrinterBackend::Socket { address }
        }
        Some(other) => {
            return Err(LoadError::invalid(
                "printer.backend",
                format!("expected `spool` or `socket`, got `{other}`"),
            ));
        }
    };

    Ok(PrinterSettings { backend })
}

fn build_http_settings(http: RawHttpSettings) -> Result<HttpSettings, LoadError> {
    let cors_origin = http
        .cors_origin
        .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
    if cors_origin.trim().is_empty() {
        return Err(LoadError::invalid(
            "http.cors_origin",
            "origin must not be empty",
        ));
    }

    Ok(HttpSettings { cors_origin })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    results_dir: Option<PathBuf>,
    tests_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    queue_capacity: Option<usize>,
    max_attempts: Option<u32>,
    retry_interval_ms: Option<u64>,
    attempt_timeout_seconds: Option<u64>,
    shutdown_policy: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPrinterSettings {
    backend: Option<String>,
    spool_dir: Option<PathBuf>,
    address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHttpSettings {
    cors_origin: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
