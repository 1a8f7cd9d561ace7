use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the scoreprint binary.
#[derive(Debug, Parser)]
#[command(
    name = "scoreprint",
    version,
    about = "Quiz result server with a background print queue"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SCOREPRINT_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API and the print worker.
    Serve(Box<ServeArgs>),
    /// Validate configuration and the test catalogue, then exit.
    #[command(name = "check")]
    Check(CheckArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub storage: StorageOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StorageOverrides {
    /// Override the directory holding submitted results.
    #[arg(long = "storage-results-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub results_dir: Option<PathBuf>,

    /// Override the test definitions file.
    #[arg(long = "storage-tests-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub tests_file: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub storage: StorageOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the print queue capacity.
    #[arg(long = "jobs-queue-capacity", value_name = "COUNT")]
    pub jobs_queue_capacity: Option<usize>,

    /// Override the number of delivery attempts per task.
    #[arg(long = "jobs-max-attempts", value_name = "COUNT")]
    pub jobs_max_attempts: Option<u32>,

    /// Override the base retry interval; attempt n waits n times this long.
    #[arg(long = "jobs-retry-interval-ms", value_name = "MS")]
    pub jobs_retry_interval_ms: Option<u64>,

    /// Override the per-attempt delivery deadline.
    #[arg(long = "jobs-attempt-timeout-seconds", value_name = "SECONDS")]
    pub jobs_attempt_timeout_seconds: Option<u64>,

    /// Override what happens to queued tasks on shutdown (drain|abandon).
    #[arg(long = "jobs-shutdown-policy", value_name = "POLICY")]
    pub jobs_shutdown_policy: Option<String>,

    /// Override the printer backend (spool|socket).
    #[arg(long = "printer-backend", value_name = "BACKEND")]
    pub printer_backend: Option<String>,

    /// Override the spool directory used by the spool backend.
    #[arg(long = "printer-spool-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub printer_spool_dir: Option<PathBuf>,

    /// Override the printer address used by the socket backend.
    #[arg(long = "printer-address", value_name = "HOST:PORT")]
    pub printer_address: Option<String>,

    /// Override the origin allowed by CORS.
    #[arg(long = "http-cors-origin", value_name = "ORIGIN")]
    pub http_cors_origin: Option<String>,
}
