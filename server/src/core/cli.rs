use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_BOOTSTRAP_TOKEN, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_TTL_SECS, ENV_CONFIG, ENV_DEBUG,
    ENV_DEPTH_MAX, ENV_ERR_MAX, ENV_FANOUT_MAX, ENV_HOST, ENV_IN_MAX, ENV_LAT_MAX_MS,
    ENV_MAX_SPAN_BYTES, ENV_NO_AUTH, ENV_PORT, ENV_QUEUE_CAPACITY, ENV_RATE_LIMIT_API_RPM,
    ENV_RATE_LIMIT_ENABLED, ENV_RATE_LIMIT_INGESTION_RPM, ENV_READ_TIMEOUT_SECS,
};

#[derive(Parser)]
#[command(name = "archlens")]
#[command(version, about = "Architecture reconstruction from telemetry spans", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Disable authentication (binds every request to the default tenant)
    #[arg(long, global = true, env = ENV_NO_AUTH)]
    pub no_auth: bool,

    /// Enable debug mode (verbose request logging)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Bootstrap API key for the default tenant (hashed and stored on startup)
    #[arg(long, global = true, env = ENV_BOOTSTRAP_TOKEN, hide_env_values = true)]
    pub bootstrap_token: Option<String>,

    // Detection thresholds
    /// High-latency edge threshold in milliseconds
    #[arg(long, global = true, env = ENV_LAT_MAX_MS)]
    pub lat_max_ms: Option<f64>,

    /// Node error-rate threshold (0..1)
    #[arg(long, global = true, env = ENV_ERR_MAX)]
    pub err_max: Option<f64>,

    /// Synchronous chain depth threshold
    #[arg(long, global = true, env = ENV_DEPTH_MAX)]
    pub depth_max: Option<u32>,

    /// Fan-out (out-degree) threshold
    #[arg(long, global = true, env = ENV_FANOUT_MAX)]
    pub fanout_max: Option<u32>,

    /// In-degree threshold for single-point-of-failure detection
    #[arg(long, global = true, env = ENV_IN_MAX)]
    pub in_max: Option<u32>,

    // Ingestion options
    /// Per-tenant ingestion queue capacity (spans)
    #[arg(long, global = true, env = ENV_QUEUE_CAPACITY)]
    pub queue_capacity: Option<usize>,

    /// Per-span serialized byte cap
    #[arg(long, global = true, env = ENV_MAX_SPAN_BYTES)]
    pub max_span_bytes: Option<usize>,

    // Cache options
    /// Analysis cache TTL in seconds
    #[arg(long, global = true, env = ENV_CACHE_TTL_SECS)]
    pub cache_ttl_secs: Option<u64>,

    /// Maximum number of cache entries
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    // Rate limit options
    /// Enable or disable per-tenant rate limiting
    #[arg(long, global = true, env = ENV_RATE_LIMIT_ENABLED)]
    pub rate_limit_enabled: Option<bool>,

    /// API rate limit (requests per minute, per tenant)
    #[arg(long, global = true, env = ENV_RATE_LIMIT_API_RPM)]
    pub rate_limit_api_rpm: Option<u32>,

    /// Ingestion rate limit (requests per minute, per tenant)
    #[arg(long, global = true, env = ENV_RATE_LIMIT_INGESTION_RPM)]
    pub rate_limit_ingestion_rpm: Option<u32>,

    // Read path options
    /// Server-side deadline for read/analysis operations in seconds
    #[arg(long, global = true, env = ENV_READ_TIMEOUT_SECS)]
    pub read_timeout_secs: Option<u64>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Delete local data directory (database, caches). Requires confirmation.
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub no_auth: bool,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub bootstrap_token: Option<String>,
    pub lat_max_ms: Option<f64>,
    pub err_max: Option<f64>,
    pub depth_max: Option<u32>,
    pub fanout_max: Option<u32>,
    pub in_max: Option<u32>,
    pub queue_capacity: Option<usize>,
    pub max_span_bytes: Option<usize>,
    pub cache_ttl_secs: Option<u64>,
    pub cache_max_entries: Option<u64>,
    pub rate_limit_enabled: Option<bool>,
    pub rate_limit_api_rpm: Option<u32>,
    pub rate_limit_ingestion_rpm: Option<u32>,
    pub read_timeout_secs: Option<u64>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        no_auth: cli.no_auth,
        debug: cli.debug,
        config: cli.config,
        bootstrap_token: cli.bootstrap_token,
        lat_max_ms: cli.lat_max_ms,
        err_max: cli.err_max,
        depth_max: cli.depth_max,
        fanout_max: cli.fanout_max,
        in_max: cli.in_max,
        queue_capacity: cli.queue_capacity,
        max_span_bytes: cli.max_span_bytes,
        cache_ttl_secs: cli.cache_ttl_secs,
        cache_max_entries: cli.cache_max_entries,
        rate_limit_enabled: cli.rate_limit_enabled,
        rate_limit_api_rpm: cli.rate_limit_api_rpm,
        rate_limit_ingestion_rpm: cli.rate_limit_ingestion_rpm,
        read_timeout_secs: cli.read_timeout_secs,
    };
    (config, cli.command)
}
