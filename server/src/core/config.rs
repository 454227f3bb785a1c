use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS, DEFAULT_DEPTH_MAX,
    DEFAULT_ERR_MAX, DEFAULT_FANOUT_MAX, DEFAULT_HOST, DEFAULT_IN_MAX, DEFAULT_LAT_MAX_MS,
    DEFAULT_MAX_SPAN_BYTES, DEFAULT_PORT, DEFAULT_QUEUE_CAPACITY, DEFAULT_RATE_LIMIT_API_RPM,
    DEFAULT_RATE_LIMIT_INGESTION_RPM, DEFAULT_READ_TIMEOUT_SECS, MAX_BATCH_SPANS,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Authentication configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuthFileConfig {
    pub enabled: Option<bool>,
}

/// Detection threshold configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ThresholdsFileConfig {
    pub lat_max_ms: Option<f64>,
    pub err_max: Option<f64>,
    pub depth_max: Option<u32>,
    pub fanout_max: Option<u32>,
    pub in_max: Option<u32>,
}

/// Ingestion configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct IngestFileConfig {
    pub queue_capacity: Option<usize>,
    pub max_span_bytes: Option<usize>,
    pub max_batch_spans: Option<usize>,
}

/// Cache configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheFileConfig {
    pub ttl_secs: Option<u64>,
    pub max_entries: Option<u64>,
}

/// Rate limit configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RateLimitFileConfig {
    pub enabled: Option<bool>,
    pub api_rpm: Option<u32>,
    pub ingestion_rpm: Option<u32>,
}

/// Read path configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReadFileConfig {
    pub timeout_secs: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub auth: Option<AuthFileConfig>,
    pub thresholds: Option<ThresholdsFileConfig>,
    pub ingest: Option<IngestFileConfig>,
    pub cache: Option<CacheFileConfig>,
    pub rate_limit: Option<RateLimitFileConfig>,
    pub read: Option<ReadFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra {
            if !map.is_empty() {
                let keys_str: String = map
                    .keys()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                tracing::warn!(
                    fields = %keys_str,
                    "Unknown fields in config file (possible typos)"
                );
            }
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                current.host = server.host;
            }
            if server.port.is_some() {
                current.port = server.port;
            }
        }

        if let Some(auth) = other.auth {
            let current = self.auth.get_or_insert_with(AuthFileConfig::default);
            if auth.enabled.is_some() {
                current.enabled = auth.enabled;
            }
        }

        if let Some(thresholds) = other.thresholds {
            let current = self
                .thresholds
                .get_or_insert_with(ThresholdsFileConfig::default);
            if thresholds.lat_max_ms.is_some() {
                current.lat_max_ms = thresholds.lat_max_ms;
            }
            if thresholds.err_max.is_some() {
                current.err_max = thresholds.err_max;
            }
            if thresholds.depth_max.is_some() {
                current.depth_max = thresholds.depth_max;
            }
            if thresholds.fanout_max.is_some() {
                current.fanout_max = thresholds.fanout_max;
            }
            if thresholds.in_max.is_some() {
                current.in_max = thresholds.in_max;
            }
        }

        if let Some(ingest) = other.ingest {
            let current = self.ingest.get_or_insert_with(IngestFileConfig::default);
            if ingest.queue_capacity.is_some() {
                current.queue_capacity = ingest.queue_capacity;
            }
            if ingest.max_span_bytes.is_some() {
                current.max_span_bytes = ingest.max_span_bytes;
            }
            if ingest.max_batch_spans.is_some() {
                current.max_batch_spans = ingest.max_batch_spans;
            }
        }

        if let Some(cache) = other.cache {
            let current = self.cache.get_or_insert_with(CacheFileConfig::default);
            if cache.ttl_secs.is_some() {
                current.ttl_secs = cache.ttl_secs;
            }
            if cache.max_entries.is_some() {
                current.max_entries = cache.max_entries;
            }
        }

        if let Some(rate_limit) = other.rate_limit {
            let current = self
                .rate_limit
                .get_or_insert_with(RateLimitFileConfig::default);
            if rate_limit.enabled.is_some() {
                current.enabled = rate_limit.enabled;
            }
            if rate_limit.api_rpm.is_some() {
                current.api_rpm = rate_limit.api_rpm;
            }
            if rate_limit.ingestion_rpm.is_some() {
                current.ingestion_rpm = rate_limit.ingestion_rpm;
            }
        }

        if let Some(read) = other.read {
            let current = self.read.get_or_insert_with(ReadFileConfig::default);
            if read.timeout_secs.is_some() {
                current.timeout_secs = read.timeout_secs;
            }
        }

        if other.debug.is_some() {
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub bootstrap_token: Option<String>,
}

/// Default detection thresholds.
///
/// Per-tenant overrides live on the tenants table; these are the
/// instance-wide baselines they fall back to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdsConfig {
    pub lat_max_ms: f64,
    pub err_max: f64,
    pub depth_max: u32,
    pub fanout_max: u32,
    pub in_max: u32,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            lat_max_ms: DEFAULT_LAT_MAX_MS,
            err_max: DEFAULT_ERR_MAX,
            depth_max: DEFAULT_DEPTH_MAX,
            fanout_max: DEFAULT_FANOUT_MAX,
            in_max: DEFAULT_IN_MAX,
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Per-tenant ingestion queue capacity (spans)
    pub queue_capacity: usize,
    /// Per-span serialized byte cap
    pub max_span_bytes: usize,
    /// Maximum spans per batch request
    pub max_batch_spans: usize,
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Analysis result TTL in seconds
    pub ttl_secs: u64,
    /// Maximum cache entries
    pub max_entries: u64,
}

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub api_rpm: u32,
    pub ingestion_rpm: u32,
}

/// Read path configuration
#[derive(Debug, Clone)]
pub struct ReadConfig {
    /// Server-side deadline for analysis operations in seconds
    pub timeout_secs: u64,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub thresholds: ThresholdsConfig,
    pub ingest: IngestConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub read: ReadConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.archlens/archlens.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path() {
            if profile_path.exists() {
                let profile_config = FileConfig::load_from_file(&profile_path)?;
                profile_config.warn_unknown_fields();
                file_config.merge(profile_config);
                found_configs.push(profile_path.display().to_string());
            }
        }

        let overlay_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let file_server = file_config.server.unwrap_or_default();
        let file_auth = file_config.auth.unwrap_or_default();
        let file_thresholds = file_config.thresholds.unwrap_or_default();
        let file_ingest = file_config.ingest.unwrap_or_default();
        let file_cache = file_config.cache.unwrap_or_default();
        let file_rate_limit = file_config.rate_limit.unwrap_or_default();
        let file_read = file_config.read.unwrap_or_default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        // auth.enabled: file config sets default, --no-auth CLI flag disables
        let auth_enabled = if cli.no_auth {
            false
        } else {
            file_auth.enabled.unwrap_or(true)
        };

        let thresholds = ThresholdsConfig {
            lat_max_ms: cli
                .lat_max_ms
                .or(file_thresholds.lat_max_ms)
                .unwrap_or(DEFAULT_LAT_MAX_MS),
            err_max: cli
                .err_max
                .or(file_thresholds.err_max)
                .unwrap_or(DEFAULT_ERR_MAX),
            depth_max: cli
                .depth_max
                .or(file_thresholds.depth_max)
                .unwrap_or(DEFAULT_DEPTH_MAX),
            fanout_max: cli
                .fanout_max
                .or(file_thresholds.fanout_max)
                .unwrap_or(DEFAULT_FANOUT_MAX),
            in_max: cli.in_max.or(file_thresholds.in_max).unwrap_or(DEFAULT_IN_MAX),
        };

        let ingest = IngestConfig {
            queue_capacity: cli
                .queue_capacity
                .or(file_ingest.queue_capacity)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            max_span_bytes: cli
                .max_span_bytes
                .or(file_ingest.max_span_bytes)
                .unwrap_or(DEFAULT_MAX_SPAN_BYTES),
            max_batch_spans: file_ingest.max_batch_spans.unwrap_or(MAX_BATCH_SPANS),
        };

        let cache = CacheConfig {
            ttl_secs: cli
                .cache_ttl_secs
                .or(file_cache.ttl_secs)
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
            max_entries: cli
                .cache_max_entries
                .or(file_cache.max_entries)
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
        };

        let rate_limit = RateLimitConfig {
            enabled: cli
                .rate_limit_enabled
                .or(file_rate_limit.enabled)
                .unwrap_or(true),
            api_rpm: cli
                .rate_limit_api_rpm
                .or(file_rate_limit.api_rpm)
                .unwrap_or(DEFAULT_RATE_LIMIT_API_RPM),
            ingestion_rpm: cli
                .rate_limit_ingestion_rpm
                .or(file_rate_limit.ingestion_rpm)
                .unwrap_or(DEFAULT_RATE_LIMIT_INGESTION_RPM),
        };

        let read = ReadConfig {
            timeout_secs: cli
                .read_timeout_secs
                .or(file_read.timeout_secs)
                .unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
        };

        let debug = cli.debug || file_config.debug.unwrap_or(false);

        let config = Self {
            server: ServerConfig { host, port },
            auth: AuthConfig {
                enabled: auth_enabled,
                bootstrap_token: cli.bootstrap_token.clone(),
            },
            thresholds,
            ingest,
            cache,
            rate_limit,
            read,
            debug,
        };

        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            auth_enabled = config.auth.enabled,
            lat_max_ms = config.thresholds.lat_max_ms,
            err_max = config.thresholds.err_max,
            depth_max = config.thresholds.depth_max,
            fanout_max = config.thresholds.fanout_max,
            in_max = config.thresholds.in_max,
            queue_capacity = config.ingest.queue_capacity,
            max_span_bytes = config.ingest.max_span_bytes,
            cache_ttl_secs = config.cache.ttl_secs,
            rate_limit_enabled = config.rate_limit.enabled,
            read_timeout_secs = config.read.timeout_secs,
            debug = config.debug,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.thresholds.err_max) {
            anyhow::bail!("Configuration error: thresholds.err_max must be within [0, 1]");
        }
        if self.thresholds.lat_max_ms < 0.0 {
            anyhow::bail!("Configuration error: thresholds.lat_max_ms must be non-negative");
        }
        if self.ingest.queue_capacity == 0 {
            anyhow::bail!("Configuration error: ingest.queue_capacity must be greater than 0");
        }
        if self.ingest.max_batch_spans < 100 {
            anyhow::bail!("Configuration error: ingest.max_batch_spans must be at least 100");
        }
        if self.cache.ttl_secs == 0 || self.cache.ttl_secs > 600 {
            anyhow::bail!("Configuration error: cache.ttl_secs must be within 1..=600");
        }
        if self.read.timeout_secs == 0 {
            anyhow::bail!("Configuration error: read.timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

/// Path to the profile-level config file (~/.archlens/archlens.json)
fn get_profile_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from)?;
    Some(
        home.join(super::constants::APP_DOT_FOLDER)
            .join(CONFIG_FILE_NAME),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> CliConfig {
        CliConfig::default()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = AppConfig::load(&base_cli()).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.auth.enabled);
        assert_eq!(config.thresholds, ThresholdsConfig::default());
        assert_eq!(config.ingest.max_batch_spans, MAX_BATCH_SPANS);
        assert!(config.rate_limit.enabled);
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let cli = CliConfig {
            port: Some(9000),
            no_auth: true,
            lat_max_ms: Some(250.0),
            depth_max: Some(3),
            ..base_cli()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(!config.auth.enabled);
        assert_eq!(config.thresholds.lat_max_ms, 250.0);
        assert_eq!(config.thresholds.depth_max, 3);
        // Untouched thresholds keep defaults
        assert_eq!(config.thresholds.err_max, DEFAULT_ERR_MAX);
    }

    #[test]
    fn test_validation_rejects_bad_error_threshold() {
        let cli = CliConfig {
            err_max: Some(1.5),
            ..base_cli()
        };
        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn test_validation_rejects_small_batch_cap() {
        let mut file = FileConfig::default();
        file.merge(FileConfig {
            ingest: Some(IngestFileConfig {
                max_batch_spans: Some(10),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(file.ingest.as_ref().unwrap().max_batch_spans, Some(10));
        // The merged value flows into validation through load(); direct check here
        let config = AppConfig {
            server: ServerConfig {
                host: DEFAULT_HOST.into(),
                port: DEFAULT_PORT,
            },
            auth: AuthConfig {
                enabled: true,
                bootstrap_token: None,
            },
            thresholds: ThresholdsConfig::default(),
            ingest: IngestConfig {
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                max_span_bytes: DEFAULT_MAX_SPAN_BYTES,
                max_batch_spans: 10,
            },
            cache: CacheConfig {
                ttl_secs: DEFAULT_CACHE_TTL_SECS,
                max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                api_rpm: DEFAULT_RATE_LIMIT_API_RPM,
                ingestion_rpm: DEFAULT_RATE_LIMIT_INGESTION_RPM,
            },
            read: ReadConfig {
                timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            },
            debug: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_merge_precedence() {
        let mut base = FileConfig {
            server: Some(ServerFileConfig {
                host: Some("0.0.0.0".into()),
                port: Some(1000),
            }),
            ..Default::default()
        };
        base.merge(FileConfig {
            server: Some(ServerFileConfig {
                host: None,
                port: Some(2000),
            }),
            ..Default::default()
        });
        let server = base.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(server.port, Some(2000));
    }
}
