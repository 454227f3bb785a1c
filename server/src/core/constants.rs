// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "Archlens";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "archlens";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".archlens";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "archlens.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "ARCHLENS_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "ARCHLENS_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "ARCHLENS_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "ARCHLENS_LOG";

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "ARCHLENS_DEBUG";

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "ARCHLENS_DATA_DIR";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5680;

// =============================================================================
// Authentication
// =============================================================================

/// Environment variable to disable authentication
pub const ENV_NO_AUTH: &str = "ARCHLENS_NO_AUTH";

/// Environment variable for a bootstrap API key bound to the default tenant
pub const ENV_BOOTSTRAP_TOKEN: &str = "ARCHLENS_BOOTSTRAP_TOKEN";

/// Tenant ID every request binds to when auth is disabled
pub const DEFAULT_TENANT_ID: &str = "default";

/// API key prefix (identifies archlens tenant keys)
pub const API_KEY_PREFIX: &str = "alk_";

/// Length of random characters in a generated API key (after prefix)
pub const API_KEY_RANDOM_LENGTH: usize = 40;

/// Cache TTL for valid API key lookups (seconds)
pub const CACHE_TTL_API_KEY_VALID: u64 = 300;

/// Cache TTL for invalid/not-found API key lookups (seconds)
pub const CACHE_TTL_API_KEY_INVALID: u64 = 30;

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "archlens.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite mmap window in bytes (256MB, covers the span indexes)
pub const SQLITE_MMAP_SIZE: &str = "268435456";

/// SQLite WAL auto-checkpoint threshold (pages)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// Span store maintenance interval in seconds (checkpoint + optimize)
pub const SQLITE_MAINTENANCE_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Detection Thresholds
// =============================================================================

/// Environment variable for the high-latency edge threshold (milliseconds)
pub const ENV_LAT_MAX_MS: &str = "ARCHLENS_LAT_MAX_MS";

/// Environment variable for the node error-rate threshold
pub const ENV_ERR_MAX: &str = "ARCHLENS_ERR_MAX";

/// Environment variable for the synchronous chain depth threshold
pub const ENV_DEPTH_MAX: &str = "ARCHLENS_DEPTH_MAX";

/// Environment variable for the fan-out threshold
pub const ENV_FANOUT_MAX: &str = "ARCHLENS_FANOUT_MAX";

/// Environment variable for the in-degree threshold
pub const ENV_IN_MAX: &str = "ARCHLENS_IN_MAX";

/// Default high-latency edge threshold (milliseconds, strict greater-than)
pub const DEFAULT_LAT_MAX_MS: f64 = 1000.0;

/// Default node error-rate threshold
pub const DEFAULT_ERR_MAX: f64 = 0.05;

/// Default synchronous chain depth threshold
pub const DEFAULT_DEPTH_MAX: u32 = 5;

/// Default fan-out (out-degree) threshold
pub const DEFAULT_FANOUT_MAX: u32 = 10;

/// Default in-degree threshold for single-point-of-failure detection
pub const DEFAULT_IN_MAX: u32 = 5;

// =============================================================================
// Ingestion
// =============================================================================

/// Environment variable for per-tenant ingestion queue capacity
pub const ENV_QUEUE_CAPACITY: &str = "ARCHLENS_QUEUE_CAPACITY";

/// Environment variable for the per-span byte cap
pub const ENV_MAX_SPAN_BYTES: &str = "ARCHLENS_MAX_SPAN_BYTES";

/// Default per-tenant ingestion queue capacity (spans)
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Default per-span serialized byte cap (64 KiB)
pub const DEFAULT_MAX_SPAN_BYTES: usize = 64 * 1024;

/// Maximum spans per batch ingest request
pub const MAX_BATCH_SPANS: usize = 1000;

/// Retry-After header value for queue backpressure (seconds)
pub const BACKPRESSURE_RETRY_AFTER_SECS: u64 = 1;

/// Body limit for ingest endpoints (16 MB batches)
pub const INGEST_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Default body limit for general API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Cache
// =============================================================================

/// Environment variable for analysis cache TTL (seconds)
pub const ENV_CACHE_TTL_SECS: &str = "ARCHLENS_CACHE_TTL_SECS";

/// Environment variable for cache max entries
pub const ENV_CACHE_MAX_ENTRIES: &str = "ARCHLENS_CACHE_MAX_ENTRIES";

/// Default analysis cache TTL (seconds, bounded per the read-surface contract)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default cache max entries
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100_000;

/// Cache key version (bump on schema changes to invalidate all cached data)
pub const CACHE_KEY_VERSION: &str = "v1";

// =============================================================================
// Rate Limiting
// =============================================================================

/// Environment variable for rate limit enabled
pub const ENV_RATE_LIMIT_ENABLED: &str = "ARCHLENS_RATE_LIMIT_ENABLED";

/// Environment variable for API rate limit (requests per minute)
pub const ENV_RATE_LIMIT_API_RPM: &str = "ARCHLENS_RATE_LIMIT_API_RPM";

/// Environment variable for ingestion rate limit (requests per minute)
pub const ENV_RATE_LIMIT_INGESTION_RPM: &str = "ARCHLENS_RATE_LIMIT_INGESTION_RPM";

/// Default API rate limit (requests per minute, per tenant)
pub const DEFAULT_RATE_LIMIT_API_RPM: u32 = 1000;

/// Default ingestion rate limit (requests per minute, per tenant)
pub const DEFAULT_RATE_LIMIT_INGESTION_RPM: u32 = 10_000;

/// Rate limit window in seconds (fixed 1-minute window)
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

// =============================================================================
// Read Path
// =============================================================================

/// Environment variable for the server-side read deadline (seconds)
pub const ENV_READ_TIMEOUT_SECS: &str = "ARCHLENS_READ_TIMEOUT_SECS";

/// Default server-side read deadline (seconds)
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Header carrying a caller-provided deadline in milliseconds
pub const DEADLINE_HEADER: &str = "x-deadline-ms";

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 60;
