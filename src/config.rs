use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub encryption_key: String,
    pub admin_token: String,
    pub host: IpAddr,
    pub port: u16,
    /// How often the queue processor wakes up and claims work.
    pub poll_interval: Duration,
    /// Items claimed per integration per tick, and provider listing page size.
    pub batch_size: i64,
    /// Minimum spacing between provider call starts, per integration.
    pub call_spacing: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Periodic full-sync interval. None disables the scheduler; the
    /// operator trigger endpoint still works.
    pub full_sync_interval: Option<Duration>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let encryption_key = env_required("IPTVSYNC_ENCRYPTION_KEY")?;
        let admin_token = env_required("IPTVSYNC_ADMIN_TOKEN")?;

        let host: IpAddr = env_or("IPTVSYNC_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid IPTVSYNC_HOST: {e}"))?;

        let port: u16 = env_or("IPTVSYNC_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid IPTVSYNC_PORT: {e}"))?;

        let poll_interval = Duration::from_secs(parse_u64("IPTVSYNC_POLL_INTERVAL_SECS", "30")?);

        let batch_size: i64 = env_or("IPTVSYNC_BATCH_SIZE", "10")
            .parse()
            .map_err(|e| format!("Invalid IPTVSYNC_BATCH_SIZE: {e}"))?;

        let call_spacing = Duration::from_millis(parse_u64("IPTVSYNC_CALL_SPACING_MS", "300")?);
        let backoff_base = Duration::from_secs(parse_u64("IPTVSYNC_BACKOFF_BASE_SECS", "60")?);
        let backoff_max = Duration::from_secs(parse_u64("IPTVSYNC_BACKOFF_MAX_SECS", "3600")?);

        let full_sync_interval = match std::env::var("IPTVSYNC_FULL_SYNC_INTERVAL_SECS").ok() {
            Some(raw) => Some(Duration::from_secs(raw.parse().map_err(|e| {
                format!("Invalid IPTVSYNC_FULL_SYNC_INTERVAL_SECS: {e}")
            })?)),
            None => None,
        };

        let log_level = env_or("IPTVSYNC_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            encryption_key,
            admin_token,
            host,
            port,
            poll_interval,
            batch_size,
            call_spacing,
            backoff_base,
            backoff_max,
            full_sync_interval,
            log_level,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_u64(key: &str, default: &str) -> Result<u64, String> {
    env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))
}
