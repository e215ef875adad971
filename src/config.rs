use std::env;
use std::num::ParseIntError;
use std::time::Duration;

/// Tunables for a `TrackListener`, loaded from environment variables the
/// way `validate_env` in the teacher service loads `GRPC_PORT`/
/// `METRICS_PORT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Cadence of the PLI timer worker (spec §4.1.3: 3 seconds).
    pub pli_interval: Duration,
    /// Size of the reusable read buffer in the forwarding worker
    /// (spec §4.1.4: one MTU-sized RTP packet, 1400 bytes).
    pub mtu_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            pli_interval: Duration::from_secs(3),
            mtu_bytes: 1400,
        }
    }
}

#[derive(Debug)]
/// Errors that can occur while loading a `ListenerConfig` from the
/// environment.
pub enum ConfigError {
    /// A value exists but is not a valid non-negative integer.
    InvalidValue(&'static str, ParseIntError),
    /// A value parsed fine but was zero, which this application rejects.
    OutOfRange(&'static str, u64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(var, err) => {
                write!(f, "{var} must be a valid integer (got error: {err})")
            }
            ConfigError::OutOfRange(var, got) => {
                write!(f, "{var} must be greater than 0 (got {got})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl ListenerConfig {
    /// Overlays `SFU_PLI_INTERVAL_MS` / `SFU_MTU_BYTES` onto the defaults
    /// if present. Missing variables fall back silently; malformed ones
    /// are reported.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = ListenerConfig::default();

        if let Ok(raw) = env::var("SFU_PLI_INTERVAL_MS") {
            let millis: u64 = raw
                .parse()
                .map_err(|e| ConfigError::InvalidValue("SFU_PLI_INTERVAL_MS", e))?;
            if millis == 0 {
                return Err(ConfigError::OutOfRange("SFU_PLI_INTERVAL_MS", millis));
            }
            cfg.pli_interval = Duration::from_millis(millis);
        }

        if let Ok(raw) = env::var("SFU_MTU_BYTES") {
            let bytes: u64 = raw
                .parse()
                .map_err(|e| ConfigError::InvalidValue("SFU_MTU_BYTES", e))?;
            if bytes == 0 {
                return Err(ConfigError::OutOfRange("SFU_MTU_BYTES", bytes));
            }
            cfg.mtu_bytes = bytes as usize;
        }

        Ok(cfg)
    }
}
