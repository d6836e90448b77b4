//! Runtime configuration loading from environment variables.
//!
//! All configuration values are loaded from `FLOOR_*` environment variables
//! with sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `FLOOR_SERVICE_DURATION_MS` | 10000 | Time a worker spends on one order (ms) |
//! | `FLOOR_RECOVERY_GRACE_MS` | 2000 | Extra age before a recovered order is stuck (ms) |
//! | `FLOOR_SETTLE_DELAY_MS` | 100 | Pause before reassigning after a completion (ms) |
//! | `FLOOR_RECOVERY_DELAY_MS` | 1000 | Delay before the startup recovery pass (ms) |
//! | `FLOOR_SHUTDOWN_TIMEOUT` | 30 | Graceful shutdown timeout (secs) |
//! | `FLOOR_IPC_FRAME_LIMIT` | 1048576 | Max IPC frame size (bytes) |
//! | `FLOOR_MAX_CONNECTIONS` | 64 | Max concurrent IPC connections |
//! | `FLOOR_LOG_FORMAT` | pretty | `json` or `pretty` |
//! | `FLOOR_LOG` | info | Log filter directive |

use std::time::Duration;

use serde::Serialize;

use crate::engine::DispatchConfig;
use crate::ipc::{ConnectionConfig, IpcServerConfig};
use crate::telemetry::{LogConfig, LogFormat};

const DEFAULT_FRAME: usize = 1024 * 1024; // 1 MiB
const MIN_FRAME: usize = 4096; // floor: 4 KiB

/// Effective runtime configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub service_duration_ms: u64,
    pub recovery_grace_ms: u64,
    pub settle_delay_ms: u64,
    pub recovery_delay_ms: u64,
    pub shutdown_timeout_secs: u64,
    pub ipc_frame_limit: usize,
    pub max_connections: usize,
    pub log_format: String,
    pub log_filter: String,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub dispatch: DispatchConfig,
    pub shutdown_timeout: Duration,
    pub ipc_server: IpcServerConfig,
    pub connections: ConnectionConfig,
    pub log: LogConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(parse_u64(key, default))
}

/// Load engine timings from environment.
fn load_dispatch_config() -> DispatchConfig {
    let service = parse_u64("FLOOR_SERVICE_DURATION_MS", 10_000).max(1); // floor: 1ms
    DispatchConfig {
        service_duration: Duration::from_millis(service),
        recovery_grace: parse_millis("FLOOR_RECOVERY_GRACE_MS", 2_000),
        settle_delay: parse_millis("FLOOR_SETTLE_DELAY_MS", 100),
        recovery_delay: parse_millis("FLOOR_RECOVERY_DELAY_MS", 1_000),
    }
}

/// Load IPC server configuration from environment.
fn load_ipc_server_config() -> IpcServerConfig {
    let max_frame_size = parse_usize("FLOOR_IPC_FRAME_LIMIT", DEFAULT_FRAME);
    let max_frame_size = max_frame_size.max(MIN_FRAME);
    IpcServerConfig { max_frame_size }
}

/// Load connection pool configuration from environment.
fn load_connection_config() -> ConnectionConfig {
    let max_connections = parse_usize("FLOOR_MAX_CONNECTIONS", 64);
    let max_connections = max_connections.max(1);
    ConnectionConfig { max_connections }
}

/// Load logging configuration from environment.
fn load_log_config() -> LogConfig {
    let format = match std::env::var("FLOOR_LOG_FORMAT") {
        Ok(val) if val.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    };
    let level = std::env::var("FLOOR_LOG")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".to_string());
    LogConfig {
        format,
        level,
        output_path: None,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let shutdown_secs = parse_u64("FLOOR_SHUTDOWN_TIMEOUT", 30).max(1);

    EnvConfig {
        dispatch: load_dispatch_config(),
        shutdown_timeout: Duration::from_secs(shutdown_secs),
        ipc_server: load_ipc_server_config(),
        connections: load_connection_config(),
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            service_duration_ms: self.dispatch.service_duration.as_millis() as u64,
            recovery_grace_ms: self.dispatch.recovery_grace.as_millis() as u64,
            settle_delay_ms: self.dispatch.settle_delay.as_millis() as u64,
            recovery_delay_ms: self.dispatch.recovery_delay.as_millis() as u64,
            shutdown_timeout_secs: self.shutdown_timeout.as_secs(),
            ipc_frame_limit: self.ipc_server.max_frame_size,
            max_connections: self.connections.max_connections,
            log_format: self.log.format.as_str().to_string(),
            log_filter: self.log.level.clone(),
        }
    }
}

/// Serializes env-mutating tests across modules.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) const ENV_KEYS: &[&str] = &[
    "FLOOR_SERVICE_DURATION_MS",
    "FLOOR_RECOVERY_GRACE_MS",
    "FLOOR_SETTLE_DELAY_MS",
    "FLOOR_RECOVERY_DELAY_MS",
    "FLOOR_SHUTDOWN_TIMEOUT",
    "FLOOR_IPC_FRAME_LIMIT",
    "FLOOR_MAX_CONNECTIONS",
    "FLOOR_LOG_FORMAT",
    "FLOOR_LOG",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.dispatch, DispatchConfig::default());
        assert_eq!(cfg.shutdown_timeout.as_secs(), 30);
        assert_eq!(cfg.ipc_server.max_frame_size, 1024 * 1024);
        assert_eq!(cfg.connections.max_connections, 64);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("FLOOR_SERVICE_DURATION_MS", "2500");
        std::env::set_var("FLOOR_SETTLE_DELAY_MS", "0");
        std::env::set_var("FLOOR_SHUTDOWN_TIMEOUT", "5");
        std::env::set_var("FLOOR_MAX_CONNECTIONS", "128");
        std::env::set_var("FLOOR_LOG_FORMAT", "JSON");
        std::env::set_var("FLOOR_LOG", "floor_core=debug");
        let cfg = load();
        assert_eq!(cfg.dispatch.service_duration, Duration::from_millis(2500));
        assert_eq!(cfg.dispatch.settle_delay, Duration::ZERO);
        assert_eq!(cfg.shutdown_timeout.as_secs(), 5);
        assert_eq!(cfg.connections.max_connections, 128);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.log.level, "floor_core=debug");
        clear_env_vars();
    }

    #[test]
    fn test_ipc_frame_limit_floor() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("FLOOR_IPC_FRAME_LIMIT", "0");
        let cfg = load();
        assert!(cfg.ipc_server.max_frame_size >= 4096, "frame limit must have floor");
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("FLOOR_SERVICE_DURATION_MS", "ten seconds");
        std::env::set_var("FLOOR_MAX_CONNECTIONS", "-3");
        std::env::set_var("FLOOR_LOG_FORMAT", "xml");
        let cfg = load();
        assert_eq!(cfg.dispatch.service_duration, Duration::from_secs(10));
        assert_eq!(cfg.connections.max_connections, 64);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_zero_service_duration_is_floored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("FLOOR_SERVICE_DURATION_MS", "0");
        std::env::set_var("FLOOR_SHUTDOWN_TIMEOUT", "0");
        let cfg = load();
        assert_eq!(cfg.dispatch.service_duration, Duration::from_millis(1));
        assert_eq!(cfg.shutdown_timeout.as_secs(), 1);
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_contains_all_fields() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().effective_config();
        assert_eq!(eff.service_duration_ms, 10_000);
        assert_eq!(eff.recovery_grace_ms, 2_000);
        assert_eq!(eff.settle_delay_ms, 100);
        assert_eq!(eff.recovery_delay_ms, 1_000);
        assert_eq!(eff.log_format, "pretty");

        let json = serde_json::to_value(&eff).unwrap();
        assert_eq!(json["ipc_frame_limit"], 1024 * 1024);
        assert_eq!(json["max_connections"], 64);
    }
}
