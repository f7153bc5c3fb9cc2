use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub sweep_interval_secs: u64,
    /// A client silent for longer than this is unreachable for new requests
    pub client_online_secs: u64,
    /// A client silent for longer than this is evicted by the sweeper
    pub client_offline_secs: u64,
    pub pending_session_ttl_secs: u64,
    pub active_session_ttl_secs: u64,
    pub access_code_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("WAYPOST_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            sweep_interval_secs: env_secs("SWEEP_INTERVAL", defaults.sweep_interval_secs),
            client_online_secs: env_secs("CLIENT_ONLINE_THRESHOLD", defaults.client_online_secs),
            client_offline_secs: env_secs("CLIENT_OFFLINE_THRESHOLD", defaults.client_offline_secs),
            pending_session_ttl_secs: env_secs(
                "PENDING_SESSION_TTL",
                defaults.pending_session_ttl_secs,
            ),
            active_session_ttl_secs: env_secs(
                "ACTIVE_SESSION_TTL",
                defaults.active_session_ttl_secs,
            ),
            access_code_ttl_secs: env_secs("ACCESS_CODE_TTL", defaults.access_code_ttl_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn online_threshold(&self) -> Duration {
        Duration::from_secs(self.client_online_secs)
    }

    pub fn offline_threshold(&self) -> Duration {
        Duration::from_secs(self.client_offline_secs)
    }

    pub fn pending_session_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_session_ttl_secs)
    }

    pub fn active_session_ttl(&self) -> Duration {
        Duration::from_secs(self.active_session_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            sweep_interval_secs: 60,
            client_online_secs: 30,
            client_offline_secs: 120,
            pending_session_ttl_secs: 300,
            active_session_ttl_secs: 3600,
            access_code_ttl_secs: 300,
        }
    }
}

fn env_secs(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
