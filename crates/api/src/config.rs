use shotserver_core::crypt::HashAlgorithm;
use shotserver_core::lease::{Timeouts, DEFAULT_FAILURE_TIMEOUT_SECS, DEFAULT_LEASE_TIMEOUT_SECS};

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for in-flight requests to drain on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Lease, cool-down and credential settings.
    pub dispatch: DispatchConfig,
}

/// Settings the poll protocol depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub lease_timeout_secs: i64,
    pub failure_timeout_secs: i64,
    pub credential_hash: HashAlgorithm,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lease_timeout_secs: DEFAULT_LEASE_TIMEOUT_SECS,
            failure_timeout_secs: DEFAULT_FAILURE_TIMEOUT_SECS,
            credential_hash: HashAlgorithm::Md5,
        }
    }
}

impl DispatchConfig {
    /// Load dispatch settings from environment variables with defaults.
    ///
    /// | Env Var                | Default |
    /// |------------------------|---------|
    /// | `LEASE_TIMEOUT_SECS`   | `180`   |
    /// | `FAILURE_TIMEOUT_SECS` | `600`   |
    /// | `CREDENTIAL_HASH`      | `md5`   |
    pub fn from_env() -> Self {
        let lease_timeout_secs: i64 = std::env::var("LEASE_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_LEASE_TIMEOUT_SECS.to_string())
            .parse()
            .expect("LEASE_TIMEOUT_SECS must be a valid i64");

        let failure_timeout_secs: i64 = std::env::var("FAILURE_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_FAILURE_TIMEOUT_SECS.to_string())
            .parse()
            .expect("FAILURE_TIMEOUT_SECS must be a valid i64");

        let credential_hash: HashAlgorithm = std::env::var("CREDENTIAL_HASH")
            .unwrap_or_else(|_| "md5".into())
            .parse()
            .unwrap_or_else(|e| panic!("CREDENTIAL_HASH: {e}"));

        assert!(lease_timeout_secs > 0, "LEASE_TIMEOUT_SECS must be positive");
        assert!(failure_timeout_secs > 0, "FAILURE_TIMEOUT_SECS must be positive");

        Self {
            lease_timeout_secs,
            failure_timeout_secs,
            credential_hash,
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::from_secs(self.lease_timeout_secs, self.failure_timeout_secs)
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    ///
    /// Dispatch settings are documented on [`DispatchConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            dispatch: DispatchConfig::from_env(),
        }
    }
}
