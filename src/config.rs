use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use remip_client::RemipClient;

use crate::error::EngineError;
use crate::runtime::PackageConfig;

const DEFAULT_SOLVER_URL: &str = "http://localhost:9000";
const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Base URL of the ReMIP solver
    pub solver_url: String,
    /// Use the event-stream response mode
    pub solver_stream: bool,
    /// Optional `X-API-Key` for the solver
    pub solver_api_key: Option<String>,
    /// Connect timeout of the HTTP client
    pub connect_timeout: Duration,
    /// Extra script packages required in every new runtime
    pub extra_packages: Vec<String>,
    /// Directory the extra packages are resolved from
    pub package_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            solver_url: DEFAULT_SOLVER_URL.to_string(),
            solver_stream: true,
            solver_api_key: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
            extra_packages: Vec::new(),
            package_path: None,
        }
    }
}

impl EngineConfig {
    /// Load from the process environment, reading a `.env` file first if present.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();

        let solver_url = env::var("REMIP_URL").unwrap_or(defaults.solver_url);

        let solver_stream = env::var("REMIP_STREAM")
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.solver_stream);

        let solver_api_key = env::var("REMIP_API_KEY").ok().filter(|k| !k.is_empty());

        let connect_timeout = env::var("REMIP_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        let extra_packages = env::var("SCRIPT_PACKAGES")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        let package_path = env::var("SCRIPT_PACKAGE_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Self {
            solver_url,
            solver_stream,
            solver_api_key,
            connect_timeout,
            extra_packages,
            package_path,
        }
    }

    /// Build the solver client this configuration describes
    pub fn solver_client(&self) -> Result<RemipClient, EngineError> {
        let http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to build HTTP client: {e}")))?;

        let mut client =
            RemipClient::with_client(&self.solver_url, http)?.with_streaming(self.solver_stream);
        if let Some(ref key) = self.solver_api_key {
            client = client.with_api_key(key);
        }
        Ok(client)
    }

    /// Packages every new script runtime loads
    pub fn package_config(&self) -> PackageConfig {
        PackageConfig {
            extra: self.extra_packages.clone(),
            path: self.package_path.clone(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
