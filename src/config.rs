//! Agent configuration, loaded once at startup from a JSON file.
//!
//! The config is immutable for the lifetime of the process; it is shared with
//! the workers behind an `Arc`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_tls_verify() -> bool {
    true
}

/// Process-wide agent configuration (see `agent_config.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Control-plane base URL, e.g. `https://master.example.org`.
    pub master_address: String,
    pub master_port: u16,
    /// Agent identifier; doubles as the User-Agent header on API calls.
    pub scan_agent: String,
    pub api_token: String,
    /// User agent injected into the scans themselves.
    pub http_useragent: String,
    /// Root of the `pending/`, `complete/`, `cancelled/` result directories.
    /// The directories are expected to exist; the agent does not create them.
    pub scan_results_dir: PathBuf,
    pub target_files_dir: PathBuf,
    /// Scanner binaries this agent is willing to run.
    pub supported_scan_binaries: Vec<String>,
    /// 1 (quietest) through 5 (loudest).
    pub log_verbosity: u8,
    pub number_of_threads: usize,
    /// Seconds between control-plane polls when no jobs are waiting.
    pub callback_interval_in_seconds: u64,
    /// Verify the control plane's TLS certificate. Deployments with a private
    /// certificate may opt out; verification stays on unless the config says
    /// otherwise.
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
}

impl AgentConfig {
    /// Load and validate the configuration file. Any failure here is fatal at
    /// startup.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config: AgentConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.log_verbosity) {
            anyhow::bail!("log_verbosity must be 1-5, got {}", self.log_verbosity);
        }
        if self.number_of_threads == 0 {
            anyhow::bail!("number_of_threads must be at least 1");
        }
        if self.supported_scan_binaries.is_empty() {
            anyhow::bail!("supported_scan_binaries must not be empty");
        }
        Ok(())
    }

    /// Default tracing level for the configured verbosity; `RUST_LOG` wins
    /// over this when set.
    pub fn default_log_level(&self) -> &'static str {
        match self.log_verbosity {
            1 => "error",
            2 => "warn",
            3 => "info",
            4 => "debug",
            _ => "trace",
        }
    }

    pub fn is_supported(&self, binary: &str) -> bool {
        self.supported_scan_binaries.iter().any(|b| b == binary)
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.scan_results_dir.join("pending")
    }

    pub fn complete_dir(&self) -> PathBuf {
        self.scan_results_dir.join("complete")
    }

    pub fn cancelled_dir(&self) -> PathBuf {
        self.scan_results_dir.join("cancelled")
    }
}

/// Fixture used by tests across modules; points all directories under the
/// given roots.
#[cfg(test)]
pub(crate) fn test_config(scan_results_dir: &Path, target_files_dir: &Path) -> AgentConfig {
    AgentConfig {
        master_address: "https://master.example.org".to_string(),
        master_port: 443,
        scan_agent: "agent-1".to_string(),
        api_token: "0123456789abcdef".to_string(),
        http_useragent: "Mozilla/5.0 (compatible)".to_string(),
        scan_results_dir: scan_results_dir.to_path_buf(),
        target_files_dir: target_files_dir.to_path_buf(),
        supported_scan_binaries: vec!["masscan".to_string(), "nmap".to_string()],
        log_verbosity: 3,
        number_of_threads: 2,
        callback_interval_in_seconds: 60,
        tls_verify: true,
    }
}

// ---------- Unit tests ----------
