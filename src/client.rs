//! Control-plane HTTP client.
//!
//! Two calls: GET the scheduled-scan list, PATCH a single scan with the fields
//! being changed. Both are best-effort from the caller's perspective; a failed
//! poll yields an empty job list and a failed update is logged and dropped
//! (the control plane re-dispatches on its own schedule).

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, error, info};

use crate::config::AgentConfig;
use crate::jobs::{ScanJob, ScanUpdate};

pub struct MasterClient {
    http: reqwest::blocking::Client,
    base: String,
    token: String,
}

impl MasterClient {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let mut builder =
            reqwest::blocking::Client::builder().user_agent(config.scan_agent.clone());
        if !config.tls_verify {
            // Deployment assumption: the control plane may present a private
            // certificate. Requires the explicit tls_verify=false opt-out.
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().context("build HTTP client")?;
        Ok(MasterClient {
            http,
            base: format!("{}:{}", config.master_address, config.master_port),
            token: config.api_token.clone(),
        })
    }

    fn scans_url(&self) -> String {
        format!("{}/api/scheduled_scans", self.base)
    }

    fn scan_url(&self, scan_id: u64) -> String {
        format!("{}/api/scheduled_scans/{scan_id}", self.base)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Poll for scheduled scans. Transport errors and non-200 responses are
    /// logged and yield an empty list; the poll loop never fails.
    pub fn fetch_jobs(&self) -> Vec<ScanJob> {
        match self.try_fetch_jobs() {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("checking for scan jobs failed: {e:#}");
                Vec::new()
            }
        }
    }

    fn try_fetch_jobs(&self) -> Result<Vec<ScanJob>> {
        let url = self.scans_url();
        debug!(%url, "checking for scan jobs");

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .context("GET scheduled scans")?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("control plane returned HTTP {status}: {body}");
        }

        response.json().context("decode scan job list")
    }

    /// PATCH the given fields onto a scheduled scan. Returns whether the
    /// control plane accepted the update; failures are logged, never
    /// propagated.
    pub fn update_scan(&self, scan_id: u64, update: &ScanUpdate) -> bool {
        let url = self.scan_url(scan_id);

        let response = self
            .http
            .patch(&url)
            .header(AUTHORIZATION, self.auth_header())
            .json(update)
            .send();

        match response {
            Ok(response) if response.status() == StatusCode::OK => {
                info!(scan_id, update = ?update, "scan update accepted");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().unwrap_or_default();
                error!(scan_id, %status, body = %body, "scan update rejected");
                false
            }
            Err(e) => {
                error!(scan_id, "scan update failed: {e:#}");
                false
            }
        }
    }
}

// ---------- Unit tests ----------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn client() -> MasterClient {
        let config = crate::config::test_config(Path::new("/tmp/results"), Path::new("/tmp/targets"));
        MasterClient::new(&config).expect("build client")
    }

    #[test]
    fn list_url_joins_address_and_port() {
        assert_eq!(
            client().scans_url(),
            "https://master.example.org:443/api/scheduled_scans"
        );
    }

    #[test]
    fn update_url_carries_the_scan_id() {
        assert_eq!(
            client().scan_url(7),
            "https://master.example.org:443/api/scheduled_scans/7"
        );
    }

    #[test]
    fn auth_header_uses_token_scheme() {
        assert_eq!(client().auth_header(), "Token 0123456789abcdef");
    }
}
