//! Wire types shared with the control plane.
//!
//! A `ScanJob` is an immutable snapshot of one scheduled-scan row; the same
//! channel carries both scan requests and control directives (pause/cancel),
//! distinguished by `scan_status`. `ScanUpdate` is the compact PATCH body: only
//! fields that are set get serialized.

use serde::{Deserialize, Serialize};

/// Every status a scheduled scan can carry. Only `pending`, `pause`, and
/// `cancel` are valid inbound triggers; the rest are states this agent
/// reports back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Pause,
    Cancel,
    Started,
    Paused,
    Cancelled,
    Completed,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Pause => "pause",
            ScanStatus::Cancel => "cancel",
            ScanStatus::Started => "started",
            ScanStatus::Paused => "paused",
            ScanStatus::Cancelled => "cancelled",
            ScanStatus::Completed => "completed",
            ScanStatus::Error => "error",
        }
    }
}

/// One scheduled scan as received from the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanJob {
    pub id: u64,
    pub scan_status: ScanStatus,
    /// Human label for the site being scanned.
    #[serde(default)]
    pub site_name: String,
    /// Which scanner to invoke (must be allowlisted in the agent config).
    pub scan_binary: String,
    /// Free-form scanner flags, trusted as-is.
    #[serde(default)]
    pub scan_command: String,
    /// Whitespace-separated target strings.
    #[serde(default)]
    pub targets: String,
    #[serde(default)]
    pub excluded_targets: String,
    /// Filesystem-safe stem used for every artifact of this job.
    pub result_file_base_name: String,
    /// Present on pause/cancel directives; names the child to signal.
    #[serde(default)]
    pub scan_binary_process_id: Option<u32>,
}

/// What an inbound job asks the agent to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    StartScan,
    PauseScan { pid: u32 },
    CancelScan { pid: u32 },
}

impl ScanJob {
    /// Classify this job at the dispatch boundary. Returns `None` for statuses
    /// that are not valid inbound triggers, and for directives that arrived
    /// without a target PID (nothing to signal, nothing to report).
    pub fn dispatch(&self) -> Option<Dispatch> {
        match self.scan_status {
            ScanStatus::Pending => Some(Dispatch::StartScan),
            ScanStatus::Pause => self
                .scan_binary_process_id
                .map(|pid| Dispatch::PauseScan { pid }),
            ScanStatus::Cancel => self
                .scan_binary_process_id
                .map(|pid| Dispatch::CancelScan { pid }),
            _ => None,
        }
    }
}

/// PATCH body for a scheduled-scan update. Unset fields are omitted so the
/// control plane only sees the fields actually being changed.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScanUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_status: Option<ScanStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_binary_process_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_file_base_name: Option<String>,
}

impl ScanUpdate {
    /// Update carrying only a status change.
    pub fn status(scan_status: ScanStatus) -> Self {
        ScanUpdate {
            scan_status: Some(scan_status),
            ..Default::default()
        }
    }

    /// The `started` announcement, carrying the child PID for later
    /// out-of-band control.
    pub fn started(pid: u32) -> Self {
        ScanUpdate {
            scan_status: Some(ScanStatus::Started),
            scan_binary_process_id: Some(pid),
            ..Default::default()
        }
    }

    /// The terminal `completed` update.
    pub fn completed(completed_time: String, result_file_base_name: String) -> Self {
        ScanUpdate {
            scan_status: Some(ScanStatus::Completed),
            completed_time: Some(completed_time),
            result_file_base_name: Some(result_file_base_name),
            ..Default::default()
        }
    }
}

// ---------- Unit tests ----------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_scheduled_scan() {
        let raw = r#"{
            "id": 7,
            "scan_status": "pending",
            "site_name": "corp-dmz",
            "scan_binary": "masscan",
            "scan_command": "-p80 --rate 1000",
            "targets": "10.0.0.0/24",
            "excluded_targets": "",
            "result_file_base_name": "job7"
        }"#;
        let job: ScanJob = serde_json::from_str(raw).expect("parse job");
        assert_eq!(job.id, 7);
        assert_eq!(job.scan_status, ScanStatus::Pending);
        assert_eq!(job.scan_binary, "masscan");
        assert_eq!(job.result_file_base_name, "job7");
        assert_eq!(job.scan_binary_process_id, None);
    }

    #[test]
    fn deserializes_a_cancel_directive() {
        let raw = r#"{
            "id": 8,
            "scan_status": "cancel",
            "scan_binary": "masscan",
            "result_file_base_name": "job8",
            "scan_binary_process_id": 4242
        }"#;
        let job: ScanJob = serde_json::from_str(raw).expect("parse directive");
        assert_eq!(job.dispatch(), Some(Dispatch::CancelScan { pid: 4242 }));
    }

    #[test]
    fn pending_dispatches_as_start() {
        let raw = r#"{
            "id": 1,
            "scan_status": "pending",
            "scan_binary": "nmap",
            "result_file_base_name": "job1"
        }"#;
        let job: ScanJob = serde_json::from_str(raw).expect("parse job");
        assert_eq!(job.dispatch(), Some(Dispatch::StartScan));
    }

    #[test]
    fn directive_without_pid_is_dropped() {
        let raw = r#"{
            "id": 2,
            "scan_status": "pause",
            "scan_binary": "nmap",
            "result_file_base_name": "job2"
        }"#;
        let job: ScanJob = serde_json::from_str(raw).expect("parse job");
        assert_eq!(job.dispatch(), None);
    }

    #[test]
    fn reported_states_are_not_inbound_triggers() {
        for status in ["started", "paused", "cancelled", "completed", "error"] {
            let raw = format!(
                r#"{{
                    "id": 3,
                    "scan_status": "{status}",
                    "scan_binary": "nmap",
                    "result_file_base_name": "job3",
                    "scan_binary_process_id": 99
                }}"#
            );
            let job: ScanJob = serde_json::from_str(&raw).expect("parse job");
            assert_eq!(job.dispatch(), None, "status {status} must not dispatch");
        }
    }

    #[test]
    fn update_serializes_only_set_fields() {
        let update = ScanUpdate::status(ScanStatus::Cancelled);
        let body = serde_json::to_string(&update).expect("serialize update");
        assert_eq!(body, r#"{"scan_status":"cancelled"}"#);
    }

    #[test]
    fn started_update_carries_the_pid() {
        let update = ScanUpdate::started(4242);
        let body = serde_json::to_value(&update).expect("serialize update");
        assert_eq!(body["scan_status"], "started");
        assert_eq!(body["scan_binary_process_id"], 4242);
        assert!(body.get("completed_time").is_none());
    }

    #[test]
    fn completed_update_carries_time_and_stem() {
        let update = ScanUpdate::completed("2026-03-01 12:30:00".to_string(), "job7".to_string());
        let body = serde_json::to_value(&update).expect("serialize update");
        assert_eq!(body["scan_status"], "completed");
        assert_eq!(body["completed_time"], "2026-03-01 12:30:00");
        assert_eq!(body["result_file_base_name"], "job7");
    }
}
