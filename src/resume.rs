//! Resume-or-fresh decisions from on-disk checkpoint state.
//!
//! Both scanners checkpoint themselves when interrupted; the agent only reads
//! what they left behind. Decisions are idempotent against unchanged disk
//! state, and no locking is needed because concurrent jobs never share a stem.

use std::path::Path;
use tracing::info;

use crate::command::{PORT_SCANNER, SERVICE_SCANNER};

/// Checkpoint file the port scanner writes into the agent's working directory
/// when interrupted. There is a single process-wide slot: a new scan that does
/// not match it simply overwrites it on the next interrupt.
pub const PAUSED_CONF: &str = "paused.conf";

/// Resume a previously interrupted port scan if the checkpoint names exactly
/// the output file this job would produce. Any other content (different scan,
/// missing file, garbled checkpoint) means a fresh start.
pub fn masscan_resume_argv(paused_conf: &Path, json_file: &Path) -> Option<Vec<String>> {
    if !paused_conf.is_file() {
        return None;
    }
    let contents = std::fs::read_to_string(paused_conf).ok()?;
    let checkpoint_output = paused_output_filename(&contents)?;

    if checkpoint_output == json_file.display().to_string() {
        info!(
            checkpoint = %paused_conf.display(),
            output = %checkpoint_output,
            "checkpoint matches this scan's output file, resuming"
        );
        Some(vec![
            PORT_SCANNER.to_string(),
            "--resume".to_string(),
            paused_conf.display().to_string(),
        ])
    } else {
        info!(
            checkpoint_output = %checkpoint_output,
            requested_output = %json_file.display(),
            "checkpoint belongs to a different scan, starting fresh"
        );
        None
    }
}

/// Extract the `output-filename = <path>` value from checkpoint contents.
/// When the line appears more than once, the last occurrence wins.
fn paused_output_filename(contents: &str) -> Option<String> {
    let mut output_filename = None;
    for line in contents.lines() {
        if line.starts_with("output-filename")
            && let Some((_, value)) = line.split_once(" = ")
        {
            output_filename = Some(value.trim().to_string());
        }
    }
    output_filename
}

/// Resume a previously interrupted service scan if its `.gnmap` checkpoint
/// exists and is non-empty.
pub fn nmap_resume_argv(gnmap_file: &Path) -> Option<Vec<String>> {
    let metadata = std::fs::metadata(gnmap_file).ok()?;
    if !metadata.is_file() || metadata.len() == 0 {
        return None;
    }
    info!(checkpoint = %gnmap_file.display(), "previous scan checkpoint found, resuming");
    Some(vec![
        SERVICE_SCANNER.to_string(),
        "--resume".to_string(),
        gnmap_file.display().to_string(),
    ])
}

// ---------- Unit tests ----------
