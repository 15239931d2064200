//! Per-job lifecycle: prepare inputs, spawn the scanner, announce, wait, and
//! walk the result files through the pending/complete/cancelled pipeline.
//!
//! Control directives (pause/cancel) ride the same job channel; they route to
//! the control handler instead of starting a scan. When a directive races a
//! running scan, the directive wins: its kill forces the supervising worker
//! down the non-success exit path, which posts no status of its own.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::client::MasterClient;
use crate::command::{self, PORT_SCANNER, SERVICE_SCANNER};
use crate::config::AgentConfig;
use crate::jobs::{Dispatch, ScanJob, ScanStatus, ScanUpdate};
use crate::registry::PidRegistry;
use crate::resume::{self, PAUSED_CONF};

/// How often a waiting worker re-checks its child for exit. The handle is
/// shared with control handlers, so the worker must not hold it across a
/// blocking wait.
const WAIT_POLL: Duration = Duration::from_millis(500);

/// Entry point for one dequeued job. Every failure stays inside this job: a
/// scan error is reported to the control plane and the worker moves on.
pub fn handle(job: &ScanJob, config: &AgentConfig, client: &MasterClient, registry: &PidRegistry) {
    match job.dispatch() {
        Some(Dispatch::StartScan) => {
            if let Err(e) = run_scan(job, config, client, registry) {
                error!(scan_id = job.id, "scan failed: {e:#}");
                client.update_scan(job.id, &ScanUpdate::status(ScanStatus::Error));
            }
        }
        Some(Dispatch::PauseScan { pid }) => {
            control_scan(job, pid, ScanStatus::Paused, config, client, registry);
        }
        Some(Dispatch::CancelScan { pid }) => {
            control_scan(job, pid, ScanStatus::Cancelled, config, client, registry);
        }
        None => {
            warn!(
                scan_id = job.id,
                status = job.scan_status.as_str(),
                "job carries no actionable dispatch, skipping"
            );
        }
    }
}

/// Run a scan to a terminal state: write target files, build (or resume) the
/// command, spawn, announce `started`, wait, and on success move the results
/// to `complete/`.
fn run_scan(
    job: &ScanJob,
    config: &AgentConfig,
    client: &MasterClient,
    registry: &PidRegistry,
) -> Result<()> {
    let stem = &job.result_file_base_name;

    // Both scanners read targets from a file; long target lists are awkward
    // on a command line.
    let targets_file = config.target_files_dir.join(format!("{stem}.targets"));
    std::fs::write(&targets_file, &job.targets)
        .with_context(|| format!("write targets file {}", targets_file.display()))?;

    let excluded_targets_file = if job.excluded_targets.is_empty() {
        None
    } else {
        let path = config
            .target_files_dir
            .join(format!("{stem}.excluded_targets"));
        std::fs::write(&path, &job.excluded_targets)
            .with_context(|| format!("write excluded targets file {}", path.display()))?;
        Some(path)
    };

    let Some(argv) = build_scan_argv(job, config, &targets_file, excluded_targets_file.as_deref())
    else {
        error!(
            scan_id = job.id,
            scan_binary = %job.scan_binary,
            "scan binary is not supported by this agent"
        );
        client.update_scan(job.id, &ScanUpdate::status(ScanStatus::Error));
        return Ok(());
    };

    // No shell. Scanner stdout/stderr are inherited, not captured.
    let child = Command::new(&argv[0])
        .args(&argv[1..])
        .spawn()
        .with_context(|| format!("spawn scanner: {}", argv.join(" ")))?;
    let pid = child.id();
    let child = Arc::new(Mutex::new(child));
    registry.insert(pid, argv[0].clone(), Arc::clone(&child));

    info!(
        scan_id = job.id,
        site = %job.site_name,
        pid,
        command = %argv.join(" "),
        "scan started"
    );
    client.update_scan(job.id, &ScanUpdate::started(pid));

    let status = wait_for_exit(&child);
    // The child is gone either way; drop the PID before anything else so the
    // registry never names a dead process.
    registry.remove(pid);
    let status = status?;

    if status.success() {
        move_matching_files(&format!("{stem}*"), &config.pending_dir(), &config.complete_dir())?;
        client.update_scan(
            job.id,
            &ScanUpdate::completed(now_timestamp(), stem.clone()),
        );
        info!(scan_id = job.id, pid, "scan completed");
    } else {
        // Reached on a plain scanner failure, and on a kill delivered by a
        // control directive. The directive posts its own status; a plain
        // failure posts nothing and leaves the files in pending/ for the
        // control plane to re-dispatch.
        info!(
            scan_id = job.id,
            pid,
            %status,
            "scanner exited without success, leaving results in pending"
        );
    }
    Ok(())
}

/// Build the argv for this job, consulting the scanner checkpoints first.
/// `None` means the requested binary is not allowlisted or has no builder.
fn build_scan_argv(
    job: &ScanJob,
    config: &AgentConfig,
    targets_file: &Path,
    excluded_targets_file: Option<&Path>,
) -> Option<Vec<String>> {
    if !config.is_supported(&job.scan_binary) {
        return None;
    }
    let stem = &job.result_file_base_name;
    let pending_dir = config.pending_dir();

    match job.scan_binary.as_str() {
        PORT_SCANNER => {
            let json_file = pending_dir.join(format!("{stem}.json"));
            Some(
                resume::masscan_resume_argv(Path::new(PAUSED_CONF), &json_file).unwrap_or_else(
                    || {
                        command::masscan_argv(
                            &job.scan_command,
                            targets_file,
                            excluded_targets_file,
                            &json_file,
                            &config.http_useragent,
                        )
                    },
                ),
            )
        }
        SERVICE_SCANNER => {
            let gnmap_file = pending_dir.join(format!("{stem}.gnmap"));
            Some(resume::nmap_resume_argv(&gnmap_file).unwrap_or_else(|| {
                command::nmap_argv(
                    &job.scan_command,
                    targets_file,
                    excluded_targets_file,
                    &pending_dir.join(stem),
                    &config.http_useragent,
                )
            }))
        }
        _ => None,
    }
}

/// Block the worker until the shared child exits. The handle is locked only
/// briefly per poll so a control handler can get in to deliver a kill.
fn wait_for_exit(child: &Arc<Mutex<Child>>) -> Result<ExitStatus> {
    loop {
        {
            let mut child = child
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(status) = child.try_wait().context("wait on scanner process")? {
                return Ok(status);
            }
        }
        std::thread::sleep(WAIT_POLL);
    }
}

/// Handle a pause/cancel directive targeting a tracked PID.
fn control_scan(
    job: &ScanJob,
    pid: u32,
    terminal: ScanStatus,
    config: &AgentConfig,
    client: &MasterClient,
    registry: &PidRegistry,
) {
    info!(
        scan_id = job.id,
        pid,
        action = job.scan_status.as_str(),
        "control directive received"
    );

    let Some(tracked) = registry.lookup(pid) else {
        // The scan may have completed between dispatch and delivery; posting
        // a status here would invent a transition the control plane never
        // asked for.
        warn!(scan_id = job.id, pid, "directive targets an untracked PID, ignoring");
        return;
    };

    if !config.is_supported(&tracked.program) {
        warn!(
            scan_id = job.id,
            pid,
            program = %tracked.program,
            "refusing to signal a process that is not an allowlisted scanner"
        );
        return;
    }

    // Kill while holding the handle: an un-reaped PID cannot be reused, so
    // the signal cannot land on a recycled process. The port scanner
    // checkpoints itself to paused.conf on the way down; the agent never
    // writes that file.
    {
        let mut child = tracked
            .child
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let already_exited = matches!(child.try_wait(), Ok(Some(_)));
        if !already_exited
            && let Err(e) = deliver_kill(pid)
        {
            error!(scan_id = job.id, pid, "failed to signal scanner: {e:#}");
            return;
        }
        match child.wait() {
            Ok(status) => info!(scan_id = job.id, pid, %status, "scanner stopped"),
            Err(e) => error!(scan_id = job.id, pid, "failed to reap scanner: {e}"),
        }
    }
    registry.remove(pid);

    if terminal == ScanStatus::Cancelled {
        let pattern = format!("{}*", job.result_file_base_name);
        if let Err(e) = move_matching_files(&pattern, &config.pending_dir(), &config.cancelled_dir())
        {
            error!(scan_id = job.id, "failed to archive cancelled results: {e:#}");
        }
    }

    client.update_scan(job.id, &ScanUpdate::status(terminal));
}

#[cfg(unix)]
fn deliver_kill(pid: u32) -> Result<()> {
    // SAFETY: kill(2) is safe to call with any pid and a valid signal number.
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the process is already gone, which is what we wanted.
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err.into());
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn deliver_kill(_pid: u32) -> Result<()> {
    anyhow::bail!("scan control is only supported on unix hosts");
}

/// Move every file in `source` whose name matches `pattern` into
/// `destination`. Per-file moves; name collisions overwrite.
pub fn move_matching_files(pattern: &str, source: &Path, destination: &Path) -> Result<()> {
    let entries =
        std::fs::read_dir(source).with_context(|| format!("list {}", source.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("list {}", source.display()))?;
        let file_name = entry.file_name();
        if wildcard_match(pattern, &file_name.to_string_lossy()) {
            let target = destination.join(&file_name);
            std::fs::rename(entry.path(), &target).with_context(|| {
                format!("move {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

/// Match a file name against a pattern honoring `*` and `?` only. Narrower
/// than full glob grammar on purpose: bracket characters are literal.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ni < name.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == name[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            backtrack = Some((pi, ni));
            pi += 1;
        } else if let Some((star_pi, star_ni)) = backtrack {
            pi = star_pi + 1;
            ni = star_ni + 1;
            backtrack = Some((star_pi, star_ni + 1));
        } else {
            return false;
        }
    }
    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

/// Control-plane timestamps are local-zone `YYYY-MM-DD HH:MM:SS` strings.
pub fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

// ---------- Unit tests ----------
