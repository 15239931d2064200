//! Top-level poll/dispatch loop.
//!
//! Polls the control plane, feeds the worker channel, and spaces consecutive
//! dispatches so each scan can report `started` before the next job goes out.
//! An interrupt stops only this loop; in-flight scans keep running until
//! their children exit.

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

use crate::client::MasterClient;
use crate::config::AgentConfig;
use crate::jobs::ScanJob;
use crate::registry::PidRegistry;

/// Spacing between enqueues within one poll. A rate limit on unannounced
/// work, not a correctness mechanism: it gives each scan time to PATCH
/// `started` before the next dispatch could observe stale state.
const DISPATCH_SPACING: Duration = Duration::from_secs(5);

/// Granularity at which sleeps notice an interrupt.
const INTERRUPT_POLL: Duration = Duration::from_millis(250);

pub struct Poller {
    config: Arc<AgentConfig>,
    client: Arc<MasterClient>,
    registry: Arc<PidRegistry>,
    jobs: Sender<ScanJob>,
    shutdown: Arc<AtomicBool>,
}

impl Poller {
    /// Build the poller and hook SIGINT/SIGTERM to its shutdown flag.
    pub fn new(
        config: Arc<AgentConfig>,
        client: Arc<MasterClient>,
        registry: Arc<PidRegistry>,
        jobs: Sender<ScanJob>,
    ) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))
            .context("register SIGINT handler")?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))
            .context("register SIGTERM handler")?;
        Ok(Poller {
            config,
            client,
            registry,
            jobs,
            shutdown,
        })
    }

    /// Run until interrupted. Children are left running on shutdown; the
    /// control plane re-dispatches anything it never heard back about.
    pub fn run(&self) -> Result<()> {
        info!(agent = %self.config.scan_agent, "starting scan agent");

        while !self.shutdown.load(Ordering::Relaxed) {
            info!(tracked = ?self.registry.snapshot(), "currently tracked scan processes");

            let jobs = self.client.fetch_jobs();
            if jobs.is_empty() {
                info!(
                    seconds = self.config.callback_interval_in_seconds,
                    "no scan jobs found, checking back later"
                );
                interruptible_sleep(
                    Duration::from_secs(self.config.callback_interval_in_seconds),
                    &self.shutdown,
                );
                continue;
            }

            for job in jobs {
                info!(
                    scan_id = job.id,
                    status = job.scan_status.as_str(),
                    site = %job.site_name,
                    "scan job received"
                );
                self.jobs.send(job).context("job queue closed")?;
                interruptible_sleep(DISPATCH_SPACING, &self.shutdown);
                if self.shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
        }

        info!("stopping scan agent");
        Ok(())
    }
}

/// Sleep for `duration`, returning early once `flag` is raised.
fn interruptible_sleep(duration: Duration, flag: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !flag.load(Ordering::Relaxed) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        std::thread::sleep(remaining.min(INTERRUPT_POLL));
    }
}

// ---------- Unit tests ----------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_runs_to_completion_when_uninterrupted() {
        let flag = AtomicBool::new(false);
        let start = Instant::now();
        interruptible_sleep(Duration::from_millis(300), &flag);
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn sleep_returns_immediately_when_already_interrupted() {
        let flag = AtomicBool::new(true);
        let start = Instant::now();
        interruptible_sleep(Duration::from_secs(30), &flag);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sleep_notices_a_late_interrupt() {
        let flag = Arc::new(AtomicBool::new(false));
        let raiser = {
            let flag = Arc::clone(&flag);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                flag.store(true, Ordering::Relaxed);
            })
        };

        let start = Instant::now();
        interruptible_sleep(Duration::from_secs(30), &flag);
        assert!(start.elapsed() < Duration::from_secs(5));

        raiser.join().expect("join raiser");
    }
}
