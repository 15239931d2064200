//! Fixed-size worker pool draining the shared job channel.
//!
//! Workers are daemon-like: they are never joined, and the process exits by
//! signal without waiting for them.

use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

use crate::client::MasterClient;
use crate::config::AgentConfig;
use crate::jobs::ScanJob;
use crate::registry::PidRegistry;
use crate::supervisor;

/// Spawn `count` workers, each looping on the shared receiver. The supervisor
/// keeps every failure inside the job it belongs to, so one bad job cannot
/// take a worker down.
pub fn spawn_workers(
    count: usize,
    jobs: Receiver<ScanJob>,
    config: Arc<AgentConfig>,
    client: Arc<MasterClient>,
    registry: Arc<PidRegistry>,
) {
    for n in 0..count {
        let jobs = jobs.clone();
        let config = Arc::clone(&config);
        let client = Arc::clone(&client);
        let registry = Arc::clone(&registry);

        let spawned = thread::Builder::new()
            .name(format!("worker-{n}"))
            .spawn(move || {
                debug!("worker up");
                for job in jobs.iter() {
                    info!(scan_id = job.id, "job picked up");
                    supervisor::handle(&job, &config, &client, &registry);
                }
                debug!("job channel closed, worker exiting");
            });

        if let Err(e) = spawned {
            error!(worker = n, "failed to spawn worker thread: {e}");
        }
    }
}

// ---------- Unit tests ----------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::ScanStatus;
    use std::time::{Duration, Instant};

    fn non_actionable_job(id: u64) -> ScanJob {
        // `completed` is never an inbound trigger, so the supervisor skips it
        // without touching the network or the filesystem.
        ScanJob {
            id,
            scan_status: ScanStatus::Completed,
            site_name: String::new(),
            scan_binary: "masscan".to_string(),
            scan_command: String::new(),
            targets: String::new(),
            excluded_targets: String::new(),
            result_file_base_name: format!("job{id}"),
            scan_binary_process_id: None,
        }
    }

    #[test]
    fn workers_drain_the_queue() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = Arc::new(crate::config::test_config(root.path(), root.path()));
        let client = Arc::new(MasterClient::new(&config).expect("build client"));
        let registry = Arc::new(PidRegistry::new());
        let (tx, rx) = crossbeam_channel::unbounded();

        spawn_workers(2, rx.clone(), config, client, registry);
        for id in 0..8 {
            tx.send(non_actionable_job(id)).expect("enqueue");
        }
        drop(tx);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !rx.is_empty() {
            assert!(Instant::now() < deadline, "queue was not drained in time");
            thread::sleep(Duration::from_millis(20));
        }
    }
}
