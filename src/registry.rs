//! Process-wide registry of live scanner children.
//!
//! Correlates OS-level identity (the PID the control plane knows about) with
//! the in-process child handle. Owned by main and passed explicitly to the
//! supervisor and control handlers.

use std::collections::HashMap;
use std::process::Child;
use std::sync::{Arc, Mutex, MutexGuard};

/// A scanner child the agent is currently supervising.
#[derive(Clone)]
pub struct TrackedScan {
    /// argv[0] of the spawned process; checked against the allowlist before
    /// any control action is taken on the PID.
    pub program: String,
    /// Live handle, shared between the supervising worker and the control
    /// handler.
    pub child: Arc<Mutex<Child>>,
}

/// Mapping from OS process ID to live child handle.
///
/// Invariant: a PID is present iff the supervisor believes the child is alive
/// and its program is an allowlisted scanner. Entries are removed on terminal
/// transition, before the OS can reuse the PID.
#[derive(Default)]
pub struct PidRegistry {
    inner: Mutex<HashMap<u32, TrackedScan>>,
}

impl PidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<u32, TrackedScan>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, pid: u32, program: String, child: Arc<Mutex<Child>>) {
        self.locked().insert(pid, TrackedScan { program, child });
    }

    /// Remove and return the tracked child. Idempotent: the supervisor and a
    /// racing control handler may both try; the second caller gets `None`.
    pub fn remove(&self, pid: u32) -> Option<TrackedScan> {
        self.locked().remove(&pid)
    }

    pub fn lookup(&self, pid: u32) -> Option<TrackedScan> {
        self.locked().get(&pid).cloned()
    }

    /// `(pid, program)` pairs, for the poller's diagnostic log line.
    pub fn snapshot(&self) -> Vec<(u32, String)> {
        self.locked()
            .iter()
            .map(|(pid, tracked)| (*pid, tracked.program.clone()))
            .collect()
    }
}

// ---------- Unit tests ----------
