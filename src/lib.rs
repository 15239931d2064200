//! scanhive-agent — core library
//!
//! A long-running agent that polls a control plane for scan jobs, supervises
//! the external scanner processes they name, and reports lifecycle
//! transitions back. Result files walk a pending → complete/cancelled
//! directory pipeline; interrupted scans resume from the checkpoints the
//! scanners leave on disk.

pub mod client;
pub mod command;
pub mod config;
pub mod jobs;
pub mod poller;
pub mod registry;
pub mod resume;
pub mod supervisor;
pub mod worker;
