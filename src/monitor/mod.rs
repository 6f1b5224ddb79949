//! Event draining and the monitoring state machine.
//!
//! `coordinator` holds the state machine and knows nothing about threads;
//! `runtime` owns the queue, decides who drains, and exposes the public
//! command surface.

/// The monitoring state machine.
pub mod coordinator;
/// Submission, draining and the public facade.
pub mod runtime;

pub use coordinator::{CoordinatorParts, DrainOutcome, MonitorSnapshot, MonitorState, MonitoringCoordinator};
pub use runtime::{EventSink, PlacesMonitor, PlacesMonitorBuilder};
