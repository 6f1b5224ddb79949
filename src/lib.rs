//! # Places Monitor
//!
//! Geofence monitoring for a mobile device. The monitor tracks where the
//! device is, keeps the nearest points of interest registered with the OS
//! geofencing service without exceeding its capacity, and reports region
//! entries and exits to the host event hub.
//!
//! ## Core Concepts
//!
//! - **EventQueue**: ordered, thread-safe FIFO of everything the monitor reacts to
//! - **RegionStore**: known POIs, geofenced regions and the regions the device is inside
//! - **MonitoringCoordinator**: the single consumer of the queue and owner of all state
//! - **PlacesMonitor**: the public command surface and drain scheduling
//!
//! Platform services are traits: [`LocationProvider`], [`PlacesService`],
//! [`EventHub`] and [`SettingsStore`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use places_monitor::{ChannelHub, FixedPlacesService, MonitorMode, PlacesMonitor};
//!
//! let (hub, notifications) = ChannelHub::new(256);
//! let monitor = PlacesMonitor::builder()
//!     .provider(my_platform_provider)
//!     .places(FixedPlacesService::new(catalog))
//!     .hub(Arc::new(hub))
//!     .build()?;
//!
//! monitor.set_mode(MonitorMode::CONTINUOUS);
//! monitor.start();
//! let first = notifications.recv()?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod geo;
pub mod hub;
pub mod logging;
pub mod monitor;
pub mod places;
pub mod policy;
pub mod provider;
pub mod queue;
pub mod region;
pub mod region_store;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use config::{ConfigurationSlot, DrainMode, HostConfiguration, MonitorConfig, PlatformCapabilities, PrivacyStatus};
pub use error::{MonitorError, MonitorResult};
pub use event::{Event, PlacesResponse};
pub use geo::Coordinate;
pub use hub::{
    ChannelHub, EventHub, EventTag, HubMessage, InboundEnvelope, NotificationStream, RegionEventType,
    RegionNotification, SharedState,
};
pub use monitor::{
    DrainOutcome, EventSink, MonitorSnapshot, MonitorState, MonitoringCoordinator, PlacesMonitor,
    PlacesMonitorBuilder,
};
pub use places::{FixedPlacesService, PlacesService};
pub use policy::{AuthorizationLevel, AuthorizationStatus, MonitorMode, MonitorStatus, MonitoringStrategy};
pub use provider::{LocationProvider, ProviderCallbacks};
pub use queue::EventQueue;
pub use region::{Region, RegionSource};
pub use region_store::{RegionDelta, RegionStore};
pub use storage::{FileSettingsStore, InMemorySettingsStore, SettingsBatch, SettingsOp, SettingsStore, StorageError};
