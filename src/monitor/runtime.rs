//! Runtime wiring: event submission, drain scheduling and the public facade.
//!
//! Producers on any thread submit events through [`PlacesMonitor`] or an
//! [`EventSink`]. Exactly one drain runs at a time. In inline mode the
//! submitting thread drains if nobody else is; a producer that finds the
//! drain busy raises `pending` and the running drain loops once more. In
//! worker mode a dedicated thread drains whenever it is woken.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError, Weak};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::config::{ConfigurationSlot, DrainMode, HostConfiguration, MonitorConfig, PrivacyStatus};
use crate::constants::{self, shared_state};
use crate::error::{MonitorError, MonitorResult};
use crate::event::Event;
use crate::hub::{EventHub, InboundEnvelope};
use crate::places::PlacesService;
use crate::policy::{AuthorizationLevel, MonitorMode};
use crate::provider::LocationProvider;
use crate::queue::EventQueue;
use crate::storage::{InMemorySettingsStore, SettingsStore};

use super::coordinator::{CoordinatorParts, DrainOutcome, MonitorSnapshot, MonitorState, MonitoringCoordinator};

struct Shared {
    queue: EventQueue,
    coordinator: Mutex<MonitoringCoordinator>,
    configuration: Arc<ConfigurationSlot>,
    hub: Arc<dyn EventHub>,
    pending: AtomicBool,
    wake: Option<Sender<()>>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("queued", &self.queue.len())
            .field("worker", &self.wake.is_some())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn submit(&self, event: Event) {
        match event {
            Event::ConfigurationChanged(config) => {
                let opted_out = config.privacy_status() == PrivacyStatus::OptedOut;
                self.configuration.set(config);
                if opted_out {
                    info!("privacy opted out; queueing stop with data clear");
                    self.queue.enqueue(Event::Stop { clear_data: true });
                }
            }
            other => self.queue.enqueue(other),
        }
        self.schedule();
    }

    fn schedule(&self) {
        match &self.wake {
            // A full wake channel already guarantees another drain.
            Some(wake) => {
                let _ = wake.try_send(());
            }
            None => self.drain(),
        }
    }

    /// Every exit path releases the lock before its final `pending` check, so
    /// a producer that raised `pending` while the lock was held is never left
    /// without a drain.
    fn drain(&self) {
        self.pending.store(true, Ordering::SeqCst);
        loop {
            let mut coordinator = match self.coordinator.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => return,
                Err(TryLockError::Poisoned(poisoned)) => {
                    warn!("coordinator lock poisoned; continuing with recovered state");
                    poisoned.into_inner()
                }
            };
            if self.pending.swap(false, Ordering::SeqCst) {
                let outcome = coordinator.process_events(&self.queue);
                if outcome == DrainOutcome::Suspended {
                    debug!(queued = self.queue.len(), "drain suspended");
                }
            }
            drop(coordinator);

            if !self.pending.load(Ordering::SeqCst) {
                return;
            }
        }
    }
}

/// Handle for delivering events to the monitor.
///
/// Holds only a weak reference: once the monitor is dropped, dispatching is
/// a no-op that returns `false`.
#[derive(Clone, Debug)]
pub struct EventSink {
    shared: Weak<Shared>,
}

impl EventSink {
    /// A sink attached to nothing.
    #[must_use]
    pub const fn detached() -> Self {
        Self { shared: Weak::new() }
    }

    /// Submit `event`. Returns false if the monitor no longer exists.
    pub fn dispatch(&self, event: Event) -> bool {
        match self.shared.upgrade() {
            Some(shared) => {
                shared.submit(event);
                true
            }
            None => {
                debug!(event = event.name(), "monitor gone; dropping event");
                false
            }
        }
    }
}

/// Builder for [`PlacesMonitor`].
#[derive(Default)]
pub struct PlacesMonitorBuilder {
    config: MonitorConfig,
    provider: Option<Box<dyn LocationProvider>>,
    places: Option<Box<dyn PlacesService>>,
    hub: Option<Arc<dyn EventHub>>,
    settings: Option<Arc<dyn SettingsStore>>,
    host_configuration: Option<HostConfiguration>,
}

impl PlacesMonitorBuilder {
    #[must_use]
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: impl LocationProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    #[must_use]
    pub fn places(mut self, places: impl PlacesService + 'static) -> Self {
        self.places = Some(Box::new(places));
        self
    }

    #[must_use]
    pub fn hub(mut self, hub: Arc<dyn EventHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Settings backend; defaults to an in-memory store.
    #[must_use]
    pub fn settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Configuration known at construction. Without it, the hub's
    /// configuration shared state is read instead.
    #[must_use]
    pub fn host_configuration(mut self, config: HostConfiguration) -> Self {
        self.host_configuration = Some(config);
        self
    }

    /// Load persisted state and start the monitor.
    ///
    /// If monitoring was running when the settings were last written, a
    /// `Start` is queued so it resumes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an invalid configuration or a missing
    /// collaborator, and `Persistence` if persisted settings cannot be read.
    pub fn build(self) -> MonitorResult<PlacesMonitor> {
        let config = self.config.validate()?;
        let mut provider = self.provider.ok_or_else(|| missing("provider"))?;
        let places = self.places.ok_or_else(|| missing("places"))?;
        let hub = self.hub.ok_or_else(|| missing("hub"))?;
        let settings = self
            .settings
            .unwrap_or_else(|| Arc::new(InMemorySettingsStore::new()) as Arc<dyn SettingsStore>);

        let (state, resume) = MonitorState::load(settings.as_ref(), &config)?;
        let host_configuration = self.host_configuration.or_else(|| {
            hub.shared_state(shared_state::CONFIGURATION)
                .and_then(HostConfiguration::from_value)
        });
        let configuration = Arc::new(ConfigurationSlot::new(host_configuration));

        let (wake_tx, wake_rx) = match config.drain_mode {
            DrainMode::Worker => {
                let (tx, rx) = bounded(1);
                (Some(tx), Some(rx))
            }
            DrainMode::Inline => (None, None),
        };

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let sink = EventSink { shared: weak.clone() };
            provider.bind(sink.clone());
            let coordinator = MonitoringCoordinator::new(CoordinatorParts {
                config: config.clone(),
                state,
                provider,
                places,
                hub: Arc::clone(&hub),
                settings,
                configuration: Arc::clone(&configuration),
                sink,
            });
            Shared {
                queue: EventQueue::new(),
                coordinator: Mutex::new(coordinator),
                configuration,
                hub,
                pending: AtomicBool::new(false),
                wake: wake_tx,
            }
        });

        shared
            .coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .publish_shared_state();

        if let Some(rx) = wake_rx {
            spawn_worker(Arc::downgrade(&shared), rx)?;
        }

        if resume {
            info!("monitoring was running before restart; resuming");
            shared.queue.enqueue(Event::Start);
            shared.schedule();
        }

        info!(
            version = constants::EXTENSION_VERSION,
            drain_mode = ?config.drain_mode,
            capacity = config.region_capacity(),
            "places monitor ready"
        );
        Ok(PlacesMonitor { shared })
    }
}

fn missing(field: &str) -> MonitorError {
    MonitorError::InvalidConfig {
        field: field.to_string(),
        reason: "required".to_string(),
    }
}

fn spawn_worker(shared: Weak<Shared>, wake: Receiver<()>) -> MonitorResult<()> {
    // Detached: the loop ends once the monitor, and with it the wake sender, is dropped.
    thread::Builder::new()
        .name("places-monitor-drain".to_string())
        .spawn(move || {
            while wake.recv().is_ok() {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.drain();
            }
            debug!("drain worker exiting");
        })
        .map(|_| ())
        .map_err(|e| MonitorError::internal(format!("failed to spawn drain worker: {e}")))
}

/// The places monitor.
///
/// Every command is queued and processed in order; none of them report the
/// outcome directly. Observe results through the hub.
#[derive(Debug)]
pub struct PlacesMonitor {
    shared: Arc<Shared>,
}

impl PlacesMonitor {
    #[must_use]
    pub fn builder() -> PlacesMonitorBuilder {
        PlacesMonitorBuilder::default()
    }

    #[must_use]
    pub const fn extension_version() -> &'static str {
        constants::EXTENSION_VERSION
    }

    #[must_use]
    pub const fn extension_name() -> &'static str {
        constants::EXTENSION_NAME
    }

    pub fn start(&self) {
        self.dispatch(Event::Start);
    }

    /// Stop monitoring; with `clear_data`, also forget all regions and settings.
    pub fn stop(&self, clear_data: bool) {
        self.dispatch(Event::Stop { clear_data });
    }

    pub fn update_location_now(&self) {
        self.dispatch(Event::UpdateLocationNow);
    }

    pub fn set_mode(&self, mode: MonitorMode) {
        self.dispatch(Event::SetMode(mode));
    }

    pub fn set_authorization_level(&self, level: AuthorizationLevel) {
        self.dispatch(Event::SetAuthorizationLevel(level));
    }

    /// Submit any event, as a provider or places callback would.
    pub fn dispatch(&self, event: Event) {
        self.shared.submit(event);
    }

    /// Decode a hub envelope and submit the resulting event, if any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEvent` if the envelope is malformed.
    pub fn dispatch_envelope(&self, envelope: &InboundEnvelope) -> MonitorResult<()> {
        if let Some(event) = envelope.decode(self.shared.hub.as_ref())? {
            self.dispatch(event);
        }
        Ok(())
    }

    /// Run a drain now, e.g. after a persistence backend recovered.
    pub fn resume(&self) {
        self.shared.schedule();
    }

    /// A sink for platform glue to deliver callbacks through.
    #[must_use]
    pub fn sink(&self) -> EventSink {
        EventSink {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Current committed state. Blocks while a drain is running.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the coordinator lock is poisoned.
    pub fn snapshot(&self) -> MonitorResult<MonitorSnapshot> {
        Ok(self.lock_coordinator()?.snapshot())
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    fn lock_coordinator(&self) -> MonitorResult<std::sync::MutexGuard<'_, MonitoringCoordinator>> {
        self.shared
            .coordinator
            .lock()
            .map_err(|_| MonitorError::internal("coordinator lock poisoned"))
    }
}
