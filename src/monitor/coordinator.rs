//! The monitoring state machine.
//!
//! The coordinator is the single consumer of the event queue. Each event is
//! handled against a staged copy of [`MonitorState`]; the copy is persisted in
//! one settings batch, outbound effects are applied, and only then is the copy
//! committed and the event polled. A handler that fails leaves both the
//! committed state and the queue head untouched, with one exception: `Stop`
//! tears the platform side down before persisting, so its in-memory state is
//! committed even when the write fails and only the write is retried.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigurationSlot, MonitorConfig, PrivacyStatus};
use crate::constants::settings;
use crate::error::{MonitorError, MonitorResult};
use crate::event::{Event, PlacesResponse};
use crate::geo::Coordinate;
use crate::hub::{EventHub, RegionNotification, SharedState};
use crate::places::PlacesService;
use crate::policy::{
    accepts_authorization_request, AuthorizationLevel, AuthorizationStatus, MonitorMode, MonitorStatus,
    MonitoringStrategy,
};
use crate::provider::LocationProvider;
use crate::queue::EventQueue;
use crate::region::Region;
use crate::region_store::{RegionDelta, RegionStore};
use crate::storage::{SettingsBatch, SettingsStore, StorageError};

use super::runtime::EventSink;

/// Everything the coordinator persists.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorState {
    pub status: MonitorStatus,
    pub mode: MonitorMode,
    pub requested_level: AuthorizationLevel,
    pub regions: RegionStore,
}

impl MonitorState {
    /// Fresh defaults with the effective region cap of `config`.
    #[must_use]
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            status: MonitorStatus::NotStarted,
            mode: MonitorMode::default(),
            requested_level: AuthorizationLevel::default().clamp_to(&config.capabilities),
            regions: RegionStore::new(config.region_capacity()),
        }
    }

    /// Rebuild from persisted settings.
    ///
    /// The returned state is always `NotStarted`; the second value reports
    /// whether monitoring was running when the settings were last written, so
    /// the caller can queue a `Start` to resume it.
    ///
    /// # Errors
    ///
    /// Propagates backend read failures.
    pub fn load(store: &dyn SettingsStore, config: &MonitorConfig) -> Result<(Self, bool), StorageError> {
        let mut state = Self::new(config);

        if let Some(bits) = store
            .get(settings::MONITOR_MODE)?
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|b| u8::try_from(b).ok())
        {
            state.mode = MonitorMode::from_bits(bits);
        }
        if let Some(level) = store
            .get(settings::REQUEST_AUTHORIZATION_LEVEL)?
            .as_ref()
            .and_then(AuthorizationLevel::from_json)
        {
            state.requested_level = level.clamp_to(&config.capabilities);
        }
        let was_started = store
            .get(settings::IS_MONITORING_STARTED)?
            .as_ref()
            .and_then(Value::as_bool)
            .unwrap_or(false);

        state.regions = RegionStore::load(store, config.region_capacity())?;
        Ok((state, was_started))
    }

    /// Append the persisted form of this state to `batch`.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if a region cannot be encoded.
    pub fn write_to(&self, batch: SettingsBatch) -> Result<SettingsBatch, StorageError> {
        let batch = batch
            .set(settings::MONITOR_MODE, Value::from(self.mode.bits()))
            .set(
                settings::REQUEST_AUTHORIZATION_LEVEL,
                Value::from(self.requested_level.to_string()),
            )
            .set(settings::IS_MONITORING_STARTED, Value::from(self.status.is_started()));
        self.regions.write_to(batch)
    }

    #[must_use]
    pub fn shared_state(&self) -> SharedState {
        SharedState::new(self.mode, self.requested_level, self.status.is_started())
    }
}

/// Why a drain returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue is empty.
    Drained,
    /// The head event cannot be processed yet and was left in place.
    Suspended,
}

/// Read-only view of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub status: MonitorStatus,
    pub mode: MonitorMode,
    pub requested_level: AuthorizationLevel,
    /// Location updates are running.
    pub monitoring_active: bool,
    pub monitored: Vec<String>,
    pub inside: Vec<String>,
}

/// Collaborators handed to the coordinator at construction.
pub struct CoordinatorParts {
    pub config: MonitorConfig,
    pub state: MonitorState,
    pub provider: Box<dyn LocationProvider>,
    pub places: Box<dyn PlacesService>,
    pub hub: Arc<dyn EventHub>,
    pub settings: Arc<dyn SettingsStore>,
    pub configuration: Arc<ConfigurationSlot>,
    pub sink: EventSink,
}

/// Outbound effects of a committed transition, applied in field order.
#[derive(Debug, Default)]
struct Effects {
    exits: Vec<Region>,
    unregister: Vec<Region>,
    register: Vec<Region>,
}

impl Effects {
    fn from_delta(delta: RegionDelta) -> Self {
        Self {
            exits: delta.exited,
            unregister: delta.to_unregister,
            register: delta.to_register,
        }
    }
}

/// Single consumer of the event queue.
pub struct MonitoringCoordinator {
    config: MonitorConfig,
    state: MonitorState,
    monitoring_active: bool,
    failed_attempts: u32,
    provider: Box<dyn LocationProvider>,
    places: Box<dyn PlacesService>,
    hub: Arc<dyn EventHub>,
    settings: Arc<dyn SettingsStore>,
    configuration: Arc<ConfigurationSlot>,
    sink: EventSink,
}

impl std::fmt::Debug for MonitoringCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringCoordinator")
            .field("state", &self.state)
            .field("monitoring_active", &self.monitoring_active)
            .field("failed_attempts", &self.failed_attempts)
            .finish_non_exhaustive()
    }
}

impl MonitoringCoordinator {
    #[must_use]
    pub fn new(parts: CoordinatorParts) -> Self {
        Self {
            config: parts.config,
            state: parts.state,
            monitoring_active: false,
            failed_attempts: 0,
            provider: parts.provider,
            places: parts.places,
            hub: parts.hub,
            settings: parts.settings,
            configuration: parts.configuration,
            sink: parts.sink,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &MonitorState {
        &self.state
    }

    #[must_use]
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            status: self.state.status,
            mode: self.state.mode,
            requested_level: self.state.requested_level,
            monitoring_active: self.monitoring_active,
            monitored: self.state.regions.monitored().map(|r| r.id().to_string()).collect(),
            inside: self.state.regions.inside().map(|r| r.id().to_string()).collect(),
        }
    }

    /// Publish the current shared-state record.
    pub fn publish_shared_state(&self) {
        self.hub.publish_shared_state(self.state.shared_state());
    }

    /// Process queued events until the queue is empty or the head must wait.
    pub fn process_events(&mut self, queue: &EventQueue) -> DrainOutcome {
        loop {
            let Ok(event) = queue.peek() else {
                return DrainOutcome::Drained;
            };

            match self.handle(&event) {
                Ok(()) => {
                    self.failed_attempts = 0;
                    let _ = queue.poll();
                }
                Err(MonitorError::PreconditionUnmet { reason }) => {
                    debug!(event = event.name(), %reason, "suspending drain");
                    return DrainOutcome::Suspended;
                }
                Err(e) if e.is_persistence() => {
                    self.failed_attempts = self.failed_attempts.saturating_add(1);
                    let droppable = !matches!(event, Event::Stop { .. });
                    if droppable && self.failed_attempts > self.config.persistence_retry_limit {
                        error!(
                            event = event.name(),
                            attempts = self.failed_attempts,
                            error = %e,
                            "persistence keeps failing; dropping event"
                        );
                        self.failed_attempts = 0;
                        let _ = queue.poll();
                        continue;
                    }
                    warn!(
                        event = event.name(),
                        attempts = self.failed_attempts,
                        error = %e,
                        "transition not committed; will retry"
                    );
                    return DrainOutcome::Suspended;
                }
                Err(e) => {
                    warn!(event = event.name(), error = %e, "event failed");
                    self.failed_attempts = 0;
                    let _ = queue.poll();
                }
            }
        }
    }

    /// Handle one event.
    ///
    /// # Errors
    ///
    /// `PreconditionUnmet` and persistence failures mean the event should be
    /// retried; any other error is terminal for the event.
    pub fn handle(&mut self, event: &Event) -> MonitorResult<()> {
        debug!(event = event.name(), status = ?self.state.status, "handling event");
        match event {
            Event::Start => self.on_start(),
            Event::Stop { clear_data } => self.on_stop(*clear_data),
            Event::UpdateLocationNow => {
                self.on_update_location_now();
                Ok(())
            }
            Event::SetMode(mode) => self.on_set_mode(*mode),
            Event::SetAuthorizationLevel(level) => self.on_set_authorization_level(*level),
            // Normally intercepted before the queue, which also queues the
            // opt-out `Stop`; here it only refreshes the slot.
            Event::ConfigurationChanged(config) => {
                self.configuration.set(config.clone());
                Ok(())
            }
            Event::LocationUpdated(location) => {
                self.on_location(*location);
                Ok(())
            }
            Event::RegionEntered(region) => self.on_region_entered(region),
            Event::RegionExited(region) => self.on_region_exited(region),
            Event::AuthorizationChanged(status) => self.on_authorization_changed(*status),
            Event::PlacesResponse(response) => self.on_places_response(response),
        }
    }

    fn on_start(&mut self) -> MonitorResult<()> {
        let Some(config) = self.configuration.current() else {
            return Err(MonitorError::precondition("configuration shared state not available"));
        };
        if config.privacy_status() == PrivacyStatus::OptedOut {
            info!("privacy opted out; ignoring start");
            return Ok(());
        }
        if self.state.status.is_started() && self.monitoring_active {
            debug!("monitoring already running");
            return Ok(());
        }

        let level = self.state.requested_level;
        match self.provider.authorization_status() {
            AuthorizationStatus::Denied => {
                self.publish_shared_state();
                Err(MonitorError::AuthorizationDenied { requested: level })
            }
            AuthorizationStatus::NotDetermined => {
                let mut staged = self.state.clone();
                staged.status = MonitorStatus::Started;
                self.persist(&staged)?;
                if self.provider.is_foreground() {
                    self.provider.request_authorization(level);
                } else {
                    debug!(%level, "app in background; authorization prompt deferred");
                }
                self.state = staged;
                info!("monitoring started; waiting for authorization");
                self.publish_shared_state();
                Ok(())
            }
            AuthorizationStatus::Granted(granted) => {
                let mut staged = self.state.clone();
                staged.status = MonitorStatus::Started;
                self.begin_monitoring(staged)?;
                info!(authorization = %granted, mode = ?self.state.mode, "monitoring started");
                Ok(())
            }
        }
    }

    /// Reconcile, persist and start location updates for `staged`.
    fn begin_monitoring(&mut self, mut staged: MonitorState) -> MonitorResult<()> {
        let delta = staged.regions.reconcile();
        for region in &delta.exited {
            staged.regions.mark_outside(region);
        }
        self.persist(&staged)?;

        self.start_updates(staged.mode);
        self.provider.request_one_shot_fix();
        self.apply(Effects::from_delta(delta));
        self.state = staged;
        self.monitoring_active = true;
        self.publish_shared_state();
        Ok(())
    }

    /// Unregistration and `provider.stop` happen before the write and are
    /// committed even if it fails. A retry finds nothing left to tear down
    /// and only repeats the write.
    fn on_stop(&mut self, clear_data: bool) -> MonitorResult<()> {
        let stop_updates = self.state.status.is_started() || self.monitoring_active;
        let unregister = self.state.regions.take_monitored();
        self.apply(Effects {
            unregister,
            ..Effects::default()
        });
        if stop_updates {
            self.provider.stop();
        }
        self.state.status = MonitorStatus::NotStarted;
        self.monitoring_active = false;
        if clear_data {
            self.state = MonitorState::new(&self.config);
        }

        let persisted = if clear_data {
            let batch = settings::ALL
                .iter()
                .fold(SettingsBatch::new(), |batch, key| batch.delete(*key));
            self.settings.apply(batch).map_err(MonitorError::from)
        } else {
            self.persist(&self.state)
        };
        self.publish_shared_state();
        persisted?;
        info!(clear_data, "monitoring stopped");
        Ok(())
    }

    fn on_update_location_now(&mut self) {
        if self.state.status.is_started() {
            self.provider.request_one_shot_fix();
        } else {
            debug!("not started; ignoring location request");
        }
    }

    fn on_set_mode(&mut self, mode: MonitorMode) -> MonitorResult<()> {
        let mut staged = self.state.clone();
        staged.mode = mode;
        self.persist(&staged)?;
        self.state = staged;

        if self.monitoring_active {
            self.provider.stop();
            self.start_updates(mode);
        }
        info!(mode = ?mode, strategy = ?mode.strategy(), "monitor mode updated");
        self.publish_shared_state();
        Ok(())
    }

    fn on_set_authorization_level(&mut self, requested: AuthorizationLevel) -> MonitorResult<()> {
        let level = requested.clamp_to(&self.config.capabilities);
        let status = self.provider.authorization_status();
        if !accepts_authorization_request(level, self.state.requested_level, status) {
            debug!(%level, current = %self.state.requested_level, ?status, "authorization request ignored");
            return Ok(());
        }

        let mut staged = self.state.clone();
        staged.requested_level = level;
        self.persist(&staged)?;
        self.state = staged;

        if self.state.status.is_started() && self.provider.is_foreground() {
            self.provider.request_authorization(level);
        }
        info!(%level, "requested authorization level updated");
        self.publish_shared_state();
        Ok(())
    }

    fn on_location(&mut self, location: Coordinate) {
        if !self.state.status.is_started() {
            debug!(%location, "not started; ignoring location");
            return;
        }
        if self.state.regions.capacity() == 0 {
            debug!("platform cannot geofence; skipping places query");
            return;
        }
        debug!(%location, "querying nearby points of interest");
        self.places
            .request_nearby(location, self.config.poi_query_limit(), &self.sink);
    }

    fn on_places_response(&mut self, response: &PlacesResponse) -> MonitorResult<()> {
        if !self.state.status.is_started() {
            info!(location = %response.location(), "discarding places response received while stopped");
            return Ok(());
        }

        match response {
            PlacesResponse::Failed { location, reason } => Err(MonitorError::ExternalService {
                service: "places".to_string(),
                message: format!("query at {location} failed: {reason}"),
            }),
            PlacesResponse::Nearby { location, regions } => {
                let mut staged = self.state.clone();
                staged.regions.set_reference(*location);
                staged.regions.set_known_pois(regions.clone());
                let delta = staged.regions.reconcile();
                for region in &delta.exited {
                    staged.regions.mark_outside(region);
                }
                self.persist(&staged)?;

                debug!(
                    register = delta.to_register.len(),
                    unregister = delta.to_unregister.len(),
                    exited = delta.exited.len(),
                    "regions reconciled"
                );
                self.apply(Effects::from_delta(delta));
                self.state = staged;
                Ok(())
            }
        }
    }

    fn on_region_entered(&mut self, region: &Region) -> MonitorResult<()> {
        let mut staged = self.state.clone();
        if !staged.regions.mark_inside(region) {
            debug!(region = %region.id(), "already inside");
            return Ok(());
        }
        self.persist(&staged)?;
        self.state = staged;
        info!(region = %region.id(), "entered region");
        self.hub.emit_region_event(RegionNotification::entry(region.clone()));
        Ok(())
    }

    fn on_region_exited(&mut self, region: &Region) -> MonitorResult<()> {
        let mut staged = self.state.clone();
        if !staged.regions.mark_outside(region) {
            debug!(region = %region.id(), "already outside");
            return Ok(());
        }
        self.persist(&staged)?;
        self.state = staged;
        info!(region = %region.id(), "exited region");
        self.hub.emit_region_event(RegionNotification::exit(region.clone()));
        Ok(())
    }

    fn on_authorization_changed(&mut self, status: AuthorizationStatus) -> MonitorResult<()> {
        debug!(?status, "authorization changed");
        match status {
            AuthorizationStatus::Granted(_) if self.state.status.is_started() && !self.monitoring_active => {
                let staged = self.state.clone();
                self.begin_monitoring(staged)?;
                info!("authorization granted; monitoring running");
                Ok(())
            }
            AuthorizationStatus::Denied if self.state.status.is_started() => {
                warn!("authorization revoked; stopping monitoring");
                self.on_stop(false)
            }
            _ => Ok(()),
        }
    }

    fn start_updates(&mut self, mode: MonitorMode) {
        match mode.strategy().supported_on(&self.config.capabilities) {
            Some(MonitoringStrategy::Continuous) => self.provider.start_continuous(),
            Some(MonitoringStrategy::SignificantChanges) => self.provider.start_significant_changes(),
            None => warn!(mode = ?mode, "platform supports no location update strategy"),
        }
    }

    fn apply(&mut self, effects: Effects) {
        for region in effects.exits {
            info!(region = %region.id(), "region dropped while inside; emitting exit");
            self.hub.emit_region_event(RegionNotification::exit(region));
        }
        for region in &effects.unregister {
            self.provider.unregister_region(region);
        }
        for region in &effects.register {
            self.provider.register_region(region);
        }
    }

    fn persist(&self, state: &MonitorState) -> MonitorResult<()> {
        let batch = state.write_to(SettingsBatch::new())?;
        self.settings.apply(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfiguration;
    use crate::hub::{ChannelHub, HubMessage, NotificationStream, RegionEventType};
    use crate::storage::InMemorySettingsStore;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        StartContinuous,
        StartSignificant,
        Stop,
        Fix,
        Register(String),
        Unregister(String),
        Authorize(AuthorizationLevel),
    }

    #[derive(Clone)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
        status: Arc<Mutex<AuthorizationStatus>>,
    }

    impl Recorder {
        fn new(status: AuthorizationStatus) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                status: Arc::new(Mutex::new(status)),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl LocationProvider for Recorder {
        fn authorization_status(&self) -> AuthorizationStatus {
            *self.status.lock().unwrap()
        }
        fn is_foreground(&self) -> bool {
            true
        }
        fn start_continuous(&mut self) {
            self.push(Call::StartContinuous);
        }
        fn start_significant_changes(&mut self) {
            self.push(Call::StartSignificant);
        }
        fn stop(&mut self) {
            self.push(Call::Stop);
        }
        fn request_one_shot_fix(&mut self) {
            self.push(Call::Fix);
        }
        fn register_region(&mut self, region: &Region) {
            self.push(Call::Register(region.id().to_string()));
        }
        fn unregister_region(&mut self, region: &Region) {
            self.push(Call::Unregister(region.id().to_string()));
        }
        fn request_authorization(&mut self, level: AuthorizationLevel) {
            self.push(Call::Authorize(level));
        }
    }

    struct NoPlaces;

    impl PlacesService for NoPlaces {
        fn request_nearby(&mut self, _location: Coordinate, _limit: usize, _sink: &EventSink) {}
    }

    struct Harness {
        coordinator: MonitoringCoordinator,
        queue: EventQueue,
        provider: Recorder,
        stream: NotificationStream,
        settings: Arc<InMemorySettingsStore>,
    }

    fn harness(status: AuthorizationStatus, configured: bool) -> Harness {
        let config = MonitorConfig::default();
        let provider = Recorder::new(status);
        let (hub, stream) = ChannelHub::new(256);
        let settings = Arc::new(InMemorySettingsStore::new());
        let slot = ConfigurationSlot::new(configured.then(HostConfiguration::default));
        let coordinator = MonitoringCoordinator::new(CoordinatorParts {
            state: MonitorState::new(&config),
            config,
            provider: Box::new(provider.clone()),
            places: Box::new(NoPlaces),
            hub: Arc::new(hub),
            settings: settings.clone(),
            configuration: Arc::new(slot),
            sink: EventSink::detached(),
        });
        Harness {
            coordinator,
            queue: EventQueue::new(),
            provider,
            stream,
            settings,
        }
    }

    fn region(id: &str, lat: f64) -> Region {
        Region::new(id, Coordinate::new(lat, 0.0).unwrap(), 100.0).unwrap()
    }

    fn region_events(stream: &NotificationStream) -> Vec<(RegionEventType, String)> {
        stream
            .drain()
            .into_iter()
            .filter_map(|m| match m {
                HubMessage::Region(n) => Some((n.event_type, n.region.id().to_string())),
                HubMessage::SharedState(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_start_with_grant_begins_monitoring() {
        let mut h = harness(AuthorizationStatus::Granted(AuthorizationLevel::Always), true);
        h.queue.enqueue(Event::Start);
        assert_eq!(h.coordinator.process_events(&h.queue), DrainOutcome::Drained);

        assert!(h.coordinator.state().status.is_started());
        assert!(h.coordinator.snapshot().monitoring_active);
        assert_eq!(h.provider.calls(), vec![Call::StartSignificant, Call::Fix]);
        assert_eq!(
            h.settings.get(settings::IS_MONITORING_STARTED).unwrap(),
            Some(Value::Bool(true))
        );
    }

    #[test]
    fn test_start_without_configuration_suspends() {
        let mut h = harness(AuthorizationStatus::Granted(AuthorizationLevel::Always), false);
        h.queue.enqueue(Event::Start);
        h.queue.enqueue(Event::SetMode(MonitorMode::CONTINUOUS));

        assert_eq!(h.coordinator.process_events(&h.queue), DrainOutcome::Suspended);
        assert_eq!(h.queue.len(), 2);
        assert_eq!(h.queue.peek().unwrap(), Event::Start);
        assert!(h.provider.calls().is_empty());
    }

    #[test]
    fn test_start_undetermined_requests_authorization_then_waits() {
        let mut h = harness(AuthorizationStatus::NotDetermined, true);
        h.queue.enqueue(Event::Start);
        h.coordinator.process_events(&h.queue);

        assert!(h.coordinator.state().status.is_started());
        assert!(!h.coordinator.snapshot().monitoring_active);
        assert_eq!(h.provider.calls(), vec![Call::Authorize(AuthorizationLevel::Always)]);

        h.queue
            .enqueue(Event::AuthorizationChanged(AuthorizationStatus::Granted(AuthorizationLevel::Always)));
        h.coordinator.process_events(&h.queue);
        assert!(h.coordinator.snapshot().monitoring_active);
        assert_eq!(h.provider.calls()[1..].to_vec(), vec![Call::StartSignificant, Call::Fix]);
    }

    #[test]
    fn test_start_denied_is_terminal() {
        let mut h = harness(AuthorizationStatus::Denied, true);
        h.queue.enqueue(Event::Start);
        assert_eq!(h.coordinator.process_events(&h.queue), DrainOutcome::Drained);
        assert!(!h.coordinator.state().status.is_started());
        assert!(h.provider.calls().is_empty());

        let published = h
            .stream
            .drain()
            .into_iter()
            .any(|m| matches!(m, HubMessage::SharedState(s) if !s.is_monitoring_started));
        assert!(published);
    }

    #[test]
    fn test_places_response_emits_exit_before_unregister() {
        let mut h = harness(AuthorizationStatus::Granted(AuthorizationLevel::Always), true);
        h.queue.enqueue(Event::Start);
        h.queue.enqueue(Event::PlacesResponse(PlacesResponse::Nearby {
            location: Coordinate::new(0.0, 0.0).unwrap(),
            regions: vec![region("a", 0.0), region("b", 0.1)],
        }));
        h.queue.enqueue(Event::RegionEntered(region("a", 0.0)));
        h.queue.enqueue(Event::PlacesResponse(PlacesResponse::Nearby {
            location: Coordinate::new(0.0, 0.0).unwrap(),
            regions: vec![region("b", 0.1)],
        }));
        h.coordinator.process_events(&h.queue);

        assert_eq!(
            region_events(&h.stream),
            vec![
                (RegionEventType::Entry, "a".to_string()),
                (RegionEventType::Exit, "a".to_string())
            ]
        );
        let calls = h.provider.calls();
        assert!(calls.contains(&Call::Unregister("a".to_string())));
        assert!(!calls.contains(&Call::Unregister("b".to_string())));
        assert_eq!(h.coordinator.snapshot().inside, Vec::<String>::new());
        assert_eq!(h.coordinator.snapshot().monitored, vec!["b".to_string()]);
    }

    #[test]
    fn test_failed_places_response_keeps_regions() {
        let mut h = harness(AuthorizationStatus::Granted(AuthorizationLevel::Always), true);
        let here = Coordinate::new(0.0, 0.0).unwrap();
        h.queue.enqueue(Event::Start);
        h.queue.enqueue(Event::PlacesResponse(PlacesResponse::Nearby {
            location: here,
            regions: vec![region("a", 0.0)],
        }));
        h.queue.enqueue(Event::PlacesResponse(PlacesResponse::Failed {
            location: here,
            reason: "offline".to_string(),
        }));
        assert_eq!(h.coordinator.process_events(&h.queue), DrainOutcome::Drained);
        assert_eq!(h.coordinator.snapshot().monitored, vec!["a".to_string()]);
    }

    #[test]
    fn test_duplicate_entry_notifies_once() {
        let mut h = harness(AuthorizationStatus::Granted(AuthorizationLevel::Always), true);
        h.queue.enqueue(Event::RegionEntered(region("a", 0.0)));
        h.queue.enqueue(Event::RegionEntered(region("a", 0.0)));
        h.queue.enqueue(Event::RegionExited(region("a", 0.0)));
        h.queue.enqueue(Event::RegionExited(region("a", 0.0)));
        h.coordinator.process_events(&h.queue);

        assert_eq!(
            region_events(&h.stream),
            vec![
                (RegionEventType::Entry, "a".to_string()),
                (RegionEventType::Exit, "a".to_string())
            ]
        );
    }

    #[test]
    fn test_set_mode_restarts_running_provider() {
        let mut h = harness(AuthorizationStatus::Granted(AuthorizationLevel::Always), true);
        h.queue.enqueue(Event::Start);
        h.queue.enqueue(Event::SetMode(MonitorMode::CONTINUOUS));
        h.coordinator.process_events(&h.queue);

        assert_eq!(
            h.provider.calls(),
            vec![Call::StartSignificant, Call::Fix, Call::Stop, Call::StartContinuous]
        );
        assert_eq!(h.settings.get(settings::MONITOR_MODE).unwrap(), Some(Value::from(1)));
    }

    #[test]
    fn test_update_location_now_requires_started() {
        let mut h = harness(AuthorizationStatus::Granted(AuthorizationLevel::Always), true);
        h.queue.enqueue(Event::UpdateLocationNow);
        h.coordinator.process_events(&h.queue);
        assert!(h.provider.calls().is_empty());
    }

    #[test]
    fn test_opt_out_configuration_clears_everything() {
        let mut h = harness(AuthorizationStatus::Granted(AuthorizationLevel::Always), true);
        h.queue.enqueue(Event::Start);
        h.queue.enqueue(Event::ConfigurationChanged(
            HostConfiguration::from_value(serde_json::json!({"global.privacy": "optedout"})).unwrap(),
        ));
        h.queue.enqueue(Event::Stop { clear_data: true });
        h.queue.enqueue(Event::Start);
        h.coordinator.process_events(&h.queue);

        assert!(!h.coordinator.state().status.is_started());
        assert!(h.settings.is_empty().unwrap());
        assert_eq!(h.provider.calls().last(), Some(&Call::Stop));
    }

    #[test]
    fn test_configuration_change_only_updates_slot() {
        let mut h = harness(AuthorizationStatus::Granted(AuthorizationLevel::Always), true);
        h.coordinator.handle(&Event::Start).unwrap();
        let calls = h.provider.calls().len();

        let opted_out =
            HostConfiguration::from_value(serde_json::json!({"global.privacy": "optedout"})).unwrap();
        h.coordinator.handle(&Event::ConfigurationChanged(opted_out)).unwrap();

        assert!(h.coordinator.state().status.is_started());
        assert_eq!(h.provider.calls().len(), calls);
        assert_eq!(
            h.coordinator.configuration.current().map(|c| c.privacy_status()),
            Some(PrivacyStatus::OptedOut)
        );
    }

    #[test]
    fn test_state_load_round_trip() {
        let config = MonitorConfig::default();
        let store = InMemorySettingsStore::new();
        let mut state = MonitorState::new(&config);
        state.status = MonitorStatus::Started;
        state.mode = MonitorMode::CONTINUOUS;
        state.requested_level = AuthorizationLevel::WhenInUse;
        store.apply(state.write_to(SettingsBatch::new()).unwrap()).unwrap();

        let (loaded, was_started) = MonitorState::load(&store, &config).unwrap();
        assert!(was_started);
        assert_eq!(loaded.status, MonitorStatus::NotStarted);
        assert_eq!(loaded.mode, MonitorMode::CONTINUOUS);
        assert_eq!(loaded.requested_level, AuthorizationLevel::WhenInUse);
    }
}
