//! Recording fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use places_monitor::constants::shared_state;
use places_monitor::{
    AuthorizationLevel, AuthorizationStatus, Coordinate, Event, EventHub, EventSink, HostConfiguration,
    InMemorySettingsStore, LocationProvider, PlacesResponse, PlacesService, Region, RegionEventType,
    RegionNotification, SettingsBatch, SettingsStore, SharedState, StorageError,
};

/// Everything observable from outside the monitor, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Trace {
    StartContinuous,
    StartSignificant,
    StopUpdates,
    OneShotFix,
    Register(String),
    Unregister(String),
    RequestAuthorization(AuthorizationLevel),
    Entry(String),
    Exit(String),
    Shared(SharedState),
}

#[derive(Debug, Clone, Default)]
pub struct TraceLog(Arc<Mutex<Vec<Trace>>>);

impl TraceLog {
    pub fn push(&self, trace: Trace) {
        self.0.lock().unwrap().push(trace);
    }

    pub fn all(&self) -> Vec<Trace> {
        self.0.lock().unwrap().clone()
    }

    /// Provider commands only.
    pub fn provider_calls(&self) -> Vec<Trace> {
        self.all()
            .into_iter()
            .filter(|t| !matches!(t, Trace::Entry(_) | Trace::Exit(_) | Trace::Shared(_)))
            .collect()
    }

    pub fn notifications(&self) -> Vec<Trace> {
        self.all()
            .into_iter()
            .filter(|t| matches!(t, Trace::Entry(_) | Trace::Exit(_)))
            .collect()
    }

    pub fn last_shared_state(&self) -> Option<SharedState> {
        self.all().into_iter().rev().find_map(|t| match t {
            Trace::Shared(s) => Some(s),
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&Trace) -> bool) -> usize {
        self.all().iter().filter(|t| pred(t)).count()
    }

    pub fn position(&self, trace: &Trace) -> Option<usize> {
        self.all().iter().position(|t| t == trace)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Location provider that records every command.
#[derive(Clone)]
pub struct RecordingProvider {
    log: TraceLog,
    status: Arc<Mutex<AuthorizationStatus>>,
    sink: Arc<Mutex<Option<EventSink>>>,
}

impl RecordingProvider {
    pub fn new(log: TraceLog, status: AuthorizationStatus) -> Self {
        Self {
            log,
            status: Arc::new(Mutex::new(status)),
            sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_status(&self, status: AuthorizationStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// The sink the monitor bound, for simulating platform callbacks.
    pub fn sink(&self) -> EventSink {
        self.sink.lock().unwrap().clone().expect("provider not bound")
    }
}

impl LocationProvider for RecordingProvider {
    fn bind(&mut self, sink: EventSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock().unwrap()
    }

    fn is_foreground(&self) -> bool {
        true
    }

    fn start_continuous(&mut self) {
        self.log.push(Trace::StartContinuous);
    }

    fn start_significant_changes(&mut self) {
        self.log.push(Trace::StartSignificant);
    }

    fn stop(&mut self) {
        self.log.push(Trace::StopUpdates);
    }

    fn request_one_shot_fix(&mut self) {
        self.log.push(Trace::OneShotFix);
    }

    fn register_region(&mut self, region: &Region) {
        self.log.push(Trace::Register(region.id().to_string()));
    }

    fn unregister_region(&mut self, region: &Region) {
        self.log.push(Trace::Unregister(region.id().to_string()));
    }

    fn request_authorization(&mut self, level: AuthorizationLevel) {
        self.log.push(Trace::RequestAuthorization(level));
    }
}

/// Hub that records outbound traffic into the shared trace.
#[derive(Debug, Default)]
pub struct RecordingHub {
    log: TraceLog,
    states: Mutex<HashMap<String, Value>>,
}

impl RecordingHub {
    pub fn new(log: TraceLog) -> Self {
        Self {
            log,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_configuration(&self, value: Value) {
        self.states
            .lock()
            .unwrap()
            .insert(shared_state::CONFIGURATION.to_string(), value);
    }
}

impl EventHub for RecordingHub {
    fn emit_region_event(&self, notification: RegionNotification) {
        let id = notification.region.id().to_string();
        self.log.push(match notification.event_type {
            RegionEventType::Entry => Trace::Entry(id),
            RegionEventType::Exit => Trace::Exit(id),
        });
    }

    fn publish_shared_state(&self, state: SharedState) {
        self.log.push(Trace::Shared(state));
    }

    fn shared_state(&self, owner: &str) -> Option<Value> {
        self.states.lock().unwrap().get(owner).cloned()
    }
}

/// Places service answering from a mutable catalog.
///
/// Returns the whole catalog regardless of the requested limit, like a
/// server that ignores it. In deferred mode requests are parked until
/// [`ScriptedPlaces::release`].
#[derive(Clone, Default)]
pub struct ScriptedPlaces {
    catalog: Arc<Mutex<Vec<Region>>>,
    deferred: bool,
    parked: Arc<Mutex<Vec<(Coordinate, EventSink)>>>,
    limits: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedPlaces {
    pub fn new(catalog: Vec<Region>) -> Self {
        Self {
            catalog: Arc::new(Mutex::new(catalog)),
            ..Self::default()
        }
    }

    pub fn deferred(catalog: Vec<Region>) -> Self {
        Self {
            deferred: true,
            ..Self::new(catalog)
        }
    }

    pub fn set_catalog(&self, catalog: Vec<Region>) {
        *self.catalog.lock().unwrap() = catalog;
    }

    pub fn requested_limits(&self) -> Vec<usize> {
        self.limits.lock().unwrap().clone()
    }

    pub fn parked(&self) -> usize {
        self.parked.lock().unwrap().len()
    }

    /// Answer every parked request.
    pub fn release(&self) {
        let parked: Vec<_> = self.parked.lock().unwrap().drain(..).collect();
        let regions = self.catalog.lock().unwrap().clone();
        for (location, sink) in parked {
            sink.dispatch(Event::PlacesResponse(PlacesResponse::Nearby {
                location,
                regions: regions.clone(),
            }));
        }
    }
}

impl PlacesService for ScriptedPlaces {
    fn request_nearby(&mut self, location: Coordinate, limit: usize, sink: &EventSink) {
        self.limits.lock().unwrap().push(limit);
        if self.deferred {
            self.parked.lock().unwrap().push((location, sink.clone()));
            return;
        }
        let regions = self.catalog.lock().unwrap().clone();
        sink.dispatch(Event::PlacesResponse(PlacesResponse::Nearby { location, regions }));
    }
}

/// In-memory settings whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakySettings {
    inner: InMemorySettingsStore,
    failures_left: AtomicU32,
}

impl FlakySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` writes. `u32::MAX` fails them all.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemorySettingsStore {
        &self.inner
    }

    fn check(&self) -> Result<(), StorageError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left == 0 {
            return Ok(());
        }
        if left != u32::MAX {
            self.failures_left.store(left - 1, Ordering::SeqCst);
        }
        Err(StorageError::IoError("disk full".to_string()))
    }
}

impl SettingsStore for FlakySettings {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.delete(key)
    }

    fn apply(&self, batch: SettingsBatch) -> Result<(), StorageError> {
        self.check()?;
        self.inner.apply(batch)
    }
}

pub fn at(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat, lon).unwrap()
}

pub fn region(id: &str, lat: f64, lon: f64) -> Region {
    Region::new(id, at(lat, lon), 100.0).unwrap()
}

/// `n` regions strung out northwards from the origin, `poi-00` nearest.
pub fn regions_north(n: usize) -> Vec<Region> {
    (0..n)
        .map(|i| region(&format!("poi-{i:02}"), 0.001 * (i as f64 + 1.0), 0.0))
        .collect()
}

pub fn configuration() -> HostConfiguration {
    HostConfiguration::from_value(serde_json::json!({"global.privacy": "optedin"})).unwrap()
}

pub fn opted_out() -> HostConfiguration {
    HostConfiguration::from_value(serde_json::json!({"global.privacy": "optedout"})).unwrap()
}
