//! Authoritative record of known POIs, geofenced regions, and regions the
//! device is inside.
//!
//! The store is plain data: the coordinator owns it, stages mutations on a
//! clone, persists the clone through [`RegionStore::write_to`], and only then
//! swaps it in. Nothing here talks to the location provider.

use std::collections::{BTreeMap, HashSet};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::constants::settings;
use crate::geo::Coordinate;
use crate::region::Region;
use crate::storage::{SettingsBatch, SettingsStore, StorageError};

/// Result of a reconciliation pass.
///
/// A region whose identifier stays selected but whose geometry changed appears
/// in both lists: the old definition in `to_unregister`, the new one in
/// `to_register`. Otherwise the lists are disjoint. `exited` lists regions the
/// device is marked inside that are no longer actively monitored; the store
/// keeps them marked inside until the caller has emitted their exit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionDelta {
    pub to_register: Vec<Region>,
    pub to_unregister: Vec<Region>,
    pub exited: Vec<Region>,
}

impl RegionDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_register.is_empty() && self.to_unregister.is_empty() && self.exited.is_empty()
    }
}

/// Known, monitored and occupied regions.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStore {
    capacity: usize,
    known: Vec<Region>,
    monitored: BTreeMap<String, Region>,
    inside: BTreeMap<String, Region>,
    reference: Option<Coordinate>,
}

impl RegionStore {
    /// Create an empty store that geofences at most `capacity` regions.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            known: Vec::new(),
            monitored: BTreeMap::new(),
            inside: BTreeMap::new(),
            reference: None,
        }
    }

    /// Rebuild from persisted settings.
    ///
    /// Known POIs are seeded from the persisted monitored set so that the
    /// first reconciliation after a restart does not unregister everything.
    ///
    /// # Errors
    ///
    /// Propagates backend read failures. Undecodable values are logged and
    /// treated as absent.
    pub fn load(store: &dyn SettingsStore, capacity: usize) -> Result<Self, StorageError> {
        let monitored: Vec<Region> = read_regions(store, settings::MONITORED_REGIONS)?;
        let inside: Vec<Region> = read_regions(store, settings::USER_WITHIN_REGIONS)?;

        let mut out = Self::new(capacity);
        out.known = monitored.clone();
        out.monitored = monitored.into_iter().map(|r| (r.id().to_string(), r)).collect();
        out.inside = inside.into_iter().map(|r| (r.id().to_string(), r)).collect();
        Ok(out)
    }

    /// Append the persisted form of this store to `batch`.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if a region cannot be encoded.
    pub fn write_to(&self, batch: SettingsBatch) -> Result<SettingsBatch, StorageError> {
        let monitored = encode(&self.monitored.values().collect::<Vec<_>>())?;
        let inside = encode(&self.inside.values().collect::<Vec<_>>())?;
        Ok(batch
            .set(settings::MONITORED_REGIONS, monitored)
            .set(settings::USER_WITHIN_REGIONS, inside))
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Location used to rank candidates nearest-first.
    pub fn set_reference(&mut self, location: Coordinate) {
        self.reference = Some(location);
    }

    #[must_use]
    pub const fn reference(&self) -> Option<Coordinate> {
        self.reference
    }

    /// Replace the candidate POI set.
    ///
    /// Invalid regions are dropped with a warning; for duplicate identifiers
    /// the first occurrence wins.
    pub fn set_known_pois(&mut self, pois: Vec<Region>) {
        let mut seen = HashSet::with_capacity(pois.len());
        self.known = pois
            .into_iter()
            .filter(|r| match r.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(region = %r.id(), error = %e, "dropping invalid point of interest");
                    false
                }
            })
            .filter(|r| seen.insert(r.id().to_string()))
            .collect();
    }

    #[must_use]
    pub fn known_pois(&self) -> &[Region] {
        &self.known
    }

    /// Recompute the actively monitored set from the known POIs.
    ///
    /// Candidates are ranked by distance from the reference location (when
    /// there is one) and then by identifier, and the first `capacity` are
    /// kept.
    pub fn reconcile(&mut self) -> RegionDelta {
        let mut ranked: Vec<(f64, &Region)> = self
            .known
            .iter()
            .map(|r| (self.reference.map_or(0.0, |loc| r.distance_from(&loc)), r))
            .collect();
        ranked.sort_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id().cmp(b.id())));

        let selected: Vec<Region> = ranked
            .into_iter()
            .take(self.capacity)
            .map(|(_, r)| r.clone())
            .collect();
        let selected_ids: HashSet<&str> = selected.iter().map(Region::id).collect();

        let redefined: HashSet<&str> = selected
            .iter()
            .filter(|r| {
                self.monitored
                    .get(r.id())
                    .is_some_and(|current| !current.same_definition(r))
            })
            .map(Region::id)
            .collect();

        let to_register: Vec<Region> = selected
            .iter()
            .filter(|r| !self.monitored.contains_key(r.id()) || redefined.contains(r.id()))
            .cloned()
            .collect();
        let to_unregister: Vec<Region> = self
            .monitored
            .values()
            .filter(|r| !selected_ids.contains(r.id()) || redefined.contains(r.id()))
            .cloned()
            .collect();
        let exited: Vec<Region> = self
            .inside
            .values()
            .filter(|r| !selected_ids.contains(r.id()))
            .cloned()
            .collect();

        for region in &to_register {
            if let Some(inside) = self.inside.get_mut(region.id()) {
                *inside = region.clone();
            }
        }
        self.monitored = selected.into_iter().map(|r| (r.id().to_string(), r)).collect();

        RegionDelta {
            to_register,
            to_unregister,
            exited,
        }
    }

    /// Regions currently geofenced, in identifier order.
    pub fn monitored(&self) -> impl Iterator<Item = &Region> {
        self.monitored.values()
    }

    #[must_use]
    pub fn monitored_count(&self) -> usize {
        self.monitored.len()
    }

    /// Look up a monitored region by identifier.
    #[must_use]
    pub fn monitored_region(&self, id: &str) -> Option<&Region> {
        self.monitored.get(id)
    }

    /// Regions the device is inside, in identifier order.
    pub fn inside(&self) -> impl Iterator<Item = &Region> {
        self.inside.values()
    }

    /// Mark the device inside `region`. Returns false if it already was.
    pub fn mark_inside(&mut self, region: &Region) -> bool {
        if self.inside.contains_key(region.id()) {
            return false;
        }
        self.inside.insert(region.id().to_string(), region.clone());
        true
    }

    /// Mark the device outside `region`. Returns false if it already was.
    pub fn mark_outside(&mut self, region: &Region) -> bool {
        self.inside.remove(region.id()).is_some()
    }

    #[must_use]
    pub fn is_inside(&self, region: &Region) -> bool {
        self.inside.contains_key(region.id())
    }

    /// Drop every monitored region, returning them for unregistration.
    pub fn take_monitored(&mut self) -> Vec<Region> {
        std::mem::take(&mut self.monitored).into_values().collect()
    }

    /// Forget everything, including the reference location.
    pub fn purge(&mut self) {
        *self = Self::new(self.capacity);
    }
}

fn read_regions<T: DeserializeOwned>(store: &dyn SettingsStore, key: &str) -> Result<Vec<T>, StorageError> {
    let Some(value) = store.get(key)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_value::<Vec<T>>(value) {
        Ok(v) => Ok(v),
        Err(e) => {
            warn!(key, error = %e, "ignoring undecodable persisted regions");
            Ok(Vec::new())
        }
    }
}

fn encode(regions: &[&Region]) -> Result<Value, StorageError> {
    serde_json::to_value(regions).map_err(|e| StorageError::SerializationError(e.to_string()))
}

impl Default for RegionStore {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_MAX_MONITORED_REGION_COUNT)
    }
}
