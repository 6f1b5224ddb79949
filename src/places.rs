//! Nearby point-of-interest lookup port.
//!
//! A query is fire-and-forget: the service answers later by dispatching
//! [`Event::PlacesResponse`] through the sink it was given. The coordinator
//! checks its state again when the response arrives, so a response landing
//! after a stop is discarded rather than applied.

use crate::event::{Event, PlacesResponse};
use crate::geo::Coordinate;
use crate::monitor::EventSink;
use crate::region::Region;

/// Remote POI query service.
pub trait PlacesService: Send {
    /// Ask for up to `limit` POIs near `location`. The answer (or failure)
    /// must eventually be dispatched through `sink`.
    fn request_nearby(&mut self, location: Coordinate, limit: usize, sink: &EventSink);
}

/// A service backed by a fixed catalog, answering synchronously.
///
/// Useful for embedding the monitor where the POI list ships with the app,
/// and for exercising the monitor without a network.
#[derive(Debug, Clone, Default)]
pub struct FixedPlacesService {
    catalog: Vec<Region>,
}

impl FixedPlacesService {
    #[must_use]
    pub const fn new(catalog: Vec<Region>) -> Self {
        Self { catalog }
    }

    /// The `limit` catalog entries nearest to `location`.
    #[must_use]
    pub fn nearest(&self, location: &Coordinate, limit: usize) -> Vec<Region> {
        let mut ranked: Vec<(f64, &Region)> = self
            .catalog
            .iter()
            .map(|r| (r.distance_from(location), r))
            .collect();
        ranked.sort_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id().cmp(b.id())));
        ranked.into_iter().take(limit).map(|(_, r)| r.clone()).collect()
    }
}

impl PlacesService for FixedPlacesService {
    fn request_nearby(&mut self, location: Coordinate, limit: usize, sink: &EventSink) {
        let regions = self.nearest(&location, limit);
        sink.dispatch(Event::PlacesResponse(PlacesResponse::Nearby { location, regions }));
    }
}
