//! Pluggable containment engines.
//!
//! [`RayCasting`] wraps the built-in crossing-number test and is the
//! default everywhere. [`GeoEngine`] answers the same question through the
//! `geo` crate. [`FailClosed`] wraps an engine that may not be available at
//! runtime and answers "not contained" whenever it is missing.

use std::sync::atomic::{AtomicBool, Ordering};

use geo::{Contains, LineString, Point, Polygon};

use crate::{LatLng, MonitoringPolygon};

/// Decides whether a point lies inside a monitoring polygon.
pub trait ContainmentEngine: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn contains(&self, point: LatLng, polygon: &MonitoringPolygon) -> bool;
}

/// The self-contained even-odd test from [`crate::contains`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RayCasting;

impl ContainmentEngine for RayCasting {
    fn name(&self) -> &'static str {
        "ray_casting"
    }

    fn contains(&self, point: LatLng, polygon: &MonitoringPolygon) -> bool {
        crate::contains(point, polygon)
    }
}

/// Containment via [`geo::Contains`].
///
/// `geo` treats boundary points as outside, which is one valid choice for
/// the boundary case the crossing-number test leaves undefined.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoEngine;

impl GeoEngine {
    fn to_geo(polygon: &MonitoringPolygon) -> Polygon<f64> {
        let ring: LineString<f64> = polygon
            .vertices()
            .iter()
            .map(|v| (v.lng, v.lat))
            .collect::<Vec<_>>()
            .into();
        Polygon::new(ring, vec![])
    }
}

impl ContainmentEngine for GeoEngine {
    fn name(&self) -> &'static str {
        "geo"
    }

    fn contains(&self, point: LatLng, polygon: &MonitoringPolygon) -> bool {
        Self::to_geo(polygon).contains(&Point::new(point.lng, point.lat))
    }
}

/// Wraps an optional engine, treating an unavailable engine as "not
/// contained".
pub struct FailClosed<E> {
    engine: Option<E>,
    warned: AtomicBool,
}

impl<E: ContainmentEngine> FailClosed<E> {
    #[must_use]
    pub const fn new(engine: Option<E>) -> Self {
        Self {
            engine,
            warned: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.engine.is_some()
    }
}

impl<E: ContainmentEngine> ContainmentEngine for FailClosed<E> {
    fn name(&self) -> &'static str {
        self.engine.as_ref().map_or("unavailable", ContainmentEngine::name)
    }

    fn contains(&self, point: LatLng, polygon: &MonitoringPolygon) -> bool {
        if let Some(engine) = &self.engine {
            return engine.contains(point, polygon);
        }
        if !self.warned.swap(true, Ordering::Relaxed) {
            log::warn!("Containment engine unavailable, treating every point as outside the zone");
        }
        false
    }
}
