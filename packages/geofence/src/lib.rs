#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Monitoring zone polygon and point-in-polygon containment.
//!
//! The zone is a fixed ring of `(lat, lng)` vertices loaded from embedded
//! TOML (see [`registry`]). [`contains`] is a self-contained crossing-number
//! test with no geometry engine behind it, so it is always available.
//! Alternative engines plug in through [`engine::ContainmentEngine`].

pub mod engine;
pub mod registry;

use serde::{Deserialize, Serialize};

/// Errors raised while building a monitoring zone.
#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    /// The zone TOML could not be parsed.
    #[error("Zone TOML error: {0}")]
    Toml(String),

    /// The zone file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A ring needs at least three vertices.
    #[error("Polygon needs at least 3 vertices, got {count}")]
    TooFewVertices {
        /// Number of vertices supplied.
        count: usize,
    },

    /// No embedded zone has this id.
    #[error("Unknown zone: {id}")]
    UnknownZone {
        /// The requested zone id.
        id: String,
    },
}

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// An implicitly closed ring of at least three vertices.
///
/// The last vertex connects back to the first; the ring must not repeat
/// the first vertex at the end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringPolygon {
    vertices: Vec<LatLng>,
}

impl MonitoringPolygon {
    /// Builds a polygon from an ordered vertex list.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::TooFewVertices`] if fewer than three vertices
    /// are given.
    pub fn new(vertices: Vec<LatLng>) -> Result<Self, ZoneError> {
        if vertices.len() < 3 {
            return Err(ZoneError::TooFewVertices {
                count: vertices.len(),
            });
        }
        Ok(Self { vertices })
    }

    #[must_use]
    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    /// Convenience wrapper around [`contains`].
    #[must_use]
    pub fn contains(&self, point: LatLng) -> bool {
        contains(point, self)
    }
}

/// Even-odd ray-casting containment test.
///
/// Walks every edge `(Vi, Vj)` where `j` is the predecessor of `i`
/// (wrapping). An edge is crossed when exactly one endpoint has a
/// longitude strictly greater than the point's, and the point's latitude
/// is below the edge's latitude interpolated at the point's longitude.
/// Each crossing flips the result.
///
/// Points lying exactly on an edge or vertex have implementation-defined
/// membership: depending on the edge orientation they may land on either
/// side. Callers must not rely on boundary behaviour.
#[must_use]
pub fn contains(point: LatLng, polygon: &MonitoringPolygon) -> bool {
    let vertices = polygon.vertices();
    let mut inside = false;
    let mut j = vertices.len() - 1;

    for (i, vi) in vertices.iter().enumerate() {
        let vj = vertices[j];
        let straddles = (vi.lng > point.lng) != (vj.lng > point.lng);
        if straddles {
            let edge_lat = (vj.lat - vi.lat) * (point.lng - vi.lng) / (vj.lng - vi.lng) + vi.lat;
            if point.lat < edge_lat {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> MonitoringPolygon {
        MonitoringPolygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 10.0),
            LatLng::new(10.0, 10.0),
            LatLng::new(10.0, 0.0),
        ])
        .unwrap()
    }

    /// An L-shaped ring, concave at (5, 5).
    fn ell() -> MonitoringPolygon {
        MonitoringPolygon::new(vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 10.0),
            LatLng::new(5.0, 10.0),
            LatLng::new(5.0, 5.0),
            LatLng::new(10.0, 5.0),
            LatLng::new(10.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_degenerate_ring() {
        let err = MonitoringPolygon::new(vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)]);
        assert!(matches!(err, Err(ZoneError::TooFewVertices { count: 2 })));
    }

    #[test]
    fn square_interior_and_exterior() {
        let poly = square();
        assert!(contains(LatLng::new(5.0, 5.0), &poly));
        assert!(contains(LatLng::new(0.5, 9.5), &poly));
        assert!(!contains(LatLng::new(-1.0, 5.0), &poly));
        assert!(!contains(LatLng::new(5.0, 11.0), &poly));
        assert!(!contains(LatLng::new(50.0, -50.0), &poly));
    }

    #[test]
    fn concave_notch_is_outside() {
        let poly = ell();
        assert!(contains(LatLng::new(2.0, 8.0), &poly));
        assert!(contains(LatLng::new(8.0, 2.0), &poly));
        assert!(!contains(LatLng::new(8.0, 8.0), &poly));
    }

    #[test]
    fn invariant_under_cyclic_rotation() {
        let base = ell();
        let probes: Vec<LatLng> = (-2..=12)
            .flat_map(|a| (-2..=12).map(move |b| LatLng::new(f64::from(a) + 0.25, f64::from(b) + 0.75)))
            .collect();

        for shift in 1..base.vertices().len() {
            let mut rotated = base.vertices().to_vec();
            rotated.rotate_left(shift);
            let rotated = MonitoringPolygon::new(rotated).unwrap();
            for p in &probes {
                assert_eq!(
                    contains(*p, &base),
                    contains(*p, &rotated),
                    "shift {shift} disagrees at {p:?}"
                );
            }
        }
    }

    #[test]
    fn method_and_free_function_agree() {
        let poly = square();
        let p = LatLng::new(3.0, 4.0);
        assert_eq!(poly.contains(p), contains(p, &poly));
    }
}
