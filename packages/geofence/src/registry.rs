//! Zone registry. Loads monitoring zones from embedded TOML configs.
//!
//! Each `.toml` file in `packages/geofence/zones/` is baked into the binary
//! at compile time via [`include_str!`]. A zone may also be loaded from an
//! arbitrary file at runtime with [`load_zone_file`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LatLng, MonitoringPolygon, ZoneError};

/// Id of the zone used when none is requested.
pub const DEFAULT_ZONE_ID: &str = "default";

/// TOML configs embedded at compile time.
const ZONE_TOMLS: &[(&str, &str)] = &[("default", include_str!("../zones/default.toml"))];

#[derive(Debug, Deserialize)]
struct ZoneToml {
    id: String,
    name: String,
    #[serde(default)]
    center: Option<LatLng>,
    vertices: Vec<LatLng>,
}

/// A named monitoring zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    /// Map centre used by display clients, if configured.
    pub center: Option<LatLng>,
    pub polygon: MonitoringPolygon,
}

/// Parses a [`Zone`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or the ring has fewer than
/// three vertices.
pub fn parse_zone_toml(toml_str: &str) -> Result<Zone, ZoneError> {
    let raw: ZoneToml = toml::de::from_str(toml_str).map_err(|e| ZoneError::Toml(e.to_string()))?;
    Ok(Zone {
        id: raw.id,
        name: raw.name,
        center: raw.center,
        polygon: MonitoringPolygon::new(raw.vertices)?,
    })
}

/// Reads and parses a zone TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails to parse.
pub fn load_zone_file(path: &Path) -> Result<Zone, ZoneError> {
    let contents = std::fs::read_to_string(path)?;
    let zone = parse_zone_toml(&contents)?;
    log::info!(
        "Loaded zone '{}' ({} vertices) from {}",
        zone.id,
        zone.polygon.vertices().len(),
        path.display()
    );
    Ok(zone)
}

/// Returns every embedded zone.
///
/// # Errors
///
/// Returns an error if an embedded TOML config is malformed.
pub fn all_zones() -> Result<Vec<Zone>, ZoneError> {
    ZONE_TOMLS
        .iter()
        .map(|(_, toml)| parse_zone_toml(toml))
        .collect()
}

/// Looks up an embedded zone by id.
///
/// # Errors
///
/// Returns [`ZoneError::UnknownZone`] if no embedded zone has this id.
pub fn zone(id: &str) -> Result<Zone, ZoneError> {
    all_zones()?
        .into_iter()
        .find(|z| z.id == id)
        .ok_or_else(|| ZoneError::UnknownZone { id: id.to_string() })
}

/// Returns the embedded default zone.
///
/// # Errors
///
/// Returns an error if the embedded config is malformed.
pub fn default_zone() -> Result<Zone, ZoneError> {
    zone(DEFAULT_ZONE_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_default_zone() {
        let zone = default_zone().unwrap();
        assert_eq!(zone.id, DEFAULT_ZONE_ID);
        assert_eq!(zone.polygon.vertices().len(), 12);
    }

    #[test]
    fn zone_ids_are_unique() {
        let zones = all_zones().unwrap();
        let mut ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), ZONE_TOMLS.len());
    }

    #[test]
    fn default_center_is_inside_default_zone() {
        let zone = default_zone().unwrap();
        assert!(zone.polygon.contains(zone.center.unwrap()));
    }

    #[test]
    fn rejects_zone_with_two_vertices() {
        let toml = r#"
            id = "tiny"
            name = "Tiny"
            vertices = [{ lat = 0.0, lng = 0.0 }, { lat = 1.0, lng = 1.0 }]
        "#;
        assert!(matches!(
            parse_zone_toml(toml),
            Err(ZoneError::TooFewVertices { count: 2 })
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            parse_zone_toml("id = "),
            Err(ZoneError::Toml(_))
        ));
    }

    #[test]
    fn zone_serializes_for_display() {
        let rendered = toml::to_string(&default_zone().unwrap()).unwrap();
        assert!(rendered.contains("id = \"default\""));
        assert!(rendered.contains("33.874927"));
        assert_eq!(rendered.matches("lat = ").count(), 13);
    }

    #[test]
    fn unknown_zone_is_an_error() {
        assert!(matches!(
            zone("nowhere"),
            Err(ZoneError::UnknownZone { .. })
        ));
    }
}
