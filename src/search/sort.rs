//! Sort directives (field and geo-distance)

use crate::error::{EsError, Result};
use crate::search::predicate::keyed;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use strum::{Display, EnumString};

/// Sort order for search results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
pub enum SortOrder {
    #[strum(to_string = "asc")]
    Ascending,
    #[strum(to_string = "desc")]
    Descending,
}

impl SortOrder {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Self::Ascending
        } else {
            Self::Descending
        }
    }
}

/// Distance units understood by the geo-distance sort
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DistanceUnit {
    #[strum(to_string = "km", serialize = "kilometers")]
    Kilometers,
    #[strum(to_string = "m", serialize = "meters")]
    Meters,
    #[strum(to_string = "cm", serialize = "centimeters")]
    Centimeters,
    #[strum(to_string = "mm", serialize = "millimeters")]
    Millimeters,
    #[strum(to_string = "mi", serialize = "miles")]
    Miles,
    #[strum(to_string = "yd", serialize = "yards")]
    Yards,
    #[strum(to_string = "ft", serialize = "feet")]
    Feet,
    #[strum(to_string = "in", serialize = "inches")]
    Inches,
    #[strum(to_string = "nmi", serialize = "nauticalmiles")]
    NauticalMiles,
}

impl DistanceUnit {
    /// Length of one unit in meters
    pub fn meters(&self) -> f64 {
        match self {
            Self::Kilometers => 1000.0,
            Self::Meters => 1.0,
            Self::Centimeters => 0.01,
            Self::Millimeters => 0.001,
            Self::Miles => 1609.344,
            Self::Yards => 0.9144,
            Self::Feet => 0.3048,
            Self::Inches => 0.0254,
            Self::NauticalMiles => 1852.0,
        }
    }
}

/// A geographical point
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(EsError::InvalidGeoPoint(format!("{},{}", lat, lon)));
        }

        Ok(Self { lat, lon })
    }

    /// Haversine distance to another point in meters
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_008.8;

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }
}

/// Parses `"lat,lon"` (latitude first)
impl FromStr for GeoPoint {
    type Err = EsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || EsError::InvalidGeoPoint(s.to_string());

        let (lat, lon) = s.split_once(',').ok_or_else(invalid)?;
        let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
        let lon = lon.trim().parse::<f64>().map_err(|_| invalid())?;

        Self::new(lat, lon).map_err(|_| invalid())
    }
}

/// A single sort criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortSpec {
    Field {
        field: String,
        order: SortOrder,
    },
    GeoDistance {
        field: String,
        origin: GeoPoint,
        unit: DistanceUnit,
        order: SortOrder,
    },
}

impl SortSpec {
    /// Sort by a document field
    pub fn field(field: impl Into<String>, ascending: bool) -> Self {
        Self::Field {
            field: field.into(),
            order: SortOrder::from_ascending(ascending),
        }
    }

    /// Sort by distance from `lat_lon`, a `"lat,lon"` string
    pub fn geo_distance(
        field: impl Into<String>,
        lat_lon: &str,
        unit: DistanceUnit,
        ascending: bool,
    ) -> Result<Self> {
        Ok(Self::GeoDistance {
            field: field.into(),
            origin: lat_lon.parse()?,
            unit,
            order: SortOrder::from_ascending(ascending),
        })
    }

    pub fn order(&self) -> SortOrder {
        match self {
            Self::Field { order, .. } | Self::GeoDistance { order, .. } => *order,
        }
    }

    /// Render as an Elasticsearch sort clause
    pub fn to_json(&self) -> Value {
        match self {
            Self::Field { field, order } => keyed(field, json!({ "order": order.to_string() })),
            Self::GeoDistance {
                field,
                origin,
                unit,
                order,
            } => {
                let mut body = serde_json::Map::new();
                body.insert(field.clone(), json!({ "lat": origin.lat, "lon": origin.lon }));
                body.insert("order".to_string(), json!(order.to_string()));
                body.insert("unit".to_string(), json!(unit.to_string()));
                keyed("_geo_distance", Value::Object(body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geo_point() {
        let point: GeoPoint = "22.54, 114.06".parse().unwrap();
        assert_eq!(point.lat, 22.54);
        assert_eq!(point.lon, 114.06);

        assert!("114.06".parse::<GeoPoint>().is_err());
        assert!("north,east".parse::<GeoPoint>().is_err());
        assert!("95.0,10.0".parse::<GeoPoint>().is_err());
    }

    #[test]
    fn test_distance() {
        let berlin = GeoPoint::new(52.52, 13.405).unwrap();
        let paris = GeoPoint::new(48.8566, 2.3522).unwrap();

        let km = berlin.distance_meters(&paris) / DistanceUnit::Kilometers.meters();
        assert!((km - 878.0).abs() < 5.0, "got {}", km);
        assert_eq!(berlin.distance_meters(&berlin), 0.0);
    }

    #[test]
    fn test_distance_unit_parsing() {
        assert_eq!("km".parse::<DistanceUnit>().unwrap(), DistanceUnit::Kilometers);
        assert_eq!("Miles".parse::<DistanceUnit>().unwrap(), DistanceUnit::Miles);
        assert_eq!(DistanceUnit::NauticalMiles.to_string(), "nmi");
        assert!("parsecs".parse::<DistanceUnit>().is_err());
    }

    #[test]
    fn test_field_sort_rendering() {
        assert_eq!(
            SortSpec::field("price", true).to_json(),
            json!({ "price": { "order": "asc" } })
        );
        assert_eq!(
            SortSpec::field("created_at", false).to_json(),
            json!({ "created_at": { "order": "desc" } })
        );
    }

    #[test]
    fn test_geo_sort_rendering() {
        let sort = SortSpec::geo_distance("location", "22.5,114.0", DistanceUnit::Kilometers, true)
            .unwrap();
        assert_eq!(
            sort.to_json(),
            json!({
                "_geo_distance": {
                    "location": { "lat": 22.5, "lon": 114.0 },
                    "order": "asc",
                    "unit": "km"
                }
            })
        );
        assert_eq!(sort.order(), SortOrder::Ascending);
    }
}
