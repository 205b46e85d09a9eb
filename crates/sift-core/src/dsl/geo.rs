//! Geospatial primitives for the geo operators.
//!
//! Everything works on plain latitude/longitude degrees. Distances use the
//! haversine formula on a spherical earth; all shape boundaries are
//! inclusive, so a point sitting exactly on an edge or vertex counts as
//! contained.
//!
//! Point operands (and point-valued document fields) are accepted in several
//! shapes:
//! - `{ "lat": 45.7, "lon": 4.8 }`
//! - `{ "latLon": <point> }` or `{ "lat_lon": <point> }`
//! - `[45.7, 4.8]` (latitude first)
//! - `"45.7, 4.8"`

use serde_json::Value;

/// Mean earth radius in meters, per the haversine convention.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Tolerance for the on-edge containment checks.
const EDGE_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a point from latitude and longitude degrees.
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another point, in meters.
    #[must_use]
    pub fn distance_to(self, other: GeoPoint) -> f64 {
        let lat_a = self.lat.to_radians();
        let lat_b = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let h = (d_lat / 2.0).sin().powi(2)
            + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * h.sqrt().asin()
    }
}

/// An axis-aligned latitude/longitude box with inclusive edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Northernmost latitude.
    pub top: f64,
    /// Westernmost longitude.
    pub left: f64,
    /// Southernmost latitude.
    pub bottom: f64,
    /// Easternmost longitude.
    pub right: f64,
}

impl BoundingBox {
    /// Whether the point lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat <= self.top
            && point.lat >= self.bottom
            && point.lon >= self.left
            && point.lon <= self.right
    }
}

/// A simple closed polygon over latitude/longitude vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<GeoPoint>,
}

impl Polygon {
    /// Builds a polygon from at least three vertices.
    ///
    /// Arity is validated by the filter parser; this constructor only wraps
    /// the vertex list.
    #[must_use]
    pub(crate) fn new(vertices: Vec<GeoPoint>) -> Self {
        debug_assert!(vertices.len() >= 3);
        Self { vertices }
    }

    /// The polygon's vertices in the order they were given.
    #[must_use]
    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    /// Point-in-polygon test via ray casting; points on an edge or vertex
    /// count as contained.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        let mut inside = false;
        let mut j = self.vertices.len() - 1;
        for i in 0..self.vertices.len() {
            let a = self.vertices[j];
            let b = self.vertices[i];
            if on_segment(a, b, point) {
                return true;
            }
            if (a.lat > point.lat) != (b.lat > point.lat) {
                let crossing_lon =
                    (b.lon - a.lon) * (point.lat - a.lat) / (b.lat - a.lat) + a.lon;
                if point.lon < crossing_lon {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

fn on_segment(a: GeoPoint, b: GeoPoint, p: GeoPoint) -> bool {
    let cross = (b.lat - a.lat) * (p.lon - a.lon) - (b.lon - a.lon) * (p.lat - a.lat);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    p.lat >= a.lat.min(b.lat) - EDGE_EPSILON
        && p.lat <= a.lat.max(b.lat) + EDGE_EPSILON
        && p.lon >= a.lon.min(b.lon) - EDGE_EPSILON
        && p.lon <= a.lon.max(b.lon) + EDGE_EPSILON
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Extracts a [`GeoPoint`] from any of the accepted JSON point shapes.
///
/// Returns `None` when the value is not a recognizable point; at match time
/// that simply means the document field cannot satisfy a geo condition.
#[must_use]
pub fn parse_point(value: &Value) -> Option<GeoPoint> {
    match value {
        Value::Object(map) => {
            if let (Some(lat), Some(lon)) = (
                map.get("lat").and_then(Value::as_f64),
                map.get("lon").and_then(Value::as_f64),
            ) {
                return Some(GeoPoint::new(lat, lon));
            }
            let inner = map.get("latLon").or_else(|| map.get("lat_lon"))?;
            parse_point(inner)
        }
        Value::Array(items) => {
            if items.len() != 2 {
                return None;
            }
            let lat = items[0].as_f64()?;
            let lon = items[1].as_f64()?;
            Some(GeoPoint::new(lat, lon))
        }
        Value::String(text) => {
            let (lat, lon) = text.split_once(',')?;
            let lat = lat.trim().parse().ok()?;
            let lon = lon.trim().parse().ok()?;
            Some(GeoPoint::new(lat, lon))
        }
        _ => None,
    }
}

/// Parses a distance operand into meters.
///
/// Numbers are taken as meters. Strings carry an optional unit suffix
/// (`mm`, `cm`, `m`, `km`, `ft`, `yd`, `mi` and their long forms); a bare
/// numeric string is meters as well. The error is a human-readable reason
/// used to build the compile error.
pub(crate) fn parse_distance(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(number) => {
            let meters = number
                .as_f64()
                .ok_or_else(|| format!("cannot read `{number}` as meters"))?;
            if meters < 0.0 {
                return Err("distance cannot be negative".to_string());
            }
            Ok(meters)
        }
        Value::String(text) => parse_distance_text(text),
        other => Err(format!(
            "expected a number of meters or a string with a unit, got `{other}`"
        )),
    }
}

fn parse_distance_text(text: &str) -> Result<f64, String> {
    let text = text.trim();
    let unit_start = text
        .find(|c: char| c.is_alphabetic())
        .unwrap_or(text.len());
    let magnitude: f64 = text[..unit_start]
        .trim()
        .parse()
        .map_err(|_| format!("cannot parse `{text}` as a distance"))?;
    if magnitude < 0.0 {
        return Err("distance cannot be negative".to_string());
    }
    let unit = text[unit_start..].trim().to_ascii_lowercase();
    let scale = match unit.as_str() {
        "" | "m" | "meter" | "meters" => 1.0,
        "mm" | "millimeter" | "millimeters" => 0.001,
        "cm" | "centimeter" | "centimeters" => 0.01,
        "km" | "kilometer" | "kilometers" => 1000.0,
        "ft" | "foot" | "feet" => 0.3048,
        "yd" | "yard" | "yards" => 0.9144,
        "mi" | "mile" | "miles" => 1609.344,
        other => return Err(format!("unknown distance unit `{other}`")),
    };
    Ok(magnitude * scale)
}

// ===========================================================================
// Tests
// ===========================================================================
