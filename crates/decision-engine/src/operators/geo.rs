//! 地理空间操作符：within_radius / in_polygon

use super::OperatorFamily;
use super::params::{as_number, number_field};
use crate::context::EvaluationSession;
use serde_json::Value;

pub struct GeoOperators;

/// 地球平均半径（公里）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// 支持 `{lat, lon}`、`{latitude, longitude}`、`{lat, lng}` 和 `[lat, lon]`
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                lat: number_field(map, &["lat", "latitude"])?,
                lon: number_field(map, &["lon", "lng", "longitude"])?,
            }),
            Value::Array(pair) if pair.len() == 2 => Some(Self {
                lat: as_number(&pair[0])?,
                lon: as_number(&pair[1])?,
            }),
            _ => None,
        }
    }
}

/// Haversine 大圆距离
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// 射线法奇偶判断，x 为经度、y 为纬度
pub fn point_in_polygon(point: GeoPoint, polygon: &[GeoPoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, yi) = (polygon[i].lon, polygon[i].lat);
        let (xj, yj) = (polygon[j].lon, polygon[j].lat);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

impl OperatorFamily for GeoOperators {
    fn name(&self) -> &'static str {
        "geospatial"
    }

    fn operators(&self) -> &'static [&'static str] {
        &["within_radius", "in_polygon"]
    }

    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        if !self.operators().contains(&operator) {
            return None;
        }
        let Some(point) = GeoPoint::from_value(actual) else {
            return Some(false);
        };

        let matched = if operator == "within_radius" {
            radius_target(expected).is_some_and(|(center, radius_km)| {
                session.caches().distance_km(point, center) <= radius_km
            })
        } else {
            let vertices = match expected {
                Value::Object(map) => map.get("polygon").and_then(Value::as_array),
                other => other.as_array(),
            };
            vertices
                .and_then(|vertices| vertices.iter().map(GeoPoint::from_value).collect::<Option<Vec<_>>>())
                .is_some_and(|polygon| point_in_polygon(point, &polygon))
        };
        Some(matched)
    }
}

fn radius_target(expected: &Value) -> Option<(GeoPoint, f64)> {
    let map = expected.as_object()?;
    let center = match map.get("center") {
        Some(center) => GeoPoint::from_value(center)?,
        None => GeoPoint::from_value(expected)?,
    };
    let radius = number_field(map, &["radius_km", "radius"])?;
    (radius >= 0.0).then_some((center, radius))
}
