// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle distance and group centroid helpers.

use crate::models::Coordinates;
use geo::{Centroid, MultiPoint, Point};

/// Mean Earth radius used for all distance math (km).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points in kilometers.
///
/// No range validation; callers check coordinates first.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Arithmetic mean of latitudes and longitudes.
///
/// Planar average, not a spherical mean: it is off near the antimeridian
/// and the poles.
pub fn planar_centroid(points: &[Coordinates]) -> Option<Coordinates> {
    let multi: MultiPoint<f64> = points.iter().copied().map(Point::from).collect();
    multi.centroid().map(Coordinates::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = Coordinates::new(37.3861, -122.0839);
        assert_eq!(distance_km(p, p), 0.0);
    }

    #[test]
    fn test_quarter_meridian() {
        // Equator to pole is a quarter of the circumference.
        let d = distance_km(Coordinates::new(0.0, 0.0), Coordinates::new(90.0, 0.0));
        let expected = std::f64::consts::PI * EARTH_RADIUS_KM / 2.0;
        assert!((d - expected).abs() < 1e-6, "got {}", d);
    }

    #[test]
    fn test_centroid_is_mean() {
        let c = planar_centroid(&[
            Coordinates::new(10.0, 20.0),
            Coordinates::new(20.0, 40.0),
            Coordinates::new(30.0, 0.0),
        ])
        .unwrap();
        assert!((c.latitude - 20.0).abs() < 1e-12);
        assert!((c.longitude - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_empty() {
        assert!(planar_centroid(&[]).is_none());
    }
}
