//! Conversion between WGS84 coordinates and the KMA 5 km forecast grid.
//!
//! The grid is a Lambert conformal conic projection with standard parallels
//! 30°N and 60°N, origin 126°E 38°N placed at grid cell (43, 136).

use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::sync::LazyLock;
use utoipa::ToSchema;

const EARTH_RADIUS_KM: f64 = 6371.00877;
const GRID_SPACING_KM: f64 = 5.0;
const STANDARD_PARALLEL_1: f64 = 30.0;
const STANDARD_PARALLEL_2: f64 = 60.0;
const ORIGIN_LON: f64 = 126.0;
const ORIGIN_LAT: f64 = 38.0;
const ORIGIN_X: f64 = 43.0;
const ORIGIN_Y: f64 = 136.0;

pub const GRID_X_MAX: i32 = 149;
pub const GRID_Y_MAX: i32 = 253;

/// A KMA grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct GridPoint {
    pub nx: i32,
    pub ny: i32,
}

impl GridPoint {
    /// Whether the cell lies within the published 149 × 253 grid.
    pub fn is_valid(&self) -> bool {
        (1..=GRID_X_MAX).contains(&self.nx) && (1..=GRID_Y_MAX).contains(&self.ny)
    }
}

/// Projection constants derived once from the grid definition.
struct Projection {
    /// Earth radius in grid units
    re: f64,
    sn: f64,
    sf: f64,
    ro: f64,
    olon: f64,
}

static PROJECTION: LazyLock<Projection> = LazyLock::new(|| {
    let slat1 = STANDARD_PARALLEL_1.to_radians();
    let slat2 = STANDARD_PARALLEL_2.to_radians();
    let olat = ORIGIN_LAT.to_radians();
    let re = EARTH_RADIUS_KM / GRID_SPACING_KM;

    let sn = (slat1.cos() / slat2.cos()).ln()
        / ((FRAC_PI_4 + slat2 * 0.5).tan() / (FRAC_PI_4 + slat1 * 0.5).tan()).ln();
    let sf = (FRAC_PI_4 + slat1 * 0.5).tan().powf(sn) * slat1.cos() / sn;
    let ro = re * sf / (FRAC_PI_4 + olat * 0.5).tan().powf(sn);

    Projection {
        re,
        sn,
        sf,
        ro,
        olon: ORIGIN_LON.to_radians(),
    }
});

/// Project a latitude/longitude (degrees) onto the nearest grid cell.
pub fn to_grid(lat: f64, lng: f64) -> GridPoint {
    let p = &*PROJECTION;
    let ra = p.re * p.sf / (FRAC_PI_4 + lat.to_radians() * 0.5).tan().powf(p.sn);

    let mut theta = lng.to_radians() - p.olon;
    if theta > PI {
        theta -= 2.0 * PI;
    }
    if theta < -PI {
        theta += 2.0 * PI;
    }
    theta *= p.sn;

    GridPoint {
        nx: (ra * theta.sin() + ORIGIN_X + 0.5).floor() as i32,
        ny: (p.ro - ra * theta.cos() + ORIGIN_Y + 0.5).floor() as i32,
    }
}

/// Latitude/longitude (degrees) of a grid cell's centre.
pub fn to_lat_lng(point: GridPoint) -> (f64, f64) {
    let p = &*PROJECTION;
    let xn = f64::from(point.nx) - ORIGIN_X;
    let yn = p.ro - f64::from(point.ny) + ORIGIN_Y;
    let ra = (xn * xn + yn * yn).sqrt();

    let alat = 2.0 * (p.re * p.sf / ra).powf(1.0 / p.sn).atan() - FRAC_PI_2;
    let theta = xn.atan2(yn);
    let alon = theta / p.sn + p.olon;

    (alat.to_degrees(), alon.to_degrees())
}

/// Rough bounding box of the Korean peninsula and surrounding islands.
pub fn is_within_korea(lat: f64, lng: f64) -> bool {
    (33.0..=43.0).contains(&lat) && (124.5..=132.0).contains(&lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seoul_city_hall() {
        assert_eq!(to_grid(37.5665, 126.9780), GridPoint { nx: 60, ny: 127 });
    }

    #[test]
    fn test_busan() {
        assert_eq!(to_grid(35.1796, 129.0756), GridPoint { nx: 98, ny: 76 });
    }

    #[test]
    fn test_origin_maps_to_origin_cell() {
        assert_eq!(to_grid(38.0, 126.0), GridPoint { nx: 43, ny: 136 });
        let (lat, lng) = to_lat_lng(GridPoint { nx: 43, ny: 136 });
        assert!((lat - 38.0).abs() < 1e-9);
        assert!((lng - 126.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_lands_in_same_cell() {
        for point in [
            GridPoint { nx: 60, ny: 127 },
            GridPoint { nx: 98, ny: 76 },
            GridPoint { nx: 52, ny: 38 },
            GridPoint { nx: 89, ny: 90 },
        ] {
            let (lat, lng) = to_lat_lng(point);
            assert_eq!(to_grid(lat, lng), point);
        }
    }

    #[test]
    fn test_grid_validity() {
        assert!(GridPoint { nx: 1, ny: 1 }.is_valid());
        assert!(GridPoint { nx: 149, ny: 253 }.is_valid());
        assert!(!GridPoint { nx: 0, ny: 100 }.is_valid());
        assert!(!GridPoint { nx: 60, ny: 254 }.is_valid());
    }

    #[test]
    fn test_korea_bounding_box() {
        assert!(is_within_korea(37.5665, 126.9780));
        assert!(is_within_korea(33.0, 124.5));
        assert!(!is_within_korea(35.6762, 139.6503)); // Tokyo
        assert!(!is_within_korea(47.3769, 8.5417)); // Zurich
    }

    #[test]
    fn test_peninsula_maps_to_valid_cells() {
        // The far eastern corners of the bounding box fall off the grid
        let mut lat = 33.0;
        while lat <= 43.0 {
            let mut lng = 124.5;
            while lng <= 131.5 {
                assert!(to_grid(lat, lng).is_valid(), "({}, {}) off grid", lat, lng);
                lng += 0.5;
            }
            lat += 0.5;
        }
    }
}
