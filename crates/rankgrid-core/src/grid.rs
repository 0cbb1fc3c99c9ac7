//! Geographic lattice around a business location.
//!
//! Mirrors how the ranking service lays out its checks: an `N x N` grid
//! spanning `radius_km` on every side of the centre. The longitude offset is
//! scaled by latitude so the physical spacing stays roughly equal.

use serde::{Deserialize, Serialize};

const KM_PER_LAT_DEGREE: f64 = 111.0;

/// Map zoom the service uses when none is given.
pub const DEFAULT_ZOOM: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Generate the `size x size` lattice centred on `center`, row-major.
///
/// Rows run from the southern edge to the northern edge and columns from
/// west to east. A size of 1 yields just the centre; a size of 0 yields an
/// empty grid.
#[must_use]
pub fn grid_coordinates(center: GridPoint, size: u8, radius_km: f64) -> Vec<GridPoint> {
    let lat_offset = radius_km / KM_PER_LAT_DEGREE;
    let lng_offset = radius_km / (KM_PER_LAT_DEGREE * center.lat.to_radians().cos());
    let step = if size > 1 {
        2.0 / f64::from(size - 1)
    } else {
        0.0
    };

    let mut points = Vec::with_capacity(usize::from(size) * usize::from(size));
    for row in 0..size {
        for col in 0..size {
            let (lat_factor, lng_factor) = if size > 1 {
                (
                    -1.0 + f64::from(row) * step,
                    -1.0 + f64::from(col) * step,
                )
            } else {
                (0.0, 0.0)
            };
            points.push(GridPoint {
                lat: center.lat + lat_factor * lat_offset,
                lng: center.lng + lng_factor * lng_offset,
            });
        }
    }
    points
}

/// Render a point the way the upstream provider expects: `"lat,lng,zoom"`
/// with six decimals. Zoom is clamped to 1..=20.
#[must_use]
pub fn format_api_coordinate(point: GridPoint, zoom: u8) -> String {
    let zoom = zoom.clamp(1, 20);
    format!("{:.6},{:.6},{zoom}", point.lat, point.lng)
}
