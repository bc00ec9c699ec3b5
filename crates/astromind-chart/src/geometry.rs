use serde::{Deserialize, Serialize};

/// Point in 2D drawing space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Normalize degrees to [0, 360).
pub fn normalize_degrees(value: f64) -> f64 {
    let normalized = value.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Convert an astrological longitude to a drawing-surface point.
///
/// 0° (Aries) sits at 9 o'clock, so the angle is rotated by 180° before the
/// usual polar conversion. Any real angle is accepted.
pub fn polar_to_cartesian(center_x: f64, center_y: f64, radius: f64, angle_degrees: f64) -> Point {
    let angle_rad = (angle_degrees - 180.0).to_radians();
    Point {
        x: center_x + radius * angle_rad.cos(),
        y: center_y + radius * angle_rad.sin(),
    }
}
