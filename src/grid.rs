use crate::types::{GRID_MAX, GridPoint, PixelPoint, Viewport};

/// Map a 0-999 grid point onto viewport pixels.
///
/// `px = floor(gx * W / 999)`, `py = floor(gy * H / 999)`. Coordinates outside
/// the grid are clamped onto it first, so the result always lies within
/// `[0, W] x [0, H]` (note `999` maps to `W` itself, one past the last pixel
/// column).
pub fn to_pixels(viewport: Viewport, point: GridPoint) -> PixelPoint {
    PixelPoint {
        x: scale_axis(point.x, viewport.width),
        y: scale_axis(point.y, viewport.height),
    }
}

fn scale_axis(value: f64, extent: u32) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let value = value.clamp(0.0, GRID_MAX);
    // Multiply before dividing so exact grid edges land on exact pixels.
    (value * f64::from(extent) / GRID_MAX).floor() as i64
}
