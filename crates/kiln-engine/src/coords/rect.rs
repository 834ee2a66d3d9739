use super::Vec2;

/// Axis-aligned rectangle. Used for normalised UV sub-rectangles of a
/// texture page.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Maps a point in `[0,1]²` into this rectangle.
    #[inline]
    pub fn lerp(self, t: Vec2) -> Vec2 {
        self.origin + self.size.mul_components(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_maps_unit_corners() {
        let r = Rect::new(0.25, 0.5, 0.5, 0.25);
        assert_eq!(r.lerp(Vec2::ZERO), Vec2::new(0.25, 0.5));
        assert_eq!(r.lerp(Vec2::ONE), Vec2::new(0.75, 0.75));
    }

    #[test]
    fn lerp_centre_is_midpoint() {
        let r = Rect::new(0.0, 0.0, 0.5, 0.5);
        assert_eq!(r.lerp(Vec2::splat(0.5)), Vec2::splat(0.25));
    }
}
