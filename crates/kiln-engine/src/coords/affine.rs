use core::ops::Mul;

use super::Vec2;

/// 2D affine transform in column-vector convention.
///
/// ```text
/// | a c e |   | x |
/// | b d f | * | y |
///             | 1 |
/// ```
///
/// `lhs * rhs` applies `rhs` first. A node's world transform is therefore
/// `parent * translate * rotate * shear * scale`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    #[inline]
    pub const fn translate(offset: Vec2) -> Self {
        Affine { e: offset.x, f: offset.y, ..Self::IDENTITY }
    }

    /// Counter-clockwise rotation (with +Y up).
    pub fn rotate_degrees(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Affine { a: cos, b: sin, c: -sin, d: cos, e: 0.0, f: 0.0 }
    }

    /// Maps `(x, y)` to `(x + s.x * y, y + s.y * x)`.
    #[inline]
    pub const fn shear(s: Vec2) -> Self {
        Affine { c: s.x, b: s.y, ..Self::IDENTITY }
    }

    #[inline]
    pub const fn scale(s: Vec2) -> Self {
        Affine { a: s.x, d: s.y, ..Self::IDENTITY }
    }

    #[inline]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    #[inline]
    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.e, self.f)
    }
}

impl Mul for Affine {
    type Output = Affine;

    fn mul(self, rhs: Affine) -> Affine {
        Affine {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            e: self.a * rhs.e + self.c * rhs.f + self.e,
            f: self.b * rhs.e + self.d * rhs.f + self.f,
        }
    }
}
