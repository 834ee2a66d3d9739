use super::{Affine, Vec2};

/// Four transformed corners of a node's local rectangle.
///
/// Corner order matches vertex submission order: the shared quad index
/// pattern `(0,1,2),(2,3,0)` splits it along the bottom-left/top-right
/// diagonal.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Quad {
    pub bottom_left: Vec2,
    pub top_left: Vec2,
    pub top_right: Vec2,
    pub bottom_right: Vec2,
}

impl Quad {
    /// Transforms the rectangle `(0, 0, size.x, size.y)`.
    pub fn from_size(size: Vec2, transform: &Affine) -> Self {
        Self {
            bottom_left: transform.transform_point(Vec2::ZERO),
            top_left: transform.transform_point(Vec2::new(0.0, size.y)),
            top_right: transform.transform_point(size),
            bottom_right: transform.transform_point(Vec2::new(size.x, 0.0)),
        }
    }

    #[inline]
    pub fn corners(&self) -> [Vec2; 4] {
        [self.bottom_left, self.top_left, self.top_right, self.bottom_right]
    }

    pub fn center(&self) -> Vec2 {
        (self.bottom_left + self.top_left + self.top_right + self.bottom_right) * 0.25
    }

    /// Point-in-quad test over the two submission triangles (edges inclusive).
    pub fn contains(&self, p: Vec2) -> bool {
        in_triangle(p, self.bottom_left, self.top_left, self.top_right)
            || in_triangle(p, self.top_right, self.bottom_right, self.bottom_left)
    }
}

fn cross(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = cross(a, b, p);
    let d2 = cross(b, c, p);
    let d3 = cross(c, a, p);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}
