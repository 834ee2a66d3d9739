use bitflags::bitflags;

use crate::coords::Vec2;

bitflags! {
    /// A point on a rectangle, as a combination of one horizontal and one
    /// vertical flag. No flags means bottom-left.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Anchor: u8 {
        const CENTRE = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
        const TOP = 1 << 3;

        const BOTTOM_LEFT = 0;
        const BOTTOM_CENTRE = Self::CENTRE.bits();
        const BOTTOM_RIGHT = Self::RIGHT.bits();
        const MIDDLE_LEFT = Self::MIDDLE.bits();
        const MIDDLE_CENTRE = Self::MIDDLE.bits() | Self::CENTRE.bits();
        const MIDDLE_RIGHT = Self::MIDDLE.bits() | Self::RIGHT.bits();
        const TOP_LEFT = Self::TOP.bits();
        const TOP_CENTRE = Self::TOP.bits() | Self::CENTRE.bits();
        const TOP_RIGHT = Self::TOP.bits() | Self::RIGHT.bits();
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::BOTTOM_LEFT
    }
}

impl Anchor {
    /// Position of the anchor as a fraction of the rectangle size.
    pub fn factor(self) -> Vec2 {
        let x = if self.contains(Self::CENTRE) {
            0.5
        } else if self.contains(Self::RIGHT) {
            1.0
        } else {
            0.0
        };
        let y = if self.contains(Self::TOP) {
            1.0
        } else if self.contains(Self::MIDDLE) {
            0.5
        } else {
            0.0
        };
        Vec2::new(x, y)
    }
}

bitflags! {
    /// Axes on which a value is relative to the parent's size.
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Axes: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const BOTH = Self::X.bits() | Self::Y.bits();
    }
}

impl Axes {
    /// Multiplies the flagged components of `value` by `parent`.
    pub fn apply(self, value: Vec2, parent: Vec2) -> Vec2 {
        Vec2::new(
            if self.contains(Self::X) { value.x * parent.x } else { value.x },
            if self.contains(Self::Y) { value.y * parent.y } else { value.y },
        )
    }
}

/// Aspect-preserving resize applied after relative sizing.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FillMode {
    #[default]
    None,
    /// Cover: the larger of the two candidate widths wins.
    Fill,
    /// Contain: the smaller of the two candidate widths wins.
    Fit,
}

impl FillMode {
    /// Resizes `size` to the aspect `ratio` (width / height).
    ///
    /// A ratio that is not a positive finite number leaves `size` as is.
    pub fn apply(self, size: Vec2, ratio: f32) -> Vec2 {
        if !(ratio.is_finite() && ratio > 0.0) {
            return size;
        }
        let side = match self {
            FillMode::None => return size,
            FillMode::Fill => size.x.max(size.y * ratio),
            FillMode::Fit => size.x.min(size.y * ratio),
        };
        Vec2::new(side, side / ratio)
    }
}
