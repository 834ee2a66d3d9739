use std::fmt;
use std::rc::Rc;

use crate::coords::{Affine, ColorRgba, Quad, Vec2};
use crate::render::Drawable;

use super::anchor::{Anchor, Axes, FillMode};

/// Generational handle to a node in a [`SceneTree`](super::SceneTree).
///
/// A handle goes stale when its node is removed; a later node reusing the
/// slot gets a new generation.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    #[inline]
    pub const fn index(self) -> u32 {
        self.idx
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@gen{})", self.idx, self.generation)
    }
}

/// Local layout attributes of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub position: Vec2,
    pub size: Vec2,
    pub scale: Vec2,
    pub shear: Vec2,
    /// Degrees, counter-clockwise.
    pub rotation: f32,
    pub alpha: f32,
    pub colour: ColorRgba,
    /// Point on the parent that `position` is measured from.
    pub anchor: Anchor,
    /// Point on this node that sits at `position`.
    pub origin: Anchor,
    pub relative_position_axes: Axes,
    pub relative_size_axes: Axes,
    pub fill_mode: FillMode,
    /// Width / height used by `fill_mode`.
    pub fill_aspect_ratio: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            size: Vec2::ONE,
            scale: Vec2::ONE,
            shear: Vec2::ZERO,
            rotation: 0.0,
            alpha: 1.0,
            colour: ColorRgba::WHITE,
            anchor: Anchor::BOTTOM_LEFT,
            origin: Anchor::BOTTOM_LEFT,
            relative_position_axes: Axes::empty(),
            relative_size_axes: Axes::empty(),
            fill_mode: FillMode::None,
            fill_aspect_ratio: 1.0,
        }
    }
}

/// World-space values derived from a node's layout and its ancestors.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Resolved {
    pub transform: Affine,
    pub absolute_size: Vec2,
    pub draw_quad: Quad,
    pub draw_colour: ColorRgba,
}

impl Default for Resolved {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            absolute_size: Vec2::ZERO,
            draw_quad: Quad::from_size(Vec2::ZERO, &Affine::IDENTITY),
            draw_colour: ColorRgba::WHITE,
        }
    }
}

impl Resolved {
    /// Resolves `layout` against its parent, or against identity, zero size
    /// and white for a root.
    pub fn resolve(layout: &Layout, parent: Option<&Resolved>) -> Resolved {
        let base = Resolved::default();
        let parent = parent.unwrap_or(&base);
        let parent_size = parent.absolute_size;

        let position = layout.relative_position_axes.apply(layout.position, parent_size)
            + layout.anchor.factor().mul_components(parent_size);

        let size = layout.relative_size_axes.apply(layout.size, parent_size);
        let size = layout.fill_mode.apply(size, layout.fill_aspect_ratio);

        let origin_offset = -layout.origin.factor().mul_components(size);

        let transform = parent.transform
            * Affine::translate(position)
            * Affine::rotate_degrees(layout.rotation)
            * Affine::shear(layout.shear)
            * Affine::scale(layout.scale)
            * Affine::translate(origin_offset);

        Resolved {
            transform,
            absolute_size: size,
            draw_quad: Quad::from_size(size, &transform),
            draw_colour: parent.draw_colour
                * layout.colour
                * ColorRgba::new(1.0, 1.0, 1.0, layout.alpha),
        }
    }
}

/// Arena entry.
pub(crate) struct Node {
    pub layout: Layout,
    pub resolved: Resolved,
    pub invalidated: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub container: bool,
    pub drawable: Option<Rc<dyn Drawable>>,
}

impl Node {
    pub fn new(container: bool, drawable: Option<Rc<dyn Drawable>>) -> Self {
        Self {
            layout: Layout::default(),
            resolved: Resolved::default(),
            invalidated: true,
            parent: None,
            children: Vec::new(),
            container,
            drawable,
        }
    }
}
