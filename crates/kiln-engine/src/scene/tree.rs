use std::rc::Rc;

use thiserror::Error;

use crate::coords::{Affine, ColorRgba, Quad, Vec2, Viewport};
use crate::error::RenderError;
use crate::render::{DrawInfo, Drawable, RendererContext};

use super::anchor::{Anchor, Axes, FillMode};
use super::node::{Layout, Node, NodeId, Resolved};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("{0:?} no longer exists")]
    StaleNode(NodeId),

    #[error("{child:?} already has a parent")]
    AlreadyParented { child: NodeId },

    #[error("{0:?} cannot hold children")]
    NotAContainer(NodeId),

    #[error("adding {child:?} under {parent:?} would create a cycle")]
    WouldCycle { parent: NodeId, child: NodeId },

    #[error("the root node cannot be reparented or removed")]
    RootNode,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-backed hierarchy of layout nodes.
///
/// The root is a container sized to the viewport. Changing any layout
/// attribute invalidates the node and its whole subtree; resolved values
/// are recomputed lazily on access or during [`queue_draw`](Self::queue_draw).
pub struct SceneTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

macro_rules! layout_setter {
    ($(#[$meta:meta])* $name:ident, $field:ident: $ty:ty) => {
        $(#[$meta])*
        pub fn $name(&mut self, id: NodeId, value: $ty) -> Result<(), SceneError> {
            let node = self.node_mut(id)?;
            if node.layout.$field == value {
                return Ok(());
            }
            node.layout.$field = value;
            self.invalidate(id)
        }
    };
}

impl SceneTree {
    pub fn new(viewport: Viewport) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId { idx: 0, generation: 0 },
        };
        tree.root = tree.insert(Node::new(true, None));
        if let Some(root) = tree.slots[0].node.as_mut() {
            root.layout.size = Vec2::new(viewport.width, viewport.height);
        }
        tree
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    // ── arena ───────────────────────────────────────────────────────────────

    fn insert(&mut self, node: Node) -> NodeId {
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.node = Some(node);
            return NodeId { idx, generation: slot.generation };
        }
        let idx = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, node: Some(node) });
        NodeId { idx, generation: 0 }
    }

    fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.slots
            .get(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(SceneError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(SceneError::StaleNode(id))
    }

    /// A node that may hold children.
    pub fn create_container(&mut self) -> NodeId {
        self.insert(Node::new(true, None))
    }

    /// A leaf node that draws `drawable` over its resolved quad.
    pub fn create_drawable(&mut self, drawable: Rc<dyn Drawable>) -> NodeId {
        self.insert(Node::new(false, Some(drawable)))
    }

    /// A container that also draws `drawable` behind its children.
    pub fn create_drawable_container(&mut self, drawable: Rc<dyn Drawable>) -> NodeId {
        self.insert(Node::new(true, Some(drawable)))
    }

    // ── hierarchy ───────────────────────────────────────────────────────────

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if !self.node(parent)?.container {
            return Err(SceneError::NotAContainer(parent));
        }
        if self.node(child)?.parent.is_some() {
            return Err(SceneError::AlreadyParented { child });
        }
        if child == self.root {
            return Err(SceneError::RootNode);
        }
        if self.is_ancestor_or_self(child, parent)? {
            return Err(SceneError::WouldCycle { parent, child });
        }

        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.invalidate(child)
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, mut of: NodeId) -> Result<bool, SceneError> {
        loop {
            if of == candidate {
                return Ok(true);
            }
            match self.node(of)?.parent {
                Some(parent) => of = parent,
                None => return Ok(false),
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(&self.node(id)?.children)
    }

    /// Detaches `id` from its parent and frees it with its whole subtree.
    /// The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Result<(), SceneError> {
        if id == self.root {
            return Err(SceneError::RootNode);
        }
        if let Some(parent) = self.node(id)?.parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
        }

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let slot = &mut self.slots[next.idx as usize];
            if let Some(node) = slot.node.take() {
                pending.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.idx);
            }
        }
        Ok(())
    }

    // ── layout ──────────────────────────────────────────────────────────────

    pub fn layout(&self, id: NodeId) -> Result<&Layout, SceneError> {
        Ok(&self.node(id)?.layout)
    }

    /// Replaces the whole layout of `id`.
    pub fn set_layout(&mut self, id: NodeId, layout: Layout) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.layout == layout {
            return Ok(());
        }
        node.layout = layout;
        self.invalidate(id)
    }

    layout_setter!(set_position, position: Vec2);
    layout_setter!(set_size, size: Vec2);
    layout_setter!(set_scale, scale: Vec2);
    layout_setter!(set_shear, shear: Vec2);
    layout_setter!(
        /// Degrees, counter-clockwise.
        set_rotation,
        rotation: f32
    );
    layout_setter!(set_alpha, alpha: f32);
    layout_setter!(set_colour, colour: ColorRgba);
    layout_setter!(set_anchor, anchor: Anchor);
    layout_setter!(set_origin, origin: Anchor);
    layout_setter!(set_relative_position_axes, relative_position_axes: Axes);
    layout_setter!(set_relative_size_axes, relative_size_axes: Axes);
    layout_setter!(set_fill_mode, fill_mode: FillMode);
    layout_setter!(set_fill_aspect_ratio, fill_aspect_ratio: f32);

    /// Resizes the root to the new viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), SceneError> {
        self.set_size(self.root, Vec2::new(viewport.width, viewport.height))
    }

    // ── validation ──────────────────────────────────────────────────────────

    /// Marks `id` and every descendant as needing revalidation.
    pub fn invalidate(&mut self, id: NodeId) -> Result<(), SceneError> {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let node = self.node_mut(next)?;
            if node.invalidated && next != id {
                // Already stale; so is everything below it.
                continue;
            }
            node.invalidated = true;
            pending.extend(node.children.iter().copied());
        }
        Ok(())
    }

    pub fn is_invalidated(&self, id: NodeId) -> Result<bool, SceneError> {
        Ok(self.node(id)?.invalidated)
    }

    /// Recomputes resolved values for `id` if stale, revalidating stale
    /// ancestors first. Descendants are left alone.
    pub fn revalidate(&mut self, id: NodeId) -> Result<(), SceneError> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(next) = cursor {
            let node = self.node(next)?;
            if node.invalidated {
                chain.push(next);
            }
            cursor = node.parent;
        }

        for next in chain.into_iter().rev() {
            self.resolve_one(next)?;
        }
        Ok(())
    }

    fn resolve_one(&mut self, id: NodeId) -> Result<(), SceneError> {
        let node = self.node(id)?;
        let parent = match node.parent {
            Some(parent) => Some(self.node(parent)?.resolved),
            None => None,
        };
        let resolved = Resolved::resolve(&node.layout, parent.as_ref());

        let node = self.node_mut(id)?;
        node.resolved = resolved;
        node.invalidated = false;
        Ok(())
    }

    fn resolved(&mut self, id: NodeId) -> Result<Resolved, SceneError> {
        self.revalidate(id)?;
        Ok(self.node(id)?.resolved)
    }

    pub fn world_transform(&mut self, id: NodeId) -> Result<Affine, SceneError> {
        Ok(self.resolved(id)?.transform)
    }

    pub fn absolute_size(&mut self, id: NodeId) -> Result<Vec2, SceneError> {
        Ok(self.resolved(id)?.absolute_size)
    }

    pub fn draw_quad(&mut self, id: NodeId) -> Result<Quad, SceneError> {
        Ok(self.resolved(id)?.draw_quad)
    }

    pub fn draw_colour(&mut self, id: NodeId) -> Result<ColorRgba, SceneError> {
        Ok(self.resolved(id)?.draw_colour)
    }

    // ── drawing ─────────────────────────────────────────────────────────────

    /// Revalidates the tree and queues every drawable front to back.
    ///
    /// Later children are in front of earlier ones, and children are in
    /// front of their parent.
    pub fn queue_draw(&mut self, renderer: &mut RendererContext) -> Result<(), RenderError> {
        let mut pending = vec![(self.root, false)];
        while let Some((id, children_done)) = pending.pop() {
            if children_done {
                let node = self.node(id)?;
                if let Some(drawable) = &node.drawable {
                    let info = DrawInfo::new(node.resolved.draw_quad, node.resolved.draw_colour);
                    renderer.queue_drawable(Rc::clone(drawable), info)?;
                }
                continue;
            }

            if self.node(id)?.invalidated {
                self.resolve_one(id)?;
            }
            pending.push((id, true));
            // Pushed first to last, so the last child is visited first.
            pending.extend(self.node(id)?.children.iter().map(|c| (*c, false)));
        }
        Ok(())
    }
}
