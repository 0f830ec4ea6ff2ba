//! Layout-node tree
//!
//! Each [`Owner`](crate::owner::Owner) owns one of these trees. The tree is
//! deliberately minimal: parent-relative rects, handlers, and the flags the
//! routing core hit-tests against. The full measurement algorithm for
//! individual elements lives in the layout engine collaborator; this tree
//! only resolves absolute rects bounded by the owner's constraints and
//! answers hit tests.

use std::rc::Rc;

use prism_core::{Canvas, Color, KeyEvent, Point, PointerInputEvent, Rect, Size};
use slotmap::SlotMap;
use smallvec::SmallVec;

slotmap::new_key_type! {
    /// Key of one node in an owner's layout tree
    pub struct NodeKey;
}

/// Pointer-input handler attached to a node
pub type PointerHandler = Rc<dyn Fn(&PointerInputEvent)>;

/// Key-event handler attached to a node; returns whether consumed
pub type KeyHandler = Rc<dyn Fn(&KeyEvent) -> bool>;

/// Position callback fired when a node's resolved rect changes
pub type MovedCallback = Rc<dyn Fn(Rect)>;

/// One node in the layout tree
#[derive(Default)]
pub struct LayoutNode {
    /// Requested rect, relative to the parent's origin
    pub rect: Rect,
    /// Background fill painted by [`NodeTree::draw`]; `None` paints nothing
    pub background: Option<Color>,
    /// Whether the focus subsystem may focus this node
    pub focusable: bool,
    /// Node hosts an embedded foreign (native platform) view; such nodes
    /// must win hit tests before the engine's synthetic dispatch claims
    /// the touch
    pub interop_view: bool,
    pub pointer_handler: Option<PointerHandler>,
    pub key_handler: Option<KeyHandler>,
    pub on_moved: Option<MovedCallback>,

    children: SmallVec<[NodeKey; 4]>,
    parent: Option<NodeKey>,
    /// Absolute rect, valid after the last resolve
    resolved: Rect,
}

impl LayoutNode {
    pub fn with_rect(rect: Rect) -> Self {
        Self {
            rect,
            ..Default::default()
        }
    }

    /// Absolute (owner-local) rect from the last layout pass
    pub fn resolved_rect(&self) -> Rect {
        self.resolved
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }
}

/// Slotmap-backed tree of layout nodes with an implicit root
pub struct NodeTree {
    nodes: SlotMap<NodeKey, LayoutNode>,
    /// Top-level nodes, in child order (later = painted on top)
    top_level: SmallVec<[NodeKey; 4]>,
    needs_layout: bool,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTree {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            top_level: SmallVec::new(),
            needs_layout: false,
        }
    }

    /// Insert a node under `parent`, or at the top level when `None`
    pub fn insert(&mut self, parent: Option<NodeKey>, node: LayoutNode) -> NodeKey {
        let mut node = node;
        node.parent = parent;
        let key = self.nodes.insert(node);
        match parent {
            Some(parent) => self.nodes[parent].children.push(key),
            None => self.top_level.push(key),
        }
        self.needs_layout = true;
        key
    }

    /// Remove a node and its subtree
    pub fn remove(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        match node.parent {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.children.retain(|c| *c != key);
                }
            }
            None => self.top_level.retain(|c| *c != key),
        }
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            if let Some(node) = self.nodes.remove(key) {
                stack.extend(node.children);
            }
        }
        self.needs_layout = true;
    }

    /// Drop every node (used when the composition root is replaced)
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.top_level.clear();
        self.needs_layout = true;
    }

    pub fn get(&self, key: NodeKey) -> Option<&LayoutNode> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut LayoutNode> {
        self.needs_layout = true;
        self.nodes.get_mut(key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn top_level(&self) -> &[NodeKey] {
        &self.top_level
    }

    /// Whether a resolve pass is owed
    pub fn needs_layout(&self) -> bool {
        self.needs_layout
    }

    pub fn mark_needs_layout(&mut self) {
        self.needs_layout = true;
    }

    /// Resolve absolute rects bounded by `max` and fire position callbacks
    /// for nodes that moved. Returns the bounding box of top-level
    /// children (the owner's content size).
    pub fn resolve_layout(&mut self, max: Size) -> Size {
        let mut moved: Vec<(MovedCallback, Rect)> = Vec::new();
        let mut content = Rect::ZERO;

        let top_level: SmallVec<[NodeKey; 4]> = self.top_level.clone();
        for key in top_level {
            self.resolve_node(key, Point::ZERO, max, &mut moved);
            if let Some(node) = self.nodes.get(key) {
                content = content.union(node.resolved);
            }
        }
        self.needs_layout = false;

        // Callbacks run after the pass so they observe a consistent tree
        for (callback, rect) in moved {
            callback(rect);
        }

        content.size
    }

    fn resolve_node(
        &mut self,
        key: NodeKey,
        parent_origin: Point,
        max: Size,
        moved: &mut Vec<(MovedCallback, Rect)>,
    ) {
        let (resolved, children) = {
            let node = &self.nodes[key];
            let origin = parent_origin.offset(node.rect.x(), node.rect.y());
            let size = Size::new(
                node.rect.width().min(max.width),
                node.rect.height().min(max.height),
            );
            (Rect::from_origin_size(origin, size), node.children.clone())
        };

        let node = &mut self.nodes[key];
        if node.resolved != resolved {
            node.resolved = resolved;
            if let Some(callback) = &node.on_moved {
                moved.push((Rc::clone(callback), resolved));
            }
        }

        for child in children {
            self.resolve_node(child, resolved.origin, max, moved);
        }
    }

    /// Deepest node containing `position` (owner-local coordinates).
    /// Later siblings win, matching paint order.
    pub fn hit_test(&self, position: Point) -> Option<NodeKey> {
        for key in self.top_level.iter().rev() {
            if let Some(hit) = self.hit_test_node(*key, position) {
                return Some(hit);
            }
        }
        None
    }

    fn hit_test_node(&self, key: NodeKey, position: Point) -> Option<NodeKey> {
        let node = self.nodes.get(key)?;
        if !node.resolved.contains(position) {
            return None;
        }
        for child in node.children.iter().rev() {
            if let Some(hit) = self.hit_test_node(*child, position) {
                return Some(hit);
            }
        }
        Some(key)
    }

    /// Whether `position` lands on a node owned by an embedded foreign
    /// view, checking the whole hit chain from the deepest node up
    pub fn hit_test_interop(&self, position: Point) -> bool {
        let mut cursor = self.hit_test(position);
        while let Some(key) = cursor {
            let node = &self.nodes[key];
            if node.interop_view {
                return true;
            }
            cursor = node.parent;
        }
        false
    }

    /// Paint node backgrounds in tree order (parents under children)
    pub fn draw(&self, canvas: &mut dyn Canvas) {
        for key in &self.top_level {
            self.draw_node(*key, canvas);
        }
    }

    fn draw_node(&self, key: NodeKey, canvas: &mut dyn Canvas) {
        let node = &self.nodes[key];
        if let Some(color) = node.background {
            canvas.fill_rect(node.resolved, color);
        }
        for child in &node.children {
            self.draw_node(*child, canvas);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_resolve_layout_content_size() {
        let mut tree = NodeTree::new();
        tree.insert(None, LayoutNode::with_rect(Rect::new(0.0, 0.0, 100.0, 50.0)));
        tree.insert(None, LayoutNode::with_rect(Rect::new(50.0, 40.0, 100.0, 50.0)));

        let content = tree.resolve_layout(Size::new(1000.0, 1000.0));
        assert_eq!(content, Size::new(150.0, 90.0));
        assert!(!tree.needs_layout());
    }

    #[test]
    fn test_resolve_clamps_to_constraints() {
        let mut tree = NodeTree::new();
        let key = tree.insert(None, LayoutNode::with_rect(Rect::new(0.0, 0.0, 500.0, 500.0)));

        let content = tree.resolve_layout(Size::new(200.0, 100.0));
        assert_eq!(content, Size::new(200.0, 100.0));
        assert_eq!(
            tree.get(key).unwrap().resolved_rect(),
            Rect::new(0.0, 0.0, 200.0, 100.0)
        );
    }

    #[test]
    fn test_hit_test_deepest_later_sibling_wins() {
        let mut tree = NodeTree::new();
        let root = tree.insert(None, LayoutNode::with_rect(Rect::new(0.0, 0.0, 200.0, 200.0)));
        let _under = tree.insert(
            Some(root),
            LayoutNode::with_rect(Rect::new(10.0, 10.0, 100.0, 100.0)),
        );
        let over = tree.insert(
            Some(root),
            LayoutNode::with_rect(Rect::new(10.0, 10.0, 100.0, 100.0)),
        );
        tree.resolve_layout(Size::new(200.0, 200.0));

        assert_eq!(tree.hit_test(Point::new(50.0, 50.0)), Some(over));
        assert_eq!(tree.hit_test(Point::new(150.0, 150.0)), Some(root));
        assert_eq!(tree.hit_test(Point::new(300.0, 300.0)), None);
    }

    #[test]
    fn test_hit_test_interop_checks_chain() {
        let mut tree = NodeTree::new();
        let mut host = LayoutNode::with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        host.interop_view = true;
        let host = tree.insert(None, host);
        tree.insert(
            Some(host),
            LayoutNode::with_rect(Rect::new(10.0, 10.0, 20.0, 20.0)),
        );
        tree.resolve_layout(Size::new(100.0, 100.0));

        // Hit lands on the child but the interop host owns the chain
        assert!(tree.hit_test_interop(Point::new(15.0, 15.0)));
        assert!(!tree.hit_test_interop(Point::new(200.0, 200.0)));
    }

    #[test]
    fn test_on_moved_fires_only_on_change() {
        let mut tree = NodeTree::new();
        let positions: Rc<RefCell<Vec<Rect>>> = Rc::new(RefCell::new(Vec::new()));

        let mut node = LayoutNode::with_rect(Rect::new(5.0, 5.0, 10.0, 10.0));
        let log = Rc::clone(&positions);
        node.on_moved = Some(Rc::new(move |rect| log.borrow_mut().push(rect)));
        let key = tree.insert(None, node);

        tree.resolve_layout(Size::new(100.0, 100.0));
        assert_eq!(positions.borrow().len(), 1);

        // Clean re-resolve does not re-fire
        tree.mark_needs_layout();
        tree.resolve_layout(Size::new(100.0, 100.0));
        assert_eq!(positions.borrow().len(), 1);

        tree.get_mut(key).unwrap().rect = Rect::new(20.0, 5.0, 10.0, 10.0);
        tree.resolve_layout(Size::new(100.0, 100.0));
        assert_eq!(positions.borrow().len(), 2);
        assert_eq!(positions.borrow()[1], Rect::new(20.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut tree = NodeTree::new();
        let root = tree.insert(None, LayoutNode::with_rect(Rect::new(0.0, 0.0, 50.0, 50.0)));
        let child = tree.insert(
            Some(root),
            LayoutNode::with_rect(Rect::new(0.0, 0.0, 10.0, 10.0)),
        );
        tree.remove(root);
        assert!(!tree.contains(root));
        assert!(!tree.contains(child));
        assert!(tree.is_empty());
    }
}
