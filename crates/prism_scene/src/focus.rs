//! Per-owner focus subsystem
//!
//! Every owner carries its own focus manager; the scene decides which owner
//! holds focus (see the attach/detach protocol in
//! [`scene`](crate::scene)), and mirrors that decision into the manager via
//! [`take_focus`](FocusManager::take_focus) /
//! [`release_focus`](FocusManager::release_focus). Key events reach the
//! focused node first and bubble up the ancestor chain until consumed.

use prism_core::KeyEvent;

use crate::node::{KeyHandler, NodeKey, NodeTree};

/// Focus state for one owner's tree
#[derive(Default)]
pub struct FocusManager {
    focused: Option<NodeKey>,
    /// Mirror of the scene-level "this owner holds focus" decision
    has_focus: bool,
}

impl FocusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene granted focus to this owner
    pub fn take_focus(&mut self) {
        if !self.has_focus {
            tracing::debug!("owner focus taken");
        }
        self.has_focus = true;
    }

    /// Scene moved focus away from this owner
    pub fn release_focus(&mut self) {
        if self.has_focus {
            tracing::debug!("owner focus released");
        }
        self.has_focus = false;
        self.focused = None;
    }

    pub fn has_focus(&self) -> bool {
        self.has_focus
    }

    /// Focus a specific node within this owner, or clear with `None`.
    /// Nodes not flagged focusable are rejected.
    pub fn request_focus(&mut self, tree: &NodeTree, node: Option<NodeKey>) -> bool {
        match node {
            Some(key) => {
                let focusable = tree.get(key).is_some_and(|n| n.focusable);
                if focusable {
                    self.focused = Some(key);
                }
                focusable
            }
            None => {
                self.focused = None;
                true
            }
        }
    }

    pub fn focused_node(&self) -> Option<NodeKey> {
        self.focused
    }

    /// Drop focus if it points at a node no longer in the tree
    pub fn prune(&mut self, tree: &NodeTree) {
        if let Some(key) = self.focused {
            if !tree.contains(key) {
                self.focused = None;
            }
        }
    }

    /// Handlers on the chain from the focused node to the root, in
    /// dispatch order. The caller invokes them until one consumes.
    pub fn key_dispatch_chain(&self, tree: &NodeTree) -> Vec<KeyHandler> {
        let mut chain = Vec::new();
        let mut cursor = self.focused;
        while let Some(key) = cursor {
            let Some(node) = tree.get(key) else { break };
            if let Some(handler) = &node.key_handler {
                chain.push(handler.clone());
            }
            cursor = node.parent();
        }
        chain
    }

    /// Dispatch a key event through the focused chain; returns consumed
    pub fn dispatch_key(&self, tree: &NodeTree, event: &KeyEvent) -> bool {
        if !self.has_focus {
            return false;
        }
        for handler in self.key_dispatch_chain(tree) {
            if handler(event) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LayoutNode;
    use prism_core::{Key, Rect};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn focusable_node(rect: Rect) -> LayoutNode {
        let mut node = LayoutNode::with_rect(rect);
        node.focusable = true;
        node
    }

    #[test]
    fn test_request_focus_rejects_non_focusable() {
        let mut tree = NodeTree::new();
        let plain = tree.insert(None, LayoutNode::with_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let target = tree.insert(None, focusable_node(Rect::new(0.0, 0.0, 10.0, 10.0)));

        let mut focus = FocusManager::new();
        focus.take_focus();

        assert!(!focus.request_focus(&tree, Some(plain)));
        assert_eq!(focus.focused_node(), None);

        assert!(focus.request_focus(&tree, Some(target)));
        assert_eq!(focus.focused_node(), Some(target));
    }

    #[test]
    fn test_key_bubbles_until_consumed() {
        let mut tree = NodeTree::new();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let mut root = LayoutNode::with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        let outer_log = Rc::clone(&log);
        root.key_handler = Some(Rc::new(move |_| {
            outer_log.borrow_mut().push("root");
            true
        }));
        let root = tree.insert(None, root);

        let mut child = focusable_node(Rect::new(0.0, 0.0, 10.0, 10.0));
        let inner_log = Rc::clone(&log);
        child.key_handler = Some(Rc::new(move |_| {
            inner_log.borrow_mut().push("child");
            false
        }));
        let child = tree.insert(Some(root), child);

        let mut focus = FocusManager::new();
        focus.take_focus();
        focus.request_focus(&tree, Some(child));

        assert!(focus.dispatch_key(&tree, &KeyEvent::pressed(Key::Enter)));
        assert_eq!(*log.borrow(), vec!["child", "root"]);
    }

    #[test]
    fn test_unfocused_owner_consumes_nothing() {
        let mut tree = NodeTree::new();
        let mut node = focusable_node(Rect::new(0.0, 0.0, 10.0, 10.0));
        node.key_handler = Some(Rc::new(|_| true));
        let key = tree.insert(None, node);

        let mut focus = FocusManager::new();
        focus.take_focus();
        focus.request_focus(&tree, Some(key));
        focus.release_focus();

        assert!(!focus.dispatch_key(&tree, &KeyEvent::pressed(Key::Space)));
    }

    #[test]
    fn test_prune_clears_stale_focus() {
        let mut tree = NodeTree::new();
        let key = tree.insert(None, focusable_node(Rect::new(0.0, 0.0, 10.0, 10.0)));

        let mut focus = FocusManager::new();
        focus.take_focus();
        focus.request_focus(&tree, Some(key));

        tree.remove(key);
        focus.prune(&tree);
        assert_eq!(focus.focused_node(), None);
    }
}
