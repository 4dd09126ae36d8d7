//! Depth-first traversal over element, comment and text nodes

use super::{Node, NodeKind};

/// Walks the subtree below `root` in document order.
///
/// Fragments are descended into but never returned. The walker only keeps
/// its current position, so inserting siblings *before* the current node or
/// editing its attributes during the walk does not disturb it.
pub struct TreeWalker {
    root: Node,
    current: Node,
}

impl TreeWalker {
    pub fn new(root: &Node) -> Self {
        Self {
            root: root.clone(),
            current: root.clone(),
        }
    }

    pub fn current(&self) -> &Node {
        &self.current
    }

    /// Advance to the next shown node, or return `None` at the end of the
    /// subtree (the walker then stays where it was).
    pub fn next_node(&mut self) -> Option<Node> {
        let mut candidate = self.current.clone();
        loop {
            candidate = self.following(&candidate)?;
            if candidate.kind() != NodeKind::Fragment {
                self.current = candidate.clone();
                return Some(candidate);
            }
        }
    }

    fn following(&self, node: &Node) -> Option<Node> {
        if let Some(child) = node.first_child() {
            return Some(child);
        }
        let mut current = node.clone();
        loop {
            if current.ptr_eq(&self.root) {
                return None;
            }
            if let Some(sibling) = current.next_sibling() {
                return Some(sibling);
            }
            current = current.parent()?;
        }
    }
}
