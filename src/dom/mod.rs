//! In-memory document tree
//!
//! [`Node`] is a cheap, reference-counted handle to a tree node. Cloning a
//! handle never copies the node: two handles compare equal (and hash equally)
//! exactly when they point at the same node, which is the identity the
//! reconciler relies on.
//!
//! Four node kinds exist: elements, text, comments and fragments. A fragment
//! is a transparent grouping node. Unlike a browser `DocumentFragment` it stays
//! in the tree when inserted, so a template instance keeps one stable root node
//! for as long as it lives; it serializes as its children only.

mod serialize;
mod walker;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use thiserror::Error;

pub(crate) use serialize::is_void_element;
pub use walker::TreeWalker;

/// Errors raised by tree mutations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The reference node is not a child of the parent it was used with
    #[error("node is not a child of this parent")]
    NotAChild,

    /// Inserting the node would make it its own ancestor
    #[error("cannot insert a node into itself or one of its descendants")]
    HierarchyRequest,

    /// Text and comment nodes cannot hold children
    #[error("{kind:?} nodes cannot contain children")]
    NotAContainer { kind: NodeKind },

    /// A node range lost one of its anchors
    #[error("node range is no longer anchored in the tree")]
    BrokenRange,
}

/// The kind of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Fragment,
    Element,
    Text,
    Comment,
}

enum Payload {
    Fragment,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

struct NodeData {
    payload: Payload,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<Node>,
}

/// Handle to a node in a document tree
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

/// Counters of tree activity on the current thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Nodes constructed, including deep clones
    pub created: u64,
    /// Structural changes, character-data writes and attribute writes
    pub mutations: u64,
}

thread_local! {
    static STATS: Cell<TreeStats> = const { Cell::new(TreeStats { created: 0, mutations: 0 }) };
}

/// Snapshot of the tree counters for the current thread
pub fn stats() -> TreeStats {
    STATS.with(Cell::get)
}

fn record_created() {
    STATS.with(|s| {
        let mut stats = s.get();
        stats.created += 1;
        s.set(stats);
    });
}

fn record_mutation() {
    STATS.with(|s| {
        let mut stats = s.get();
        stats.mutations += 1;
        s.set(stats);
    });
}

impl Node {
    fn with_payload(payload: Payload) -> Self {
        record_created();
        Node(Rc::new(RefCell::new(NodeData {
            payload,
            parent: Weak::new(),
            children: Vec::new(),
        })))
    }

    /// Create a detached, empty fragment
    pub fn fragment() -> Self {
        Self::with_payload(Payload::Fragment)
    }

    /// Create a detached element without attributes
    pub fn element(name: impl Into<String>) -> Self {
        Self::with_payload(Payload::Element {
            name: name.into(),
            attributes: Vec::new(),
        })
    }

    /// Create a detached text node
    pub fn text(data: impl Into<String>) -> Self {
        Self::with_payload(Payload::Text(data.into()))
    }

    /// Create a detached comment node
    pub fn comment(data: impl Into<String>) -> Self {
        Self::with_payload(Payload::Comment(data.into()))
    }

    pub fn kind(&self) -> NodeKind {
        match self.0.borrow().payload {
            Payload::Fragment => NodeKind::Fragment,
            Payload::Element { .. } => NodeKind::Element,
            Payload::Text(_) => NodeKind::Text,
            Payload::Comment(_) => NodeKind::Comment,
        }
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A handle that does not keep the node alive
    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    /// Tag name of an element
    pub fn tag_name(&self) -> Option<String> {
        match &self.0.borrow().payload {
            Payload::Element { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    /// Character data of a text or comment node
    pub fn data(&self) -> Option<String> {
        match &self.0.borrow().payload {
            Payload::Text(data) | Payload::Comment(data) => Some(data.clone()),
            _ => None,
        }
    }

    /// Replace the character data of a text or comment node.
    ///
    /// Returns `false` (and changes nothing) for elements and fragments.
    pub fn set_data(&self, value: &str) -> bool {
        let mut node = self.0.borrow_mut();
        match &mut node.payload {
            Payload::Text(data) | Payload::Comment(data) => {
                value.clone_into(data);
                record_mutation();
                true
            }
            _ => false,
        }
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.borrow().parent.upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.borrow().children.first().cloned()
    }

    pub fn last_child(&self) -> Option<Node> {
        self.0.borrow().children.last().cloned()
    }

    fn position(&self) -> Option<(Node, usize)> {
        let parent = self.parent()?;
        let index = parent
            .0
            .borrow()
            .children
            .iter()
            .position(|child| child.ptr_eq(self))?;
        Some((parent, index))
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let (parent, index) = self.position()?;
        let next = parent.0.borrow().children.get(index + 1).cloned();
        next
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let (parent, index) = self.position()?;
        let index = index.checked_sub(1)?;
        let previous = parent.0.borrow().children.get(index).cloned();
        previous
    }

    fn can_contain_children(&self) -> Result<(), DomError> {
        match self.kind() {
            NodeKind::Fragment | NodeKind::Element => Ok(()),
            kind => Err(DomError::NotAContainer { kind }),
        }
    }

    fn is_inclusive_ancestor_of(&self, node: &Node) -> bool {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if candidate.ptr_eq(self) {
                return true;
            }
            current = candidate.parent();
        }
        false
    }

    fn detach(&self) {
        if let Some((parent, index)) = self.position() {
            parent.0.borrow_mut().children.remove(index);
            self.0.borrow_mut().parent = Weak::new();
        }
    }

    fn index_of(&self, child: &Node) -> Option<usize> {
        self.0
            .borrow()
            .children
            .iter()
            .position(|c| c.ptr_eq(child))
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None`. The child is first removed from wherever it currently is.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<(), DomError> {
        self.can_contain_children()?;
        if child.is_inclusive_ancestor_of(self) {
            return Err(DomError::HierarchyRequest);
        }
        if let Some(reference) = reference {
            if reference.ptr_eq(child) {
                return Ok(());
            }
            if self.index_of(reference).is_none() {
                return Err(DomError::NotAChild);
            }
        }

        child.detach();
        let index = match reference {
            Some(reference) => self.index_of(reference).ok_or(DomError::NotAChild)?,
            None => self.child_count(),
        };
        self.0.borrow_mut().children.insert(index, child.clone());
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        record_mutation();
        Ok(())
    }

    pub fn append_child(&self, child: &Node) -> Result<(), DomError> {
        self.insert_before(child, None)
    }

    pub fn remove_child(&self, child: &Node) -> Result<(), DomError> {
        let index = self.index_of(child).ok_or(DomError::NotAChild)?;
        self.0.borrow_mut().children.remove(index);
        child.0.borrow_mut().parent = Weak::new();
        record_mutation();
        Ok(())
    }

    /// Put `new_child` where `old_child` is. `new_child` is first removed
    /// from its current position.
    pub fn replace_child(&self, new_child: &Node, old_child: &Node) -> Result<(), DomError> {
        self.can_contain_children()?;
        if self.index_of(old_child).is_none() {
            return Err(DomError::NotAChild);
        }
        if new_child.ptr_eq(old_child) {
            return Ok(());
        }
        if new_child.is_inclusive_ancestor_of(self) {
            return Err(DomError::HierarchyRequest);
        }

        new_child.detach();
        let index = self.index_of(old_child).ok_or(DomError::NotAChild)?;
        self.0.borrow_mut().children[index] = new_child.clone();
        old_child.0.borrow_mut().parent = Weak::new();
        new_child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        record_mutation();
        Ok(())
    }

    /// Append a freshly built, detached node without bookkeeping.
    pub(crate) fn adopt(&self, child: Node) {
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child);
    }

    pub fn has_attributes(&self) -> bool {
        match &self.0.borrow().payload {
            Payload::Element { attributes, .. } => !attributes.is_empty(),
            _ => false,
        }
    }

    /// All attributes of an element, in insertion order
    pub fn attributes(&self) -> Vec<(String, String)> {
        match &self.0.borrow().payload {
            Payload::Element { attributes, .. } => attributes.clone(),
            _ => Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.0.borrow().payload {
            Payload::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Look an attribute up by ASCII case-insensitive name, returning its
    /// stored name and value
    pub fn find_attribute(&self, name: &str) -> Option<(String, String)> {
        match &self.0.borrow().payload {
            Payload::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .cloned(),
            _ => None,
        }
    }

    /// Set an attribute on an element. Returns `false` for other node kinds.
    pub fn set_attribute(&self, name: &str, value: &str) -> bool {
        let mut node = self.0.borrow_mut();
        let Payload::Element { attributes, .. } = &mut node.payload else {
            return false;
        };
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => value.clone_into(existing),
            None => attributes.push((name.to_string(), value.to_string())),
        }
        record_mutation();
        true
    }

    /// Remove an attribute, returning whether it was present
    pub fn remove_attribute(&self, name: &str) -> bool {
        let mut node = self.0.borrow_mut();
        let Payload::Element { attributes, .. } = &mut node.payload else {
            return false;
        };
        let before = attributes.len();
        attributes.retain(|(n, _)| n != name);
        let removed = attributes.len() != before;
        if removed {
            record_mutation();
        }
        removed
    }

    /// Copy this node and its whole subtree. The copy is detached.
    pub fn deep_clone(&self) -> Node {
        let data = self.0.borrow();
        let payload = match &data.payload {
            Payload::Fragment => Payload::Fragment,
            Payload::Element { name, attributes } => Payload::Element {
                name: name.clone(),
                attributes: attributes.clone(),
            },
            Payload::Text(text) => Payload::Text(text.clone()),
            Payload::Comment(text) => Payload::Comment(text.clone()),
        };
        let copy = Node::with_payload(payload);
        for child in &data.children {
            copy.adopt(child.deep_clone());
        }
        copy
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

/// Non-owning handle to a node, compared and hashed by identity
#[derive(Clone)]
pub struct WeakNode(Weak<RefCell<NodeData>>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }

    /// Whether the node has been dropped
    pub fn is_dropped(&self) -> bool {
        self.0.strong_count() == 0
    }
}

impl PartialEq for WeakNode {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for WeakNode {}

impl Hash for WeakNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Weak::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakNode({:?})", node.kind()),
            None => f.write_str("WeakNode(dropped)"),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({:?} {})", self.kind(), self.to_markup())
    }
}
