//! Slot targets and their reconcilers
//!
//! A node slot owns the siblings strictly between two anchors. Updates walk
//! those siblings and the new items in lockstep: a purely positional diff,
//! with no attempt to detect moved items.

use crate::dom::{DomError, Node, NodeKind};
use crate::template::{Resolved, SlotDescriptor};

/// Sibling range between two anchor nodes, both exclusive
#[derive(Debug)]
pub(crate) struct NodeRange {
    start: Node,
    end: Node,
}

impl NodeRange {
    /// Range starting at `start` and ending at its current next sibling
    pub(crate) fn after(start: Node) -> Option<Self> {
        let end = start.next_sibling()?;
        Some(Self { start, end })
    }

    /// Make the range hold exactly the nodes for `items`
    pub(crate) fn apply(&self, items: &[Resolved]) -> Result<(), DomError> {
        let parent = self.start.parent().ok_or(DomError::BrokenRange)?;
        let mut cursor = self.start.next_sibling().ok_or(DomError::BrokenRange)?;

        for item in items {
            let existing = if cursor.ptr_eq(&self.end) {
                None
            } else {
                let existing = cursor.clone();
                cursor = existing.next_sibling().ok_or(DomError::BrokenRange)?;
                Some(existing)
            };

            let desired = match item {
                Resolved::Empty => None,
                Resolved::Text(text) => match &existing {
                    Some(node) if node.kind() == NodeKind::Text => {
                        if node.data().as_deref() != Some(&**text) {
                            node.set_data(text);
                        }
                        Some(node.clone())
                    }
                    _ => Some(Node::text(&**text)),
                },
                Resolved::Node(node) => Some(node.clone()),
                Resolved::Template(template) => {
                    template.instance.as_ref().map(|instance| instance.root().clone())
                }
            };

            match (existing, desired) {
                (Some(old), Some(new)) if old.ptr_eq(&new) => {}
                (Some(old), Some(new)) => {
                    // The replacement may be the very node the cursor points at
                    if new.ptr_eq(&cursor) {
                        cursor = cursor.next_sibling().ok_or(DomError::BrokenRange)?;
                    }
                    parent.replace_child(&new, &old)?;
                }
                (Some(old), None) => parent.remove_child(&old)?,
                (None, Some(new)) => parent.insert_before(&new, Some(&self.end))?,
                (None, None) => {}
            }
        }

        // Whatever is left belonged to items that no longer exist
        while !cursor.ptr_eq(&self.end) {
            let next = cursor.next_sibling().ok_or(DomError::BrokenRange)?;
            parent.remove_child(&cursor)?;
            cursor = next;
        }
        Ok(())
    }
}

/// Concrete location of one instance slot
#[derive(Debug)]
pub(crate) enum SlotTarget {
    Nodes(NodeRange),
    /// The whole attribute value is one expression
    AttributeValue { element: Node, name: String },
    /// Literal text interleaved with expressions
    AttributeTemplate {
        element: Node,
        name: String,
        strings: Vec<String>,
    },
}

impl SlotTarget {
    /// Build the target for `descriptor` at the node found at its position
    pub(crate) fn locate(descriptor: &SlotDescriptor, node: Node) -> Option<Self> {
        match descriptor {
            SlotDescriptor::Node { .. } => NodeRange::after(node).map(SlotTarget::Nodes),
            SlotDescriptor::Attribute { name, .. } if descriptor.is_whole_attribute() => {
                Some(SlotTarget::AttributeValue {
                    element: node,
                    name: name.clone(),
                })
            }
            SlotDescriptor::Attribute { name, strings, .. } => Some(SlotTarget::AttributeTemplate {
                element: node,
                name: name.clone(),
                strings: strings.clone(),
            }),
        }
    }

    pub(crate) fn apply(&self, items: &[Resolved]) -> Result<(), DomError> {
        match self {
            SlotTarget::Nodes(range) => range.apply(items),
            SlotTarget::AttributeValue { element, name } => {
                let value: String = items.iter().filter_map(Resolved::text).collect();
                write_attribute(element, name, &value);
                Ok(())
            }
            SlotTarget::AttributeTemplate {
                element,
                name,
                strings,
            } => {
                write_attribute(element, name, &interleave(strings, items));
                Ok(())
            }
        }
    }
}

/// Rebuild an attribute value from its literal strings and the item at each
/// expression position; non-text items contribute nothing
fn interleave(strings: &[String], items: &[Resolved]) -> String {
    let mut value = String::new();
    let Some((last, leading)) = strings.split_last() else {
        return value;
    };
    for (position, literal) in leading.iter().enumerate() {
        value.push_str(literal);
        if let Some(text) = items.get(position).and_then(Resolved::text) {
            value.push_str(text);
        }
    }
    value.push_str(last);
    value
}

fn write_attribute(element: &Node, name: &str, value: &str) {
    if element.attribute(name).as_deref() != Some(value) {
        element.set_attribute(name, value);
    }
}
