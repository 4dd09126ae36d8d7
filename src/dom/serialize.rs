//! Markup serialization

use super::{Node, Payload};

/// Elements that never have children or a closing tag
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|void| void.eq_ignore_ascii_case(name))
}

impl Node {
    /// Serialize this node. Fragments serialize as their children.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }

    /// Serialize the children of this node
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            write_node(&child, &mut out);
        }
        out
    }
}

fn write_node(node: &Node, out: &mut String) {
    let data = node.0.borrow();
    match &data.payload {
        Payload::Fragment => {
            for child in &data.children {
                write_node(child, out);
            }
        }
        Payload::Text(text) => escape_text(text, out),
        Payload::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Payload::Element { name, attributes } => {
            out.push('<');
            out.push_str(name);
            for (attribute, value) in attributes {
                out.push(' ');
                out.push_str(attribute);
                out.push_str("=\"");
                escape_attribute(value, out);
                out.push('"');
            }
            out.push('>');
            if is_void_element(name) && data.children.is_empty() {
                return;
            }
            for child in &data.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
