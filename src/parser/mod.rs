//! Markup parser
//!
//! Turns template markup into a detached [`Node`] tree. The dialect is the
//! subset templates are written in: elements with quoted, unquoted or bare
//! attributes, void and self-closing elements, text, and comments.
//!
//! It is stricter than a browser: every non-void element needs its own end
//! tag, so `<p>a<p>b` or a list of `<li>` without `</li>` is rejected as
//! malformed instead of having its end tags implied.

pub mod ast;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use grammar::parse;
pub use lexer::{lex, Token};

use crate::dom::Node;
use crate::ParseError;

/// Parse markup into a fragment node holding the top-level nodes
pub fn parse_fragment(markup: &str) -> Result<Node, Vec<ParseError>> {
    let nodes = parse(markup)?;
    let root = Node::fragment();
    build(&root, nodes);
    Ok(root)
}

fn build(parent: &Node, nodes: Vec<Spanned<MarkupNode>>) {
    for spanned in nodes {
        let node = match spanned.node {
            MarkupNode::Text(text) => Node::text(text),
            MarkupNode::Comment(text) => Node::comment(text),
            MarkupNode::Element(element) => {
                let node = Node::element(element.name);
                for attribute in &element.attributes {
                    node.set_attribute(&attribute.name, &attribute.value);
                }
                build(&node, element.children);
                node
            }
        };
        parent.adopt(node);
    }
}
