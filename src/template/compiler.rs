//! Skeleton compiler
//!
//! A template's literal fragments are joined with expression markers and
//! parsed once. Walking the parsed tree then finds every marker, turns it
//! into a slot descriptor and strips it, leaving a clean skeleton that
//! instances clone.
//!
//! Node slots are bounded by two anchor nodes. The descriptor records the
//! position of the start anchor in the depth-first walk; the end anchor is
//! always the start anchor's next sibling.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::dom::{Node, NodeKind, TreeWalker};
use crate::error::CompileError;
use crate::parser::parse_fragment;

use super::marker::{self, split_markers};
use super::{TemplateFamily, TemplateStrings};

/// Matches the attribute name in the literal text leading up to an
/// attribute-position expression: whitespace, the name, `=`, then any start
/// of the value (unquoted, double-quoted or single-quoted) running to the end.
static LAST_ATTRIBUTE_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"[ \x09\x0a\x0c\x0d]([^\x00-\x1F\x7F-\x9F \x09\x0a\x0c\x0d"'>=/]+)"#,
        r#"[ \x09\x0a\x0c\x0d]*=[ \x09\x0a\x0c\x0d]*"#,
        r#"(?:[^ \x09\x0a\x0c\x0d"'`<>=]*|"[^"]*|'[^']*)$"#,
    ))
    .ok()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkeletonId(pub u32);

impl fmt::Display for SkeletonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a dynamic value goes, by position in the depth-first walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotDescriptor {
    /// A range of sibling nodes, located by its start anchor
    Node { index: usize },
    /// An attribute of the element at `index`
    Attribute {
        index: usize,
        /// Name the value is written under
        name: String,
        /// Name as written before the preceding expression
        raw_name: String,
        /// Literal text around the attribute's expressions
        strings: Vec<String>,
    },
}

impl SlotDescriptor {
    pub fn index(&self) -> usize {
        match self {
            SlotDescriptor::Node { index } | SlotDescriptor::Attribute { index, .. } => *index,
        }
    }

    /// How many expression values this slot consumes
    pub fn value_count(&self) -> usize {
        match self {
            SlotDescriptor::Node { .. } => 1,
            SlotDescriptor::Attribute { strings, .. } => strings.len().saturating_sub(1),
        }
    }

    /// An attribute whose whole value is a single expression
    pub fn is_whole_attribute(&self) -> bool {
        match self {
            SlotDescriptor::Attribute { strings, .. } => {
                strings.len() == 2 && strings[0].is_empty() && strings[1].is_empty()
            }
            SlotDescriptor::Node { .. } => false,
        }
    }
}

/// The compiled, reusable structure of one template
#[derive(Debug)]
pub struct Skeleton {
    id: SkeletonId,
    family: TemplateFamily,
    root: Node,
    slots: Vec<SlotDescriptor>,
}

impl Skeleton {
    pub fn id(&self) -> SkeletonId {
        self.id
    }

    pub fn family(&self) -> TemplateFamily {
        self.family
    }

    /// The compiled tree. Instances clone it; it is never mounted itself.
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn slots(&self) -> &[SlotDescriptor] {
        &self.slots
    }

    /// Number of expression values a render of this skeleton consumes
    pub fn expression_count(&self) -> usize {
        self.slots.iter().map(SlotDescriptor::value_count).sum()
    }
}

/// A marker found during the walk, before positions are final
enum Bound {
    Node(Node),
    Attribute {
        element: Node,
        name: String,
        raw_name: String,
        strings: Vec<String>,
    },
}

/// Compile the literal fragments of a template into a skeleton
pub fn compile(
    id: SkeletonId,
    strings: &TemplateStrings,
    family: TemplateFamily,
) -> Result<Skeleton, CompileError> {
    let fragments = strings.fragments();
    let markup = match family {
        TemplateFamily::Html => assemble(fragments),
        TemplateFamily::Svg => format!("<svg>{}</svg>", assemble(fragments)),
    };

    let root = parse_fragment(&markup).map_err(|errors| CompileError::Markup {
        markup: markup.clone(),
        errors,
    })?;
    if family == TemplateFamily::Svg {
        unwrap_svg(&root)?;
    }

    let bound = bind_markers(&root, fragments, family)?;
    let slots = locate(&root, bound)?;

    let expected = strings.expression_count();
    let bound_count: usize = slots.iter().map(SlotDescriptor::value_count).sum();
    if bound_count != expected {
        return Err(CompileError::UnboundExpressions {
            expected,
            bound: bound_count,
        });
    }

    Ok(Skeleton {
        id,
        family,
        root,
        slots,
    })
}

/// Join fragments with a node marker where the expression sits in text and
/// a bare marker where it sits inside a tag
fn assemble(fragments: &[&str]) -> String {
    let Some((last, leading)) = fragments.split_last() else {
        return String::new();
    };

    let mut markup = String::new();
    let mut in_text = true;
    for fragment in leading {
        markup.push_str(fragment);
        // A fragment without tags keeps the previous state
        if let Some(close) = find_tag_close(fragment) {
            in_text = close < fragment.len();
        }
        markup.push_str(if in_text {
            marker::node_marker()
        } else {
            marker::marker()
        });
    }
    markup.push_str(last);
    markup
}

/// Index of the `>` closing the last tag, `s.len()` when the last tag is
/// still open, `None` when `s` has no tags
fn find_tag_close(s: &str) -> Option<usize> {
    let close = s.rfind('>');
    let after = close.map_or(0, |c| c + 1);
    if s[after..].contains('<') {
        Some(s.len())
    } else {
        close
    }
}

/// Lift the children of the wrapping `<svg>` up into the root
fn unwrap_svg(root: &Node) -> Result<(), CompileError> {
    let Some(svg) = root.first_child() else {
        return Ok(());
    };
    for child in svg.children() {
        root.insert_before(&child, Some(&svg))?;
    }
    root.remove_child(&svg)?;
    Ok(())
}

fn bind_markers(
    root: &Node,
    fragments: &[&str],
    family: TemplateFamily,
) -> Result<Vec<Bound>, CompileError> {
    let mut walker = TreeWalker::new(root);
    let mut bound = Vec::new();
    let mut expression = 0;
    // Removing these during the walk would lose the walker's place
    let mut markers = Vec::new();

    while let Some(node) = walker.next_node() {
        match node.kind() {
            NodeKind::Element => {
                bind_attributes(&node, fragments, family, &mut expression, &mut bound)?
            }
            NodeKind::Text => {
                let Some(data) = node.data().filter(|d| d.contains(marker::marker())) else {
                    continue;
                };
                let Some(parent) = node.parent() else {
                    continue;
                };
                let parts = split_markers(&data);
                let Some((last, leading)) = parts.split_last() else {
                    continue;
                };
                // Earlier segments go in front so the walker keeps its place;
                // each of them starts one slot
                for part in leading {
                    let text = Node::text(*part);
                    parent.insert_before(&text, Some(&node))?;
                    bound.push(Bound::Node(text));
                }
                expression += leading.len();
                node.set_data(last);
            }
            NodeKind::Comment if node.data().as_deref() == Some(marker::marker()) => {
                let Some(parent) = node.parent() else {
                    continue;
                };
                let start = match node.previous_sibling() {
                    Some(previous) if previous.kind() == NodeKind::Text => previous,
                    _ => {
                        let anchor = Node::text("");
                        parent.insert_before(&anchor, Some(&node))?;
                        anchor
                    }
                };
                if node.next_sibling().is_none() {
                    parent.insert_before(&Node::text(""), Some(&node))?;
                }
                bound.push(Bound::Node(start));
                markers.push(node);
                expression += 1;
            }
            _ => {}
        }
    }

    for node in markers {
        if let Some(parent) = node.parent() {
            parent.remove_child(&node)?;
        }
    }

    Ok(bound)
}

fn bind_attributes(
    element: &Node,
    fragments: &[&str],
    family: TemplateFamily,
    expression: &mut usize,
    bound: &mut Vec<Bound>,
) -> Result<(), CompileError> {
    if !element.has_attributes() {
        return Ok(());
    }

    let attributes = element.attributes();
    if attributes
        .iter()
        .any(|(name, _)| name.contains(marker::marker()))
    {
        return Err(CompileError::ExpressionInAttributeName {
            element: element.tag_name().unwrap_or_default(),
        });
    }

    // Attribute order need not follow expression order, so names are
    // recovered from the literal text instead
    let count = attributes
        .iter()
        .filter(|(_, value)| value.contains(marker::marker()))
        .count();

    for _ in 0..count {
        let fragment = fragments.get(*expression).copied().unwrap_or_default();
        let raw_name =
            last_attribute_name(fragment).ok_or_else(|| CompileError::AttributeName {
                expression: *expression,
                fragment: fragment.to_string(),
            })?;
        let (stored, value) =
            element
                .find_attribute(raw_name)
                .ok_or_else(|| CompileError::AttributeNotFound {
                    name: raw_name.to_string(),
                })?;

        let strings: Vec<String> = split_markers(&value)
            .into_iter()
            .map(str::to_string)
            .collect();
        *expression += strings.len() - 1;
        element.remove_attribute(&stored);

        let name = match family {
            TemplateFamily::Html => stored.to_ascii_lowercase(),
            TemplateFamily::Svg => stored,
        };
        bound.push(Bound::Attribute {
            element: element.clone(),
            name,
            raw_name: raw_name.to_string(),
            strings,
        });
    }
    Ok(())
}

fn last_attribute_name(fragment: &str) -> Option<&str> {
    let pattern = LAST_ATTRIBUTE_NAME.as_ref()?;
    pattern
        .captures(fragment)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
}

/// Turn bound markers into descriptors positioned in the final tree
fn locate(root: &Node, bound: Vec<Bound>) -> Result<Vec<SlotDescriptor>, CompileError> {
    let mut positions = HashMap::new();
    let mut walker = TreeWalker::new(root);
    let mut index = 0;
    while let Some(node) = walker.next_node() {
        positions.insert(node, index);
        index += 1;
    }

    bound
        .into_iter()
        .map(|slot| {
            let node = match &slot {
                Bound::Node(node) | Bound::Attribute { element: node, .. } => node,
            };
            let index = positions
                .get(node)
                .copied()
                .ok_or(crate::dom::DomError::NotAChild)?;
            Ok(match slot {
                Bound::Node(_) => SlotDescriptor::Node { index },
                Bound::Attribute {
                    name,
                    raw_name,
                    strings,
                    ..
                } => SlotDescriptor::Attribute {
                    index,
                    name,
                    raw_name,
                    strings,
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile_html(strings: &'static TemplateStrings) -> Result<Skeleton, CompileError> {
        compile(SkeletonId(1), strings, TemplateFamily::Html)
    }

    fn node_at(root: &Node, index: usize) -> Node {
        let mut walker = TreeWalker::new(root);
        let mut node = None;
        for _ in 0..=index {
            node = walker.next_node();
        }
        node.expect("index within tree")
    }

    #[test]
    fn test_find_tag_close() {
        assert_eq!(find_tag_close("plain"), None);
        assert_eq!(find_tag_close("<p>"), Some(2));
        assert_eq!(find_tag_close("<p><a href="), Some(11));
        assert_eq!(find_tag_close("\" title="), None);
    }

    #[test]
    fn test_classification_persists_across_fragments() {
        let markup = assemble(&["<a href=", " title=", ">", "</a>"]);
        let m = marker::marker();
        let n = marker::node_marker();
        assert_eq!(
            markup,
            format!("<a href={m} title={m}>{n}</a>")
        );
    }

    #[test]
    fn test_attribute_name_recovery() {
        assert_eq!(last_attribute_name("<div class="), Some("class"));
        assert_eq!(last_attribute_name("<div a=\"x\" title = \"pre "), Some("title"));
        assert_eq!(last_attribute_name("<div data-x='"), Some("data-x"));
        assert_eq!(last_attribute_name("<div>"), None);
    }

    #[test]
    fn test_node_slots_in_text() {
        static STRINGS: TemplateStrings = TemplateStrings::new(&["<p>a ", " b ", "</p>"]);
        let skeleton = compile_html(&STRINGS).unwrap();
        assert_eq!(
            skeleton.slots(),
            &[
                SlotDescriptor::Node { index: 1 },
                SlotDescriptor::Node { index: 2 }
            ]
        );
        // Marker comments are gone, text anchors remain
        assert_eq!(skeleton.root().to_markup(), "<p>a  b </p>");
        let start = node_at(skeleton.root(), 1);
        assert_eq!(start.data().as_deref(), Some("a "));
        assert_eq!(start.next_sibling().and_then(|n| n.data()).as_deref(), Some(" b "));
    }

    #[test]
    fn test_adjacent_expressions_get_separate_anchors() {
        static STRINGS: TemplateStrings = TemplateStrings::new(&["<div>", "", "</div>"]);
        let skeleton = compile_html(&STRINGS).unwrap();
        let div = skeleton.root().first_child().unwrap();
        assert_eq!(div.child_count(), 3);
        assert!(div
            .children()
            .iter()
            .all(|child| child.data().as_deref() == Some("")));
        assert_eq!(
            skeleton.slots(),
            &[
                SlotDescriptor::Node { index: 1 },
                SlotDescriptor::Node { index: 2 }
            ]
        );
    }

    #[test]
    fn test_attribute_slots() {
        static STRINGS: TemplateStrings =
            TemplateStrings::new(&["<div class=\"a-", "-b\" id=", ">x</div>"]);
        let skeleton = compile_html(&STRINGS).unwrap();
        assert_eq!(
            skeleton.slots(),
            &[
                SlotDescriptor::Attribute {
                    index: 0,
                    name: "class".to_string(),
                    raw_name: "class".to_string(),
                    strings: vec!["a-".to_string(), "-b".to_string()],
                },
                SlotDescriptor::Attribute {
                    index: 0,
                    name: "id".to_string(),
                    raw_name: "id".to_string(),
                    strings: vec![String::new(), String::new()],
                },
            ]
        );
        assert!(skeleton.slots()[1].is_whole_attribute());
        // Marker attributes are stripped
        assert_eq!(skeleton.root().to_markup(), "<div>x</div>");
    }

    #[test]
    fn test_several_expressions_in_one_attribute() {
        static STRINGS: TemplateStrings =
            TemplateStrings::new(&["<p title=\"", " and ", "\"></p>"]);
        let skeleton = compile_html(&STRINGS).unwrap();
        assert_eq!(skeleton.slots().len(), 1);
        assert_eq!(skeleton.slots()[0].value_count(), 2);
        assert_eq!(skeleton.expression_count(), 2);
    }

    #[test]
    fn test_html_attribute_names_are_lowercased() {
        static STRINGS: TemplateStrings = TemplateStrings::new(&["<div onClick=", "></div>"]);
        let skeleton = compile_html(&STRINGS).unwrap();
        let SlotDescriptor::Attribute { name, raw_name, .. } = &skeleton.slots()[0] else {
            panic!("expected attribute slot");
        };
        assert_eq!(name, "onclick");
        assert_eq!(raw_name, "onClick");
    }

    #[test]
    fn test_svg_is_unwrapped() {
        static STRINGS: TemplateStrings =
            TemplateStrings::new(&["<circle viewBox=", " r=\"2\"/>"]);
        let skeleton = compile(SkeletonId(2), &STRINGS, TemplateFamily::Svg).unwrap();
        assert_eq!(skeleton.root().to_markup(), "<circle r=\"2\"></circle>");
        let SlotDescriptor::Attribute { name, .. } = &skeleton.slots()[0] else {
            panic!("expected attribute slot");
        };
        assert_eq!(name, "viewBox");
    }

    #[test]
    fn test_expression_as_attribute_name_fails() {
        static STRINGS: TemplateStrings = TemplateStrings::new(&["<div ", "></div>"]);
        assert_eq!(
            compile_html(&STRINGS).unwrap_err(),
            CompileError::ExpressionInAttributeName {
                element: "div".to_string()
            }
        );
    }

    #[test]
    fn test_unrecoverable_attribute_name_fails() {
        // No whitespace ahead of `title`, so the name cannot be read back
        static STRINGS: TemplateStrings = TemplateStrings::new(&["<div/title=", "></div>"]);
        assert_eq!(
            compile_html(&STRINGS).unwrap_err(),
            CompileError::AttributeName {
                expression: 0,
                fragment: "<div/title=".to_string()
            }
        );
    }

    #[test]
    fn test_expression_in_comment_is_unbound() {
        static STRINGS: TemplateStrings = TemplateStrings::new(&["<!-- ", " -->"]);
        assert_eq!(
            compile_html(&STRINGS).unwrap_err(),
            CompileError::UnboundExpressions {
                expected: 1,
                bound: 0
            }
        );
    }

    #[test]
    fn test_malformed_markup() {
        static STRINGS: TemplateStrings = TemplateStrings::new(&["<div><span></div>"]);
        assert!(matches!(
            compile_html(&STRINGS),
            Err(CompileError::Markup { .. })
        ));
    }
}
