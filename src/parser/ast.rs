//! Syntax tree for template markup

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// A node with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// One node of parsed markup
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Element(ElementNode),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    /// Tag name exactly as written
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Spanned<MarkupNode>>,
}

/// An attribute in source order. A bare attribute has an empty value.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub span: Span,
}
