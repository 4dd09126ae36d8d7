//! Template results and the `html!`/`svg!` construction macros

use std::fmt;
use std::rc::Rc;

use super::Value;

/// Which markup dialect a template is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFamily {
    Html,
    Svg,
}

/// The literal fragments of one template call site.
///
/// Skeletons are cached by the *address* of this value, so each call site
/// must own exactly one `'static` instance. The [`html!`](crate::html) and
/// [`svg!`](crate::svg) macros take care of that.
#[derive(Debug)]
pub struct TemplateStrings {
    fragments: &'static [&'static str],
}

impl TemplateStrings {
    pub const fn new(fragments: &'static [&'static str]) -> Self {
        Self { fragments }
    }

    pub fn fragments(&self) -> &'static [&'static str] {
        self.fragments
    }

    /// Number of expressions interleaved with the fragments
    pub fn expression_count(&self) -> usize {
        self.fragments.len().saturating_sub(1)
    }
}

struct ResultInner {
    strings: &'static TemplateStrings,
    values: Vec<Value>,
    family: TemplateFamily,
}

/// A template call: its literal fragments, the expression values of this
/// call, and the family. Cheap to clone; clones are the same result.
#[derive(Clone)]
pub struct TemplateResult(Rc<ResultInner>);

impl TemplateResult {
    pub fn new(strings: &'static TemplateStrings, values: Vec<Value>, family: TemplateFamily) -> Self {
        Self(Rc::new(ResultInner {
            strings,
            values,
            family,
        }))
    }

    pub fn html(strings: &'static TemplateStrings, values: Vec<Value>) -> Self {
        Self::new(strings, values, TemplateFamily::Html)
    }

    pub fn svg(strings: &'static TemplateStrings, values: Vec<Value>) -> Self {
        Self::new(strings, values, TemplateFamily::Svg)
    }

    pub fn strings(&self) -> &'static TemplateStrings {
        self.0.strings
    }

    pub fn values(&self) -> &[Value] {
        &self.0.values
    }

    pub fn family(&self) -> TemplateFamily {
        self.0.family
    }

    pub fn ptr_eq(&self, other: &TemplateResult) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for TemplateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResult")
            .field("family", &self.0.family)
            .field("fragments", &self.0.strings.fragments)
            .field("values", &self.0.values)
            .finish()
    }
}

/// Build an HTML [`TemplateResult`](crate::TemplateResult).
///
/// Literal fragments alternate with `{expression}` groups; every expression
/// is converted with `Value::from`.
///
/// ```
/// use live_template::{html, Node};
///
/// let name = "world";
/// let greeting = html!("<p>Hello " {name} "!</p>");
///
/// let container = Node::element("main");
/// live_template::render(&greeting, &container).unwrap();
/// assert_eq!(container.inner_markup(), "<p>Hello world!</p>");
/// ```
#[macro_export]
macro_rules! html {
    ($first:literal $({ $value:expr } $rest:literal)*) => {{
        static STRINGS: $crate::template::TemplateStrings =
            $crate::template::TemplateStrings::new(&[$first $(, $rest)*]);
        $crate::template::TemplateResult::html(
            &STRINGS,
            vec![$($crate::template::Value::from($value)),*],
        )
    }};
}

/// Build an SVG [`TemplateResult`](crate::TemplateResult); see [`html!`].
#[macro_export]
macro_rules! svg {
    ($first:literal $({ $value:expr } $rest:literal)*) => {{
        static STRINGS: $crate::template::TemplateStrings =
            $crate::template::TemplateStrings::new(&[$first $(, $rest)*]);
        $crate::template::TemplateResult::svg(
            &STRINGS,
            vec![$($crate::template::Value::from($value)),*],
        )
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(label: &str) -> TemplateResult {
        crate::html!("<b>" {label} "</b>")
    }

    #[test]
    fn test_call_site_identity() {
        let a = labelled("a");
        let b = labelled("b");
        assert!(std::ptr::eq(a.strings(), b.strings()));
        assert!(!a.ptr_eq(&b));

        // Same text, different call site
        let other = crate::html!("<b>" {"a"} "</b>");
        assert!(!std::ptr::eq(a.strings(), other.strings()));
    }

    #[test]
    fn test_fragments_and_values() {
        let result = crate::svg!("<circle r=" {5} "/>");
        assert_eq!(result.family(), TemplateFamily::Svg);
        assert_eq!(result.strings().fragments(), &["<circle r=", "/>"]);
        assert_eq!(result.strings().expression_count(), 1);
        assert_eq!(result.values().len(), 1);
    }

    #[test]
    fn test_no_expressions() {
        let result = crate::html!("<hr>");
        assert_eq!(result.strings().expression_count(), 0);
        assert!(result.values().is_empty());
    }
}
