//! Live Template - declarative markup templates rendered into a live tree
//!
//! Templates are written inline with [`html!`] or [`svg!`]. Each call site is
//! compiled once into a skeleton; rendering clones it and binds the
//! expression values, and rendering again patches only what changed.
//!
//! # Example
//!
//! ```rust
//! use live_template::{html, render, Node, TemplateResult};
//!
//! fn counter(count: u32) -> TemplateResult {
//!     html!("<button data-count=\"" {count} "\">Clicked " {count} " times</button>")
//! }
//!
//! let container = Node::element("div");
//! render(&counter(0), &container).unwrap();
//! render(&counter(3), &container).unwrap();
//! assert_eq!(
//!     container.inner_markup(),
//!     "<button data-count=\"3\">Clicked 3 times</button>"
//! );
//! ```

pub mod dom;
pub mod error;
pub mod parser;
pub mod reactive;
pub mod renderer;
pub mod template;

pub use dom::{DomError, Node, NodeKind};
pub use error::{CompileError, ParseError};
pub use reactive::{Deferred, Settle, Sink, Source, SourceError, Subscription};
pub use renderer::{AsyncErrorPolicy, ConfigError, Instance, RenderConfig, Renderer};
pub use template::{ResolveError, SkeletonId, TemplateFamily, TemplateResult, Value};

use std::cell::RefCell;

use thiserror::Error;

/// Errors that can occur while rendering
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template cannot be compiled: {0}")]
    Compile(#[from] CompileError),

    #[error("value cannot be resolved: {0}")]
    Resolve(#[from] ResolveError),

    #[error("tree update failed: {0}")]
    Tree(#[from] DomError),

    /// Several slots failed during one update
    #[error("{} slots failed: {}", .0.len(), format_errors(.0))]
    Slots(Vec<RenderError>),

    #[error("nested templates exceed the depth limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("skeleton {skeleton} has no node for slot {slot}")]
    MissingSlotTarget { skeleton: SkeletonId, slot: usize },

    /// A slot was updated while it was already being updated
    #[error("slot updated re-entrantly")]
    Reentrant,
}

impl RenderError {
    /// Fold the failures of one update pass into a single result
    pub(crate) fn collect(mut errors: Vec<RenderError>) -> Result<(), RenderError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(RenderError::Slots(errors)),
        }
    }
}

fn format_errors(errors: &[RenderError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

thread_local! {
    static DEFAULT_RENDERER: RefCell<Renderer> = RefCell::new(Renderer::new());
}

/// Render `result` into `container` with this thread's default renderer
///
/// Containers keep their instance between calls, so rendering the same
/// template again updates the existing nodes. The renderer holds containers
/// weakly: a dropped container's instance is released on the next call.
///
/// # Example
///
/// ```rust
/// use live_template::{html, render, Node};
///
/// let list = Node::element("ul");
/// let items = vec![html!("<li>a</li>"), html!("<li>b</li>")];
/// render(&html!("<li>head</li>" {items} ""), &list).unwrap();
/// assert_eq!(list.inner_markup(), "<li>head</li><li>a</li><li>b</li>");
/// ```
pub fn render(result: &TemplateResult, container: &Node) -> Result<(), RenderError> {
    DEFAULT_RENDERER.with(|renderer| {
        renderer
            .try_borrow_mut()
            .map_err(|_| RenderError::Reentrant)?
            .render(result, container)
    })
}

/// Remove what this thread's default renderer mounted in `container`,
/// cancelling its subscriptions. Returns whether anything was mounted.
pub fn unmount(container: &Node) -> bool {
    DEFAULT_RENDERER.with(|renderer| match renderer.try_borrow_mut() {
        Ok(mut renderer) => renderer.unmount(container),
        Err(_) => {
            tracing::warn!("cannot unmount while the default renderer is busy");
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_render_simple_template() {
        let container = Node::element("section");
        render(&html!("<h2>Title</h2>"), &container).unwrap();
        assert_eq!(container.inner_markup(), "<h2>Title</h2>");
    }

    #[test]
    fn test_render_is_per_container() {
        let a = Node::element("div");
        let b = Node::element("div");
        let view = |n: i32| html!("<span>" {n} "</span>");
        render(&view(1), &a).unwrap();
        render(&view(2), &b).unwrap();
        render(&view(3), &a).unwrap();
        assert_eq!(a.inner_markup(), "<span>3</span>");
        assert_eq!(b.inner_markup(), "<span>2</span>");
    }

    #[test]
    fn test_unmount_restores_container() {
        let container = Node::element("nav");
        render(&html!("<a>home</a>"), &container).unwrap();
        assert!(unmount(&container));
        assert!(!unmount(&container));
        assert_eq!(container.child_count(), 0);
    }

    #[test]
    fn test_dropped_container_cancels_its_source() {
        let cancelled = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancelled);
        let source = Source::new(move |sink| {
            sink.next("tick");
            let flag = Rc::clone(&flag);
            Subscription::new(move || flag.set(true))
        });
        {
            let container = Node::element("div");
            render(&html!("<i>" {source} "</i>"), &container).unwrap();
            assert_eq!(container.inner_markup(), "<i>tick</i>");
        }
        assert!(!cancelled.get());

        render(&html!("<hr>"), &Node::element("div")).unwrap();
        assert!(cancelled.get());
    }

    #[test]
    fn test_collect_errors() {
        assert!(RenderError::collect(Vec::new()).is_ok());
        assert!(matches!(
            RenderError::collect(vec![RenderError::Reentrant]),
            Err(RenderError::Reentrant)
        ));
        let err = RenderError::collect(vec![
            RenderError::Reentrant,
            RenderError::DepthExceeded { limit: 2 },
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "2 slots failed: slot updated re-entrantly; nested templates exceed the depth limit of 2"
        );
    }

    #[test]
    fn test_compile_error_is_returned() {
        let container = Node::element("div");
        let err = render(&html!("<div " {"x"} "></div>"), &container).unwrap_err();
        assert!(matches!(err, RenderError::Compile(_)));
        assert_eq!(container.child_count(), 0);
    }
}
