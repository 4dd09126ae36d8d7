//! Renderer: mounts template results into containers and keeps them updated
//!
//! A container keeps its [`Instance`] for as long as it is rendered with
//! results of the same call site. Rendering a different template replaces
//! the instance; rendering the same one only updates the slots whose values
//! changed.
//!
//! Containers are held weakly. Once a container is dropped, its instance is
//! disposed on the renderer's next `render`, `unmount` or `release_dropped`.

pub mod config;

mod instance;
mod target;

pub use config::{AsyncErrorPolicy, ConfigError, RenderConfig};
pub use instance::Instance;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{error, trace, warn};

use crate::dom::{DomError, Node, NodeKind, WeakNode};
use crate::template::{SkeletonCache, TemplateResult};
use crate::RenderError;

type ErrorHook = Box<dyn FnMut(&RenderError)>;

/// State shared by a renderer and the asynchronous callbacks of its slots
pub(crate) struct Context {
    pub(crate) cache: Rc<SkeletonCache>,
    pub(crate) config: RenderConfig,
    error_hook: RefCell<Option<ErrorHook>>,
}

impl Context {
    pub(crate) fn new(cache: Rc<SkeletonCache>, config: RenderConfig) -> Self {
        Self {
            cache,
            config,
            error_hook: RefCell::new(None),
        }
    }

    /// Surface an error that has no caller to return to
    pub(crate) fn report(&self, error: &RenderError) {
        error!(%error, "asynchronous update failed");
        match self.error_hook.try_borrow_mut() {
            Ok(mut hook) => {
                if let Some(hook) = hook.as_mut() {
                    hook(error);
                }
            }
            Err(_) => warn!("error hook raised another error, dropping it"),
        }
    }
}

/// Renders template results into containers
pub struct Renderer {
    ctx: Rc<Context>,
    mounted: HashMap<WeakNode, Instance>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self::with_config(RenderConfig::default())
    }

    pub fn with_config(config: RenderConfig) -> Self {
        Self::with_cache(config, Rc::new(SkeletonCache::new()))
    }

    /// Create a renderer that shares compiled skeletons through `cache`
    pub fn with_cache(config: RenderConfig, cache: Rc<SkeletonCache>) -> Self {
        Self {
            ctx: Rc::new(Context::new(cache, config)),
            mounted: HashMap::new(),
        }
    }

    /// Install the callback for errors raised by asynchronous values after
    /// `render` has returned. Replaces any previous hook.
    pub fn on_error(&mut self, hook: impl FnMut(&RenderError) + 'static) {
        match self.ctx.error_hook.try_borrow_mut() {
            Ok(mut slot) => *slot = Some(Box::new(hook)),
            Err(_) => warn!("cannot replace the error hook while it is running"),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.ctx.config
    }

    pub fn cache(&self) -> &Rc<SkeletonCache> {
        &self.ctx.cache
    }

    /// The instance currently mounted in `container`
    pub fn instance(&self, container: &Node) -> Option<&Instance> {
        self.mounted.get(&container.downgrade())
    }

    /// Render `result` into `container`.
    ///
    /// The first render appends the template's nodes after any existing
    /// children. Later renders of the same template update in place.
    pub fn render(&mut self, result: &TemplateResult, container: &Node) -> Result<(), RenderError> {
        match container.kind() {
            NodeKind::Element | NodeKind::Fragment => {}
            kind => return Err(DomError::NotAContainer { kind }.into()),
        }
        self.release_dropped();
        let skeleton = self.ctx.cache.get_or_compile(result)?;

        if let Some(instance) = self.mounted.get(&container.downgrade()) {
            if Rc::ptr_eq(instance.skeleton(), &skeleton) {
                trace!(skeleton = %skeleton.id(), "updating mounted instance");
                return instance.update(&self.ctx, result.values());
            }
        }
        self.unmount(container);

        let instance = Instance::create(skeleton, 0)?;
        let outcome = instance.update(&self.ctx, result.values());
        container.append_child(instance.root())?;
        self.mounted.insert(container.downgrade(), instance);
        outcome
    }

    /// Dispose the instance mounted in `container` and remove its nodes.
    /// Returns whether anything was mounted.
    pub fn unmount(&mut self, container: &Node) -> bool {
        self.release_dropped();
        let Some(instance) = self.mounted.remove(&container.downgrade()) else {
            return false;
        };
        let root = instance.root().clone();
        instance.dispose();
        if let Some(parent) = root.parent() {
            if let Err(error) = parent.remove_child(&root) {
                warn!(%error, "could not detach unmounted nodes");
            }
        }
        true
    }

    /// Dispose the instances of containers that have been dropped, which
    /// cancels their subscriptions. Returns how many were released.
    pub fn release_dropped(&mut self) -> usize {
        let dropped: Vec<WeakNode> = self
            .mounted
            .keys()
            .filter(|container| container.is_dropped())
            .cloned()
            .collect();
        for container in &dropped {
            if let Some(instance) = self.mounted.remove(container) {
                instance.dispose();
            }
        }
        if !dropped.is_empty() {
            trace!(released = dropped.len(), "released instances of dropped containers");
        }
        dropped.len()
    }

    /// Number of containers with a mounted instance, dropped ones included
    pub fn mounted_count(&self) -> usize {
        self.mounted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html;
    use crate::reactive::{Deferred, Source, SourceError, Subscription};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn page(title: &str, body: &str) -> TemplateResult {
        html!("<h1>" {title} "</h1><p>" {body} "</p>")
    }

    #[test]
    fn test_render_and_update() {
        let mut renderer = Renderer::new();
        let container = Node::element("main");
        renderer.render(&page("A", "one"), &container).unwrap();
        assert_eq!(container.inner_markup(), "<h1>A</h1><p>one</p>");

        let root = renderer.instance(&container).unwrap().root().clone();
        renderer.render(&page("A", "two"), &container).unwrap();
        assert_eq!(container.inner_markup(), "<h1>A</h1><p>two</p>");
        assert!(renderer.instance(&container).unwrap().root().ptr_eq(&root));
    }

    #[test]
    fn test_different_template_replaces_instance() {
        let mut renderer = Renderer::new();
        let container = Node::element("div");
        renderer.render(&page("A", "b"), &container).unwrap();
        renderer.render(&html!("<hr>"), &container).unwrap();
        assert_eq!(container.inner_markup(), "<hr>");
        assert_eq!(container.child_count(), 1);
    }

    #[test]
    fn test_text_container_is_rejected() {
        let mut renderer = Renderer::new();
        let error = renderer.render(&page("a", "b"), &Node::text("x")).unwrap_err();
        assert!(matches!(
            error,
            RenderError::Tree(DomError::NotAContainer { kind: NodeKind::Text })
        ));
    }

    #[test]
    fn test_unmount() {
        let mut renderer = Renderer::new();
        let container = Node::element("div");
        container.append_child(&Node::text("kept")).unwrap();
        renderer.render(&page("t", "b"), &container).unwrap();
        assert!(renderer.unmount(&container));
        assert!(!renderer.unmount(&container));
        assert_eq!(container.inner_markup(), "kept");
    }

    #[test]
    fn test_async_error_reaches_hook_and_keeps_content() {
        let mut renderer = Renderer::new();
        let reported = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&reported);
        renderer.on_error(move |error| log.borrow_mut().push(error.to_string()));

        let (deferred, settle) = Deferred::new();
        let container = Node::element("div");
        renderer
            .render(&html!("<p>" {"before"} "</p><p>" {deferred} "</p>"), &container)
            .unwrap();
        settle.reject("offline");

        assert_eq!(container.inner_markup(), "<p>before</p><p></p>");
        assert_eq!(reported.borrow().len(), 1);
        assert!(reported.borrow()[0].contains("offline"));
    }

    #[test]
    fn test_settled_deferred_delivers_through_the_hook() {
        let mut renderer = Renderer::new();
        let reported = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&reported);
        renderer.on_error(move |error| log.borrow_mut().push(error.to_string()));

        let container = Node::element("div");
        let view = html!("<p>" {Deferred::resolved("ready")} "</p><p>" {Deferred::rejected("broken")} "</p>");
        assert!(renderer.render(&view, &container).is_ok());

        assert_eq!(container.inner_markup(), "<p>ready</p><p></p>");
        assert_eq!(reported.borrow().len(), 1);
        assert!(reported.borrow()[0].contains("broken"));
    }

    #[test]
    fn test_async_error_can_clear_content() {
        let config = RenderConfig::new().with_async_errors(AsyncErrorPolicy::ClearContent);
        let mut renderer = Renderer::with_config(config);
        let sink_handle = Rc::new(RefCell::new(None));
        let captured = Rc::clone(&sink_handle);
        let source = Source::new(move |sink| {
            sink.next("live");
            *captured.borrow_mut() = Some(sink);
            Subscription::empty()
        });
        let container = Node::element("div");
        renderer.render(&html!("<b>" {source} "</b>"), &container).unwrap();
        assert_eq!(container.inner_markup(), "<b>live</b>");

        if let Some(sink) = sink_handle.borrow_mut().take() {
            sink.error(SourceError::new("gone"));
        }
        assert_eq!(container.inner_markup(), "<b></b>");
    }

    #[test]
    fn test_shared_cache() {
        let cache = Rc::new(SkeletonCache::new());
        let mut first = Renderer::with_cache(RenderConfig::default(), Rc::clone(&cache));
        let mut second = Renderer::with_cache(RenderConfig::default(), Rc::clone(&cache));
        first.render(&page("a", "b"), &Node::element("div")).unwrap();
        second.render(&page("c", "d"), &Node::element("div")).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_dropping_renderer_cancels_sources() {
        let cancelled = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancelled);
        let source = Source::new(move |_sink| {
            let flag = Rc::clone(&flag);
            Subscription::new(move || flag.set(true))
        });
        let mut renderer = Renderer::new();
        renderer.render(&html!("<i>" {source} "</i>"), &Node::element("div")).unwrap();
        assert!(!cancelled.get());
        drop(renderer);
        assert!(cancelled.get());
    }

    #[test]
    fn test_dropped_container_is_released() {
        let cancelled = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancelled);
        let source = Source::new(move |_sink| {
            let flag = Rc::clone(&flag);
            Subscription::new(move || flag.set(true))
        });
        let mut renderer = Renderer::new();
        {
            let container = Node::element("div");
            renderer.render(&html!("<i>" {source} "</i>"), &container).unwrap();
        }
        assert!(!cancelled.get());
        assert_eq!(renderer.mounted_count(), 1);

        renderer.render(&page("a", "b"), &Node::element("div")).unwrap();
        assert!(cancelled.get());
        assert_eq!(renderer.mounted_count(), 1);
        assert_eq!(renderer.release_dropped(), 1);
        assert_eq!(renderer.mounted_count(), 0);
    }

    #[test]
    fn test_live_containers_are_kept() {
        let mut renderer = Renderer::new();
        let container = Node::element("div");
        renderer.render(&page("a", "b"), &container).unwrap();
        assert_eq!(renderer.release_dropped(), 0);
        renderer.render(&page("a", "c"), &container).unwrap();
        assert_eq!(container.inner_markup(), "<h1>a</h1><p>c</p>");
    }
}
