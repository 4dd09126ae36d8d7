//! Value resolver
//!
//! Normalizes an expression value into a flat list of renderable items.
//! Plain values resolve once, synchronously. A [`Deferred`](crate::Deferred)
//! or [`Source`](crate::Source) resolves through a subscription whose
//! callback receives each list as it becomes available.

use std::rc::Rc;

use thiserror::Error;

use crate::dom::Node;
use crate::error::CompileError;
use crate::reactive::{Notification, Sink, SourceError, Subscription};
use crate::renderer::Instance;

use super::compiler::Skeleton;
use super::value::number_text;
use super::{SkeletonCache, TemplateResult, Value};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    /// Futures and streams are only accepted as a slot's whole value
    #[error("a {kind} cannot be nested inside a list or emitted by another source")]
    NestedAsync { kind: &'static str },

    #[error("nested template cannot be compiled: {0}")]
    Template(#[from] CompileError),

    #[error("source failed: {0}")]
    Source(#[from] SourceError),
}

/// A leaf-level renderable item
pub enum Resolved {
    Empty,
    Text(Rc<str>),
    /// Caller-owned node, placed as is
    Node(Node),
    Template(ResolvedTemplate),
}

/// A nested template and, once the slot has placed it, its live instance
pub struct ResolvedTemplate {
    pub result: TemplateResult,
    pub skeleton: Rc<Skeleton>,
    pub instance: Option<Instance>,
}

impl Resolved {
    pub fn text(&self) -> Option<&str> {
        match self {
            Resolved::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Empty => f.write_str("Empty"),
            Resolved::Text(text) => write!(f, "Text({text:?})"),
            Resolved::Node(node) => write!(f, "Node({node:?})"),
            Resolved::Template(template) => write!(
                f,
                "Template({}, instance: {})",
                template.skeleton.id(),
                template.instance.is_some()
            ),
        }
    }
}

/// One delivery from an asynchronous value
pub type Emission = Result<Vec<Resolved>, ResolveError>;

/// Outcome of starting resolution
pub enum Resolution {
    /// The value was synchronous
    Ready(Vec<Resolved>),
    /// Items will arrive through the emit callback while this is held
    Pending(Subscription),
}

/// Resolve a slot's value.
///
/// Synchronous values return their items directly and never call `emit`.
/// Asynchronous values return the subscription; `emit` receives every later
/// delivery.
///
/// There is no scheduler to defer to, so an already settled `Deferred`, or a
/// `Source` that emits while being subscribed, calls `emit` before this
/// returns. That delivery still goes through `emit`: a failure in it reaches
/// the renderer's error hook and is not returned from `render`.
pub fn resolve(
    value: &Value,
    cache: &Rc<SkeletonCache>,
    mut emit: impl FnMut(Emission) + 'static,
) -> Result<Resolution, ResolveError> {
    match value {
        Value::Future(deferred) => {
            let cache = Rc::clone(cache);
            let subscription = deferred.subscribe(move |outcome| {
                emit(
                    outcome
                        .map_err(ResolveError::from)
                        .and_then(|value| resolve_sync(&value, &cache)),
                )
            });
            Ok(Resolution::Pending(subscription))
        }
        Value::Stream(source) => {
            let cache = Rc::clone(cache);
            let sink = Sink::new(move |notification| match notification {
                Notification::Next(value) => emit(resolve_sync(&value, &cache)),
                Notification::Error(err) => emit(Err(err.into())),
                Notification::Complete => tracing::trace!("source completed"),
            });
            Ok(Resolution::Pending(source.subscribe(sink)))
        }
        sync => resolve_sync(sync, cache).map(Resolution::Ready),
    }
}

/// Resolve a synchronous value, flattening lists depth-first
pub fn resolve_sync(value: &Value, cache: &SkeletonCache) -> Result<Vec<Resolved>, ResolveError> {
    let mut items = Vec::new();
    flatten(value, cache, &mut items)?;
    Ok(items)
}

fn flatten(value: &Value, cache: &SkeletonCache, items: &mut Vec<Resolved>) -> Result<(), ResolveError> {
    let item = match value {
        // `true` renders nothing, like `false`
        Value::Undefined | Value::Null | Value::Bool(_) => Resolved::Empty,
        Value::Number(n) => Resolved::Text(Rc::from(number_text(*n))),
        Value::Text(text) => Resolved::Text(Rc::clone(text)),
        Value::Node(node) => Resolved::Node(node.clone()),
        Value::Template(result) => Resolved::Template(ResolvedTemplate {
            skeleton: cache.get_or_compile(result)?,
            result: result.clone(),
            instance: None,
        }),
        Value::List(list) => {
            for value in list.iter() {
                flatten(value, cache, items)?;
            }
            return Ok(());
        }
        Value::Future(_) | Value::Stream(_) => {
            return Err(ResolveError::NestedAsync {
                kind: value.kind_name(),
            })
        }
    };
    items.push(item);
    Ok(())
}
