//! Templates: construction, compilation, caching and value resolution
//!
//! A template is written with the [`html!`](crate::html) or
//! [`svg!`](crate::svg) macro, which yields a [`TemplateResult`]: the call
//! site's literal fragments plus this call's expression values.
//!
//! ```
//! use live_template::html;
//!
//! fn row(label: &str, done: bool) -> live_template::TemplateResult {
//!     html!("<li class=\"" {if done { "done" } else { "open" }} "\">" {label} "</li>")
//! }
//!
//! let result = row("write tests", true);
//! assert_eq!(result.values().len(), 2);
//! ```
//!
//! The first render of a call site compiles its fragments into a
//! [`Skeleton`] held by the [`SkeletonCache`]; every later render reuses it.

pub mod marker;

mod compiler;
mod registry;
mod resolver;
mod result;
mod value;

pub use compiler::{compile, Skeleton, SkeletonId, SlotDescriptor};
pub use registry::SkeletonCache;
pub use resolver::{resolve, resolve_sync, Emission, Resolution, ResolveError, Resolved, ResolvedTemplate};
pub use result::{TemplateFamily, TemplateResult, TemplateStrings};
pub use value::Value;
