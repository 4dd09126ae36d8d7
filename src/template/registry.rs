//! Skeleton cache: one compiled skeleton per template call site

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::CompileError;

use super::compiler::{compile, Skeleton, SkeletonId};
use super::{TemplateFamily, TemplateResult, TemplateStrings};

/// Identity of a call site's literal fragments: the address of its
/// `TemplateStrings`, not the text
#[derive(Clone, Copy)]
struct StringsKey(&'static TemplateStrings);

impl PartialEq for StringsKey {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for StringsKey {}

impl Hash for StringsKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state);
    }
}

/// Compiled skeletons keyed by family, then by call site.
///
/// Entries are never evicted. Failed compilations are not cached.
#[derive(Default)]
pub struct SkeletonCache {
    families: RefCell<HashMap<TemplateFamily, HashMap<StringsKey, Rc<Skeleton>>>>,
    last_id: Cell<u32>,
}

impl SkeletonCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the skeleton for a result's call site, compiling it on first use
    pub fn get_or_compile(&self, result: &TemplateResult) -> Result<Rc<Skeleton>, CompileError> {
        if let Some(skeleton) = self.get(result.family(), result.strings()) {
            tracing::trace!(skeleton = %skeleton.id(), "skeleton cache hit");
            return Ok(skeleton);
        }

        let id = SkeletonId(self.last_id.get() + 1);
        self.last_id.set(id.0);

        let skeleton = Rc::new(compile(id, result.strings(), result.family())?);
        tracing::debug!(
            skeleton = %id,
            family = ?result.family(),
            slots = skeleton.slots().len(),
            "compiled template skeleton"
        );

        self.families
            .borrow_mut()
            .entry(result.family())
            .or_default()
            .insert(StringsKey(result.strings()), Rc::clone(&skeleton));
        Ok(skeleton)
    }

    /// Look up an already compiled skeleton
    pub fn get(
        &self,
        family: TemplateFamily,
        strings: &'static TemplateStrings,
    ) -> Option<Rc<Skeleton>> {
        self.families
            .borrow()
            .get(&family)
            .and_then(|by_strings| by_strings.get(&StringsKey(strings)))
            .cloned()
    }

    /// Number of cached skeletons across all families
    pub fn len(&self) -> usize {
        self.families.borrow().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SkeletonCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkeletonCache")
            .field("skeletons", &self.len())
            .finish()
    }
}
