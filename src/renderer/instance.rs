//! Live template instances
//!
//! An [`Instance`] is a deep clone of a skeleton's tree plus one slot record
//! per slot descriptor. Nested template values own their own instances, so a
//! rendered container holds a strict ownership tree of instances.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::target::SlotTarget;
use super::{AsyncErrorPolicy, Context};
use crate::dom::{Node, TreeWalker};
use crate::reactive::Subscription;
use crate::template::{
    resolve, Emission, Resolution, Resolved, ResolvedTemplate, Skeleton, SkeletonId, Value,
};
use crate::RenderError;

/// One materialization of a skeleton
pub struct Instance {
    skeleton: Rc<Skeleton>,
    root: Node,
    slots: Vec<Rc<InstanceSlot>>,
    depth: usize,
}

struct InstanceSlot {
    skeleton: SkeletonId,
    position: usize,
    /// Depth of the owning instance
    depth: usize,
    value_count: usize,
    target: SlotTarget,
    state: RefCell<SlotState>,
}

#[derive(Default)]
struct SlotState {
    /// Raw values of the last update, `None` forces the next one through
    previous: Option<Vec<Value>>,
    subscription: Option<Subscription>,
    resolved: Vec<Resolved>,
    /// Bumped on every update so late emissions of a replaced value are ignored
    generation: u64,
}

impl Instance {
    /// Clone the skeleton's tree and bind every slot descriptor to the
    /// matching node of the clone
    pub(crate) fn create(skeleton: Rc<Skeleton>, depth: usize) -> Result<Self, RenderError> {
        let root = skeleton.root().deep_clone();
        let mut walker = TreeWalker::new(&root);
        let mut walked = 0;
        let mut current: Option<Node> = None;
        let mut slots = Vec::with_capacity(skeleton.slots().len());

        for (position, descriptor) in skeleton.slots().iter().enumerate() {
            // Several attribute slots may share one element
            while walked <= descriptor.index() {
                current = walker.next_node();
                walked += 1;
                if current.is_none() {
                    break;
                }
            }
            let missing = || RenderError::MissingSlotTarget {
                skeleton: skeleton.id(),
                slot: position,
            };
            let node = current.clone().ok_or_else(missing)?;
            let target = SlotTarget::locate(descriptor, node).ok_or_else(missing)?;
            slots.push(Rc::new(InstanceSlot {
                skeleton: skeleton.id(),
                position,
                depth,
                value_count: descriptor.value_count(),
                target,
                state: RefCell::new(SlotState::default()),
            }));
        }

        debug!(skeleton = %skeleton.id(), depth, slots = slots.len(), "created instance");
        Ok(Instance {
            skeleton,
            root,
            slots,
            depth,
        })
    }

    /// Fragment holding the instance's nodes
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn skeleton(&self) -> &Rc<Skeleton> {
        &self.skeleton
    }

    /// Nesting depth, zero for an instance mounted directly in a container
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Feed a new set of expression values through the slots, in order
    pub(crate) fn update(&self, ctx: &Rc<Context>, values: &[Value]) -> Result<(), RenderError> {
        let expected = self.skeleton.expression_count();
        if values.len() != expected {
            warn!(
                skeleton = %self.skeleton.id(),
                expected,
                received = values.len(),
                "value count does not match the template's expressions"
            );
        }

        let mut offset = 0;
        let mut errors = Vec::new();
        for slot in &self.slots {
            let consumed: Vec<Value> = (offset..offset + slot.value_count)
                .map(|index| values.get(index).cloned().unwrap_or_default())
                .collect();
            offset += slot.value_count;
            if let Err(error) = slot.update(ctx, consumed) {
                errors.push(error);
            }
        }
        RenderError::collect(errors)
    }

    /// Cancel every subscription held by this instance and its descendants
    pub(crate) fn dispose(self) {
        debug!(skeleton = %self.skeleton.id(), depth = self.depth, "disposing instance");
        for slot in &self.slots {
            slot.clear();
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("skeleton", &self.skeleton.id())
            .field("depth", &self.depth)
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl InstanceSlot {
    fn update(self: &Rc<Self>, ctx: &Rc<Context>, values: Vec<Value>) -> Result<(), RenderError> {
        let generation = {
            let mut state = self.state.try_borrow_mut().map_err(|_| RenderError::Reentrant)?;
            if let Some(previous) = &state.previous {
                if previous.len() == values.len()
                    && previous.iter().zip(&values).all(|(old, new)| old.is_identical(new))
                {
                    trace!(skeleton = %self.skeleton, slot = self.position, "slot value unchanged");
                    return Ok(());
                }
            }
            // The old source must be silenced before anything new is applied
            if let Some(subscription) = state.subscription.take() {
                trace!(skeleton = %self.skeleton, slot = self.position, "unsubscribing");
                subscription.unsubscribe();
            }
            state.generation += 1;
            state.previous = Some(values.clone());
            state.generation
        };
        trace!(skeleton = %self.skeleton, slot = self.position, "updating slot");

        let raw = match self.target {
            SlotTarget::AttributeTemplate { .. } => Value::List(values.into()),
            _ => values.into_iter().next().unwrap_or_default(),
        };
        let slot = Rc::downgrade(self);
        let emit_ctx = Rc::clone(ctx);
        let resolution = resolve(&raw, &ctx.cache, move |emission| {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            if let Err(error) = slot.receive(&emit_ctx, emission, generation) {
                emit_ctx.report(&error);
            }
        });

        let outcome = match resolution {
            Ok(Resolution::Ready(items)) => self.apply(ctx, items),
            Ok(Resolution::Pending(subscription)) => {
                self.hold(subscription, generation);
                Ok(())
            }
            Err(error) => Err(error.into()),
        };
        if outcome.is_err() {
            // Keep the content but let an identical value retry
            if let Ok(mut state) = self.state.try_borrow_mut() {
                state.previous = None;
            }
        }
        outcome
    }

    fn hold(&self, subscription: Subscription, generation: u64) {
        match self.state.try_borrow_mut() {
            Ok(mut state) if state.generation == generation => state.subscription = Some(subscription),
            _ => subscription.unsubscribe(),
        }
    }

    /// Handle one delivery from an asynchronous value
    fn receive(&self, ctx: &Rc<Context>, emission: Emission, generation: u64) -> Result<(), RenderError> {
        let current = self
            .state
            .try_borrow()
            .map_err(|_| RenderError::Reentrant)?
            .generation;
        if current != generation {
            trace!(skeleton = %self.skeleton, slot = self.position, "ignoring stale emission");
            return Ok(());
        }
        match emission {
            Ok(items) => self.apply(ctx, items),
            Err(error) => {
                if ctx.config.async_errors == AsyncErrorPolicy::ClearContent {
                    self.apply(ctx, Vec::new())?;
                }
                Err(error.into())
            }
        }
    }

    /// Reconcile the slot with a freshly resolved list
    fn apply(&self, ctx: &Rc<Context>, mut items: Vec<Resolved>) -> Result<(), RenderError> {
        let mut state = self.state.try_borrow_mut().map_err(|_| RenderError::Reentrant)?;

        // Build every new instance up front so a failure leaves the slot as it was
        let mut fresh = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            fresh.push(match item {
                Resolved::Template(new) if !reusable(state.resolved.get(position), new) => {
                    if self.depth + 1 > ctx.config.max_depth {
                        return Err(RenderError::DepthExceeded {
                            limit: ctx.config.max_depth,
                        });
                    }
                    Some(Instance::create(Rc::clone(&new.skeleton), self.depth + 1)?)
                }
                _ => None,
            });
        }

        let mut previous = std::mem::take(&mut state.resolved);
        for ((position, item), fresh) in items.iter_mut().enumerate().zip(fresh) {
            if let Resolved::Template(new) = item {
                new.instance = fresh.or_else(|| match previous.get_mut(position) {
                    Some(Resolved::Template(old)) => old.instance.take(),
                    _ => None,
                });
            }
        }

        let mut errors = Vec::new();
        match self.target.apply(&items) {
            Ok(()) => {
                for item in &items {
                    if let Resolved::Template(ResolvedTemplate {
                        result,
                        instance: Some(instance),
                        ..
                    }) = item
                    {
                        if let Err(error) = instance.update(ctx, result.values()) {
                            errors.push(error);
                        }
                    }
                }
            }
            Err(error) => errors.push(error.into()),
        }
        state.resolved = items;
        drop(state);

        dispose_items(previous);
        RenderError::collect(errors)
    }

    fn clear(&self) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            warn!(skeleton = %self.skeleton, slot = self.position, "slot is busy, skipping disposal");
            return;
        };
        state.generation += 1;
        state.previous = None;
        if let Some(subscription) = state.subscription.take() {
            trace!(skeleton = %self.skeleton, slot = self.position, "unsubscribing");
            subscription.unsubscribe();
        }
        let resolved = std::mem::take(&mut state.resolved);
        drop(state);
        dispose_items(resolved);
    }
}

fn reusable(old: Option<&Resolved>, new: &ResolvedTemplate) -> bool {
    matches!(
        old,
        Some(Resolved::Template(old))
            if old.instance.is_some() && Rc::ptr_eq(&old.skeleton, &new.skeleton)
    )
}

fn dispose_items(items: Vec<Resolved>) {
    for item in items {
        if let Resolved::Template(ResolvedTemplate {
            instance: Some(instance),
            ..
        }) = item
        {
            instance.dispose();
        }
    }
}
