//! One-shot asynchronous values
//!
//! A [`Deferred`] is settled once through its [`Settle`] handle or by a
//! future spawned on a [`LocalSpawn`]. Waiters are notified in subscription
//! order.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::task::{LocalSpawn, LocalSpawnExt, SpawnError};

use super::{SourceError, Subscription};
use crate::template::Value;

type Outcome = Result<Value, SourceError>;
type Callback = Box<dyn FnOnce(Outcome)>;
// Emptied on unsubscribe, so a waiter cancelled while others are being
// notified is skipped
type Waiter = Rc<RefCell<Option<Callback>>>;

enum State {
    Pending { waiters: Vec<Waiter> },
    Settled(Outcome),
}

/// A value that becomes available once.
///
/// Settling happens through the paired [`Settle`] handle. Subscribers added
/// after settling are called during `subscribe`, not on a later turn, since
/// nothing here owns a scheduler. Spawn with [`Deferred::from_future`] to
/// have the value arrive from the executor instead.
#[derive(Clone)]
pub struct Deferred(Rc<RefCell<State>>);

/// Write side of a [`Deferred`]. Dropping it unsettled leaves the deferred
/// pending forever.
pub struct Settle(Deferred);

impl Deferred {
    pub fn new() -> (Deferred, Settle) {
        let deferred = Deferred(Rc::new(RefCell::new(State::Pending {
            waiters: Vec::new(),
        })));
        (deferred.clone(), Settle(deferred))
    }

    pub fn resolved(value: impl Into<Value>) -> Self {
        Deferred(Rc::new(RefCell::new(State::Settled(Ok(value.into())))))
    }

    pub fn rejected(error: impl Into<SourceError>) -> Self {
        Deferred(Rc::new(RefCell::new(State::Settled(Err(error.into())))))
    }

    /// Run `future` on `spawner` and settle with its output
    pub fn from_future<Sp, F>(spawner: &Sp, future: F) -> Result<Self, SpawnError>
    where
        Sp: LocalSpawn,
        F: Future + 'static,
        F::Output: Into<Value>,
    {
        let (deferred, settle) = Deferred::new();
        spawner.spawn_local(async move {
            settle.resolve(future.await);
        })?;
        Ok(deferred)
    }

    pub fn is_settled(&self) -> bool {
        matches!(*self.0.borrow(), State::Settled(_))
    }

    pub fn ptr_eq(&self, other: &Deferred) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Call `callback` with the outcome once it is known
    pub fn subscribe(&self, callback: impl FnOnce(Outcome) + 'static) -> Subscription {
        let settled = {
            let mut state = self.0.borrow_mut();
            match &mut *state {
                State::Settled(outcome) => outcome.clone(),
                State::Pending { waiters } => {
                    let waiter: Waiter = Rc::new(RefCell::new(Some(Box::new(callback) as Callback)));
                    let handle = Rc::downgrade(&waiter);
                    waiters.push(waiter);
                    let state = Rc::downgrade(&self.0);
                    return Subscription::new(move || cancel_waiter(&state, &handle));
                }
            }
        };
        callback(settled);
        Subscription::empty()
    }
}

fn cancel_waiter(state: &Weak<RefCell<State>>, handle: &Weak<RefCell<Option<Callback>>>) {
    let Some(waiter) = handle.upgrade() else {
        return;
    };
    waiter.borrow_mut().take();
    if let Some(state) = state.upgrade() {
        if let Ok(mut state) = state.try_borrow_mut() {
            if let State::Pending { waiters } = &mut *state {
                waiters.retain(|other| !Rc::ptr_eq(other, &waiter));
            }
        }
    }
}

impl Settle {
    pub fn resolve(self, value: impl Into<Value>) {
        self.settle(Ok(value.into()));
    }

    pub fn reject(self, error: impl Into<SourceError>) {
        self.settle(Err(error.into()));
    }

    fn settle(self, outcome: Outcome) {
        let waiters = {
            let mut state = (self.0).0.borrow_mut();
            match std::mem::replace(&mut *state, State::Settled(outcome.clone())) {
                State::Pending { waiters } => waiters,
                previous @ State::Settled(_) => {
                    *state = previous;
                    return;
                }
            }
        };
        for waiter in waiters {
            let callback = waiter.borrow_mut().take();
            if let Some(callback) = callback {
                callback(outcome.clone());
            }
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("settled", &self.is_settled())
            .finish()
    }
}
