//! Multi-value asynchronous sources
//!
//! A [`Source`] pushes [`Notification`]s into the [`Sink`] it is subscribed
//! with until it finishes or is unsubscribed. Sources can wrap a `Stream`
//! driven by a local executor.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::future::abortable;
use futures::task::{LocalSpawn, LocalSpawnExt};
use futures::{pin_mut, Stream, StreamExt};

use super::{SourceError, Subscription};
use crate::template::Value;

/// What a source delivers to its sink
#[derive(Debug, Clone)]
pub enum Notification {
    Next(Value),
    Error(SourceError),
    Complete,
}

struct SinkInner {
    observer: RefCell<Box<dyn FnMut(Notification)>>,
    closed: Cell<bool>,
}

/// Receiving end handed to a [`Source`] on subscribe.
///
/// After `error`, `complete` or unsubscribe the sink is closed and ignores
/// everything it is given.
#[derive(Clone)]
pub struct Sink(Rc<SinkInner>);

impl Sink {
    pub fn new(observer: impl FnMut(Notification) + 'static) -> Self {
        Self(Rc::new(SinkInner {
            observer: RefCell::new(Box::new(observer)),
            closed: Cell::new(false),
        }))
    }

    pub fn next(&self, value: impl Into<Value>) {
        self.deliver(Notification::Next(value.into()));
    }

    pub fn error(&self, error: impl Into<SourceError>) {
        self.deliver(Notification::Error(error.into()));
    }

    pub fn complete(&self) {
        self.deliver(Notification::Complete);
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.get()
    }

    pub(crate) fn close(&self) {
        self.0.closed.set(true);
    }

    fn deliver(&self, notification: Notification) {
        if self.is_closed() {
            return;
        }
        if !matches!(notification, Notification::Next(_)) {
            self.close();
        }
        match self.0.observer.try_borrow_mut() {
            Ok(mut observer) => observer(notification),
            Err(_) => {
                tracing::warn!("dropping a notification delivered from inside its own observer")
            }
        }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A push-style value source.
///
/// Each subscription calls the subscribe function with a fresh [`Sink`].
/// Unsubscribing closes that sink before running the source's own teardown,
/// so nothing reaches the observer after cancellation.
#[derive(Clone)]
pub struct Source(Rc<dyn Fn(Sink) -> Subscription>);

impl Source {
    pub fn new(subscribe: impl Fn(Sink) -> Subscription + 'static) -> Self {
        Self(Rc::new(subscribe))
    }

    pub fn subscribe(&self, sink: Sink) -> Subscription {
        let inner = (self.0)(sink.clone());
        Subscription::new(move || {
            sink.close();
            inner.unsubscribe();
        })
    }

    pub fn ptr_eq(&self, other: &Source) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Adapt a `futures` stream. Every subscription creates a stream with
    /// `factory` and drives it on `spawner`; unsubscribing aborts the task.
    pub fn from_stream<Sp, F, S>(spawner: Sp, factory: F) -> Self
    where
        Sp: LocalSpawn + 'static,
        F: Fn() -> S + 'static,
        S: Stream + 'static,
        S::Item: Into<Value>,
    {
        Self::new(move |sink| {
            let stream = factory();
            let task_sink = sink.clone();
            spawn_abortable(&spawner, &sink, async move {
                pin_mut!(stream);
                while let Some(item) = stream.next().await {
                    task_sink.next(item);
                }
                task_sink.complete();
            })
        })
    }

    /// Like [`from_stream`](Self::from_stream) for fallible streams. The
    /// first `Err` is delivered as an error and ends the source.
    pub fn from_try_stream<Sp, F, S, T, E>(spawner: Sp, factory: F) -> Self
    where
        Sp: LocalSpawn + 'static,
        F: Fn() -> S + 'static,
        S: Stream<Item = Result<T, E>> + 'static,
        T: Into<Value>,
        E: Into<SourceError>,
    {
        Self::new(move |sink| {
            let stream = factory();
            let task_sink = sink.clone();
            spawn_abortable(&spawner, &sink, async move {
                pin_mut!(stream);
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(value) => task_sink.next(value),
                        Err(err) => {
                            task_sink.error(err);
                            return;
                        }
                    }
                }
                task_sink.complete();
            })
        })
    }
}

fn spawn_abortable(
    spawner: &impl LocalSpawn,
    sink: &Sink,
    task: impl std::future::Future<Output = ()> + 'static,
) -> Subscription {
    let (task, handle) = abortable(task);
    match spawner.spawn_local(async move {
        // Aborted tasks just stop
        let _ = task.await;
    }) {
        Ok(()) => Subscription::new(move || handle.abort()),
        Err(err) => {
            sink.error(err);
            Subscription::empty()
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Source")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::executor::LocalPool;

    fn collect() -> (Sink, Rc<RefCell<Vec<String>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let sink = Sink::new(move |notification| {
            log.borrow_mut().push(match notification {
                Notification::Next(value) => format!("next {:?}", value),
                Notification::Error(err) => format!("error {}", err),
                Notification::Complete => "complete".to_string(),
            })
        });
        (sink, seen)
    }

    #[test]
    fn test_sink_closes_after_complete() {
        let (sink, seen) = collect();
        sink.next(1);
        sink.complete();
        sink.next(2);
        assert_eq!(*seen.borrow(), vec!["next Number(1)", "complete"]);
        assert!(sink.is_closed());
    }

    #[test]
    fn test_unsubscribe_closes_sink_first() {
        let held: Rc<RefCell<Option<Sink>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&held);
        let source = Source::new(move |sink| {
            *slot.borrow_mut() = Some(sink);
            Subscription::empty()
        });

        let (sink, seen) = collect();
        let subscription = source.subscribe(sink);
        let captured = held.borrow().clone().unwrap();
        captured.next("a");
        subscription.unsubscribe();
        captured.next("b");
        assert_eq!(*seen.borrow(), vec!["next Text(\"a\")"]);
    }

    #[test]
    fn test_from_stream_on_local_pool() {
        let mut pool = LocalPool::new();
        let (tx, rx) = mpsc::unbounded::<i32>();
        let rx = RefCell::new(Some(rx));
        let source = Source::from_stream(pool.spawner(), move || {
            rx.borrow_mut().take().unwrap_or_else(|| mpsc::unbounded().1)
        });

        let (sink, seen) = collect();
        let _subscription = source.subscribe(sink);
        tx.unbounded_send(1).unwrap();
        tx.unbounded_send(2).unwrap();
        pool.run_until_stalled();
        drop(tx);
        pool.run_until_stalled();
        assert_eq!(
            *seen.borrow(),
            vec!["next Number(1)", "next Number(2)", "complete"]
        );
    }

    #[test]
    fn test_from_try_stream_error_ends_source() {
        let mut pool = LocalPool::new();
        let source = Source::from_try_stream(pool.spawner(), || {
            futures::stream::iter(vec![Ok(1), Err("boom"), Ok(3)])
        });

        let (sink, seen) = collect();
        let _subscription = source.subscribe(sink);
        pool.run_until_stalled();
        assert_eq!(*seen.borrow(), vec!["next Number(1)", "error boom"]);
    }

    #[test]
    fn test_abort_on_unsubscribe() {
        let mut pool = LocalPool::new();
        let (tx, rx) = mpsc::unbounded::<i32>();
        let rx = RefCell::new(Some(rx));
        let source = Source::from_stream(pool.spawner(), move || {
            rx.borrow_mut().take().unwrap_or_else(|| mpsc::unbounded().1)
        });

        let (sink, seen) = collect();
        let subscription = source.subscribe(sink);
        subscription.unsubscribe();
        tx.unbounded_send(1).unwrap_or_default();
        pool.run_until_stalled();
        assert!(seen.borrow().is_empty());
    }
}
