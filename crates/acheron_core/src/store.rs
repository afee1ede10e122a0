//! Single-writer state store.
//!
//! Every write is a producer that maps the current state to a partial patch.
//! Producers run strictly in submission order, each one seeing the state the
//! previous one committed. A commit that leaves the state deep-equal to what
//! it was notifies nobody.

use std::collections::VecDeque;

/// A state that can absorb a partial update.
pub trait Merge {
    type Patch;

    fn merge(&mut self, patch: Self::Patch);
}

pub type Producer<S> = Box<dyn FnOnce(&S) -> <S as Merge>::Patch + Send>;

/// Called with `(reason, previous, next)` after every effective commit.
pub type Listener<S> = Box<dyn FnMut(&str, &S, &S) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct StateStore<S: Merge> {
    state: S,
    queue: VecDeque<(String, Producer<S>)>,
    listeners: Vec<(SubscriptionId, Listener<S>)>,
    next_subscription: u64,
}

impl<S> StateStore<S>
where
    S: Merge + Clone + PartialEq,
{
    pub fn new(state: S) -> Self {
        Self {
            state,
            queue: VecDeque::new(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Queues a producer; it runs on the next [`flush`](Self::flush) or
    /// before the next synchronous write.
    pub fn submit<F>(&mut self, why: &str, producer: F)
    where
        F: FnOnce(&S) -> S::Patch + Send + 'static,
    {
        self.queue.push_back((why.to_string(), Box::new(producer)));
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Runs every queued producer in order. Returns how many changed the state.
    pub fn flush(&mut self) -> usize {
        let mut changed = 0;
        while let Some((why, producer)) = self.queue.pop_front() {
            let patch = producer(&self.state);
            if self.commit(&why, patch) {
                changed += 1;
            }
        }
        changed
    }

    /// Drains the queue, then applies `producer` immediately. Unlike
    /// [`submit`](Self::submit) the producer may borrow from the caller.
    pub fn set<F>(&mut self, why: &str, producer: F) -> bool
    where
        F: FnOnce(&S) -> S::Patch,
    {
        self.flush();
        let patch = producer(&self.state);
        self.commit(why, patch)
    }

    /// Like [`set`](Self::set) for a producer that can fail. On error nothing
    /// is committed.
    pub fn try_set<F, E>(&mut self, why: &str, producer: F) -> Result<bool, E>
    where
        F: FnOnce(&S) -> Result<S::Patch, E>,
    {
        self.flush();
        let patch = producer(&self.state)?;
        Ok(self.commit(why, patch))
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&str, &S, &S) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn commit(&mut self, why: &str, patch: S::Patch) -> bool {
        let mut next = self.state.clone();
        next.merge(patch);
        if next == self.state {
            tracing::trace!(why, "state unchanged");
            return false;
        }
        let previous = std::mem::replace(&mut self.state, next);
        for (_, listener) in self.listeners.iter_mut() {
            listener(why, &previous, &self.state);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        counter: i64,
        label: String,
    }

    #[derive(Default)]
    struct CounterPatch {
        counter: Option<i64>,
        label: Option<String>,
    }

    impl Merge for Counter {
        type Patch = CounterPatch;

        fn merge(&mut self, patch: CounterPatch) {
            if let Some(counter) = patch.counter {
                self.counter = counter;
            }
            if let Some(label) = patch.label {
                self.label = label;
            }
        }
    }

    fn store() -> StateStore<Counter> {
        StateStore::new(Counter {
            counter: 5,
            label: "start".into(),
        })
    }

    fn increment(prev: &Counter) -> CounterPatch {
        CounterPatch {
            counter: Some(prev.counter + 1),
            ..Default::default()
        }
    }

    #[test]
    fn queued_producers_see_previous_commit() {
        let mut store = store();
        store.submit("first", increment);
        store.submit("second", increment);
        assert_eq!(store.pending(), 2);
        assert_eq!(store.state().counter, 5);
        assert_eq!(store.flush(), 2);
        assert_eq!(store.state().counter, 7);
    }

    #[test]
    fn set_drains_queue_first() {
        let mut store = store();
        store.submit("queued", increment);
        store.set("double", |prev| CounterPatch {
            counter: Some(prev.counter * 2),
            ..Default::default()
        });
        assert_eq!(store.state().counter, 12);
    }

    #[test]
    fn no_op_does_not_notify() {
        let mut store = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |why, prev, next| {
            sink.lock().push((why.to_string(), prev.counter, next.counter));
        });

        assert!(!store.set("same", |prev| CounterPatch {
            label: Some(prev.label.clone()),
            ..Default::default()
        }));
        assert!(store.set("bump", increment));
        assert_eq!(*seen.lock(), vec![("bump".to_string(), 5, 6)]);
    }

    #[test]
    fn unsubscribed_listener_is_silent() {
        let mut store = store();
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let id = store.subscribe(move |_, _, _| *counter.lock() += 1);
        store.set("one", increment);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set("two", increment);
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn failed_producer_commits_nothing() {
        let mut store = store();
        store.submit("queued", increment);
        let result: Result<bool, &str> = store.try_set("fails", |_| Err("boom"));
        assert_eq!(result, Err("boom"));
        // the queue still ran
        assert_eq!(store.state().counter, 6);
    }
}
