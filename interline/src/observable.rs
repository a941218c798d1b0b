//! Single-threaded value cell with change notification.
//!
//! Subscribers are explicit handles: [`Observable::subscribe`] returns a
//! [`SubscriptionId`] that must be passed back to [`Observable::unsubscribe`]. Nothing is
//! delivered to a subscriber before it subscribes or after it unsubscribes, including when
//! a callback unsubscribes another one mid-notification.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Rc<dyn Fn(T, T)>;

pub struct Observable<T> {
    value: Cell<T>,
    subscribers: RefCell<Vec<(SubscriptionId, Callback<T>)>>,
    next_id: Cell<u64>,
}

impl<T: Copy + PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Cell::new(value),
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Store `value` and notify subscribers with `(old, new)` if it changed.
    pub fn set(&self, value: T) {
        let old = self.value.replace(value);
        if old == value {
            return;
        }

        // Snapshot the ids so callbacks may (un)subscribe freely.
        let ids: Vec<SubscriptionId> = self.subscribers.borrow().iter().map(|(id, _)| *id).collect();
        for id in ids {
            let callback = self
                .subscribers
                .borrow()
                .iter()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, callback)| Rc::clone(callback));
            if let Some(callback) = callback {
                callback(old, value);
            }
        }
    }

    pub fn subscribe(&self, callback: impl Fn(T, T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(candidate, _)| *candidate != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.value.get())
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifies_with_old_and_new() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let observable = Observable::new(1.0);

        let sink = Rc::clone(&seen);
        observable.subscribe(move |old, new| sink.borrow_mut().push((old, new)));
        observable.set(2.0);
        observable.set(5.0);

        assert_eq!(*seen.borrow(), vec![(1.0, 2.0), (2.0, 5.0)]);
        assert_eq!(observable.get(), 5.0);
    }

    #[test]
    fn unchanged_value_is_silent() {
        let count = Rc::new(Cell::new(0));
        let observable = Observable::new(3);

        let sink = Rc::clone(&count);
        observable.subscribe(move |_, _| sink.set(sink.get() + 1));
        observable.set(3);

        assert_eq!(count.get(), 0);
    }

    #[test]
    fn unsubscribed_callback_is_not_invoked() {
        let count = Rc::new(Cell::new(0));
        let observable = Observable::new(0);

        let sink = Rc::clone(&count);
        let id = observable.subscribe(move |_, _| sink.set(sink.get() + 1));
        observable.set(1);
        assert!(observable.unsubscribe(id));
        observable.set(2);

        assert_eq!(count.get(), 1);
        assert!(!observable.unsubscribe(id));
        assert_eq!(observable.subscriber_count(), 0);
    }

    #[test]
    fn callback_may_unsubscribe_a_later_subscriber() {
        let observable = Rc::new(Observable::new(0));
        let late_calls = Rc::new(Cell::new(0));
        let late_id = Rc::new(Cell::new(None));

        let remover = Rc::clone(&observable);
        let target = Rc::clone(&late_id);
        observable.subscribe(move |_, _| {
            if let Some(id) = target.get() {
                remover.unsubscribe(id);
            }
        });
        let sink = Rc::clone(&late_calls);
        late_id.set(Some(observable.subscribe(move |_, _| sink.set(sink.get() + 1))));

        observable.set(1);

        assert_eq!(late_calls.get(), 0);
        assert_eq!(observable.subscriber_count(), 1);
    }
}
