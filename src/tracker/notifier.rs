use std::sync::{Arc, RwLock};

use tokio::sync::watch;

/// Receives "the model changed, redraw" signals.
pub trait Notifier: Send + Sync {
    fn on_state_changed(&self);
}

impl<F> Notifier for F
where
    F: Fn() + Send + Sync,
{
    fn on_state_changed(&self) {
        self()
    }
}

/// Fans a change signal out to every registered observer.
///
/// Besides callback observers, each notification bumps a revision number on a
/// watch channel, for consumers that would rather await changes.
pub struct NotifierHub {
    observers: RwLock<Vec<Arc<dyn Notifier>>>,
    revision: watch::Sender<u64>,
}

impl Default for NotifierHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifierHub {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            observers: RwLock::new(Vec::new()),
            revision,
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn Notifier>) {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    /// A receiver whose value is the number of notifications sent so far.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
        let observers = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for observer in observers {
            observer.on_state_changed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_observer_is_called() {
        let hub = NotifierHub::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        for counter in [&first, &second] {
            let counter = Arc::clone(counter);
            hub.subscribe(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        hub.notify();
        hub.notify();
        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
        assert_eq!(hub.revision(), 2);
    }

    #[tokio::test]
    async fn watchers_see_new_revisions() {
        let hub = NotifierHub::new();
        let mut rx = hub.watch();
        hub.notify();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }

    #[test]
    fn callbacks_may_subscribe_without_deadlock() {
        let hub = Arc::new(NotifierHub::new());
        let weak = Arc::downgrade(&hub);
        hub.subscribe(Arc::new(move || {
            if let Some(hub) = weak.upgrade() {
                hub.subscribe(Arc::new(|| {}));
            }
        }));

        hub.notify();
        assert_eq!(hub.observers.read().unwrap().len(), 2);
    }
}
