use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::session::lifecycle::{HotSwapOutcome, StreamLifecycle};
use crate::traits::enumeration_observer::{EnumerationObserver, HotSwapSnapshot};

/// Keeps a stream consistent across output device list changes.
///
/// The before hook stops a running stream and captures whether it was
/// running; the snapshot is handed back to the after hook, which re-resolves
/// the device and restarts. There is no flag stored on the coordinator
/// between the two calls.
pub struct HotSwapCoordinator {
    lifecycle: Arc<StreamLifecycle>,
    last_outcome: Mutex<Option<HotSwapOutcome>>,
}

impl HotSwapCoordinator {
    pub fn new(lifecycle: Arc<StreamLifecycle>) -> Self {
        Self {
            lifecycle,
            last_outcome: Mutex::new(None),
        }
    }

    /// Create a coordinator and subscribe it to `notifier`.
    ///
    /// The notifier keeps only a weak reference; the caller owns the
    /// returned `Arc`.
    pub fn attach(lifecycle: Arc<StreamLifecycle>, notifier: &EnumerationNotifier) -> Arc<Self> {
        let coordinator = Arc::new(Self::new(lifecycle));
        let observer: Arc<dyn EnumerationObserver> = coordinator.clone();
        notifier.subscribe(&observer);
        coordinator
    }

    pub fn lifecycle(&self) -> &Arc<StreamLifecycle> {
        &self.lifecycle
    }

    /// Outcome of the most recent after-change hook.
    pub fn last_outcome(&self) -> Option<HotSwapOutcome> {
        self.last_outcome.lock().clone()
    }

    /// Run `change` between the before and after hooks.
    pub fn coordinate<F: FnOnce()>(&self, change: F) -> HotSwapOutcome {
        let snapshot = self.lifecycle.will_change();
        change();
        self.finish(snapshot)
    }

    fn finish(&self, snapshot: HotSwapSnapshot) -> HotSwapOutcome {
        let outcome = self.lifecycle.did_change(snapshot);
        *self.last_outcome.lock() = Some(outcome.clone());
        outcome
    }
}

impl EnumerationObserver for HotSwapCoordinator {
    fn on_before_enumeration_change(&self) -> HotSwapSnapshot {
        self.lifecycle.will_change()
    }

    fn on_after_enumeration_change(&self, snapshot: HotSwapSnapshot) {
        self.finish(snapshot);
    }
}

/// Fan-out of device enumeration changes to subscribed observers.
///
/// Observers are held weakly and pruned once dropped.
#[derive(Default)]
pub struct EnumerationNotifier {
    observers: Mutex<Vec<Weak<dyn EnumerationObserver>>>,
}

impl EnumerationNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: &Arc<dyn EnumerationObserver>) {
        self.observers.lock().push(Arc::downgrade(observer));
    }

    pub fn observer_count(&self) -> usize {
        let mut observers = self.observers.lock();
        observers.retain(|o| o.strong_count() > 0);
        observers.len()
    }

    /// Run every before hook and return the pending change.
    ///
    /// The observer list is copied out first so hooks run without the
    /// notifier lock.
    pub fn begin_change(&self) -> PendingEnumeration {
        let live: Vec<Arc<dyn EnumerationObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        let snapshots = live
            .into_iter()
            .map(|observer| {
                let snapshot = observer.on_before_enumeration_change();
                (observer, snapshot)
            })
            .collect();
        PendingEnumeration { snapshots }
    }

    /// Run `change` wrapped in the before and after hooks of every observer.
    pub fn notify_change<F: FnOnce()>(&self, change: F) {
        let pending = self.begin_change();
        change();
        pending.finish();
    }
}

/// Snapshots captured by the before hooks, waiting for the after hooks.
#[must_use = "observers stay stopped until finish() is called"]
pub struct PendingEnumeration {
    snapshots: Vec<(Arc<dyn EnumerationObserver>, HotSwapSnapshot)>,
}

impl PendingEnumeration {
    /// Hand each observer its own snapshot back.
    pub fn finish(self) {
        for (observer, snapshot) in self.snapshots {
            observer.on_after_enumeration_change(snapshot);
        }
    }
}
