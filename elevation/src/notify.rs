//! Asynchronous, strictly-ordered change delivery.

use crate::ElevationChange;
use crossbeam_channel::{unbounded, Sender};
use log::debug;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

/// Receives elevation changes on the notifier thread.
pub trait ElevationListener: Send + Sync {
    fn elevations_changed(&self, change: &ElevationChange);
}

/// Token for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

type Listeners = Arc<Mutex<Vec<(u64, Arc<dyn ElevationListener>)>>>;

/// Dispatches changes to listeners from a single dedicated thread:
/// deliveries are serialized relative to each other but asynchronous
/// relative to the call that published them.
pub(crate) struct Notifier {
    tx: Option<Sender<ElevationChange>>,
    listeners: Listeners,
    next_id: AtomicU64,
    worker: Option<JoinHandle<()>>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded::<ElevationChange>();
        let listeners: Listeners = Arc::default();
        let worker = {
            let listeners = Arc::clone(&listeners);
            thread::spawn(move || {
                for change in rx {
                    // Snapshot so a listener may add or remove
                    // listeners during delivery.
                    let current = listeners.lock().unwrap().clone();
                    debug!("delivering {change:?} to {} listeners", current.len());
                    for (_, listener) in current {
                        listener.elevations_changed(&change);
                    }
                }
            })
        };
        Self {
            tx: Some(tx),
            listeners,
            next_id: AtomicU64::new(0),
            worker: Some(worker),
        }
    }

    pub(crate) fn add(&self, listener: Arc<dyn ElevationListener>) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().push((id, listener));
        ListenerHandle(id)
    }

    pub(crate) fn remove(&self, handle: ListenerHandle) {
        self.listeners.lock().unwrap().retain(|(id, _)| *id != handle.0);
    }

    pub(crate) fn publish(&self, change: ElevationChange) {
        if let Some(tx) = &self.tx {
            // The receiver lives until drop; a failed send can only
            // mean shutdown has already begun.
            let _ = tx.send(change);
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
