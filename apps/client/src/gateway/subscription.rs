use std::fmt;
use std::sync::{Mutex, PoisonError};

type Disposer = Box<dyn FnOnce() + Send>;

/// Handle to a live listener. Disposing is idempotent and also happens on drop.
pub struct Subscription {
    dispose: Mutex<Option<Disposer>>,
}

impl Subscription {
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Mutex::new(Some(Box::new(dispose))),
        }
    }

    /// A handle with nothing to tear down.
    pub fn noop() -> Self {
        Self {
            dispose: Mutex::new(None),
        }
    }

    pub fn unsubscribe(&self) {
        let dispose = self
            .dispose
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dispose) = dispose {
            dispose();
        }
    }

    pub fn is_active(&self) -> bool {
        self.dispose
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
