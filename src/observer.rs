//! Diagnostic observers for container lifecycle events.
//!
//! Observers receive creation and destruction notifications for every
//! managed instance, enabling structured tracing and startup profiling
//! without touching the lifecycle pipeline itself.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::ContainerError;

/// Hook interface for observing instance lifecycle events.
///
/// All methods default to no-ops so implementors override only what they
/// care about.
pub trait ContainerObserver: Send + Sync {
    /// An instance is about to be created.
    fn creating(&self, name: &str) {
        let _ = name;
    }

    /// An instance finished the full lifecycle pipeline.
    fn created(&self, name: &str, duration: Duration) {
        let _ = (name, duration);
    }

    /// Creation aborted with an error.
    fn creation_failed(&self, name: &str, error: &ContainerError) {
        let _ = (name, error);
    }

    /// An instance's destroy callback ran during shutdown.
    fn destroyed(&self, name: &str) {
        let _ = name;
    }
}

/// Fan-out collection of registered observers.
#[derive(Default)]
pub(crate) struct Observers {
    list: RwLock<Vec<Arc<dyn ContainerObserver>>>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Arc<dyn ContainerObserver>) {
        self.list.write().push(observer);
    }

    pub(crate) fn creating(&self, name: &str) {
        for obs in self.list.read().iter() {
            obs.creating(name);
        }
    }

    pub(crate) fn created(&self, name: &str, duration: Duration) {
        for obs in self.list.read().iter() {
            obs.created(name, duration);
        }
    }

    pub(crate) fn creation_failed(&self, name: &str, error: &ContainerError) {
        for obs in self.list.read().iter() {
            obs.creation_failed(name, error);
        }
    }

    pub(crate) fn destroyed(&self, name: &str) {
        for obs in self.list.read().iter() {
            obs.destroyed(name);
        }
    }
}

/// Observer that emits lifecycle events through `tracing`.
#[derive(Default)]
pub struct TracingObserver;

impl TracingObserver {
    /// Creates the observer.
    pub fn new() -> Self {
        Self
    }
}

impl ContainerObserver for TracingObserver {
    fn creating(&self, name: &str) {
        debug!(instance = name, "creating");
    }

    fn created(&self, name: &str, duration: Duration) {
        debug!(instance = name, elapsed_us = duration.as_micros() as u64, "created");
    }

    fn creation_failed(&self, name: &str, error: &ContainerError) {
        warn!(instance = name, error = %error, "creation failed");
    }

    fn destroyed(&self, name: &str) {
        debug!(instance = name, "destroyed");
    }
}
