//! Internal destruction bag for managing destroy callbacks.

use tracing::warn;

use crate::error::ContainerResult;

type DestroyFn = Box<dyn FnOnce() -> ContainerResult<()> + Send>;

/// Container for destroy callbacks with LIFO execution order.
///
/// Callbacks run in strict reverse-registration order; a failing callback
/// is recorded and does not stop the remaining ones.
#[derive(Default)]
pub(crate) struct DestructionBag {
    entries: Vec<(String, DestroyFn)>,
}

impl DestructionBag {
    /// Add a destroy callback for the named instance.
    pub(crate) fn push(&mut self, name: String, f: DestroyFn) {
        self.entries.push((name, f));
    }

    /// Execute all callbacks in reverse order (LIFO), collecting each
    /// instance's outcome in execution order.
    pub(crate) fn run_all_reverse(&mut self) -> Vec<(String, ContainerResult<()>)> {
        let mut outcomes = Vec::with_capacity(self.entries.len());
        while let Some((name, f)) = self.entries.pop() {
            let outcome = f();
            if let Err(err) = &outcome {
                warn!(instance = %name, error = %err, "destroy callback failed");
            }
            outcomes.push((name, outcome));
        }
        outcomes
    }
}
