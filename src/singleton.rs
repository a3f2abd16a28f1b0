//! Three-tier singleton cache.
//!
//! Tier one holds finished singletons and is safe for unsynchronized
//! concurrent reads once populated. Tiers two and three (early references
//! and early-reference factories) together with the in-creation marker set
//! live behind one coarse re-entrant lock shared across all names: holding
//! it for the full duration of one singleton's creation serializes singleton
//! construction container-wide, which is what guarantees at most one
//! creation per name. Re-entrant `get` calls on the creating thread observe
//! the early tiers instead of deadlocking, which is how reference cycles
//! between singletons are broken.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::trace;

use crate::blueprint::AnyArc;
use crate::error::{ContainerError, ContainerResult};
use crate::internal::DestructionBag;

type EarlyFactory = Box<dyn FnOnce() -> AnyArc + Send>;

#[derive(Default)]
struct CreationTiers {
    early: HashMap<String, AnyArc>,
    factories: HashMap<String, EarlyFactory>,
    in_creation: HashSet<String>,
}

/// The singleton cache backing a container.
pub struct SingletonCache {
    finals: RwLock<HashMap<String, AnyArc>>,
    tiers: ReentrantMutex<RefCell<CreationTiers>>,
    destruction: Mutex<DestructionBag>,
}

impl SingletonCache {
    pub(crate) fn new() -> Self {
        Self {
            finals: RwLock::new(HashMap::new()),
            tiers: ReentrantMutex::new(RefCell::new(CreationTiers::default())),
            destruction: Mutex::new(DestructionBag::default()),
        }
    }

    /// Looks up a singleton, consulting the early tiers only for names
    /// currently mid-creation.
    ///
    /// For an in-creation name the early-reference factory is invoked at
    /// most once; its result moves to the early tier and is handed out for
    /// every subsequent lookup until creation completes.
    pub fn get(&self, name: &str) -> Option<AnyArc> {
        if let Some(v) = self.finals.read().get(name) {
            return Some(v.clone());
        }
        let guard = self.tiers.lock();
        let factory = {
            let tiers = guard.borrow();
            if !tiers.in_creation.contains(name) {
                return None;
            }
            if let Some(v) = tiers.early.get(name) {
                return Some(v.clone());
            }
            drop(tiers);
            guard.borrow_mut().factories.remove(name)
        };
        let factory = factory?;
        let v = factory();
        guard.borrow_mut().early.insert(name.to_string(), v.clone());
        trace!(instance = name, "early reference materialized");
        Some(v)
    }

    /// Runs `factory` to create the singleton, holding the shared creation
    /// lock for the whole duration. Re-entry for the *same* name on one
    /// call chain is rejected rather than deadlocking or re-creating.
    pub fn get_or_create(
        &self,
        name: &str,
        factory: impl FnOnce() -> ContainerResult<AnyArc>,
    ) -> ContainerResult<AnyArc> {
        let guard = self.tiers.lock();
        if let Some(v) = self.finals.read().get(name) {
            return Ok(v.clone());
        }
        {
            let mut tiers = guard.borrow_mut();
            if !tiers.in_creation.insert(name.to_string()) {
                // Double-creation guard; genuine cycles are caught earlier by
                // the resolver with the full path.
                return Err(ContainerError::creation(
                    name,
                    "instance is already being created on this call chain",
                ));
            }
        }
        let result = factory();
        {
            let mut tiers = guard.borrow_mut();
            tiers.in_creation.remove(name);
        }
        match result {
            Ok(v) => {
                // The pipeline promotes the (possibly wrapped) instance; fall
                // back to promoting the factory result for bare factories.
                if let Some(promoted) = self.finals.read().get(name) {
                    return Ok(promoted.clone());
                }
                self.promote_to_final(name, v.clone());
                Ok(v)
            }
            Err(e) => {
                let mut tiers = guard.borrow_mut();
                tiers.early.remove(name);
                tiers.factories.remove(name);
                Err(e)
            }
        }
    }

    /// Registers the early-reference factory for a name mid-creation.
    /// Replaces any earlier factory or early reference; a no-op once the
    /// name has a final instance.
    pub fn register_early_factory(&self, name: &str, factory: EarlyFactory) {
        let guard = self.tiers.lock();
        if self.finals.read().contains_key(name) {
            return;
        }
        let mut tiers = guard.borrow_mut();
        tiers.factories.insert(name.to_string(), factory);
        tiers.early.remove(name);
    }

    /// Moves an instance to the final tier, clearing its early tiers.
    ///
    /// Lock order is always creation tiers before the final map; the
    /// creation lock is re-entrant so the creating thread passes through.
    pub fn promote_to_final(&self, name: &str, instance: AnyArc) {
        let guard = self.tiers.lock();
        self.finals.write().insert(name.to_string(), instance);
        let mut tiers = guard.borrow_mut();
        tiers.early.remove(name);
        tiers.factories.remove(name);
    }

    /// Removes a singleton from every tier, returning the final instance
    /// if one existed.
    pub fn remove(&self, name: &str) -> Option<AnyArc> {
        let guard = self.tiers.lock();
        let removed = self.finals.write().remove(name);
        let mut tiers = guard.borrow_mut();
        tiers.early.remove(name);
        tiers.factories.remove(name);
        removed
    }

    /// Whether the name is currently mid-creation.
    pub fn in_creation(&self, name: &str) -> bool {
        let guard = self.tiers.lock();
        let tiers = guard.borrow();
        tiers.in_creation.contains(name)
    }

    /// Whether a final instance exists under this name.
    pub fn contains(&self, name: &str) -> bool {
        self.finals.read().contains_key(name)
    }

    /// Names of all final singletons.
    pub fn names(&self) -> Vec<String> {
        self.finals.read().keys().cloned().collect()
    }

    /// Number of final singletons.
    pub fn count(&self) -> usize {
        self.finals.read().len()
    }

    pub(crate) fn register_destruction(
        &self,
        name: String,
        callback: Box<dyn FnOnce() -> ContainerResult<()> + Send>,
    ) {
        self.destruction.lock().push(name, callback);
    }

    /// Runs all destroy callbacks in reverse registration order, then
    /// clears every tier.
    pub(crate) fn destroy_all(&self) -> Vec<(String, ContainerResult<()>)> {
        let outcomes = self.destruction.lock().run_all_reverse();
        self.clear_all();
        outcomes
    }

    pub(crate) fn clear_all(&self) {
        let guard = self.tiers.lock();
        self.finals.write().clear();
        let mut tiers = guard.borrow_mut();
        tiers.early.clear();
        tiers.factories.clear();
        tiers.in_creation.clear();
    }
}
