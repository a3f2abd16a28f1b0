//! Scope strategies for non-singleton instances.
//!
//! A [`Scope`] decides whether the lifecycle pipeline's result is cached at
//! all and for how long. The singleton scope is not represented here; it is
//! the container's own cache. [`UnscopedScope`] never caches.
//! [`ConversationScope`] keys its cache by an externally supplied
//! conversation identifier and runs destruction callbacks when a
//! conversation ends.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::blueprint::AnyArc;
use crate::error::ContainerResult;

/// Factory handed to a scope on cache miss; runs the full lifecycle pipeline.
pub type ScopeFactory<'a> = dyn Fn() -> ContainerResult<AnyArc> + 'a;

/// Destruction callback registered against a scope. Failures are handled
/// (and logged) inside the callback itself.
pub type ScopeCallback = Box<dyn FnOnce() + Send>;

/// A caching policy for one scope name.
pub trait Scope: Send + Sync {
    /// Returns the instance cached under `name`, invoking `factory` on miss.
    fn get(&self, name: &str, factory: &ScopeFactory<'_>) -> ContainerResult<AnyArc>;

    /// Removes the cached instance, if any, dropping its callbacks.
    fn remove(&self, name: &str) -> Option<AnyArc>;

    /// Registers a callback to run when the instance's lifetime ends.
    fn register_destruction_callback(&self, name: &str, callback: ScopeCallback);

    /// Identifier of the scope's current conversation, where meaningful.
    fn conversation_id(&self) -> Option<String>;
}

/// Never caches: each `get` runs the factory and returns a fresh instance.
///
/// Destruction callbacks registered here are intentionally never invoked by
/// the container; ownership of unscoped instances rests with the caller.
/// At most one callback is held per name, so repeated resolution does not
/// accumulate captured instances.
#[derive(Default)]
pub struct UnscopedScope {
    callbacks: Mutex<HashMap<String, ScopeCallback>>,
}

impl UnscopedScope {
    /// Creates the unscoped policy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scope for UnscopedScope {
    fn get(&self, _name: &str, factory: &ScopeFactory<'_>) -> ContainerResult<AnyArc> {
        factory()
    }

    fn remove(&self, name: &str) -> Option<AnyArc> {
        self.callbacks.lock().remove(name);
        None
    }

    fn register_destruction_callback(&self, name: &str, callback: ScopeCallback) {
        self.callbacks.lock().insert(name.to_string(), callback);
    }

    fn conversation_id(&self) -> Option<String> {
        None
    }
}

#[derive(Default)]
struct ConversationState {
    instances: HashMap<String, AnyArc>,
    // The thread id records which thread registered each callback; the
    // factory runs on the registering thread, so it identifies the
    // registrations of an instance that loses a creation race.
    callbacks: Vec<(String, ThreadId, ScopeCallback)>,
}

/// A request/session-like scope keyed by conversation identifier.
///
/// The active conversation is set explicitly via [`set_conversation`]
/// (per thread of control in the caller's hands, not thread-local).
/// Ending a conversation drops its cached instances and runs their
/// destruction callbacks in reverse registration order.
///
/// [`set_conversation`]: ConversationScope::set_conversation
pub struct ConversationScope {
    current: RwLock<String>,
    conversations: Mutex<HashMap<String, ConversationState>>,
}

impl ConversationScope {
    /// Creates the scope with the given initial conversation active.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(initial.into()),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Switches the active conversation.
    pub fn set_conversation(&self, id: impl Into<String>) {
        *self.current.write() = id.into();
    }

    /// Ends a conversation: drops its instances and runs their destruction
    /// callbacks in reverse registration order.
    pub fn end_conversation(&self, id: &str) {
        let state = self.conversations.lock().remove(id);
        if let Some(mut state) = state {
            debug!(conversation = id, instances = state.instances.len(), "ending conversation");
            while let Some((_, _, callback)) = state.callbacks.pop() {
                callback();
            }
        }
    }
}

impl Scope for ConversationScope {
    fn get(&self, name: &str, factory: &ScopeFactory<'_>) -> ContainerResult<AnyArc> {
        let conversation = self.current.read().clone();
        {
            let mut conversations = self.conversations.lock();
            let state = conversations.entry(conversation.clone()).or_default();
            if let Some(v) = state.instances.get(name) {
                return Ok(v.clone());
            }
        }
        // The factory re-enters the container; the conversation map must not
        // be held across it.
        let created = factory()?;
        let mut conversations = self.conversations.lock();
        let state = conversations.entry(conversation).or_default();
        match state.instances.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                // Another thread built and cached this name while the
                // factory ran. Keep the cached instance and discard the
                // callbacks this thread registered for the losing one.
                let current = thread::current().id();
                state
                    .callbacks
                    .retain(|(n, tid, _)| n != name || *tid != current);
                Ok(existing.get().clone())
            }
            Entry::Vacant(slot) => Ok(slot.insert(created).clone()),
        }
    }

    fn remove(&self, name: &str) -> Option<AnyArc> {
        let conversation = self.current.read().clone();
        let mut conversations = self.conversations.lock();
        let state = conversations.get_mut(&conversation)?;
        state.callbacks.retain(|(n, _, _)| n != name);
        state.instances.remove(name)
    }

    fn register_destruction_callback(&self, name: &str, callback: ScopeCallback) {
        let conversation = self.current.read().clone();
        let mut conversations = self.conversations.lock();
        let state = conversations.entry(conversation).or_default();
        state
            .callbacks
            .push((name.to_string(), thread::current().id(), callback));
    }

    fn conversation_id(&self) -> Option<String> {
        Some(self.current.read().clone())
    }
}
