//! Instance post-processors.
//!
//! Post-processors hook into the lifecycle pipeline around initialization
//! and may replace the instance under construction, which is how proxies
//! enter the picture: [`AutoProxyProcessor`] swaps a finished instance for
//! an interception proxy when any of its advisors is in scope for the
//! instance's type.

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::blueprint::{AnyArc, BlueprintRegistry};
use crate::error::ContainerResult;
use crate::intercept::proxy::{create_proxy, FixedTargetSource};
use crate::intercept::Advisor;

/// Hooks invoked for every created instance, regardless of scope.
///
/// Returning `Ok(None)` keeps the current instance; returning
/// `Ok(Some(other))` replaces it for the rest of the pipeline.
pub trait InstancePostProcessor: Send + Sync {
    /// Runs after property population and aware callbacks, before
    /// initialization.
    fn before_init(&self, instance: &AnyArc, name: &str) -> ContainerResult<Option<AnyArc>> {
        let _ = (instance, name);
        Ok(None)
    }

    /// Runs after initialization.
    fn after_init(&self, instance: &AnyArc, name: &str) -> ContainerResult<Option<AnyArc>> {
        let _ = (instance, name);
        Ok(None)
    }
}

/// Wraps finished instances in interception proxies.
///
/// After initialization the processor looks up the instance's blueprint by
/// concrete type; when at least one registered advisor's pointcut is in
/// scope for the type (or one of its declared interfaces, or is
/// unconditional), the instance is replaced by a proxy over a fixed target
/// source carrying every registered advisor. Chain computation per method
/// still filters advisors individually.
pub struct AutoProxyProcessor {
    blueprints: Arc<BlueprintRegistry>,
    advisors: RwLock<Vec<Arc<Advisor>>>,
}

impl AutoProxyProcessor {
    /// Processor over the given blueprint registry.
    pub fn new(blueprints: Arc<BlueprintRegistry>) -> Self {
        Self {
            blueprints,
            advisors: RwLock::new(Vec::new()),
        }
    }

    /// Registers an advisor considered for every subsequently created
    /// instance.
    pub fn add_advisor(&self, advisor: Arc<Advisor>) {
        self.advisors.write().push(advisor);
    }

    fn in_scope(&self, type_name: &str, interfaces: &[&'static str]) -> bool {
        self.advisors.read().iter().any(|advisor| {
            match advisor.pointcut() {
                None => true,
                Some(pc) => {
                    let filter = pc.class_filter();
                    filter.matches_type(type_name)
                        || interfaces.iter().any(|i| filter.matches_type(i))
                }
            }
        })
    }
}

impl InstancePostProcessor for AutoProxyProcessor {
    fn after_init(&self, instance: &AnyArc, name: &str) -> ContainerResult<Option<AnyArc>> {
        // Unregistered concrete types (including already-proxied instances)
        // pass through untouched.
        let type_name = match self.blueprints.name_for_id(instance.as_ref().type_id()) {
            Some(tn) => tn,
            None => return Ok(None),
        };
        let blueprint = match self.blueprints.get(type_name) {
            Some(bp) => bp,
            None => return Ok(None),
        };
        if !self.in_scope(type_name, blueprint.interfaces()) {
            return Ok(None);
        }
        let advisors = self.advisors.read().clone();
        let source = Arc::new(FixedTargetSource::new(instance.clone(), type_name));
        let proxy = create_proxy(&self.blueprints, source, advisors, None)?;
        debug!(instance = name, type_name, "auto-proxied");
        Ok(Some(Arc::new(proxy) as AnyArc))
    }
}
