//! Method interception: advice, pointcuts, advisors, and chain assembly.
//!
//! An [`Advisor`] pairs a piece of advice with an optional [`Pointcut`]
//! saying where it applies. [`ProxyConfig`] owns the registered advisors
//! and computes, per method, the ordered chain of applicable entries; the
//! computed chain is cached by method name and invalidated wholesale when
//! an advisor is added. Execution of a chain is driven by
//! [`MethodInvocation`](invocation::MethodInvocation) inside a
//! [`Proxy`](proxy::Proxy).

pub mod invocation;
pub mod proxy;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::blueprint::AnyArc;
use crate::error::{ContainerError, ContainerResult};
use invocation::MethodInvocation;

/// Advice executed before the target method runs.
pub trait BeforeAdvice: Send + Sync {
    /// Called with the in-flight invocation; an error aborts the call.
    fn before(&self, invocation: &MethodInvocation<'_>) -> ContainerResult<()>;
}

/// Advice executed after the target method returns successfully.
pub trait AfterReturningAdvice: Send + Sync {
    /// Called with the in-flight invocation and the real return value.
    fn after_returning(
        &self,
        invocation: &MethodInvocation<'_>,
        result: &AnyArc,
    ) -> ContainerResult<()>;
}

/// The two advice positions supported by the chain.
#[derive(Clone)]
pub enum Advice {
    /// Runs before the target method
    Before(Arc<dyn BeforeAdvice>),
    /// Runs after a successful return, seeing the return value
    AfterReturning(Arc<dyn AfterReturningAdvice>),
}

/// Decides whether a pointcut applies to a type (concrete or interface).
pub trait ClassFilter: Send + Sync {
    /// Whether the named type is in scope.
    fn matches_type(&self, type_name: &str) -> bool;
}

/// Decides whether a pointcut applies to a method.
///
/// A static matcher is decided once per (method, type) and cached with the
/// chain; a dynamic matcher is additionally re-evaluated on every call with
/// the actual arguments.
pub trait MethodMatcher: Send + Sync {
    /// Static part of the match, evaluated at chain-computation time.
    fn matches(&self, method: &str, type_name: &str) -> bool;

    /// Whether [`matches_args`](MethodMatcher::matches_args) must run per call.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Per-call part of the match for dynamic matchers.
    fn matches_args(&self, method: &str, type_name: &str, args: &[AnyArc]) -> bool {
        let _ = args;
        self.matches(method, type_name)
    }
}

/// A class filter plus a method matcher.
pub trait Pointcut: Send + Sync {
    /// The type-level filter.
    fn class_filter(&self) -> &dyn ClassFilter;

    /// The method-level matcher.
    fn method_matcher(&self) -> &dyn MethodMatcher;
}

/// Class filter accepting every type.
#[derive(Default)]
pub struct TrueClassFilter;

impl ClassFilter for TrueClassFilter {
    fn matches_type(&self, _type_name: &str) -> bool {
        true
    }
}

/// Class filter matching one registered type or interface name.
pub struct TypeClassFilter {
    type_name: &'static str,
}

impl TypeClassFilter {
    /// Filter scoped to the named type or interface.
    pub fn new(type_name: &'static str) -> Self {
        Self { type_name }
    }
}

impl ClassFilter for TypeClassFilter {
    fn matches_type(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }
}

/// Method matcher on explicit names, with a trailing-`*` prefix form
/// (`"set*"` matches `set_url`).
pub struct NameMethodMatcher {
    patterns: Vec<String>,
}

impl NameMethodMatcher {
    /// Matcher over the given name patterns.
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

impl MethodMatcher for NameMethodMatcher {
    fn matches(&self, method: &str, _type_name: &str) -> bool {
        self.patterns.iter().any(|p| {
            if let Some(prefix) = p.strip_suffix('*') {
                method.starts_with(prefix)
            } else {
                p == method
            }
        })
    }
}

/// Pointcut assembled from a class filter and a method matcher.
pub struct StaticPointcut {
    filter: Arc<dyn ClassFilter>,
    matcher: Arc<dyn MethodMatcher>,
}

impl StaticPointcut {
    /// Pointcut from the given parts.
    pub fn new(filter: Arc<dyn ClassFilter>, matcher: Arc<dyn MethodMatcher>) -> Self {
        Self { filter, matcher }
    }

    /// Pointcut matching the named methods on any type.
    pub fn for_methods(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(
            Arc::new(TrueClassFilter),
            Arc::new(NameMethodMatcher::new(patterns)),
        )
    }
}

impl Pointcut for StaticPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        self.filter.as_ref()
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self.matcher.as_ref()
    }
}

/// An advice plus the pointcut saying where it applies.
///
/// An advisor without a pointcut applies to every method unconditionally.
pub struct Advisor {
    advice: Advice,
    pointcut: Option<Arc<dyn Pointcut>>,
}

impl Advisor {
    /// Unconditional advisor.
    pub fn new(advice: Advice) -> Self {
        Self {
            advice,
            pointcut: None,
        }
    }

    /// Scopes the advisor to a pointcut.
    pub fn with_pointcut(mut self, pointcut: Arc<dyn Pointcut>) -> Self {
        self.pointcut = Some(pointcut);
        self
    }

    /// Unconditional before advice.
    pub fn before(advice: Arc<dyn BeforeAdvice>) -> Self {
        Self::new(Advice::Before(advice))
    }

    /// Unconditional after-returning advice.
    pub fn after_returning(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self::new(Advice::AfterReturning(advice))
    }

    /// The advice.
    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    /// The pointcut, if any.
    pub fn pointcut(&self) -> Option<&Arc<dyn Pointcut>> {
        self.pointcut.as_ref()
    }
}

/// One applicable entry of a computed chain.
#[derive(Clone)]
pub struct ChainEntry {
    advice: Advice,
    pointcut: Option<Arc<dyn Pointcut>>,
    dynamic: bool,
}

impl ChainEntry {
    /// The advice to run.
    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    /// Whether a dynamic matcher gates this entry per call.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub(crate) fn matches_args(&self, method: &str, type_name: &str, args: &[AnyArc]) -> bool {
        if !self.dynamic {
            return true;
        }
        match &self.pointcut {
            Some(pc) => pc.method_matcher().matches_args(method, type_name, args),
            None => true,
        }
    }
}

pub(crate) type Chain = SmallVec<[ChainEntry; 4]>;

/// Advisor registration and per-method chain computation for one proxy.
pub struct ProxyConfig {
    advisors: RwLock<Vec<Arc<Advisor>>>,
    chain_cache: RwLock<HashMap<String, Chain>>,
    frozen: AtomicBool,
}

impl ProxyConfig {
    /// Config seeded with the given advisors, in order.
    pub fn new(advisors: Vec<Arc<Advisor>>) -> Self {
        Self {
            advisors: RwLock::new(advisors),
            chain_cache: RwLock::new(HashMap::new()),
            frozen: AtomicBool::new(false),
        }
    }

    /// Appends an advisor, invalidating every cached chain.
    pub fn add_advisor(&self, advisor: Arc<Advisor>) -> ContainerResult<()> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(ContainerError::ProxyCreation(
                "cannot add advisor to frozen proxy configuration".to_string(),
            ));
        }
        self.advisors.write().push(advisor);
        self.chain_cache.write().clear();
        Ok(())
    }

    /// Forbids further advisor changes.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Whether the configuration is frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Number of registered advisors.
    pub fn advisor_count(&self) -> usize {
        self.advisors.read().len()
    }

    /// The ordered chain of entries applicable to `method` on the concrete
    /// type with the given declared interfaces. Cached per method name.
    pub fn chain_for(
        &self,
        method: &str,
        type_name: &str,
        interfaces: &[&'static str],
    ) -> Chain {
        if let Some(chain) = self.chain_cache.read().get(method) {
            return chain.clone();
        }
        let chain = self.compute_chain(method, type_name, interfaces);
        self.chain_cache
            .write()
            .insert(method.to_string(), chain.clone());
        chain
    }

    fn compute_chain(&self, method: &str, type_name: &str, interfaces: &[&'static str]) -> Chain {
        let mut chain = Chain::new();
        for advisor in self.advisors.read().iter() {
            match advisor.pointcut() {
                None => chain.push(ChainEntry {
                    advice: advisor.advice().clone(),
                    pointcut: None,
                    dynamic: false,
                }),
                Some(pc) => {
                    let filter = pc.class_filter();
                    let concrete_match = filter.matches_type(type_name);
                    let matched_interfaces: SmallVec<[&str; 4]> = interfaces
                        .iter()
                        .copied()
                        .filter(|i| filter.matches_type(i))
                        .collect();
                    if !concrete_match && matched_interfaces.is_empty() {
                        continue;
                    }
                    let matcher = pc.method_matcher();
                    let method_match = (concrete_match && matcher.matches(method, type_name))
                        || matched_interfaces.iter().any(|i| matcher.matches(method, i));
                    if method_match {
                        chain.push(ChainEntry {
                            advice: advisor.advice().clone(),
                            pointcut: Some(pc.clone()),
                            dynamic: matcher.is_dynamic(),
                        });
                    }
                }
            }
        }
        chain
    }
}
