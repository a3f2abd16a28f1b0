//! The container facade.
//!
//! [`Container`] is a cheap-to-clone `Arc` handle over the shared state:
//! the definition registry, blueprint registry, converter registry,
//! singleton cache, scope map, post-processors, and observers. All
//! resolution goes through [`get_instance`](Container::get_instance) and
//! its typed variants.

mod lifecycle;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::blueprint::{AnyArc, Blueprint, BlueprintRegistry};
use crate::convert::ConverterRegistry;
use crate::definition::{Definition, SCOPE_SINGLETON, SCOPE_UNSCOPED};
use crate::error::{ContainerError, ContainerResult};
use crate::instantiate::{
    DirectInstantiation, InstantiationStrategy, SubclassingInstantiation, PROXY_TARGET_CLASS,
};
use crate::intercept::proxy::{create_proxy, Proxy, ScopedTargetSource, TargetSource};
use crate::intercept::Advisor;
use crate::observer::{ContainerObserver, Observers};
use crate::processor::InstancePostProcessor;
use crate::registry::{DefinitionMap, DefinitionRegistry};
use crate::scope::{Scope, UnscopedScope};
use crate::singleton::SingletonCache;

struct ContainerInner {
    definitions: Arc<dyn DefinitionRegistry>,
    blueprints: Arc<BlueprintRegistry>,
    converters: ConverterRegistry,
    singletons: SingletonCache,
    scopes: RwLock<HashMap<String, Arc<dyn Scope>>>,
    scoped_proxies: RwLock<HashMap<String, AnyArc>>,
    processors: RwLock<Vec<Arc<dyn InstancePostProcessor>>>,
    observers: Observers,
    strategy: RwLock<Arc<dyn InstantiationStrategy>>,
}

/// The managed-object container.
///
/// # Examples
///
/// ```rust
/// use std::sync::RwLock;
/// use armature::{Blueprint, Container, Definition, PropertyValue, ValueKind};
///
/// struct Greeter {
///     greeting: RwLock<String>,
/// }
///
/// let container = Container::new();
/// container.register_blueprint(
///     Blueprint::new::<Greeter>("Greeter")
///         .with_default(|| Greeter { greeting: RwLock::new(String::new()) })
///         .with_setter("greeting", ValueKind::Str, |g: &Greeter, v: std::sync::Arc<String>| {
///             *g.greeting.write().unwrap() = (*v).clone();
///         }),
/// );
/// container.register_definition(
///     "greeter",
///     Definition::new("Greeter").with_property("greeting", PropertyValue::Str("hello".into())),
/// );
///
/// let greeter = container.get_typed::<Greeter>("greeter").unwrap();
/// assert_eq!(*greeter.greeting.read().unwrap(), "hello");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Creates an empty container with an in-memory definition registry
    /// and the unscoped scope pre-registered.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(DefinitionMap::new()))
    }

    /// Creates a container reading definitions from an external registry.
    pub fn with_registry(definitions: Arc<dyn DefinitionRegistry>) -> Self {
        let mut scopes: HashMap<String, Arc<dyn Scope>> = HashMap::new();
        scopes.insert(SCOPE_UNSCOPED.to_string(), Arc::new(UnscopedScope::new()));
        Self {
            inner: Arc::new(ContainerInner {
                definitions,
                blueprints: Arc::new(BlueprintRegistry::new()),
                converters: ConverterRegistry::new(),
                singletons: SingletonCache::new(),
                scopes: RwLock::new(scopes),
                scoped_proxies: RwLock::new(HashMap::new()),
                processors: RwLock::new(Vec::new()),
                observers: Observers::default(),
                strategy: RwLock::new(Arc::new(DirectInstantiation)),
            }),
        }
    }

    // ---- registration surface ----

    /// Registers a definition under a name.
    pub fn register_definition(&self, name: impl Into<String>, definition: Definition) {
        self.inner.definitions.register(name.into(), definition);
    }

    /// Registers a type's capability table.
    pub fn register_blueprint(&self, blueprint: Blueprint) {
        self.inner.blueprints.register(blueprint);
    }

    /// Declares a capability interface by name and method list.
    pub fn register_interface(&self, name: &'static str, methods: Vec<&'static str>) {
        self.inner.blueprints.register_interface(name, methods);
    }

    /// Registers a custom scope. The singleton and unscoped scope names
    /// are reserved.
    pub fn register_scope(&self, name: impl Into<String>, scope: Arc<dyn Scope>) -> ContainerResult<()> {
        let name = name.into();
        if name == SCOPE_SINGLETON || name == SCOPE_UNSCOPED {
            return Err(ContainerError::creation(
                name.clone(),
                format!("scope name '{}' is reserved", name),
            ));
        }
        self.inner.scopes.write().insert(name, scope);
        Ok(())
    }

    /// Places a pre-built instance directly in the singleton cache.
    pub fn register_singleton(&self, name: impl Into<String>, instance: AnyArc) {
        self.inner.singletons.promote_to_final(&name.into(), instance);
    }

    /// Appends a post-processor; runs for every created instance in
    /// registration order.
    pub fn add_post_processor(&self, processor: Arc<dyn InstancePostProcessor>) {
        self.inner.processors.write().push(processor);
    }

    /// Appends a lifecycle observer.
    pub fn add_observer(&self, observer: Arc<dyn ContainerObserver>) {
        self.inner.observers.add(observer);
    }

    /// Replaces the default instantiation strategy.
    pub fn set_instantiation_strategy(&self, strategy: Arc<dyn InstantiationStrategy>) {
        *self.inner.strategy.write() = strategy;
    }

    // ---- resolution surface ----

    /// Resolves the named instance, creating it (and its dependencies)
    /// on first request according to its definition's scope.
    pub fn get_instance(&self, name: &str) -> ContainerResult<AnyArc> {
        self.do_get(name, None)
    }

    /// Resolves the named instance and downcasts it to `T`.
    pub fn get_typed<T: Send + Sync + 'static>(&self, name: &str) -> ContainerResult<Arc<T>> {
        let instance = self.get_instance(name)?;
        instance
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Resolves the single instance whose definition matches `T`'s
    /// registered blueprint; fails when zero or several definitions match.
    pub fn get_by_type<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        let type_name = self
            .inner
            .blueprints
            .name_for_id(TypeId::of::<T>())
            .ok_or_else(|| ContainerError::NotFound(std::any::type_name::<T>().to_string()))?;
        let candidates = self.names_assignable_to(type_name);
        match candidates.len() {
            0 => Err(ContainerError::NotFound(type_name.to_string())),
            1 => self.get_typed::<T>(&candidates[0]),
            _ => Err(ContainerError::AmbiguousDependency {
                dependency: type_name.to_string(),
                candidates,
            }),
        }
    }

    /// Resolves the named instance passing explicit constructor arguments.
    /// For singletons the arguments only apply to the first creation.
    pub fn get_with_args(&self, name: &str, args: &[AnyArc]) -> ContainerResult<AnyArc> {
        self.do_get(name, Some(args))
    }

    /// Whether a final singleton or a definition exists under this name.
    pub fn contains_instance(&self, name: &str) -> bool {
        self.inner.singletons.contains(name) || self.inner.definitions.contains(name)
    }

    /// Whether a fully-initialized singleton is cached under this name.
    pub fn contains_singleton(&self, name: &str) -> bool {
        self.inner.singletons.contains(name)
    }

    /// Looks up a definition.
    pub fn get_definition(&self, name: &str) -> Option<Definition> {
        self.inner.definitions.definition(name)
    }

    /// Whether a definition exists under this name.
    pub fn contains_definition(&self, name: &str) -> bool {
        self.inner.definitions.contains(name)
    }

    /// All definition names, in registration order.
    pub fn definition_names(&self) -> Vec<String> {
        self.inner.definitions.names()
    }

    /// Definition names whose concrete type is exactly `type_name`.
    pub fn names_for_type(&self, type_name: &str) -> Vec<String> {
        self.inner
            .definitions
            .names()
            .into_iter()
            .filter(|n| {
                self.get_definition(n)
                    .map(|d| d.type_name() == type_name)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Definition names whose type is `type_name` or declares it as a
    /// capability interface.
    pub fn names_assignable_to(&self, type_name: &str) -> Vec<String> {
        self.inner
            .definitions
            .names()
            .into_iter()
            .filter(|n| {
                self.get_definition(n)
                    .map(|d| {
                        d.type_name() == type_name
                            || self
                                .inner
                                .blueprints
                                .get(d.type_name())
                                .map(|bp| bp.interfaces().contains(&type_name))
                                .unwrap_or(false)
                    })
                    .unwrap_or(false)
            })
            .collect()
    }

    /// The registered scope for a name, if any.
    pub fn scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.inner.scopes.read().get(name).cloned()
    }

    /// The shared blueprint registry.
    pub fn blueprints(&self) -> &Arc<BlueprintRegistry> {
        &self.inner.blueprints
    }

    /// The per-container conversion table.
    pub fn converters(&self) -> &ConverterRegistry {
        &self.inner.converters
    }

    /// Builds a standalone interception proxy using this container's
    /// blueprint registry.
    pub fn create_proxy(
        &self,
        target_source: Arc<dyn TargetSource>,
        advisors: Vec<Arc<Advisor>>,
        explicit_type: Option<&'static str>,
    ) -> ContainerResult<Proxy> {
        create_proxy(&self.inner.blueprints, target_source, advisors, explicit_type)
    }

    /// Runs every registered destroy callback in reverse registration
    /// order, then clears all cache tiers. Failures are collected, not
    /// fatal; destruction always sweeps everything.
    pub fn shutdown(&self) -> Vec<ContainerError> {
        let outcomes = self.inner.singletons.destroy_all();
        let mut errors = Vec::new();
        for (name, outcome) in outcomes {
            self.inner.observers.destroyed(&name);
            if let Err(err) = outcome {
                errors.push(match err {
                    destruction @ ContainerError::Destruction { .. } => destruction,
                    other => ContainerError::Destruction {
                        name,
                        message: other.to_string(),
                    },
                });
            }
        }
        self.inner.scoped_proxies.write().clear();
        errors
    }

    // ---- internals ----

    fn do_get(&self, name: &str, args: Option<&[AnyArc]>) -> ContainerResult<AnyArc> {
        if args.is_none() {
            if let Some(instance) = self.inner.singletons.get(name) {
                return Ok(instance);
            }
        }
        let definition = self
            .get_definition(name)
            .ok_or_else(|| ContainerError::NotFound(name.to_string()))?;
        if definition.is_singleton() {
            self.inner.singletons.get_or_create(name, || {
                lifecycle::create_instance(self, name, &definition, args)
            })
        } else if definition.scoped_proxy() && !definition.is_unscoped() {
            self.scoped_proxy_for(name, &definition)
        } else {
            let scope = self.scope_for(name, &definition)?;
            scope.get(name, &|| {
                lifecycle::create_instance(self, name, &definition, args)
            })
        }
    }

    fn scope_for(&self, name: &str, definition: &Definition) -> ContainerResult<Arc<dyn Scope>> {
        self.scope(definition.scope()).ok_or_else(|| {
            ContainerError::creation(
                name,
                format!("no scope registered under '{}'", definition.scope()),
            )
        })
    }

    /// Returns the stable per-name scope proxy, creating it on first
    /// request. The scope itself caches only raw pipeline output; proxied
    /// calls re-fetch through [`resolve_scoped_target`](Self::resolve_scoped_target).
    fn scoped_proxy_for(&self, name: &str, definition: &Definition) -> ContainerResult<AnyArc> {
        if let Some(proxy) = self.inner.scoped_proxies.read().get(name) {
            return Ok(proxy.clone());
        }
        self.scope_for(name, definition)?;
        let source = Arc::new(ScopedTargetSource::new(
            self.clone(),
            name,
            definition.type_name(),
        ));
        let proxy = create_proxy(
            &self.inner.blueprints,
            source,
            Vec::new(),
            Some(definition.type_name()),
        )?;
        self.inner
            .definitions
            .stamp_attribute(name, "scoped-proxy", "applied");
        self.inner
            .definitions
            .stamp_attribute(name, "original-scope", definition.scope());
        let proxy: AnyArc = Arc::new(proxy);
        let mut proxies = self.inner.scoped_proxies.write();
        Ok(proxies.entry(name.to_string()).or_insert(proxy).clone())
    }

    pub(crate) fn resolve_scoped_target(&self, name: &str) -> ContainerResult<AnyArc> {
        let definition = self
            .get_definition(name)
            .ok_or_else(|| ContainerError::NotFound(name.to_string()))?;
        let scope = self.scope_for(name, &definition)?;
        scope.get(name, &|| {
            lifecycle::create_instance(self, name, &definition, None)
        })
    }

    pub(crate) fn singletons(&self) -> &SingletonCache {
        &self.inner.singletons
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.observers
    }

    pub(crate) fn processors(&self) -> Vec<Arc<dyn InstancePostProcessor>> {
        self.inner.processors.read().clone()
    }

    pub(crate) fn strategy_for(&self, definition: &Definition) -> Arc<dyn InstantiationStrategy> {
        if definition.attribute(PROXY_TARGET_CLASS).is_some() {
            Arc::new(SubclassingInstantiation) as Arc<dyn InstantiationStrategy>
        } else {
            self.inner.strategy.read().clone()
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}
