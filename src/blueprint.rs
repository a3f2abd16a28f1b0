//! Per-type capability tables.
//!
//! The container performs no runtime introspection. Everything it needs to
//! know about a concrete type is registered up front in a [`Blueprint`]:
//! constructor factories with declared parameters, named property accessors,
//! a named method table for interception and lifecycle methods, declared
//! capability interfaces, and the aware/init/destroy hooks. Blueprints live
//! in a [`BlueprintRegistry`] keyed by type name, shared between the
//! lifecycle pipeline and the interception engine.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::container::Container;
use crate::convert::ScalarKind;
use crate::error::{ContainerError, ContainerResult};

/// Type-erased shared instance handle used throughout the container.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Constructor factory: receives resolved arguments in declared order.
pub type ConstructorFn = Arc<dyn Fn(&[AnyArc]) -> ContainerResult<AnyArc> + Send + Sync>;

/// Entry in a type's method table.
pub type MethodFn = Arc<dyn Fn(&AnyArc, &[AnyArc]) -> ContainerResult<AnyArc> + Send + Sync>;

type SetterFn = Arc<dyn Fn(&AnyArc, AnyArc) -> ContainerResult<()> + Send + Sync>;
type GetterFn = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;
type InitFn = Arc<dyn Fn(&AnyArc) -> ContainerResult<()> + Send + Sync>;
type AwareNameFn = Arc<dyn Fn(&AnyArc, &str) + Send + Sync>;
type AwareContainerFn = Arc<dyn Fn(&AnyArc, &Container) + Send + Sync>;

/// Placeholder passed for an optional constructor parameter that could not
/// be resolved.
#[derive(Debug)]
pub struct Absent;

/// A type-erased absent-argument marker.
pub fn absent() -> AnyArc {
    Arc::new(Absent)
}

/// Whether a constructor argument is the absent-argument marker.
pub fn is_absent(value: &AnyArc) -> bool {
    value.downcast_ref::<Absent>().is_some()
}

/// The declared kind of a constructor parameter or property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `String` scalar
    Str,
    /// `i64` scalar
    Int,
    /// `f64` scalar
    Float,
    /// `bool` scalar
    Bool,
    /// Another managed type or capability interface, by registered name
    Instance(&'static str),
}

impl ValueKind {
    /// The scalar kind, if this is a scalar.
    pub fn scalar(&self) -> Option<ScalarKind> {
        match self {
            ValueKind::Str => Some(ScalarKind::Str),
            ValueKind::Int => Some(ScalarKind::Int),
            ValueKind::Float => Some(ScalarKind::Float),
            ValueKind::Bool => Some(ScalarKind::Bool),
            ValueKind::Instance(_) => None,
        }
    }
}

/// A declared constructor parameter.
#[derive(Debug, Clone)]
pub struct Param {
    /// Parameter name, consulted during by-name dependency resolution
    pub name: &'static str,
    /// Declared kind
    pub kind: ValueKind,
    /// Whether resolution failure abandons the candidate constructor
    pub required: bool,
}

impl Param {
    /// A required parameter.
    pub fn required(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// An optional parameter; receives [`absent`] when unresolvable.
    pub fn optional(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// A registered constructor: declared parameters plus the factory closure.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Param>,
    build: ConstructorFn,
}

impl Constructor {
    /// The declared parameters, in call order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Invokes the factory, checking argument arity first.
    pub fn invoke(&self, type_name: &str, args: &[AnyArc]) -> ContainerResult<AnyArc> {
        if args.len() != self.params.len() {
            return Err(ContainerError::creation(
                type_name,
                format!(
                    "constructor expects {} arguments, got {}",
                    self.params.len(),
                    args.len()
                ),
            ));
        }
        (self.build)(args)
    }
}

/// A named property's accessor pair.
#[derive(Clone)]
pub struct Accessor {
    kind: ValueKind,
    set: SetterFn,
    get: Option<GetterFn>,
}

impl Accessor {
    /// Declared kind of the property.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Assigns a value to the property on the given instance.
    pub fn set(&self, target: &AnyArc, value: AnyArc) -> ContainerResult<()> {
        (self.set)(target, value)
    }

    /// Reads the current value, if a getter was registered and the
    /// property is populated.
    pub fn get(&self, target: &AnyArc) -> Option<AnyArc> {
        self.get.as_ref().and_then(|g| g(target))
    }

    /// Whether the property can be read back (needed for nested paths).
    pub fn readable(&self) -> bool {
        self.get.is_some()
    }
}

/// The capability table for one concrete type.
///
/// # Examples
///
/// ```rust
/// use std::sync::RwLock;
/// use armature::{Blueprint, ValueKind};
///
/// struct Greeter {
///     name: RwLock<String>,
/// }
///
/// let bp = Blueprint::new::<Greeter>("Greeter")
///     .with_default(|| Greeter { name: RwLock::new(String::new()) })
///     .with_setter("name", ValueKind::Str, |g: &Greeter, v: std::sync::Arc<String>| {
///         *g.name.write().unwrap() = (*v).clone();
///     });
///
/// assert_eq!(bp.type_name(), "Greeter");
/// assert!(bp.property("name").is_some());
/// ```
#[derive(Clone)]
pub struct Blueprint {
    type_name: &'static str,
    type_id: TypeId,
    constructors: Vec<Constructor>,
    properties: HashMap<&'static str, Accessor>,
    methods: HashMap<&'static str, MethodFn>,
    interfaces: Vec<&'static str>,
    aware_name: Option<AwareNameFn>,
    aware_container: Option<AwareContainerFn>,
    init: Option<InitFn>,
    destroy: Option<InitFn>,
}

impl Blueprint {
    /// Creates an empty blueprint for `T` under the given registered name.
    pub fn new<T: Send + Sync + 'static>(type_name: &'static str) -> Self {
        Self {
            type_name,
            type_id: TypeId::of::<T>(),
            constructors: Vec::new(),
            properties: HashMap::new(),
            methods: HashMap::new(),
            interfaces: Vec::new(),
            aware_name: None,
            aware_container: None,
            init: None,
            destroy: None,
        }
    }

    /// Registers a constructor with declared parameters.
    pub fn with_constructor<F>(mut self, params: Vec<Param>, build: F) -> Self
    where
        F: Fn(&[AnyArc]) -> ContainerResult<AnyArc> + Send + Sync + 'static,
    {
        self.constructors.push(Constructor {
            params,
            build: Arc::new(build),
        });
        self
    }

    /// Registers a zero-parameter constructor from a plain factory.
    pub fn with_default<T, F>(self, build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.with_constructor(Vec::new(), move |_| Ok(Arc::new(build()) as AnyArc))
    }

    /// Registers a write-only property.
    pub fn with_setter<T, V, F>(mut self, name: &'static str, kind: ValueKind, set: F) -> Self
    where
        T: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: Fn(&T, Arc<V>) + Send + Sync + 'static,
    {
        let type_name = self.type_name;
        let set_fn: SetterFn = Arc::new(move |target, value| {
            let obj = downcast_target::<T>(target, type_name, name)?;
            let value = value
                .downcast::<V>()
                .map_err(|_| ContainerError::Conversion {
                    value: format!("value for property '{}'", name),
                    target: std::any::type_name::<V>().to_string(),
                })?;
            set(obj, value);
            Ok(())
        });
        self.properties.insert(
            name,
            Accessor {
                kind,
                set: set_fn,
                get: None,
            },
        );
        self
    }

    /// Registers a readable and writable property. A getter is required for
    /// properties traversed by dotted nested paths.
    pub fn with_property<T, V, G, S>(
        mut self,
        name: &'static str,
        kind: ValueKind,
        get: G,
        set: S,
    ) -> Self
    where
        T: Send + Sync + 'static,
        V: Send + Sync + 'static,
        G: Fn(&T) -> Option<Arc<V>> + Send + Sync + 'static,
        S: Fn(&T, Arc<V>) + Send + Sync + 'static,
    {
        self = self.with_setter(name, kind, set);
        let type_name = self.type_name;
        let get_fn: GetterFn = Arc::new(move |target| {
            let obj = downcast_target::<T>(target, type_name, name).ok()?;
            get(obj).map(|v| v as AnyArc)
        });
        if let Some(accessor) = self.properties.get_mut(name) {
            accessor.get = Some(get_fn);
        }
        self
    }

    /// Adds a named entry to the method table.
    pub fn with_method<T, F>(mut self, name: &'static str, call: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &[AnyArc]) -> ContainerResult<AnyArc> + Send + Sync + 'static,
    {
        let type_name = self.type_name;
        let method: MethodFn = Arc::new(move |target, args| {
            let obj = downcast_target::<T>(target, type_name, name)?;
            call(obj, args)
        });
        self.methods.insert(name, method);
        self
    }

    /// Declares that this type exposes the named capability interface.
    pub fn implements(mut self, interface: &'static str) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Hook invoked after property population with the instance's name.
    pub fn aware_of_name<T, F>(mut self, hook: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &str) + Send + Sync + 'static,
    {
        self.aware_name = Some(Arc::new(move |target, name| {
            if let Some(obj) = target.downcast_ref::<T>() {
                hook(obj, name);
            }
        }));
        self
    }

    /// Hook invoked after property population with the owning container.
    pub fn aware_of_container<T, F>(mut self, hook: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &Container) + Send + Sync + 'static,
    {
        self.aware_container = Some(Arc::new(move |target, container| {
            if let Some(obj) = target.downcast_ref::<T>() {
                hook(obj, container);
            }
        }));
        self
    }

    /// Initialization callback, run before any named init method.
    ///
    /// A named init method called exactly `"init"` is treated as this same
    /// callback and not invoked a second time.
    pub fn on_init<T, F>(mut self, hook: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
    {
        let type_name = self.type_name;
        self.init = Some(Arc::new(move |target| {
            let obj = downcast_target::<T>(target, type_name, "init")?;
            hook(obj)
        }));
        self
    }

    /// Destruction callback, run before any named destroy method.
    ///
    /// A named destroy method called exactly `"destroy"` is treated as this
    /// same callback and not invoked a second time.
    pub fn on_destroy<T, F>(mut self, hook: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
    {
        let type_name = self.type_name;
        self.destroy = Some(Arc::new(move |target| {
            let obj = downcast_target::<T>(target, type_name, "destroy")?;
            hook(obj)
        }));
        self
    }

    /// The registered type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The concrete `TypeId` this blueprint describes.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// All registered constructors, in registration order.
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// The zero-parameter constructor, if one was registered.
    pub fn default_constructor(&self) -> Option<&Constructor> {
        self.constructors.iter().find(|c| c.params.is_empty())
    }

    /// Looks up a property accessor.
    pub fn property(&self, name: &str) -> Option<&Accessor> {
        self.properties.get(name)
    }

    /// Looks up a method-table entry.
    pub fn method(&self, name: &str) -> Option<MethodFn> {
        self.methods.get(name).cloned()
    }

    /// Whether the method table is non-empty (a viable subclass-proxy surface).
    pub fn has_methods(&self) -> bool {
        !self.methods.is_empty()
    }

    /// Declared capability interfaces.
    pub fn interfaces(&self) -> &[&'static str] {
        &self.interfaces
    }

    pub(crate) fn aware_name_hook(&self) -> Option<&AwareNameFn> {
        self.aware_name.as_ref()
    }

    pub(crate) fn aware_container_hook(&self) -> Option<&AwareContainerFn> {
        self.aware_container.as_ref()
    }

    pub(crate) fn init_hook(&self) -> Option<&InitFn> {
        self.init.as_ref()
    }

    pub(crate) fn destroy_hook(&self) -> Option<&InitFn> {
        self.destroy.as_ref()
    }
}

fn downcast_target<'a, T: Send + Sync + 'static>(
    target: &'a AnyArc,
    type_name: &str,
    member: &str,
) -> ContainerResult<&'a T> {
    target
        .downcast_ref::<T>()
        .ok_or_else(|| ContainerError::TypeMismatch {
            name: format!("{}::{}", type_name, member),
            expected: std::any::type_name::<T>(),
        })
}

/// A declared capability interface: a name plus the method names any
/// implementing type's method table is expected to carry.
#[derive(Debug, Clone)]
pub struct InterfaceDef {
    /// Interface name
    pub name: &'static str,
    /// Method names belonging to the interface
    pub methods: Vec<&'static str>,
}

/// Registry of blueprints and capability interfaces, keyed by type name.
///
/// Shared between the lifecycle pipeline and the interception engine; also
/// usable standalone when building proxies without a container.
#[derive(Default)]
pub struct BlueprintRegistry {
    by_name: RwLock<HashMap<&'static str, Arc<Blueprint>>>,
    by_id: RwLock<HashMap<TypeId, &'static str>>,
    interfaces: RwLock<HashMap<&'static str, Arc<InterfaceDef>>>,
}

impl BlueprintRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a blueprint under its type name.
    pub fn register(&self, blueprint: Blueprint) {
        let name = blueprint.type_name;
        self.by_id.write().insert(blueprint.type_id, name);
        self.by_name.write().insert(name, Arc::new(blueprint));
    }

    /// Declares a capability interface.
    pub fn register_interface(&self, name: &'static str, methods: Vec<&'static str>) {
        self.interfaces
            .write()
            .insert(name, Arc::new(InterfaceDef { name, methods }));
    }

    /// Looks up a blueprint by type name.
    pub fn get(&self, type_name: &str) -> Option<Arc<Blueprint>> {
        self.by_name.read().get(type_name).cloned()
    }

    /// Looks up the registered type name for a concrete `TypeId`.
    pub fn name_for_id(&self, id: TypeId) -> Option<&'static str> {
        self.by_id.read().get(&id).copied()
    }

    /// Looks up a declared interface.
    pub fn interface(&self, name: &str) -> Option<Arc<InterfaceDef>> {
        self.interfaces.read().get(name).cloned()
    }

    /// Whether the name refers to a declared interface.
    pub fn is_interface(&self, name: &str) -> bool {
        self.interfaces.read().contains_key(name)
    }
}
