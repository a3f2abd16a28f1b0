//! Declarative instance definitions.
//!
//! A [`Definition`] is the recipe the container follows for one named
//! instance: which registered type to build, under which scope to cache it,
//! which properties to populate, and which lifecycle methods to run. It is
//! immutable after registration except for attribute stamping performed by
//! the container itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::blueprint::AnyArc;

/// Scope name for container-cached, one-per-name instances.
pub const SCOPE_SINGLETON: &str = "singleton";

/// Scope name for never-cached instances (a fresh one per request).
pub const SCOPE_UNSCOPED: &str = "unscoped";

/// A value assigned to a property during population.
///
/// Scalar variants are converted on assignment when the target property
/// declares a different scalar kind. `Reference` is resolved through the
/// container at population time; `Instance` carries an already-built object.
#[derive(Clone)]
pub enum PropertyValue {
    /// Literal string
    Str(String),
    /// Literal integer
    Int(i64),
    /// Literal float
    Float(f64),
    /// Literal boolean
    Bool(bool),
    /// Reference to another managed instance, by name
    Reference(String),
    /// A pre-built object supplied directly
    Instance(AnyArc),
}

impl PropertyValue {
    /// Renders the value for error messages.
    pub fn describe(&self) -> String {
        match self {
            PropertyValue::Str(s) => s.clone(),
            PropertyValue::Int(i) => i.to_string(),
            PropertyValue::Float(x) => x.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Reference(r) => format!("ref:{}", r),
            PropertyValue::Instance(_) => "<instance>".to_string(),
        }
    }

    /// The scalar payload as a type-erased `Arc`, if this is a scalar variant.
    pub fn to_any(&self) -> Option<AnyArc> {
        match self {
            PropertyValue::Str(s) => Some(Arc::new(s.clone())),
            PropertyValue::Int(i) => Some(Arc::new(*i)),
            PropertyValue::Float(x) => Some(Arc::new(*x)),
            PropertyValue::Bool(b) => Some(Arc::new(*b)),
            PropertyValue::Instance(v) => Some(v.clone()),
            PropertyValue::Reference(_) => None,
        }
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(s) => f.debug_tuple("Str").field(s).finish(),
            PropertyValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            PropertyValue::Float(x) => f.debug_tuple("Float").field(x).finish(),
            PropertyValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            PropertyValue::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
            PropertyValue::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// One named property assignment within a definition.
///
/// The name may be a dotted path (`"engine.threads"`); intermediate
/// segments are traversed through registered accessors and auto-created
/// from the default constructor when absent.
#[derive(Debug, Clone)]
pub struct PropertyBinding {
    /// Property name or dotted path
    pub name: String,
    /// Value to assign
    pub value: PropertyValue,
}

/// The declarative recipe for one managed instance.
///
/// # Examples
///
/// ```rust
/// use armature::{Definition, PropertyValue, SCOPE_UNSCOPED};
///
/// let def = Definition::new("Database")
///     .with_scope(SCOPE_UNSCOPED)
///     .with_property("url", PropertyValue::Str("postgres://localhost".into()))
///     .with_ref("pool", "connection-pool")
///     .with_init("warm_up")
///     .with_destroy("close");
///
/// assert_eq!(def.type_name(), "Database");
/// assert!(!def.is_singleton());
/// assert_eq!(def.properties().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Definition {
    type_name: &'static str,
    scope: String,
    properties: Vec<PropertyBinding>,
    init_method: Option<String>,
    destroy_method: Option<String>,
    scoped_proxy: bool,
    attributes: HashMap<String, String>,
}

impl Definition {
    /// Creates a singleton-scoped definition for the named registered type.
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            scope: SCOPE_SINGLETON.to_string(),
            properties: Vec::new(),
            init_method: None,
            destroy_method: None,
            scoped_proxy: false,
            attributes: HashMap::new(),
        }
    }

    /// Sets the scope name (`"singleton"`, `"unscoped"`, or a custom scope).
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Appends a property assignment.
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.push(PropertyBinding {
            name: name.into(),
            value,
        });
        self
    }

    /// Appends a property referencing another managed instance by name.
    pub fn with_ref(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_property(name, PropertyValue::Reference(target.into()))
    }

    /// Names a method from the type's method table to run after initialization callbacks.
    pub fn with_init(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    /// Names a method from the type's method table to run at destruction.
    pub fn with_destroy(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }

    /// Requests a scope proxy: dependents receive a lazily-resolving proxy
    /// that re-fetches the current instance for the active conversation on
    /// every call. Only meaningful for custom scopes.
    pub fn with_scoped_proxy(mut self) -> Self {
        self.scoped_proxy = true;
        self
    }

    /// Sets a string attribute on the definition.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// The registered type name this definition instantiates.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The scope name.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Whether this definition is singleton-scoped.
    pub fn is_singleton(&self) -> bool {
        self.scope == SCOPE_SINGLETON
    }

    /// Whether this definition is unscoped (never cached).
    pub fn is_unscoped(&self) -> bool {
        self.scope == SCOPE_UNSCOPED
    }

    /// The ordered property assignments.
    pub fn properties(&self) -> &[PropertyBinding] {
        &self.properties
    }

    /// The named init method, if any.
    pub fn init_method(&self) -> Option<&str> {
        self.init_method.as_deref()
    }

    /// The named destroy method, if any.
    pub fn destroy_method(&self) -> Option<&str> {
        self.destroy_method.as_deref()
    }

    /// Whether a scope proxy was requested.
    pub fn scoped_proxy(&self) -> bool {
        self.scoped_proxy
    }

    /// Looks up a stamped or declared attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub(crate) fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }
}
