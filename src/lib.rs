//! # armature
//!
//! A managed-object container: it creates, wires, caches, and destroys
//! long-lived application objects according to declarative definitions,
//! and overlays them with a method-interception layer that injects
//! cross-cutting behavior without touching instance code.
//!
//! ## Features
//!
//! - **Lifecycle engine**: constructor autowiring, property population
//!   (including dotted nested paths), aware callbacks, init/destroy hooks,
//!   and post-processors, in a fixed pipeline order
//! - **Cycle resolution**: setter-referenced singleton cycles are broken
//!   through a three-tier cache with early references; constructor-only
//!   cycles fail fast with the offending path
//! - **Scopes**: singleton, unscoped, and custom conversation-keyed scopes
//!   with independent destruction callbacks, plus lazily-resolving scope
//!   proxies
//! - **Interception**: advisors with pointcuts (static or dynamic method
//!   matchers), per-method chain caching, and interface- or subclass-style
//!   proxies over a re-fetched target source
//! - **No introspection**: everything the container knows about a type is
//!   registered up front in a capability blueprint; proxies are plain
//!   composition, never code generation
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, RwLock};
//! use armature::{Blueprint, Container, Definition, ValueKind};
//!
//! struct Database {
//!     url: RwLock<String>,
//! }
//!
//! struct UserService {
//!     db: RwLock<Option<Arc<Database>>>,
//! }
//!
//! let container = Container::new();
//! container.register_blueprint(
//!     Blueprint::new::<Database>("Database")
//!         .with_default(|| Database { url: RwLock::new("postgres://localhost".into()) }),
//! );
//! container.register_blueprint(
//!     Blueprint::new::<UserService>("UserService")
//!         .with_default(|| UserService { db: RwLock::new(None) })
//!         .with_setter("db", ValueKind::Instance("Database"), |s: &UserService, v: Arc<Database>| {
//!             *s.db.write().unwrap() = Some(v);
//!         }),
//! );
//! container.register_definition("database", Definition::new("Database"));
//! container.register_definition(
//!     "userService",
//!     Definition::new("UserService").with_ref("db", "database"),
//! );
//!
//! let service = container.get_typed::<UserService>("userService").unwrap();
//! let db = container.get_typed::<Database>("database").unwrap();
//! assert!(Arc::ptr_eq(
//!     service.db.read().unwrap().as_ref().unwrap(),
//!     &db,
//! ));
//! ```

pub mod blueprint;
pub mod container;
pub mod convert;
pub mod definition;
pub mod error;
pub mod instantiate;
pub mod intercept;
pub mod observer;
pub mod processor;
pub mod registry;
pub mod scope;
pub mod singleton;

mod internal;
mod resolver;

pub use blueprint::{
    absent, is_absent, Absent, Accessor, AnyArc, Blueprint, BlueprintRegistry, Constructor,
    ConstructorFn, InterfaceDef, MethodFn, Param, ValueKind,
};
pub use container::Container;
pub use convert::{ConverterRegistry, ScalarKind};
pub use definition::{
    Definition, PropertyBinding, PropertyValue, SCOPE_SINGLETON, SCOPE_UNSCOPED,
};
pub use error::{ContainerError, ContainerResult};
pub use instantiate::{
    DirectInstantiation, InstantiationStrategy, SubclassingInstantiation, PROXY_TARGET_CLASS,
};
pub use intercept::invocation::MethodInvocation;
pub use intercept::proxy::{
    create_proxy, FixedTargetSource, Proxy, ScopedTargetSource, TargetSource,
};
pub use intercept::{
    Advice, Advisor, AfterReturningAdvice, BeforeAdvice, ChainEntry, ClassFilter, MethodMatcher,
    NameMethodMatcher, Pointcut, ProxyConfig, StaticPointcut, TrueClassFilter, TypeClassFilter,
};
pub use observer::{ContainerObserver, TracingObserver};
pub use processor::{AutoProxyProcessor, InstancePostProcessor};
pub use registry::{DefinitionMap, DefinitionRegistry};
pub use scope::{ConversationScope, Scope, ScopeCallback, ScopeFactory, UnscopedScope};
pub use singleton::SingletonCache;
