//! Error types for the managed-object container.

use std::fmt;

/// Container errors
///
/// Represents the error conditions that can occur while registering,
/// creating, wiring, proxying, or destroying managed instances.
///
/// # Examples
///
/// ```rust
/// use armature::{Container, ContainerError};
///
/// // Example of NotFound error
/// let container = Container::new();
/// match container.get_instance("missing") {
///     Err(ContainerError::NotFound(name)) => {
///         assert_eq!(name, "missing");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone)]
pub enum ContainerError {
    /// No definition or registered singleton under this name
    NotFound(String),
    /// Instance could not be downcast to the requested type
    TypeMismatch {
        /// Instance name
        name: String,
        /// The type the caller asked for
        expected: &'static str,
    },
    /// Instantiation or lifecycle-callback failure while creating an instance
    Creation {
        /// Instance name being created
        name: String,
        /// What went wrong, including the underlying cause where there is one
        message: String,
    },
    /// Dependency resolution yielded zero candidates
    UnresolvedDependency {
        /// The instance whose dependency could not be satisfied
        name: String,
        /// The dependency that could not be resolved
        dependency: String,
    },
    /// Dependency resolution yielded several candidates with no way to rank them
    AmbiguousDependency {
        /// The dependency that matched more than one definition
        dependency: String,
        /// Names of all matching definitions
        candidates: Vec<String>,
    },
    /// A reference cycle was requested through a path that cannot be broken
    CircularReference(Vec<String>),
    /// A proxy could not be built for the target type
    ProxyCreation(String),
    /// A proxied call could not be dispatched
    ProxyInvocation(String),
    /// A value could not be coerced to the required type
    Conversion {
        /// The offending value, rendered as text
        value: String,
        /// The target type
        target: String,
    },
    /// A destroy callback raised during shutdown or conversation end
    Destruction {
        /// Instance name being destroyed
        name: String,
        /// The failure reported by the callback
        message: String,
    },
}

impl ContainerError {
    /// Shorthand for a [`ContainerError::Creation`] with formatted message.
    pub fn creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        ContainerError::Creation {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::NotFound(name) => write!(f, "Instance not found: {}", name),
            ContainerError::TypeMismatch { name, expected } => {
                write!(f, "Instance '{}' is not of type {}", name, expected)
            }
            ContainerError::Creation { name, message } => {
                write!(f, "Error creating instance '{}': {}", name, message)
            }
            ContainerError::UnresolvedDependency { name, dependency } => {
                write!(f, "Unresolved dependency '{}' of instance '{}'", dependency, name)
            }
            ContainerError::AmbiguousDependency { dependency, candidates } => {
                write!(
                    f,
                    "Ambiguous dependency '{}': candidates [{}]",
                    dependency,
                    candidates.join(", ")
                )
            }
            ContainerError::CircularReference(path) => {
                write!(f, "Circular reference: {}", path.join(" -> "))
            }
            ContainerError::ProxyCreation(msg) => write!(f, "Proxy creation failed: {}", msg),
            ContainerError::ProxyInvocation(msg) => write!(f, "Proxy invocation failed: {}", msg),
            ContainerError::Conversion { value, target } => {
                write!(f, "Cannot convert '{}' to {}", value, target)
            }
            ContainerError::Destruction { name, message } => {
                write!(f, "Error destroying instance '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for ContainerError {}

/// Result type for container operations
///
/// A convenience alias for `Result<T, ContainerError>` used throughout armature.
pub type ContainerResult<T> = Result<T, ContainerError>;
