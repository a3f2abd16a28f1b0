//! Scalar type conversion.
//!
//! Property values and explicit constructor arguments do not have to match
//! the declared scalar kind exactly; a per-container [`ConverterRegistry`]
//! coerces between the supported kinds. The registry is owned by the
//! container instance and carries no process-wide state, so two containers
//! can hold entirely different conversion tables.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::blueprint::AnyArc;
use crate::definition::PropertyValue;
use crate::error::{ContainerError, ContainerResult};

/// The scalar kinds understood by the conversion table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `String`
    Str,
    /// `i64`
    Int,
    /// `f64`
    Float,
    /// `bool`
    Bool,
}

impl ScalarKind {
    /// Human-readable name, used in conversion errors.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Str => "string",
            ScalarKind::Int => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "boolean",
        }
    }
}

/// A single conversion function from one scalar kind to another.
pub type ConvertFn = Arc<dyn Fn(&PropertyValue) -> ContainerResult<AnyArc> + Send + Sync>;

/// Per-container registry of scalar conversions.
///
/// Seeded with the standard pairs (string parsing, numeric widening,
/// rendering back to string); additional pairs can be registered or
/// existing ones replaced per container.
///
/// # Examples
///
/// ```rust
/// use armature::{ConverterRegistry, PropertyValue, ScalarKind};
///
/// let converters = ConverterRegistry::new();
/// let port = converters
///     .convert(&PropertyValue::Str("8080".into()), ScalarKind::Int)
///     .unwrap();
/// assert_eq!(*port.downcast::<i64>().unwrap(), 8080);
/// ```
pub struct ConverterRegistry {
    table: RwLock<HashMap<(ScalarKind, ScalarKind), ConvertFn>>,
}

impl ConverterRegistry {
    /// Creates a registry seeded with the default conversion table.
    pub fn new() -> Self {
        let registry = Self {
            table: RwLock::new(HashMap::new()),
        };
        registry.install_defaults();
        registry
    }

    /// Registers (or replaces) the conversion for a `(from, to)` pair.
    pub fn register<F>(&self, from: ScalarKind, to: ScalarKind, convert: F)
    where
        F: Fn(&PropertyValue) -> ContainerResult<AnyArc> + Send + Sync + 'static,
    {
        self.table.write().insert((from, to), Arc::new(convert));
    }

    /// Coerces `value` to the target scalar kind.
    ///
    /// A value already of the target kind passes through untouched. Fails
    /// with [`ContainerError::Conversion`] for non-scalar sources and for
    /// pairs with no registered conversion.
    pub fn convert(&self, value: &PropertyValue, target: ScalarKind) -> ContainerResult<AnyArc> {
        let source = scalar_kind_of(value).ok_or_else(|| ContainerError::Conversion {
            value: value.describe(),
            target: target.name().to_string(),
        })?;
        if source == target {
            return value.to_any().ok_or_else(|| ContainerError::Conversion {
                value: value.describe(),
                target: target.name().to_string(),
            });
        }
        let convert = self.table.read().get(&(source, target)).cloned();
        match convert {
            Some(f) => f(value),
            None => Err(ContainerError::Conversion {
                value: value.describe(),
                target: target.name().to_string(),
            }),
        }
    }

    fn install_defaults(&self) {
        self.register(ScalarKind::Str, ScalarKind::Int, |v| {
            let s = expect_str(v)?;
            s.trim()
                .parse::<i64>()
                .map(|i| Arc::new(i) as AnyArc)
                .map_err(|_| conversion_error(v, ScalarKind::Int))
        });
        self.register(ScalarKind::Str, ScalarKind::Float, |v| {
            let s = expect_str(v)?;
            s.trim()
                .parse::<f64>()
                .map(|x| Arc::new(x) as AnyArc)
                .map_err(|_| conversion_error(v, ScalarKind::Float))
        });
        self.register(ScalarKind::Str, ScalarKind::Bool, |v| {
            let s = expect_str(v)?;
            match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Arc::new(true) as AnyArc),
                "false" | "no" | "off" | "0" => Ok(Arc::new(false) as AnyArc),
                _ => Err(conversion_error(v, ScalarKind::Bool)),
            }
        });
        self.register(ScalarKind::Int, ScalarKind::Float, |v| match v {
            PropertyValue::Int(i) => Ok(Arc::new(*i as f64) as AnyArc),
            _ => Err(conversion_error(v, ScalarKind::Float)),
        });
        self.register(ScalarKind::Float, ScalarKind::Int, |v| match v {
            PropertyValue::Float(x) => Ok(Arc::new(*x as i64) as AnyArc),
            _ => Err(conversion_error(v, ScalarKind::Int)),
        });
        self.register(ScalarKind::Int, ScalarKind::Str, |v| match v {
            PropertyValue::Int(i) => Ok(Arc::new(i.to_string()) as AnyArc),
            _ => Err(conversion_error(v, ScalarKind::Str)),
        });
        self.register(ScalarKind::Float, ScalarKind::Str, |v| match v {
            PropertyValue::Float(x) => Ok(Arc::new(x.to_string()) as AnyArc),
            _ => Err(conversion_error(v, ScalarKind::Str)),
        });
        self.register(ScalarKind::Bool, ScalarKind::Str, |v| match v {
            PropertyValue::Bool(b) => Ok(Arc::new(b.to_string()) as AnyArc),
            _ => Err(conversion_error(v, ScalarKind::Str)),
        });
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The scalar kind of a property value, if it is a scalar.
pub fn scalar_kind_of(value: &PropertyValue) -> Option<ScalarKind> {
    match value {
        PropertyValue::Str(_) => Some(ScalarKind::Str),
        PropertyValue::Int(_) => Some(ScalarKind::Int),
        PropertyValue::Float(_) => Some(ScalarKind::Float),
        PropertyValue::Bool(_) => Some(ScalarKind::Bool),
        PropertyValue::Reference(_) | PropertyValue::Instance(_) => None,
    }
}

fn expect_str(value: &PropertyValue) -> ContainerResult<&str> {
    match value {
        PropertyValue::Str(s) => Ok(s),
        _ => Err(conversion_error(value, ScalarKind::Str)),
    }
}

fn conversion_error(value: &PropertyValue, target: ScalarKind) -> ContainerError {
    ContainerError::Conversion {
        value: value.describe(),
        target: target.name().to_string(),
    }
}
