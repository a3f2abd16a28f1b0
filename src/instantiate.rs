//! Instantiation strategies.
//!
//! The lifecycle pipeline delegates the actual construction call to an
//! [`InstantiationStrategy`]. [`DirectInstantiation`] invokes the chosen
//! constructor as-is. [`SubclassingInstantiation`] additionally requires
//! the type to expose an overridable surface (a non-empty method table),
//! which is what a later subclass proxy dispatches through; it is selected
//! for definitions flagged with the `proxy-target-class` attribute.

use tracing::trace;

use crate::blueprint::{AnyArc, Blueprint, Constructor};
use crate::definition::Definition;
use crate::error::{ContainerError, ContainerResult};

/// Attribute flagging a definition for subclass-style proxying.
pub const PROXY_TARGET_CLASS: &str = "proxy-target-class";

/// Strategy for turning a chosen constructor and resolved arguments into
/// a raw instance.
pub trait InstantiationStrategy: Send + Sync {
    /// Constructs the raw instance. A `None` constructor means the
    /// blueprint's default constructor.
    fn instantiate(
        &self,
        definition: &Definition,
        blueprint: &Blueprint,
        constructor: Option<&Constructor>,
        args: &[AnyArc],
    ) -> ContainerResult<AnyArc>;
}

fn construct(
    definition: &Definition,
    blueprint: &Blueprint,
    constructor: Option<&Constructor>,
    args: &[AnyArc],
) -> ContainerResult<AnyArc> {
    match constructor {
        Some(c) => c.invoke(definition.type_name(), args),
        None => blueprint
            .default_constructor()
            .ok_or_else(|| {
                ContainerError::creation(
                    definition.type_name(),
                    "no default constructor registered",
                )
            })?
            .invoke(definition.type_name(), &[]),
    }
}

/// Plain construction through the registered factory closure.
#[derive(Default)]
pub struct DirectInstantiation;

impl InstantiationStrategy for DirectInstantiation {
    fn instantiate(
        &self,
        definition: &Definition,
        blueprint: &Blueprint,
        constructor: Option<&Constructor>,
        args: &[AnyArc],
    ) -> ContainerResult<AnyArc> {
        construct(definition, blueprint, constructor, args)
    }
}

/// Construction for subclass-proxy targets.
///
/// The instance itself is built the same way; the strategy verifies the
/// blueprint carries a method table, since a subclass proxy has nothing to
/// override otherwise.
#[derive(Default)]
pub struct SubclassingInstantiation;

impl InstantiationStrategy for SubclassingInstantiation {
    fn instantiate(
        &self,
        definition: &Definition,
        blueprint: &Blueprint,
        constructor: Option<&Constructor>,
        args: &[AnyArc],
    ) -> ContainerResult<AnyArc> {
        if !blueprint.has_methods() {
            return Err(ContainerError::ProxyCreation(format!(
                "type {} has no method table to override",
                definition.type_name()
            )));
        }
        let instance = construct(definition, blueprint, constructor, args)?;
        trace!(type_name = definition.type_name(), "instantiated subclass-proxy target");
        Ok(instance)
    }
}
