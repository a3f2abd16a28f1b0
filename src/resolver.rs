//! Constructor selection and property population.
//!
//! Autowiring walks candidate constructors from most to fewest parameters
//! and resolves each declared parameter against the container; property
//! population applies a definition's bindings through the blueprint's
//! accessors, converting scalars and resolving references, with dotted
//! paths traversing (and when necessary auto-creating) nested instances.

use std::any::Any;

use tracing::trace;

use crate::blueprint::{absent, AnyArc, Blueprint, Constructor, Param, ValueKind};
use crate::container::Container;
use crate::convert::ScalarKind;
use crate::definition::{Definition, PropertyValue};
use crate::error::{ContainerError, ContainerResult};

pub(crate) struct DependencyResolver<'a> {
    container: &'a Container,
}

impl<'a> DependencyResolver<'a> {
    pub(crate) fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Chooses a constructor and resolves its arguments.
    ///
    /// With explicit arguments, the first constructor whose parameters
    /// accept them (converting scalars where needed) wins. Without,
    /// candidates are tried in descending parameter count; a candidate is
    /// abandoned when a required parameter cannot be resolved, and the
    /// default constructor is the final fallback.
    pub(crate) fn resolve_constructor(
        &self,
        name: &str,
        definition: &Definition,
        blueprint: &Blueprint,
        explicit: Option<&[AnyArc]>,
    ) -> ContainerResult<(Option<Constructor>, Vec<AnyArc>)> {
        let candidates = blueprint.constructors();
        if candidates.is_empty() {
            return Err(ContainerError::creation(
                name,
                format!("no constructors registered for type {}", definition.type_name()),
            ));
        }

        if let Some(args) = explicit {
            for candidate in candidates {
                if let Some(coerced) = self.coerce_explicit(candidate, args) {
                    return Ok((Some(candidate.clone()), coerced));
                }
            }
            return Err(ContainerError::creation(
                name,
                format!("no constructor of {} accepts the supplied arguments", definition.type_name()),
            ));
        }

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|a, b| candidates[*b].params().len().cmp(&candidates[*a].params().len()));

        let mut abandoned: Option<ContainerError> = None;
        for idx in order {
            let candidate = &candidates[idx];
            if candidate.params().is_empty() {
                // Default constructor is the fallback, not a candidate.
                continue;
            }
            match self.autowire(name, candidate) {
                Ok(args) => {
                    trace!(
                        instance = name,
                        params = candidate.params().len(),
                        "autowired constructor"
                    );
                    return Ok((Some(candidate.clone()), args));
                }
                Err(err @ ContainerError::UnresolvedDependency { .. })
                | Err(err @ ContainerError::AmbiguousDependency { .. }) => {
                    // Prefer reporting a circular failure over a plain miss.
                    if !matches!(abandoned, Some(ContainerError::CircularReference(_))) {
                        abandoned = Some(err);
                    }
                }
                Err(err @ ContainerError::CircularReference(_)) => {
                    abandoned = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        if blueprint.default_constructor().is_some() {
            return Ok((None, Vec::new()));
        }
        Err(abandoned.unwrap_or_else(|| {
            ContainerError::creation(
                name,
                format!("no resolvable constructor for type {}", definition.type_name()),
            )
        }))
    }

    fn autowire(&self, name: &str, candidate: &Constructor) -> ContainerResult<Vec<AnyArc>> {
        let mut args = Vec::with_capacity(candidate.params().len());
        for param in candidate.params() {
            match self.resolve_param(name, param)? {
                Some(value) => args.push(value),
                None if param.required => {
                    return Err(ContainerError::UnresolvedDependency {
                        name: name.to_string(),
                        dependency: param.name.to_string(),
                    })
                }
                None => args.push(absent()),
            }
        }
        Ok(args)
    }

    /// Resolves one declared parameter, or `None` when nothing matches.
    fn resolve_param(&self, name: &str, param: &Param) -> ContainerResult<Option<AnyArc>> {
        let type_name = match param.kind {
            ValueKind::Instance(tn) => tn,
            // Scalars cannot be sourced from the container during autowiring.
            _ => return Ok(None),
        };

        let dependency = match self.resolve_dependency_name(param, type_name)? {
            Some(dep) => dep,
            None => return Ok(None),
        };

        // A dependency mid-creation on this chain either has an early
        // reference to hand out or the cycle cannot be broken.
        if self.container.singletons().in_creation(&dependency) {
            if let Some(early) = self.container.singletons().get(&dependency) {
                trace!(instance = name, dependency = %dependency, "wired early reference");
                return Ok(Some(early));
            }
            return Err(ContainerError::CircularReference(vec![
                name.to_string(),
                dependency,
            ]));
        }

        self.container.get_instance(&dependency).map(Some)
    }

    /// Ranks candidate definition names for an instance-typed parameter:
    /// declared parameter name, then unique type match, then the parameter
    /// name among the type's candidates, then the decapitalized simple type
    /// name.
    fn resolve_dependency_name(
        &self,
        param: &Param,
        type_name: &str,
    ) -> ContainerResult<Option<String>> {
        if let Some(def) = self.container.get_definition(param.name) {
            if self.definition_satisfies(&def, type_name) {
                return Ok(Some(param.name.to_string()));
            }
        }

        let candidates = self.container.names_assignable_to(type_name);
        match candidates.len() {
            0 => Ok(None),
            1 => Ok(Some(candidates.into_iter().next().ok_or_else(|| {
                ContainerError::creation(param.name, "candidate list emptied unexpectedly")
            })?)),
            _ => {
                if candidates.iter().any(|c| c == param.name) {
                    return Ok(Some(param.name.to_string()));
                }
                let simple = decapitalized_simple_name(type_name);
                if candidates.iter().any(|c| *c == simple) {
                    return Ok(Some(simple));
                }
                Err(ContainerError::AmbiguousDependency {
                    dependency: type_name.to_string(),
                    candidates,
                })
            }
        }
    }

    fn definition_satisfies(&self, definition: &Definition, type_name: &str) -> bool {
        if definition.type_name() == type_name {
            return true;
        }
        self.container
            .blueprints()
            .get(definition.type_name())
            .map(|bp| bp.interfaces().contains(&type_name))
            .unwrap_or(false)
    }

    /// Checks an explicit argument list against a candidate's parameters,
    /// converting scalar arguments where the kinds differ.
    fn coerce_explicit(&self, candidate: &Constructor, args: &[AnyArc]) -> Option<Vec<AnyArc>> {
        if candidate.params().len() != args.len() {
            return None;
        }
        let mut coerced = Vec::with_capacity(args.len());
        for (param, arg) in candidate.params().iter().zip(args) {
            coerced.push(self.coerce_arg(param, arg)?);
        }
        Some(coerced)
    }

    fn coerce_arg(&self, param: &Param, arg: &AnyArc) -> Option<AnyArc> {
        match param.kind {
            ValueKind::Instance(tn) => {
                let blueprint = self.container.blueprints().get(tn)?;
                if arg.as_ref().type_id() == blueprint.type_id() {
                    Some(arg.clone())
                } else {
                    None
                }
            }
            _ => {
                let target = param.kind.scalar()?;
                if scalar_matches(arg, target) {
                    return Some(arg.clone());
                }
                let value = scalar_value_of(arg)?;
                self.container.converters().convert(&value, target).ok()
            }
        }
    }

    /// Applies a definition's property bindings to a raw instance.
    pub(crate) fn populate(
        &self,
        name: &str,
        definition: &Definition,
        blueprint: &Blueprint,
        instance: &AnyArc,
    ) -> ContainerResult<()> {
        for binding in definition.properties() {
            self.apply_property(name, blueprint, instance, &binding.name, &binding.value)?;
        }
        Ok(())
    }

    fn apply_property(
        &self,
        name: &str,
        blueprint: &Blueprint,
        instance: &AnyArc,
        path: &str,
        value: &PropertyValue,
    ) -> ContainerResult<()> {
        if let Some((head, rest)) = path.split_once('.') {
            return self.apply_nested(name, blueprint, instance, head, rest, value);
        }

        let accessor = blueprint.property(path).ok_or_else(|| {
            ContainerError::creation(
                name,
                format!("type {} has no property '{}'", blueprint.type_name(), path),
            )
        })?;

        let resolved = match value {
            PropertyValue::Reference(target) => self.container.get_instance(target)?,
            PropertyValue::Instance(v) => v.clone(),
            scalar => match accessor.kind().scalar() {
                Some(target_kind) => self.container.converters().convert(scalar, target_kind)?,
                None => {
                    return Err(ContainerError::creation(
                        name,
                        format!(
                            "property '{}' of {} expects an instance, got scalar '{}'",
                            path,
                            blueprint.type_name(),
                            scalar.describe()
                        ),
                    ))
                }
            },
        };
        accessor.set(instance, resolved)
    }

    /// Traverses one segment of a dotted path, creating the intermediate
    /// instance from its default constructor when unset.
    fn apply_nested(
        &self,
        name: &str,
        blueprint: &Blueprint,
        instance: &AnyArc,
        head: &str,
        rest: &str,
        value: &PropertyValue,
    ) -> ContainerResult<()> {
        let accessor = blueprint.property(head).ok_or_else(|| {
            ContainerError::creation(
                name,
                format!("type {} has no property '{}'", blueprint.type_name(), head),
            )
        })?;
        let nested_type = match accessor.kind() {
            ValueKind::Instance(tn) => tn,
            _ => {
                return Err(ContainerError::creation(
                    name,
                    format!("cannot traverse scalar property '{}' in nested path", head),
                ))
            }
        };
        if !accessor.readable() {
            return Err(ContainerError::creation(
                name,
                format!("property '{}' has no getter; nested paths need one", head),
            ));
        }
        let nested_blueprint = self.container.blueprints().get(nested_type).ok_or_else(|| {
            ContainerError::creation(name, format!("no blueprint for nested type {}", nested_type))
        })?;
        let nested = match accessor.get(instance) {
            Some(existing) => existing,
            None => {
                let created = nested_blueprint
                    .default_constructor()
                    .ok_or_else(|| {
                        ContainerError::creation(
                            name,
                            format!(
                                "nested type {} has no default constructor to auto-create",
                                nested_type
                            ),
                        )
                    })?
                    .invoke(nested_type, &[])?;
                accessor.set(instance, created.clone())?;
                created
            }
        };
        self.apply_property(name, &nested_blueprint, &nested, rest, value)
    }
}

fn scalar_matches(arg: &AnyArc, kind: ScalarKind) -> bool {
    match kind {
        ScalarKind::Str => arg.downcast_ref::<String>().is_some(),
        ScalarKind::Int => arg.downcast_ref::<i64>().is_some(),
        ScalarKind::Float => arg.downcast_ref::<f64>().is_some(),
        ScalarKind::Bool => arg.downcast_ref::<bool>().is_some(),
    }
}

fn scalar_value_of(arg: &AnyArc) -> Option<PropertyValue> {
    if let Some(s) = arg.downcast_ref::<String>() {
        return Some(PropertyValue::Str(s.clone()));
    }
    if let Some(i) = arg.downcast_ref::<i64>() {
        return Some(PropertyValue::Int(*i));
    }
    if let Some(x) = arg.downcast_ref::<f64>() {
        return Some(PropertyValue::Float(*x));
    }
    if let Some(b) = arg.downcast_ref::<bool>() {
        return Some(PropertyValue::Bool(*b));
    }
    None
}

/// `"app::EngineCore"` becomes `"engineCore"`, the conventional definition
/// name tried last during by-type resolution.
pub(crate) fn decapitalized_simple_name(type_name: &str) -> String {
    let simple = type_name.rsplit("::").next().unwrap_or(type_name);
    let mut chars = simple.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
