//! The instance lifecycle pipeline.
//!
//! One creation runs, in order: constructor resolution, instantiation,
//! early-reference exposure (singletons only), property population, aware
//! callbacks, pre-init processors, initialization, post-init processors,
//! destruction registration, and final promotion. Any error up to and
//! including the post-init processors aborts the creation; no partially
//! built instance ever becomes visible under its name.

use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::blueprint::{AnyArc, Blueprint};
use crate::definition::Definition;
use crate::error::{ContainerError, ContainerResult};
use crate::resolver::DependencyResolver;

use super::Container;

/// Canonical name of the blueprint init callback; a named init method with
/// this name is the callback, not a second method to invoke.
const INIT_CALLBACK: &str = "init";

/// Canonical name of the blueprint destroy callback.
const DESTROY_CALLBACK: &str = "destroy";

pub(crate) fn create_instance(
    container: &Container,
    name: &str,
    definition: &Definition,
    args: Option<&[AnyArc]>,
) -> ContainerResult<AnyArc> {
    container.observers().creating(name);
    let started = Instant::now();
    match run_pipeline(container, name, definition, args) {
        Ok(instance) => {
            container.observers().created(name, started.elapsed());
            Ok(instance)
        }
        Err(err) => {
            container.observers().creation_failed(name, &err);
            Err(err)
        }
    }
}

fn run_pipeline(
    container: &Container,
    name: &str,
    definition: &Definition,
    args: Option<&[AnyArc]>,
) -> ContainerResult<AnyArc> {
    debug!(instance = name, type_name = definition.type_name(), "creating instance");
    let blueprint = container
        .blueprints()
        .get(definition.type_name())
        .ok_or_else(|| {
            ContainerError::creation(
                name,
                format!("no blueprint registered for type {}", definition.type_name()),
            )
        })?;

    let resolver = DependencyResolver::new(container);
    let (constructor, argv) = resolver.resolve_constructor(name, definition, &blueprint, args)?;
    let strategy = container.strategy_for(definition);
    let raw = strategy.instantiate(definition, &blueprint, constructor.as_ref(), &argv)?;

    if definition.is_singleton() {
        let early = raw.clone();
        container
            .singletons()
            .register_early_factory(name, Box::new(move || early));
        trace!(instance = name, "early reference exposed");
    }

    resolver.populate(name, definition, &blueprint, &raw)?;

    if let Some(hook) = blueprint.aware_name_hook() {
        hook(&raw, name);
    }
    if let Some(hook) = blueprint.aware_container_hook() {
        hook(&raw, container);
    }

    let mut instance = raw;
    for processor in container.processors() {
        if let Some(replaced) = processor.before_init(&instance, name)? {
            instance = replaced;
        }
    }

    initialize(name, definition, &blueprint, &instance)?;

    for processor in container.processors() {
        if let Some(replaced) = processor.after_init(&instance, name)? {
            instance = replaced;
        }
    }

    register_destruction(container, name, definition, &blueprint, &instance)?;

    if definition.is_singleton() {
        container.singletons().promote_to_final(name, instance.clone());
    }
    debug!(instance = name, "instance ready");
    Ok(instance)
}

fn initialize(
    name: &str,
    definition: &Definition,
    blueprint: &Blueprint,
    instance: &AnyArc,
) -> ContainerResult<()> {
    if let Some(hook) = blueprint.init_hook() {
        hook(instance).map_err(|err| {
            ContainerError::creation(name, format!("init callback failed: {}", err))
        })?;
    }
    if let Some(method) = definition.init_method() {
        if method == INIT_CALLBACK && blueprint.init_hook().is_some() {
            return Ok(());
        }
        let call = blueprint.method(method).ok_or_else(|| {
            ContainerError::creation(
                name,
                format!(
                    "init method '{}' not found on type {}",
                    method,
                    blueprint.type_name()
                ),
            )
        })?;
        call(instance, &[]).map_err(|err| {
            ContainerError::creation(name, format!("init method '{}' failed: {}", method, err))
        })?;
    }
    Ok(())
}

/// Wires the destroy callback and named destroy method into whichever
/// lifetime owns the instance. A named destroy method missing from the
/// method table fails the creation here rather than surfacing at shutdown.
fn register_destruction(
    container: &Container,
    name: &str,
    definition: &Definition,
    blueprint: &std::sync::Arc<Blueprint>,
    instance: &AnyArc,
) -> ContainerResult<()> {
    let has_hook = blueprint.destroy_hook().is_some();
    let named = definition
        .destroy_method()
        .filter(|m| !(*m == DESTROY_CALLBACK && has_hook))
        .map(str::to_string);

    if let Some(method) = &named {
        if blueprint.method(method).is_none() {
            return Err(ContainerError::creation(
                name,
                format!(
                    "destroy method '{}' not found on type {}",
                    method,
                    blueprint.type_name()
                ),
            ));
        }
    }
    if !has_hook && named.is_none() {
        return Ok(());
    }

    let owned_name = name.to_string();
    let owned_blueprint = blueprint.clone();
    let owned_instance = instance.clone();
    let destroy = move || -> ContainerResult<()> {
        if let Some(hook) = owned_blueprint.destroy_hook() {
            hook(&owned_instance).map_err(|err| ContainerError::Destruction {
                name: owned_name.clone(),
                message: format!("destroy callback failed: {}", err),
            })?;
        }
        if let Some(method) = &named {
            let call = owned_blueprint
                .method(method)
                .ok_or_else(|| ContainerError::Destruction {
                    name: owned_name.clone(),
                    message: format!("destroy method '{}' disappeared", method),
                })?;
            call(&owned_instance, &[]).map_err(|err| ContainerError::Destruction {
                name: owned_name.clone(),
                message: format!("destroy method '{}' failed: {}", method, err),
            })?;
        }
        Ok(())
    };

    if definition.is_singleton() {
        container
            .singletons()
            .register_destruction(name.to_string(), Box::new(destroy));
    } else {
        let scope = container.scope(definition.scope()).ok_or_else(|| {
            ContainerError::creation(
                name,
                format!("no scope registered under '{}'", definition.scope()),
            )
        })?;
        let callback_name = name.to_string();
        scope.register_destruction_callback(
            name,
            Box::new(move || {
                if let Err(err) = destroy() {
                    warn!(instance = %callback_name, error = %err, "scoped destroy failed");
                }
            }),
        );
    }
    Ok(())
}
