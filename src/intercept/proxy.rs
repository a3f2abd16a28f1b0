//! Proxy construction and dispatch.
//!
//! A [`Proxy`] is an ordinary value wrapping a [`TargetSource`] and a
//! [`ProxyConfig`]; no code generation is involved. The target is
//! re-fetched from the source on every call (so non-static sources such as
//! scope proxies see the current conversation's instance) and the source's
//! release hook always runs, even when the call fails.

use std::sync::Arc;

use crate::blueprint::{AnyArc, Blueprint, BlueprintRegistry, InterfaceDef};
use crate::container::Container;
use crate::error::{ContainerError, ContainerResult};

use super::invocation::MethodInvocation;
use super::{Advisor, Chain, ProxyConfig};

/// Supplies the target instance for each proxied call.
pub trait TargetSource: Send + Sync {
    /// Registered type name of the targets this source produces.
    fn target_type(&self) -> &'static str;

    /// Whether every call sees the same instance.
    fn is_static(&self) -> bool;

    /// Fetches the target for one call.
    fn target(&self) -> ContainerResult<AnyArc>;

    /// Invoked after the call, success or failure.
    fn release(&self, target: &AnyArc) {
        let _ = target;
    }
}

/// Target source over one fixed instance.
pub struct FixedTargetSource {
    target: AnyArc,
    type_name: &'static str,
}

impl FixedTargetSource {
    /// Source always yielding `target`.
    pub fn new(target: AnyArc, type_name: &'static str) -> Self {
        Self { target, type_name }
    }
}

impl TargetSource for FixedTargetSource {
    fn target_type(&self) -> &'static str {
        self.type_name
    }

    fn is_static(&self) -> bool {
        true
    }

    fn target(&self) -> ContainerResult<AnyArc> {
        Ok(self.target.clone())
    }
}

/// Target source resolving through a container scope on every call, so the
/// active conversation decides which instance a proxied call lands on.
pub struct ScopedTargetSource {
    container: Container,
    name: String,
    type_name: &'static str,
}

impl ScopedTargetSource {
    /// Source re-fetching the named instance from its scope per call.
    pub fn new(container: Container, name: impl Into<String>, type_name: &'static str) -> Self {
        Self {
            container,
            name: name.into(),
            type_name,
        }
    }
}

impl TargetSource for ScopedTargetSource {
    fn target_type(&self) -> &'static str {
        self.type_name
    }

    fn is_static(&self) -> bool {
        false
    }

    fn target(&self) -> ContainerResult<AnyArc> {
        self.container.resolve_scoped_target(&self.name)
    }
}

enum ProxyKind {
    /// Dispatches only methods declared by the target's capability interfaces
    Interface(Vec<Arc<InterfaceDef>>),
    /// Dispatches any method-table entry, terminal step calling the original
    Subclass,
}

/// A composed method-interception proxy.
///
/// Calls go through [`invoke`](Proxy::invoke): the chain applicable to the
/// method runs around the target's method-table entry.
pub struct Proxy {
    type_name: &'static str,
    blueprint: Arc<Blueprint>,
    kind: ProxyKind,
    target_source: Arc<dyn TargetSource>,
    config: ProxyConfig,
}

impl Proxy {
    /// Registered type name of the proxied target.
    pub fn target_type(&self) -> &'static str {
        self.type_name
    }

    /// Whether this proxy stands in for the named capability interface.
    pub fn implements_interface(&self, interface: &str) -> bool {
        match &self.kind {
            ProxyKind::Interface(interfaces) => interfaces.iter().any(|i| i.name == interface),
            ProxyKind::Subclass => false,
        }
    }

    /// Whether this is a subclass-style proxy (a runtime stand-in for the
    /// concrete type rather than for an interface).
    pub fn is_subclass(&self) -> bool {
        matches!(self.kind, ProxyKind::Subclass)
    }

    /// The advisor configuration, for adding advisors or freezing.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Invokes a method through the advice chain.
    pub fn invoke(&self, method: &str, args: &[AnyArc]) -> ContainerResult<AnyArc> {
        let target = self.target_source.target()?;
        let result = self.dispatch(&target, method, args);
        self.target_source.release(&target);
        result
    }

    fn dispatch(&self, target: &AnyArc, method: &str, args: &[AnyArc]) -> ContainerResult<AnyArc> {
        if let ProxyKind::Interface(interfaces) = &self.kind {
            let exposed = interfaces
                .iter()
                .any(|i| i.methods.iter().any(|m| *m == method));
            if !exposed {
                return Err(ContainerError::ProxyInvocation(format!(
                    "method '{}' is not declared by any interface of {}",
                    method, self.type_name
                )));
            }
        }
        let terminal = self.blueprint.method(method).ok_or_else(|| {
            ContainerError::ProxyInvocation(format!(
                "type {} has no method '{}'",
                self.type_name, method
            ))
        })?;
        let chain = self
            .config
            .chain_for(method, self.type_name, self.blueprint.interfaces());
        let chain: Chain = chain
            .into_iter()
            .filter(|entry| entry.matches_args(method, self.type_name, args))
            .collect();
        if chain.is_empty() {
            return terminal(target, args);
        }
        let mut invocation =
            MethodInvocation::new(self.type_name, method, args, target, &chain, &terminal);
        invocation.proceed()
    }
}

/// Builds a proxy for the targets of `target_source`.
///
/// Strategy selection: a target type declaring at least one registered
/// capability interface gets an interface proxy; otherwise a type with a
/// method table gets a subclass-style proxy; a type with neither fails
/// with [`ContainerError::ProxyCreation`]. `explicit_type` overrides the
/// type reported by the target source.
///
/// Usable standalone, without any container, given a populated
/// [`BlueprintRegistry`].
pub fn create_proxy(
    registry: &BlueprintRegistry,
    target_source: Arc<dyn TargetSource>,
    advisors: Vec<Arc<Advisor>>,
    explicit_type: Option<&'static str>,
) -> ContainerResult<Proxy> {
    let type_name = explicit_type.unwrap_or_else(|| target_source.target_type());
    let blueprint = registry.get(type_name).ok_or_else(|| {
        ContainerError::ProxyCreation(format!("no blueprint registered for type {}", type_name))
    })?;
    let kind = if blueprint.interfaces().is_empty() {
        if !blueprint.has_methods() {
            return Err(ContainerError::ProxyCreation(format!(
                "type {} exposes no interfaces and no method table",
                type_name
            )));
        }
        ProxyKind::Subclass
    } else {
        let mut interfaces = Vec::with_capacity(blueprint.interfaces().len());
        for name in blueprint.interfaces() {
            let def = registry.interface(name).ok_or_else(|| {
                ContainerError::ProxyCreation(format!(
                    "type {} declares unregistered interface {}",
                    type_name, name
                ))
            })?;
            interfaces.push(def);
        }
        ProxyKind::Interface(interfaces)
    };
    Ok(Proxy {
        type_name,
        blueprint,
        kind,
        target_source,
        config: ProxyConfig::new(advisors),
    })
}
