//! Per-call chain traversal.

use smallvec::SmallVec;
use std::sync::Arc;

use crate::blueprint::{AnyArc, MethodFn};
use crate::error::{ContainerError, ContainerResult};

use super::{Advice, AfterReturningAdvice, ChainEntry};

/// The cursor object driving one proxied call through its advice chain.
///
/// The cursor starts at -1. Traversal is iterative: before advices run as
/// the cursor passes them, after-returning advices are pushed onto an
/// explicit pending stack and unwound in reverse once the terminal call
/// returns, so call-stack depth stays constant regardless of chain length.
/// The ordering is identical to a recursive push-down traversal: for a
/// chain `[afterA, beforeB]`, `beforeB` runs, then the target, then
/// `afterA` sees the return value.
pub struct MethodInvocation<'a> {
    type_name: &'static str,
    method: &'a str,
    args: &'a [AnyArc],
    target: &'a AnyArc,
    chain: &'a [ChainEntry],
    terminal: &'a MethodFn,
    cursor: isize,
}

impl<'a> MethodInvocation<'a> {
    pub(crate) fn new(
        type_name: &'static str,
        method: &'a str,
        args: &'a [AnyArc],
        target: &'a AnyArc,
        chain: &'a [ChainEntry],
        terminal: &'a MethodFn,
    ) -> Self {
        Self {
            type_name,
            method,
            args,
            target,
            chain,
            terminal,
            cursor: -1,
        }
    }

    /// The target's registered type name.
    pub fn target_type(&self) -> &'static str {
        self.type_name
    }

    /// The invoked method name.
    pub fn method(&self) -> &str {
        self.method
    }

    /// The call arguments.
    pub fn args(&self) -> &[AnyArc] {
        self.args
    }

    /// The target instance.
    pub fn target(&self) -> &AnyArc {
        self.target
    }

    /// Runs the remaining chain and the terminal method call, returning the
    /// target method's result.
    pub fn proceed(&mut self) -> ContainerResult<AnyArc> {
        if self.cursor != -1 {
            return Err(ContainerError::ProxyInvocation(format!(
                "invocation of '{}::{}' already consumed",
                self.type_name, self.method
            )));
        }
        let mut pending: SmallVec<[Arc<dyn AfterReturningAdvice>; 4]> = SmallVec::new();
        loop {
            self.cursor += 1;
            if self.cursor as usize >= self.chain.len() {
                break;
            }
            let advice = self.chain[self.cursor as usize].advice().clone();
            match advice {
                Advice::Before(before) => before.before(self)?,
                Advice::AfterReturning(after) => pending.push(after),
            }
        }
        let result = (self.terminal)(self.target, self.args)?;
        while let Some(after) = pending.pop() {
            after.after_returning(self, &result)?;
        }
        Ok(result)
    }
}
