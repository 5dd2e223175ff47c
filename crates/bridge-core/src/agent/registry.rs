//! Static action registry: name, declared parameters, description, executor.
//!
//! Built once at startup from a fixed table and never mutated afterwards.
//! Registering the same name twice is a wiring error and fails fast.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::agent::wire::CommandArg;
use crate::session::{Completion, Session};

/// Name of the reserved control action resolved against the in-flight set.
pub const WAIT: &str = "wait";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Number,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

/// Future returned by [`SessionAction::start`].
pub type StartFuture = Pin<Box<dyn Future<Output = anyhow::Result<Completion>> + Send>>;

/// Uniform executor shape shared by every action: issue the action against the
/// session, returning a handle that resolves at the action's natural or timed
/// completion. Awaiting `start` itself only covers issuance, which is how the
/// dispatcher keeps start order strict while completions overlap.
pub trait SessionAction: Send + Sync {
    fn start(&self, session: Arc<dyn Session>, args: Vec<CommandArg>) -> StartFuture;
}

pub enum ActionKind {
    /// Reserved control action: the dispatcher suspends until the in-flight
    /// set drains. No session call is made.
    AwaitDrain,
    Session(Box<dyn SessionAction>),
}

pub struct ActionSpec {
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    pub description: &'static str,
    pub kind: ActionKind,
}

#[derive(Default)]
pub struct ActionRegistry {
    order: Vec<ActionSpec>,
    by_name: HashMap<&'static str, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panics on a duplicate name: that is a configuration error, caught at
    /// startup rather than at runtime.
    pub fn register(&mut self, spec: ActionSpec) {
        if self.by_name.insert(spec.name, self.order.len()).is_some() {
            panic!("duplicate action registered: {}", spec.name);
        }
        self.order.push(spec);
    }

    /// Name lookup, tolerant of the casing and padding models produce.
    pub fn lookup(&self, name: &str) -> Option<&ActionSpec> {
        let name = name.trim().to_ascii_lowercase();
        self.by_name.get(name.as_str()).map(|&idx| &self.order[idx])
    }

    /// One line per action, in registration order, for the decision prompt.
    pub fn describe_all(&self) -> Vec<String> {
        self.order
            .iter()
            .map(|spec| {
                let mut line = String::from(spec.name);
                for param in spec.params {
                    line.push_str(" <");
                    line.push_str(param.name);
                    line.push('>');
                }
                line.push_str(": ");
                line.push_str(spec.description);
                line
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
