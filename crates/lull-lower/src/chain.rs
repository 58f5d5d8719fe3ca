// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! State chain representation - flat table of pause-to-pause states.
//!
//! Successors are stored as ids, never references, so the chain is a plain
//! arena: `states[id.0]` is the state with that id.

use indexmap::IndexMap;
use lull_ast::{Expr, Slot, Stmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HandlerId(pub u32);

/// Which runtime wrapper drives the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MethodKind {
    /// Produces values through `yield`; pulled by an enumerator.
    Iterator,
    /// Waits on futures through `await`; pushed by continuations.
    Async,
}

/// One pause-to-pause execution unit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct State {
    pub id: StateId,
    pub statements: Vec<Stmt>,
    pub terminator: Terminator,
    /// Innermost exception handler covering this state.
    pub handler: Option<HandlerId>,
}

/// The single suspension a state may end with.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SuspendPoint {
    /// Produce the value and pause until pulled again.
    Yield(Expr),
    /// Evaluate to a future and pause until it settles.
    Await(Expr),
}

/// How control leaves a state after its statements complete normally.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Terminator {
    Goto(StateId),
    Branch {
        cond: Expr,
        then_to: StateId,
        else_to: StateId,
    },
    Suspend {
        point: SuspendPoint,
        resume: StateId,
    },
    /// Store the return value (if any), then continue at `target`. Without
    /// a target the chain completes with that value.
    Return {
        value: Option<Expr>,
        target: Option<StateId>,
    },
    /// Remember `then` as the pending exit of `finally`, then run it.
    EnterFinally {
        finally: StateId,
        then: StateId,
    },
    /// Last op of a finally state: continue at its pending exit, or rethrow
    /// the pending fault.
    EndFinally,
    /// Chain finished.
    Complete,
    /// Never entered by a well-formed chain.
    Unreachable,
}

impl Terminator {
    /// Static successors, in branch order.
    pub fn successors(&self) -> Vec<StateId> {
        match self {
            Terminator::Goto(target) => vec![*target],
            Terminator::Branch { then_to, else_to, .. } => vec![*then_to, *else_to],
            Terminator::Suspend { resume, .. } => vec![*resume],
            Terminator::Return { target, .. } => target.iter().copied().collect(),
            Terminator::EnterFinally { finally, then } => vec![*finally, *then],
            Terminator::EndFinally | Terminator::Complete | Terminator::Unreachable => vec![],
        }
    }

    /// Apply `f` to every successor that is an exit target.
    ///
    /// The `finally` of an `EnterFinally` is not an exit target; it belongs
    /// to the try statement that created the route.
    pub fn for_each_exit_mut(&mut self, mut f: impl FnMut(&mut StateId)) {
        match self {
            Terminator::Goto(target) => f(target),
            Terminator::Branch { then_to, else_to, .. } => {
                f(then_to);
                f(else_to);
            }
            Terminator::Suspend { resume, .. } => f(resume),
            Terminator::Return { target, .. } => {
                if let Some(target) = target {
                    f(target);
                }
            }
            Terminator::EnterFinally { then, .. } => f(then),
            Terminator::EndFinally | Terminator::Complete | Terminator::Unreachable => {}
        }
    }

    /// Apply `f` to every state id mentioned, exit target or not.
    pub(crate) fn for_each_id_mut(&mut self, mut f: impl FnMut(&mut StateId)) {
        if let Terminator::EnterFinally { finally, .. } = self {
            f(finally);
        }
        self.for_each_exit_mut(f);
    }

    pub fn is_suspension(&self) -> bool {
        matches!(self, Terminator::Suspend { .. })
    }
}

/// Exception dispatch record for one try statement region.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Handler {
    pub id: HandlerId,
    pub catch: Option<CatchTarget>,
    /// Single state holding the finally body.
    pub finally: Option<StateId>,
    pub parent: Option<HandlerId>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CatchTarget {
    pub entry: StateId,
    /// Name bound to the caught error.
    pub binding: Option<String>,
    /// Hoisted slot the driver writes the error into.
    pub slot: Option<Slot>,
}

/// Why a variable lives in hoisted storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaptureOrigin {
    /// Seeded by the driver at creation.
    Parameter,
    /// Written by the driver on catch dispatch.
    CatchBinding,
    /// Read in a state other than one that writes it.
    Local,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapturedVar {
    pub slot: Slot,
    pub name: String,
    pub origin: CaptureOrigin,
}

/// Variables promoted to persistent storage, in slot order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaptureManifest {
    vars: IndexMap<String, CapturedVar>,
}

impl CaptureManifest {
    /// Add `name` if absent. Returns its slot either way.
    pub fn insert(&mut self, name: &str, origin: CaptureOrigin) -> Slot {
        let next = Slot(self.vars.len() as u32);
        self.vars
            .entry(name.to_string())
            .or_insert_with(|| CapturedVar {
                slot: next,
                name: name.to_string(),
                origin,
            })
            .slot
    }

    pub fn slot_of(&self, name: &str) -> Option<Slot> {
        self.vars.get(name).map(|v| v.slot)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn get(&self, slot: Slot) -> Option<&CapturedVar> {
        self.vars.get_index(slot.0 as usize).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapturedVar> {
        self.vars.values()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Output of the lowering transform.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateChain {
    pub name: String,
    pub kind: MethodKind,
    /// Indexed by `StateId`; entry is `StateId(0)`.
    pub states: Vec<State>,
    /// Indexed by `HandlerId`.
    pub handlers: Vec<Handler>,
    pub captures: CaptureManifest,
    /// Slot of each method parameter, in declaration order.
    pub params: Vec<Slot>,
}

impl StateChain {
    pub const ENTRY: StateId = StateId(0);

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0 as usize]
    }

    pub fn handler(&self, id: HandlerId) -> &Handler {
        &self.handlers[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of states ending in a suspension.
    pub fn suspension_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| s.terminator.is_suspension())
            .count()
    }

    /// Finally states covering `id`, innermost first.
    pub fn enclosing_finally(&self, id: StateId) -> Vec<StateId> {
        let mut out = Vec::new();
        let mut current = self.state(id).handler;
        while let Some(h) = current {
            let handler = self.handler(h);
            if let Some(fin) = handler.finally {
                out.push(fin);
            }
            current = handler.parent;
        }
        out
    }
}
