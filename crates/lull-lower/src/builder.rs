// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! ChainBuilder - helper for state construction during lowering.

use lull_ast::Stmt;

use crate::chain::{Handler, HandlerId, State, StateId, Terminator};

pub struct ChainBuilder {
    states: Vec<State>,
    handlers: Vec<Handler>,
    current: StateId,
    /// Handler given to newly created states.
    handler: Option<HandlerId>,
}

impl ChainBuilder {
    /// Start with the entry state open.
    pub fn new() -> Self {
        let entry = StateId(0);
        Self {
            states: vec![State {
                id: entry,
                statements: Vec::new(),
                terminator: Terminator::Unreachable,
                handler: None,
            }],
            handlers: Vec::new(),
            current: entry,
            handler: None,
        }
    }

    pub fn create_state(&mut self) -> StateId {
        self.create_state_in(self.handler)
    }

    pub fn create_state_in(&mut self, handler: Option<HandlerId>) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(State {
            id,
            statements: Vec::new(),
            terminator: Terminator::Unreachable,
            handler,
        });
        id
    }

    /// Id the next created state will get.
    pub fn next_id(&self) -> u32 {
        self.states.len() as u32
    }

    pub fn switch_to(&mut self, state: StateId) {
        self.current = state;
    }

    pub fn current(&self) -> StateId {
        self.current
    }

    pub fn handler(&self) -> Option<HandlerId> {
        self.handler
    }

    pub fn set_handler(&mut self, handler: Option<HandlerId>) {
        self.handler = handler;
    }

    pub fn add_handler(&mut self, finally: Option<StateId>, parent: Option<HandlerId>) -> HandlerId {
        let id = HandlerId(self.handlers.len() as u32);
        self.handlers.push(Handler {
            id,
            catch: None,
            finally,
            parent,
        });
        id
    }

    pub fn handler_mut(&mut self, id: HandlerId) -> &mut Handler {
        &mut self.handlers[id.0 as usize]
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id.0 as usize]
    }

    pub fn push_stmt(&mut self, stmt: Stmt) {
        let state = &mut self.states[self.current.0 as usize];
        state.statements.push(stmt);
    }

    pub fn terminate(&mut self, term: Terminator) {
        let state = &mut self.states[self.current.0 as usize];
        state.terminator = term;
    }

    /// Check if the current state still has the default Unreachable terminator.
    pub fn current_unterminated(&self) -> bool {
        matches!(
            self.states[self.current.0 as usize].terminator,
            Terminator::Unreachable
        )
    }

    /// Open, unterminated, with no statements yet.
    pub fn current_is_empty(&self) -> bool {
        self.current_unterminated() && self.states[self.current.0 as usize].statements.is_empty()
    }

    pub fn finish(self) -> (Vec<State>, Vec<Handler>) {
        (self.states, self.handlers)
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}
