// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Return collapsing, dead state elimination and dense renumbering.

use crate::chain::{Handler, HandlerId, State, StateId, Terminator};

/// Let a `return` whose target only completes the chain complete it
/// directly. The shared return state then drops out when nothing else
/// reaches it.
pub(crate) fn collapse_returns(states: &mut [State]) {
    let completes: Vec<bool> = states
        .iter()
        .map(|s| s.statements.is_empty() && s.terminator == Terminator::Complete)
        .collect();
    for state in states.iter_mut() {
        if let Terminator::Return { target, .. } = &mut state.terminator {
            if target.is_some_and(|t| completes[t.0 as usize]) {
                *target = None;
            }
        }
    }
}

/// Drop states not reachable from the entry and renumber the survivors.
///
/// A state is reachable through a successor edge, or as the catch entry or
/// finally state of a handler covering a reachable state. Relative order of
/// surviving states and handlers is preserved.
pub(crate) fn prune(states: Vec<State>, handlers: Vec<Handler>) -> (Vec<State>, Vec<Handler>) {
    let mut live_states = vec![false; states.len()];
    let mut live_handlers = vec![false; handlers.len()];
    let mut work = vec![StateId(0)];

    while let Some(id) = work.pop() {
        let idx = id.0 as usize;
        if live_states[idx] {
            continue;
        }
        live_states[idx] = true;

        let state = &states[idx];
        work.extend(state.terminator.successors());

        let mut covering = state.handler;
        while let Some(h) = covering {
            let handler = &handlers[h.0 as usize];
            live_handlers[h.0 as usize] = true;
            if let Some(catch) = &handler.catch {
                work.push(catch.entry);
            }
            if let Some(finally) = handler.finally {
                work.push(finally);
            }
            covering = handler.parent;
        }
    }

    let state_map = renumber(&live_states);
    let handler_map = renumber(&live_handlers);
    let map_state = |id: StateId| state_map[id.0 as usize].map_or(id, StateId);
    let map_handler = |id: HandlerId| handler_map[id.0 as usize].map_or(id, HandlerId);

    let before = states.len();
    let states: Vec<State> = states
        .into_iter()
        .filter(|s| live_states[s.id.0 as usize])
        .map(|mut state| {
            state.id = map_state(state.id);
            state.terminator.for_each_id_mut(|t| *t = map_state(*t));
            state.handler = state.handler.map(map_handler);
            state
        })
        .collect();

    let handlers = handlers
        .into_iter()
        .filter(|h| live_handlers[h.id.0 as usize])
        .map(|mut handler| {
            handler.id = map_handler(handler.id);
            handler.parent = handler.parent.map(map_handler);
            handler.finally = handler.finally.map(map_state);
            if let Some(catch) = &mut handler.catch {
                catch.entry = map_state(catch.entry);
            }
            handler
        })
        .collect();

    tracing::trace!(before, after = states.len(), "pruned unreachable states");
    (states, handlers)
}

/// New dense index for each live entry.
fn renumber(live: &[bool]) -> Vec<Option<u32>> {
    let mut next = 0;
    live.iter()
        .map(|&alive| {
            alive.then(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect()
}
