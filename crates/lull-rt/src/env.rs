// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Transient variable bindings of one state execution.

use std::collections::HashMap;

use crate::value::Value;

#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Value>,
}

/// Scoped bindings, discarded when the state finishes.
#[derive(Debug)]
pub(crate) struct Frame {
    scopes: Vec<Scope>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// Frame seeded with `bindings` in its outermost scope.
    pub fn with_bindings(bindings: HashMap<String, Value>) -> Self {
        Self {
            scopes: vec![Scope { bindings }],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn define(&mut self, name: String, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.bindings.get(name))
    }

    /// Assign to an existing binding. Returns false if there is none.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.bindings.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        false
    }

    /// Every visible binding, inner scopes shadowing outer ones.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        for scope in &self.scopes {
            for (name, value) in &scope.bindings {
                out.insert(name.clone(), value.clone());
            }
        }
        out
    }
}
