// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Native functions callable from lowered methods.
//!
//! Call targets that resolve to no variable are looked up here by name.
//! Registration is explicit; there is no discovery.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::RuntimeFault;
use crate::value::Value;

pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value, RuntimeFault>>;

#[derive(Clone, Default)]
pub struct Host {
    functions: HashMap<String, NativeFn>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeFault> + 'static,
    {
        self.functions.insert(name.into(), Rc::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RuntimeFault> {
        let f = self
            .functions
            .get(name)
            .ok_or_else(|| RuntimeFault::UndefinedFunction(name.to_string()))?;
        f(args)
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("Host").field("functions", &names).finish()
    }
}
