// SPDX-License-Identifier: (MIT OR Apache-2.0)

/// Knobs for the lowering pass.
#[derive(Debug, Clone)]
pub struct LowerConfig {
    /// Upper bound on states in one chain, checked after pruning.
    pub max_states: usize,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self { max_states: 4096 }
    }
}
