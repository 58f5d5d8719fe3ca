// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Method declarations.

use crate::stmt::Stmt;
use crate::{NodeId, Span};

/// A method handed over by the parse layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Method {
    pub id: NodeId,
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Method {
    pub fn new(name: impl Into<String>, params: &[&str], body: Vec<Stmt>) -> Self {
        Self {
            id: NodeId::DUMMY,
            name: name.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
            span: Span::DUMMY,
        }
    }
}
