// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement AST nodes.

use crate::expr::Expr;
use crate::{NodeId, Slot, Span};

/// A statement in the AST.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

/// The kind of statement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StmtKind {
    /// Let binding
    Let {
        name: String,
        init: Expr,
    },
    /// Assignment to an existing local
    Assign {
        target: String,
        value: Expr,
    },
    /// Expression statement
    Expr(Expr),
    /// Conditional
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    /// While loop
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// Protected region with optional catch and finally
    Try {
        body: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    /// Produce a value and pause
    Yield(Expr),
    /// End an iterator method
    YieldBreak,
    /// Return statement
    Return(Option<Expr>),
    /// Break out of the innermost loop
    Break,
    /// Continue the innermost loop
    Continue,
    /// Raise an error
    Throw(Expr),
    /// Nested block
    Block(Vec<Stmt>),
    /// Write to hoisted storage. Produced by lowering.
    Store {
        slot: Slot,
        value: Expr,
    },
}

/// The `catch` arm of a try statement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CatchClause {
    /// Name bound to the caught error, if any.
    pub binding: Option<String>,
    pub body: Vec<Stmt>,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { id: NodeId::DUMMY, kind, span: Span::DUMMY }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn let_binding(name: impl Into<String>, init: Expr) -> Self {
        Self::new(StmtKind::Let { name: name.into(), init })
    }

    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Self::new(StmtKind::Assign { target: target.into(), value })
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    pub fn if_else(cond: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>) -> Self {
        Self::new(StmtKind::If { cond, then_branch, else_branch })
    }

    pub fn while_loop(cond: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::While { cond, body })
    }

    pub fn try_finally(body: Vec<Stmt>, finally: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Try { body, catch: None, finally: Some(finally) })
    }

    pub fn try_catch(
        body: Vec<Stmt>,
        binding: Option<&str>,
        catch_body: Vec<Stmt>,
        finally: Option<Vec<Stmt>>,
    ) -> Self {
        Self::new(StmtKind::Try {
            body,
            catch: Some(CatchClause {
                binding: binding.map(str::to_string),
                body: catch_body,
            }),
            finally,
        })
    }

    pub fn yield_value(value: Expr) -> Self {
        Self::new(StmtKind::Yield(value))
    }

    pub fn yield_break() -> Self {
        Self::new(StmtKind::YieldBreak)
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return(value))
    }

    pub fn brk() -> Self {
        Self::new(StmtKind::Break)
    }

    pub fn cont() -> Self {
        Self::new(StmtKind::Continue)
    }

    pub fn throw(value: Expr) -> Self {
        Self::new(StmtKind::Throw(value))
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Block(stmts))
    }

    pub fn store(slot: Slot, value: Expr) -> Self {
        Self::new(StmtKind::Store { slot, value })
    }
}
