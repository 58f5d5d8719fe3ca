// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Binding renaming.
//!
//! Gives every binding in a method a unique name (`x`, `x#1`, `x#2`, ...) so
//! later passes can key variables by name once statements are scattered
//! across states. Names that resolve to no binding (host functions) are
//! left alone.

use std::collections::HashMap;

use lull_ast::{CatchClause, Expr, ExprKind, Method, Stmt, StmtKind};

pub(crate) fn rename_bindings(method: &Method) -> Method {
    let mut renamer = Renamer::default();
    renamer.push();
    let params = method.params.iter().map(|p| renamer.declare(p)).collect();
    let body = renamer.block(&method.body);
    renamer.pop();
    Method {
        id: method.id,
        name: method.name.clone(),
        params,
        body,
        span: method.span,
    }
}

#[derive(Default)]
struct Renamer {
    /// Innermost scope last. Maps source name to unique name.
    scopes: Vec<HashMap<String, String>>,
    /// How many bindings of each source name were declared so far.
    seen: HashMap<String, u32>,
}

impl Renamer {
    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) -> String {
        let count = self.seen.entry(name.to_string()).or_insert(0);
        let unique = if *count == 0 {
            name.to_string()
        } else {
            format!("{}#{}", name, count)
        };
        *count += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), unique.clone());
        }
        unique
    }

    fn resolve(&self, name: &str) -> String {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
            .unwrap_or_else(|| name.to_string())
    }

    fn block(&mut self, stmts: &[Stmt]) -> Vec<Stmt> {
        self.push();
        let out = stmts.iter().map(|s| self.stmt(s)).collect();
        self.pop();
        out
    }

    fn stmt(&mut self, stmt: &Stmt) -> Stmt {
        let kind = match &stmt.kind {
            StmtKind::Let { name, init } => {
                // Initializer sees the outer binding.
                let init = self.expr(init);
                StmtKind::Let { name: self.declare(name), init }
            }
            StmtKind::Assign { target, value } => StmtKind::Assign {
                target: self.resolve(target),
                value: self.expr(value),
            },
            StmtKind::Store { slot, value } => StmtKind::Store {
                slot: *slot,
                value: self.expr(value),
            },
            StmtKind::Expr(expr) => StmtKind::Expr(self.expr(expr)),
            StmtKind::If { cond, then_branch, else_branch } => StmtKind::If {
                cond: self.expr(cond),
                then_branch: self.block(then_branch),
                else_branch: self.block(else_branch),
            },
            StmtKind::While { cond, body } => StmtKind::While {
                cond: self.expr(cond),
                body: self.block(body),
            },
            StmtKind::Try { body, catch, finally } => {
                let body = self.block(body);
                let catch = catch.as_ref().map(|clause| {
                    self.push();
                    let binding = clause.binding.as_deref().map(|b| self.declare(b));
                    let body = clause.body.iter().map(|s| self.stmt(s)).collect();
                    self.pop();
                    CatchClause { binding, body }
                });
                let finally = finally.as_ref().map(|f| self.block(f));
                StmtKind::Try { body, catch, finally }
            }
            StmtKind::Yield(expr) => StmtKind::Yield(self.expr(expr)),
            StmtKind::Return(value) => StmtKind::Return(value.as_ref().map(|e| self.expr(e))),
            StmtKind::Throw(expr) => StmtKind::Throw(self.expr(expr)),
            StmtKind::Block(stmts) => StmtKind::Block(self.block(stmts)),
            StmtKind::YieldBreak => StmtKind::YieldBreak,
            StmtKind::Break => StmtKind::Break,
            StmtKind::Continue => StmtKind::Continue,
        };
        Stmt { id: stmt.id, kind, span: stmt.span }
    }

    fn expr(&mut self, expr: &Expr) -> Expr {
        let kind = match &expr.kind {
            ExprKind::Local(name) => ExprKind::Local(self.resolve(name)),
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op: *op,
                left: Box::new(self.expr(left)),
                right: Box::new(self.expr(right)),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: Box::new(self.expr(operand)),
            },
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: Box::new(self.expr(callee)),
                args: args.iter().map(|a| self.expr(a)).collect(),
            },
            ExprKind::Await(inner) => ExprKind::Await(Box::new(self.expr(inner))),
            ExprKind::Lambda { params, body } => {
                self.push();
                let params = params.iter().map(|p| self.declare(p)).collect();
                let body = body.iter().map(|s| self.stmt(s)).collect();
                self.pop();
                ExprKind::Lambda { params, body }
            }
            other => other.clone(),
        };
        Expr { id: expr.id, kind, span: expr.span }
    }
}
