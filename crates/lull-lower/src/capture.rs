// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Capture analysis - which variables outlive the state that wrote them.
//!
//! Per-state liveness is coarse: a written variable is hoisted once any
//! access to it, read or write, happens in a state other than its first
//! writer. A variable defined and consumed inside one state never touches
//! persistent storage. A name that is never written is a host function and
//! is left alone.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use lull_ast::{Expr, ExprKind, Stmt, StmtKind};

use crate::chain::{CaptureManifest, CaptureOrigin, Handler, State, SuspendPoint, Terminator};

#[derive(Default)]
struct Usage {
    reads: BTreeSet<u32>,
    writes: BTreeSet<u32>,
}

impl Usage {
    fn crosses_states(&self) -> bool {
        let Some(first) = self.writes.first() else {
            return false;
        };
        self.writes.iter().chain(&self.reads).any(|s| s != first)
    }
}

/// Decide hoisted storage for a pruned chain.
///
/// Slot order: parameters, then catch bindings, then locals in first-use
/// order.
pub(crate) fn build_manifest(states: &[State], params: &[String], catch_bindings: &[String]) -> CaptureManifest {
    let mut usage: IndexMap<String, Usage> = IndexMap::new();
    for state in states {
        let mut collector = UsageCollector {
            state: state.id.0,
            usage: &mut usage,
        };
        for stmt in &state.statements {
            collector.stmt(stmt);
        }
        collector.terminator(&state.terminator);
    }

    let mut manifest = CaptureManifest::default();
    for param in params {
        manifest.insert(param, CaptureOrigin::Parameter);
    }
    for binding in catch_bindings {
        manifest.insert(binding, CaptureOrigin::CatchBinding);
    }
    for (name, u) in &usage {
        if u.crosses_states() {
            manifest.insert(name, CaptureOrigin::Local);
        }
    }
    manifest
}

/// Route every access to a hoisted variable through its slot.
pub(crate) fn rewrite(states: &mut [State], handlers: &mut [Handler], manifest: &CaptureManifest) {
    let rewriter = Rewriter { manifest };
    for state in states.iter_mut() {
        rewriter.block(&mut state.statements);
        match &mut state.terminator {
            Terminator::Branch { cond, .. } => rewriter.expr(cond),
            Terminator::Suspend { point, .. } => match point {
                SuspendPoint::Yield(expr) | SuspendPoint::Await(expr) => rewriter.expr(expr),
            },
            Terminator::Return { value: Some(value), .. } => rewriter.expr(value),
            _ => {}
        }
    }
    for handler in handlers.iter_mut() {
        if let Some(catch) = &mut handler.catch {
            catch.slot = catch.binding.as_deref().and_then(|b| manifest.slot_of(b));
        }
    }
}

struct UsageCollector<'a> {
    state: u32,
    usage: &'a mut IndexMap<String, Usage>,
}

impl UsageCollector<'_> {
    fn read(&mut self, name: &str) {
        let state = self.state;
        self.usage.entry(name.to_string()).or_default().reads.insert(state);
    }

    fn write(&mut self, name: &str) {
        let state = self.state;
        self.usage.entry(name.to_string()).or_default().writes.insert(state);
    }

    fn block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, init } => {
                self.expr(init);
                self.write(name);
            }
            StmtKind::Assign { target, value } => {
                self.expr(value);
                self.write(target);
            }
            StmtKind::Store { value: expr, .. }
            | StmtKind::Expr(expr)
            | StmtKind::Throw(expr)
            | StmtKind::Yield(expr) => self.expr(expr),
            StmtKind::Return(value) => {
                if let Some(expr) = value {
                    self.expr(expr);
                }
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.expr(cond);
                self.block(then_branch);
                self.block(else_branch);
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.block(body);
            }
            StmtKind::Try { body, catch, finally } => {
                self.block(body);
                if let Some(clause) = catch {
                    if let Some(binding) = &clause.binding {
                        self.write(binding);
                    }
                    self.block(&clause.body);
                }
                if let Some(fin) = finally {
                    self.block(fin);
                }
            }
            StmtKind::Block(stmts) => self.block(stmts),
            StmtKind::YieldBreak | StmtKind::Break | StmtKind::Continue => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Local(name) => self.read(name),
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Await(inner) => self.expr(inner),
            // A closure created in this state sees the state's variables.
            ExprKind::Lambda { body, .. } => self.block(body),
            ExprKind::Unit
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Captured(_)
            | ExprKind::Resume => {}
        }
    }

    fn terminator(&mut self, term: &Terminator) {
        match term {
            Terminator::Branch { cond, .. } => self.expr(cond),
            Terminator::Suspend { point: SuspendPoint::Yield(e) | SuspendPoint::Await(e), .. } => self.expr(e),
            Terminator::Return { value: Some(value), .. } => self.expr(value),
            _ => {}
        }
    }
}

struct Rewriter<'a> {
    manifest: &'a CaptureManifest,
}

impl Rewriter<'_> {
    fn block(&self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&self, stmt: &mut Stmt) {
        let replacement = match &mut stmt.kind {
            StmtKind::Let { name, init: value } | StmtKind::Assign { target: name, value } => {
                self.expr(value);
                self.manifest.slot_of(name).map(|slot| StmtKind::Store {
                    slot,
                    value: std::mem::replace(value, Expr::unit()),
                })
            }
            StmtKind::Store { value: expr, .. }
            | StmtKind::Expr(expr)
            | StmtKind::Throw(expr)
            | StmtKind::Yield(expr) => {
                self.expr(expr);
                None
            }
            StmtKind::Return(value) => {
                if let Some(expr) = value {
                    self.expr(expr);
                }
                None
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.expr(cond);
                self.block(then_branch);
                self.block(else_branch);
                None
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.block(body);
                None
            }
            StmtKind::Try { body, catch, finally } => {
                self.block(body);
                if let Some(clause) = catch {
                    self.block(&mut clause.body);
                }
                if let Some(fin) = finally {
                    self.block(fin);
                }
                None
            }
            StmtKind::Block(stmts) => {
                self.block(stmts);
                None
            }
            StmtKind::YieldBreak | StmtKind::Break | StmtKind::Continue => None,
        };
        if let Some(kind) = replacement {
            stmt.kind = kind;
        }
    }

    fn expr(&self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Local(name) => {
                if let Some(slot) = self.manifest.slot_of(name) {
                    expr.kind = ExprKind::Captured(slot);
                }
            }
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Await(inner) => self.expr(inner),
            ExprKind::Lambda { body, .. } => self.block(body),
            ExprKind::Unit
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Captured(_)
            | ExprKind::Resume => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StateId;
    use lull_ast::Slot;

    fn state(id: u32, statements: Vec<Stmt>, terminator: Terminator) -> State {
        State {
            id: StateId(id),
            statements,
            terminator,
            handler: None,
        }
    }

    #[test]
    fn write_then_read_elsewhere_is_hoisted() {
        let states = vec![
            state(
                0,
                vec![Stmt::let_binding("a", Expr::int(1)), Stmt::let_binding("b", Expr::int(2))],
                Terminator::Suspend {
                    point: SuspendPoint::Yield(Expr::local("b")),
                    resume: StateId(1),
                },
            ),
            state(1, vec![Stmt::expr(Expr::call("print", vec![Expr::local("a")]))], Terminator::Complete),
        ];
        let manifest = build_manifest(&states, &[], &[]);
        assert_eq!(manifest.slot_of("a"), Some(Slot(0)));
        // b is consumed by the yield in the state that wrote it.
        assert!(!manifest.contains("b"));
        // Host function names are never written.
        assert!(!manifest.contains("print"));
    }

    #[test]
    fn loop_carried_variable_is_hoisted() {
        // i is written and read in state 1 only, but state 0 also writes it.
        let states = vec![
            state(0, vec![Stmt::let_binding("i", Expr::int(0))], Terminator::Goto(StateId(1))),
            state(
                1,
                vec![Stmt::assign("i", Expr::local("i"))],
                Terminator::Goto(StateId(1)),
            ),
        ];
        let manifest = build_manifest(&states, &[], &[]);
        assert!(manifest.contains("i"));
    }

    #[test]
    fn variable_reassigned_in_later_state_is_hoisted() {
        let states = vec![
            state(
                0,
                vec![Stmt::let_binding("x", Expr::int(0))],
                Terminator::Suspend {
                    point: SuspendPoint::Yield(Expr::int(1)),
                    resume: StateId(1),
                },
            ),
            state(1, vec![Stmt::assign("x", Expr::int(5))], Terminator::Complete),
        ];
        let manifest = build_manifest(&states, &[], &[]);
        assert!(manifest.contains("x"));
    }

    #[test]
    fn rewrite_replaces_locals_and_bindings() {
        let mut states = vec![state(
            0,
            vec![
                Stmt::let_binding("a", Expr::int(1)),
                Stmt::let_binding("f", Expr::lambda(vec![], vec![Stmt::assign("a", Expr::int(2))])),
            ],
            Terminator::Return {
                value: Some(Expr::local("a")),
                target: None,
            },
        )];
        let mut manifest = CaptureManifest::default();
        let slot = manifest.insert("a", CaptureOrigin::Local);
        rewrite(&mut states, &mut [], &manifest);

        let rendered: Vec<String> = states[0].statements.iter().map(|s| s.to_string()).collect();
        assert_eq!(rendered, vec!["$0 = 1;", "let f = || { $0 = 2; };"]);
        assert_eq!(
            states[0].terminator,
            Terminator::Return {
                value: Some(Expr::captured(slot)),
                target: None,
            }
        );
    }
}
