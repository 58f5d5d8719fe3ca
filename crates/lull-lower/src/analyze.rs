// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Suspension point detection.
//!
//! A suspension point is a `yield` statement or an `await` expression at any
//! control-flow depth. Lambda bodies are skipped: an anonymous function is a
//! method of its own and gets analyzed when it is lowered.

use lull_ast::{Expr, ExprKind, Span, Stmt, StmtKind};

use crate::chain::MethodKind;
use crate::error::LoweringError;

/// What the analyzer found in one body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuspensionReport {
    pub yields: usize,
    /// `yield break` marks an iterator but does not pause.
    pub yield_breaks: usize,
    pub awaits: usize,
}

impl SuspensionReport {
    pub fn has_suspension_points(&self) -> bool {
        self.yields + self.awaits > 0
    }

    /// Runtime wrapper the body needs, or `None` if it needs no lowering.
    pub fn kind(&self, method: &str) -> Result<Option<MethodKind>, LoweringError> {
        let iterator = self.yields + self.yield_breaks > 0;
        match (iterator, self.awaits > 0) {
            (true, true) => Err(LoweringError::MixedSuspension {
                method: method.to_string(),
            }),
            (true, false) if self.yields > 0 => Ok(Some(MethodKind::Iterator)),
            (false, true) => Ok(Some(MethodKind::Async)),
            _ => Ok(None),
        }
    }
}

/// Side-effect free scan for suspension points.
#[derive(Default)]
pub struct SuspensionAnalyzer {
    report: SuspensionReport,
}

impl SuspensionAnalyzer {
    pub fn analyze(body: &[Stmt]) -> SuspensionReport {
        let mut analyzer = Self::default();
        for stmt in body {
            analyzer.visit_stmt(stmt);
        }
        analyzer.report
    }

    fn visit_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { init: expr, .. }
            | StmtKind::Assign { value: expr, .. }
            | StmtKind::Store { value: expr, .. }
            | StmtKind::Expr(expr)
            | StmtKind::Throw(expr) => self.visit_expr(expr),
            StmtKind::Return(value) => {
                if let Some(expr) = value {
                    self.visit_expr(expr);
                }
            }
            StmtKind::Yield(expr) => {
                self.report.yields += 1;
                self.visit_expr(expr);
            }
            StmtKind::YieldBreak => self.report.yield_breaks += 1,
            StmtKind::If { cond, then_branch, else_branch } => {
                self.visit_expr(cond);
                self.visit_block(then_branch);
                self.visit_block(else_branch);
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(cond);
                self.visit_block(body);
            }
            StmtKind::Try { body, catch, finally } => {
                self.visit_block(body);
                if let Some(clause) = catch {
                    self.visit_block(&clause.body);
                }
                if let Some(fin) = finally {
                    self.visit_block(fin);
                }
            }
            StmtKind::Block(stmts) => self.visit_block(stmts),
            StmtKind::Break | StmtKind::Continue => {}
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Await(inner) => {
                self.report.awaits += 1;
                self.visit_expr(inner);
            }
            ExprKind::Binary { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            ExprKind::Unary { operand, .. } => self.visit_expr(operand),
            ExprKind::Call { callee, args } => {
                self.visit_expr(callee);
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            // Analyzed independently.
            ExprKind::Lambda { .. } => {}
            ExprKind::Unit
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Local(_)
            | ExprKind::Captured(_)
            | ExprKind::Resume => {}
        }
    }
}

/// Check if a body contains suspension points.
pub fn has_suspension_points(body: &[Stmt]) -> bool {
    SuspensionAnalyzer::analyze(body).has_suspension_points()
}

pub(crate) fn stmt_has_suspension(stmt: &Stmt) -> bool {
    has_suspension_points(std::slice::from_ref(stmt))
}

/// Innermost construct holding an `await` somewhere inside `expr`.
///
/// `context` names the position `expr` itself occupies.
pub(crate) fn nested_await(expr: &Expr, context: &'static str) -> Option<(&'static str, Span)> {
    match &expr.kind {
        ExprKind::Await(_) => Some((context, expr.span)),
        ExprKind::Binary { left, right, .. } => nested_await(left, "binary operand")
            .or_else(|| nested_await(right, "binary operand")),
        ExprKind::Unary { operand, .. } => nested_await(operand, "unary operand"),
        ExprKind::Call { callee, args } => nested_await(callee, "callee")
            .or_else(|| args.iter().find_map(|a| nested_await(a, "call argument"))),
        _ => None,
    }
}

/// First `return`/`yield break`, or `break`/`continue` targeting a loop
/// outside `stmt`.
pub(crate) fn escaping_jump(stmt: &Stmt, loop_depth: usize) -> Option<(&'static str, Span)> {
    let in_block = |stmts: &[Stmt], depth: usize| stmts.iter().find_map(|s| escaping_jump(s, depth));
    match &stmt.kind {
        StmtKind::Break if loop_depth == 0 => Some(("break", stmt.span)),
        StmtKind::Continue if loop_depth == 0 => Some(("continue", stmt.span)),
        StmtKind::Return(_) => Some(("return", stmt.span)),
        StmtKind::YieldBreak => Some(("yield break", stmt.span)),
        StmtKind::If { then_branch, else_branch, .. } => {
            in_block(then_branch, loop_depth).or_else(|| in_block(else_branch, loop_depth))
        }
        StmtKind::While { body, .. } => in_block(body, loop_depth + 1),
        StmtKind::Try { body, catch, finally } => in_block(body, loop_depth)
            .or_else(|| catch.as_ref().and_then(|c| in_block(&c.body, loop_depth)))
            .or_else(|| finally.as_ref().and_then(|f| in_block(f, loop_depth))),
        StmtKind::Block(stmts) => in_block(stmts, loop_depth),
        _ => None,
    }
}

/// Stays an ordinary statement of the open state.
pub(crate) fn is_flat(stmt: &Stmt) -> bool {
    !stmt_has_suspension(stmt) && escaping_jump(stmt, 0).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str) -> Stmt {
        Stmt::expr(Expr::call(name, vec![]))
    }

    #[test]
    fn plain_body_has_no_suspension_points() {
        let body = vec![call("a"), Stmt::let_binding("x", Expr::int(1))];
        assert!(!has_suspension_points(&body));
        assert_eq!(SuspensionAnalyzer::analyze(&body).kind("m"), Ok(None));
    }

    #[test]
    fn finds_yield_inside_loop_and_try() {
        let body = vec![Stmt::while_loop(
            Expr::bool(true),
            vec![Stmt::try_finally(
                vec![Stmt::yield_value(Expr::int(1))],
                vec![call("cleanup")],
            )],
        )];
        let report = SuspensionAnalyzer::analyze(&body);
        assert_eq!(report.yields, 1);
        assert_eq!(report.kind("m"), Ok(Some(MethodKind::Iterator)));
    }

    #[test]
    fn finds_await_nested_in_expression() {
        let body = vec![Stmt::if_else(
            Expr::bool(true),
            vec![Stmt::expr(Expr::call(
                "log",
                vec![Expr::await_on(Expr::call("fetch", vec![]))],
            ))],
            vec![],
        )];
        let report = SuspensionAnalyzer::analyze(&body);
        assert_eq!(report.awaits, 1);
        assert_eq!(report.kind("m"), Ok(Some(MethodKind::Async)));
    }

    #[test]
    fn lambda_bodies_are_skipped() {
        let body = vec![Stmt::let_binding(
            "f",
            Expr::lambda(vec![], vec![Stmt::yield_value(Expr::int(1))]),
        )];
        assert!(!has_suspension_points(&body));
    }

    #[test]
    fn mixed_yield_and_await_rejected() {
        let body = vec![
            Stmt::yield_value(Expr::int(1)),
            Stmt::expr(Expr::await_on(Expr::call("f", vec![]))),
        ];
        let err = SuspensionAnalyzer::analyze(&body).kind("both").unwrap_err();
        assert!(matches!(err, LoweringError::MixedSuspension { ref method } if method == "both"));
    }

    #[test]
    fn yield_break_alone_is_not_a_suspension() {
        let body = vec![Stmt::yield_break()];
        let report = SuspensionAnalyzer::analyze(&body);
        assert!(!report.has_suspension_points());
        assert_eq!(report.kind("m"), Ok(None));
    }

    #[test]
    fn break_inside_own_loop_does_not_escape() {
        let inner = Stmt::while_loop(Expr::bool(true), vec![Stmt::brk()]);
        assert!(escaping_jump(&inner, 0).is_none());
        assert!(is_flat(&inner));

        let outer = Stmt::if_else(Expr::bool(true), vec![Stmt::brk()], vec![]);
        assert_eq!(escaping_jump(&outer, 0).map(|(k, _)| k), Some("break"));
        assert!(!is_flat(&outer));
    }

    #[test]
    fn nested_await_names_innermost_construct() {
        let expr = Expr::binary(
            lull_ast::BinOp::Add,
            Expr::int(1),
            Expr::call("f", vec![Expr::await_on(Expr::local("x"))]),
        );
        assert_eq!(nested_await(&expr, "expression").map(|(c, _)| c), Some("call argument"));
        assert!(nested_await(&Expr::int(3), "expression").is_none());
    }
}
