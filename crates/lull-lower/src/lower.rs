// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! State machine transform for suspension-bearing methods.
//!
//! Splits a method body into a chain of states. A suspension point (`yield`
//! or `await`) is always the last operation of its state; the state after it
//! starts by receiving the resumption value.
//!
//! Without suspension points the method is left untouched. With them, the
//! body is walked with an open state that collects ordinary statements.
//! Compound statements that neither suspend nor jump out of themselves stay
//! ordinary statements. The rest are broken up:
//!
//! ```text
//! if c { A } else { B }      s0: .. branch c ? s1 : s2
//!                            s1: A goto s3     s2: B goto s3     s3: (merge)
//!
//! while c { A }              s0: branch c ? s1 : s2
//!                            s1: A goto s0     s2: (exit)
//!
//! try { A } finally { F }    every exit of A's states is routed through
//!                            `enter finally F then <target>`
//! ```
//!
//! After lowering, unreachable states are pruned, then variables whose value
//! crosses a state boundary are hoisted into slots.

use std::collections::HashMap;
use std::ops::Range;

use lull_ast::{Expr, Method, Span, Stmt, StmtKind};

use crate::analyze::{escaping_jump, is_flat, nested_await, stmt_has_suspension, SuspensionAnalyzer};
use crate::builder::ChainBuilder;
use crate::chain::{CatchTarget, Handler, MethodKind, State, StateChain, StateId, SuspendPoint, Terminator};
use crate::config::LowerConfig;
use crate::error::LoweringError;
use crate::{capture, compact, resolve};

// ── Public API ──────────────────────────────────────────────────────

/// Lower a method into a state chain.
///
/// Returns `None` if the method has no suspension points; such a method
/// needs no driver and is passed through unchanged.
pub fn transform(method: &Method, config: &LowerConfig) -> Result<Option<StateChain>, LoweringError> {
    let report = SuspensionAnalyzer::analyze(&method.body);
    if !report.has_suspension_points() {
        tracing::trace!(method = %method.name, "no suspension points, left unchanged");
        return Ok(None);
    }
    let Some(kind) = report.kind(&method.name)? else {
        return Ok(None);
    };

    let method = resolve::rename_bindings(method);
    let mut lowered = Lowerer::new(kind).lower(&method.body)?;
    compact::collapse_returns(&mut lowered.states);
    let (mut states, mut handlers) = compact::prune(lowered.states, lowered.handlers);

    if states.len() > config.max_states {
        return Err(LoweringError::TooManyStates {
            method: method.name.clone(),
            count: states.len(),
            limit: config.max_states,
        });
    }

    let captures = capture::build_manifest(&states, &method.params, &lowered.catch_bindings);
    capture::rewrite(&mut states, &mut handlers, &captures);
    let params = method
        .params
        .iter()
        .filter_map(|p| captures.slot_of(p))
        .collect();

    tracing::debug!(
        method = %method.name,
        ?kind,
        states = states.len(),
        suspensions = report.yields + report.awaits,
        captures = captures.len(),
        "lowered method to state chain"
    );

    Ok(Some(StateChain {
        name: method.name.clone(),
        kind,
        states,
        handlers,
        captures,
        params,
    }))
}

// ── Lowering ────────────────────────────────────────────────────────

pub(crate) struct Lowered {
    pub states: Vec<State>,
    pub handlers: Vec<Handler>,
    /// Catch bindings of split try statements; the driver writes them.
    pub catch_bindings: Vec<String>,
}

struct LoopTargets {
    break_to: StateId,
    continue_to: StateId,
}

struct Lowerer {
    builder: ChainBuilder,
    kind: MethodKind,
    loops: Vec<LoopTargets>,
    /// Shared target of every `return`. Reserved up front so that its id
    /// precedes every try region.
    return_state: StateId,
    catch_bindings: Vec<String>,
}

impl Lowerer {
    fn new(kind: MethodKind) -> Self {
        let mut builder = ChainBuilder::new();
        let return_state = builder.create_state_in(None);
        builder.state_mut(return_state).terminator = Terminator::Complete;
        Self {
            builder,
            kind,
            loops: Vec::new(),
            return_state,
            catch_bindings: Vec::new(),
        }
    }

    fn lower(mut self, body: &[Stmt]) -> Result<Lowered, LoweringError> {
        self.lower_block(body)?;
        if self.builder.current_unterminated() {
            self.builder.terminate(Terminator::Complete);
        }
        let (states, handlers) = self.builder.finish();
        Ok(Lowered {
            states,
            handlers,
            catch_bindings: self.catch_bindings,
        })
    }

    fn lower_block(&mut self, stmts: &[Stmt]) -> Result<(), LoweringError> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), LoweringError> {
        if is_flat(stmt) {
            self.builder.push_stmt(stmt.clone());
            return Ok(());
        }

        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Let { name, init } => {
                let init = self.receive(init, "let initializer")?;
                self.push(stmt, StmtKind::Let { name: name.clone(), init });
            }
            StmtKind::Assign { target, value } => {
                let value = self.receive(value, "assigned value")?;
                self.push(stmt, StmtKind::Assign { target: target.clone(), value });
            }
            StmtKind::Store { slot, value } => {
                let value = self.receive(value, "assigned value")?;
                self.push(stmt, StmtKind::Store { slot: *slot, value });
            }
            StmtKind::Expr(expr) => {
                let expr = self.receive(expr, "expression")?;
                self.push(stmt, StmtKind::Expr(expr));
            }
            StmtKind::Throw(expr) => {
                let expr = self.receive(expr, "throw operand")?;
                self.push(stmt, StmtKind::Throw(expr));
            }
            StmtKind::Yield(value) => {
                reject_nested(value, "yield operand")?;
                self.suspend(SuspendPoint::Yield(value.clone()));
            }
            StmtKind::YieldBreak => self.emit_return(None),
            StmtKind::Return(value) => {
                if self.kind == MethodKind::Iterator && value.is_some() {
                    return Err(LoweringError::ReturnValueInIterator { span });
                }
                let value = match value {
                    Some(expr) => Some(self.receive(expr, "return value")?),
                    None => None,
                };
                self.emit_return(value);
            }
            StmtKind::Break => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.break_to)
                    .ok_or(LoweringError::JumpOutsideLoop { keyword: "break", span })?;
                self.jump(target);
            }
            StmtKind::Continue => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.continue_to)
                    .ok_or(LoweringError::JumpOutsideLoop { keyword: "continue", span })?;
                self.jump(target);
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.lower_if(cond, then_branch, else_branch)?;
            }
            StmtKind::While { cond, body } => self.lower_while(cond, body)?,
            StmtKind::Try { body, catch, finally } => {
                self.lower_try(body, catch.as_ref(), finally.as_deref(), span)?;
            }
            StmtKind::Block(stmts) => self.lower_block(stmts)?,
        }
        Ok(())
    }

    /// Push a rewritten form of `original`.
    fn push(&mut self, original: &Stmt, kind: StmtKind) {
        self.builder.push_stmt(Stmt {
            id: original.id,
            kind,
            span: original.span,
        });
    }

    /// Close the open state with `point` and open its resume state.
    fn suspend(&mut self, point: SuspendPoint) -> StateId {
        let resume = self.builder.create_state();
        self.builder.terminate(Terminator::Suspend { point, resume });
        self.builder.switch_to(resume);
        resume
    }

    /// Split off a top-level `await` in `expr`, returning what the rest of
    /// the statement should evaluate instead.
    fn receive(&mut self, expr: &Expr, context: &'static str) -> Result<Expr, LoweringError> {
        match expr.as_await() {
            Some(operand) => {
                reject_nested(operand, "await operand")?;
                self.suspend(SuspendPoint::Await(operand.clone()));
                Ok(Expr::resume().with_span(expr.span))
            }
            None => {
                reject_nested(expr, context)?;
                Ok(expr.clone())
            }
        }
    }

    /// Open a fresh state after an unconditional jump. Anything lowered into
    /// it is dead and gets pruned.
    fn start_dead_state(&mut self) {
        let dead = self.builder.create_state();
        self.builder.switch_to(dead);
    }

    fn jump(&mut self, target: StateId) {
        self.builder.terminate(Terminator::Goto(target));
        self.start_dead_state();
    }

    fn emit_return(&mut self, value: Option<Expr>) {
        self.builder.terminate(Terminator::Return {
            value,
            target: Some(self.return_state),
        });
        self.start_dead_state();
    }

    fn fall_through(&mut self, target: StateId) {
        if self.builder.current_unterminated() {
            self.builder.terminate(Terminator::Goto(target));
        }
    }

    fn lower_if(&mut self, cond: &Expr, then_branch: &[Stmt], else_branch: &[Stmt]) -> Result<(), LoweringError> {
        let cond = self.receive(cond, "if condition")?;
        let then_state = self.builder.create_state();
        let else_state = if else_branch.is_empty() {
            None
        } else {
            Some(self.builder.create_state())
        };
        let merge = self.builder.create_state();

        self.builder.terminate(Terminator::Branch {
            cond,
            then_to: then_state,
            else_to: else_state.unwrap_or(merge),
        });

        self.builder.switch_to(then_state);
        self.lower_block(then_branch)?;
        self.fall_through(merge);

        if let Some(else_state) = else_state {
            self.builder.switch_to(else_state);
            self.lower_block(else_branch)?;
            self.fall_through(merge);
        }

        self.builder.switch_to(merge);
        Ok(())
    }

    fn lower_while(&mut self, cond: &Expr, body: &[Stmt]) -> Result<(), LoweringError> {
        // The condition test needs a state of its own as back-edge target.
        let head = if self.builder.current_is_empty() {
            self.builder.current()
        } else {
            let head = self.builder.create_state();
            self.builder.terminate(Terminator::Goto(head));
            self.builder.switch_to(head);
            head
        };

        let cond = self.receive(cond, "loop condition")?;
        let body_state = self.builder.create_state();
        let exit = self.builder.create_state();
        self.builder.terminate(Terminator::Branch {
            cond,
            then_to: body_state,
            else_to: exit,
        });

        self.loops.push(LoopTargets {
            break_to: exit,
            continue_to: head,
        });
        self.builder.switch_to(body_state);
        self.lower_block(body)?;
        self.fall_through(head);
        self.loops.pop();

        self.builder.switch_to(exit);
        Ok(())
    }

    fn lower_try(
        &mut self,
        body: &[Stmt],
        catch: Option<&lull_ast::CatchClause>,
        finally: Option<&[Stmt]>,
        span: Span,
    ) -> Result<(), LoweringError> {
        if catch.is_none() && finally.is_none() {
            return self.lower_block(body);
        }
        if let Some(fin) = finally {
            if let Some(stmt) = fin.iter().find(|s| stmt_has_suspension(s)) {
                return Err(LoweringError::SuspensionInFinally { span: stmt.span });
            }
            if let Some((keyword, span)) = fin.iter().find_map(|s| escaping_jump(s, 0)) {
                return Err(LoweringError::JumpOutOfFinally { keyword, span });
            }
        }

        let outer = self.builder.handler();
        let after = self.builder.create_state();
        let finally_state = finally.map(|_| self.builder.create_state());
        let handler = self.builder.add_handler(finally_state, outer);

        // Everything created from here until the finally body is the
        // protected region.
        let region_start = self.builder.next_id();
        let body_entry = self.builder.create_state_in(Some(handler));
        self.builder.terminate(Terminator::Goto(body_entry));
        self.builder.switch_to(body_entry);
        self.builder.set_handler(Some(handler));
        self.lower_block(body)?;
        self.fall_through(after);

        if let Some(clause) = catch {
            // Faults in the catch body skip the catch but still run finally.
            let catch_handler = match finally_state {
                Some(_) => Some(self.builder.add_handler(finally_state, outer)),
                None => outer,
            };
            let entry = self.builder.create_state_in(catch_handler);
            self.builder.handler_mut(handler).catch = Some(CatchTarget {
                entry,
                binding: clause.binding.clone(),
                slot: None,
            });
            if let Some(name) = &clause.binding {
                self.catch_bindings.push(name.clone());
            }
            self.builder.set_handler(catch_handler);
            self.builder.switch_to(entry);
            self.lower_block(&clause.body)?;
            self.fall_through(after);
        }

        let region = region_start..self.builder.next_id();
        self.builder.set_handler(outer);

        if let (Some(state), Some(fin)) = (finally_state, finally) {
            self.builder.switch_to(state);
            for stmt in fin {
                self.builder.push_stmt(stmt.clone());
            }
            self.builder.terminate(Terminator::EndFinally);
            self.route_exits(region, state);
        }

        tracing::trace!(?span, handler = handler.0, "lowered try statement");
        self.builder.switch_to(after);
        Ok(())
    }

    /// Redirect every successor leaving `region` through a synthetic
    /// `enter finally, then continue to <target>` state. One route state is
    /// created per distinct target.
    fn route_exits(&mut self, region: Range<u32>, finally: StateId) {
        let outer = self.builder.handler();
        let mut routes: HashMap<StateId, StateId> = HashMap::new();

        for raw in region.clone() {
            let id = StateId(raw);
            let mut exits = Vec::new();
            self.builder.state_mut(id).terminator.for_each_exit_mut(|target| {
                if !region.contains(&target.0) {
                    exits.push(*target);
                }
            });

            for target in exits {
                if routes.contains_key(&target) {
                    continue;
                }
                let route = self.builder.create_state_in(outer);
                self.builder.state_mut(route).terminator = Terminator::EnterFinally {
                    finally,
                    then: target,
                };
                routes.insert(target, route);
            }

            self.builder.state_mut(id).terminator.for_each_exit_mut(|target| {
                if !region.contains(&target.0) {
                    if let Some(route) = routes.get(target) {
                        *target = *route;
                    }
                }
            });
        }
    }
}

fn reject_nested(expr: &Expr, context: &'static str) -> Result<(), LoweringError> {
    match nested_await(expr, context) {
        Some((construct, span)) => Err(LoweringError::UnsupportedSuspension { construct, span }),
        None => Ok(()),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CaptureOrigin;
    use lull_ast::{BinOp, ExprKind, Slot};

    fn lower(body: Vec<Stmt>) -> StateChain {
        lower_with(&[], body)
    }

    fn lower_with(params: &[&str], body: Vec<Stmt>) -> StateChain {
        let method = Method::new("test_method", params, body);
        transform(&method, &LowerConfig::default())
            .expect("should lower")
            .expect("should have suspension points")
    }

    fn lower_err(body: Vec<Stmt>) -> LoweringError {
        let method = Method::new("test_method", &[], body);
        transform(&method, &LowerConfig::default()).unwrap_err()
    }

    fn call(name: &str) -> Stmt {
        Stmt::expr(Expr::call(name, vec![]))
    }

    fn fetch() -> Expr {
        Expr::await_on(Expr::call("fetch", vec![]))
    }

    #[test]
    fn no_suspension_points_returns_none() {
        let method = Method::new("plain", &[], vec![call("work")]);
        assert!(transform(&method, &LowerConfig::default()).unwrap().is_none());
    }

    #[test]
    fn single_yield_produces_two_states() {
        let chain = lower(vec![
            call("before"),
            Stmt::yield_value(Expr::int(1)),
            call("after"),
        ]);

        assert_eq!(chain.kind, MethodKind::Iterator);
        assert_eq!(chain.len(), 2);
        let first = chain.state(StateChain::ENTRY);
        assert_eq!(first.statements.len(), 1);
        assert_eq!(
            first.terminator,
            Terminator::Suspend {
                point: SuspendPoint::Yield(Expr::int(1)),
                resume: StateId(1),
            }
        );
        let second = chain.state(StateId(1));
        assert_eq!(second.statements[0].to_string(), "after();");
        assert_eq!(second.terminator, Terminator::Complete);
    }

    #[test]
    fn each_suspension_ends_exactly_one_state() {
        let chain = lower(vec![
            Stmt::yield_value(Expr::int(1)),
            Stmt::yield_value(Expr::int(2)),
            Stmt::yield_value(Expr::int(3)),
        ]);
        assert_eq!(chain.suspension_count(), 3);
        assert_eq!(chain.len(), 4);
        for (i, state) in chain.states.iter().enumerate() {
            assert_eq!(state.id, StateId(i as u32), "ids are dense and ordered");
        }
    }

    #[test]
    fn await_resume_state_receives_value() {
        let chain = lower(vec![
            Stmt::let_binding("x", fetch()),
            Stmt::expr(Expr::call("print", vec![Expr::local("x")])),
        ]);

        assert_eq!(chain.kind, MethodKind::Async);
        assert_eq!(chain.len(), 2);
        assert!(matches!(
            chain.state(StateId(0)).terminator,
            Terminator::Suspend { point: SuspendPoint::Await(_), .. }
        ));
        let resumed = chain.state(StateId(1));
        assert_eq!(resumed.statements[0].to_string(), "let x = <resume>;");
        // x is written and read in the same state.
        assert!(!chain.captures.contains("x"));
    }

    #[test]
    fn awaited_value_returned_in_two_states() {
        let chain = lower(vec![
            Stmt::let_binding("x", fetch()),
            Stmt::ret(Some(Expr::local("x"))),
        ]);
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain.state(StateId(1)).terminator,
            Terminator::Return {
                value: Some(Expr::local("x")),
                target: None,
            }
        );
        assert!(chain.captures.is_empty());
    }

    #[test]
    fn bare_await_statement_rethrows_on_resume() {
        let chain = lower(vec![Stmt::expr(fetch())]);
        assert_eq!(chain.state(StateId(1)).statements[0].to_string(), "<resume>;");
    }

    #[test]
    fn variable_read_after_suspension_is_captured() {
        let chain = lower(vec![
            Stmt::let_binding("x", Expr::int(1)),
            Stmt::let_binding("y", Expr::int(2)),
            Stmt::expr(Expr::call("print", vec![Expr::local("y")])),
            Stmt::yield_value(Expr::int(0)),
            Stmt::expr(Expr::call("print", vec![Expr::local("x")])),
        ]);

        let x = chain.captures.slot_of("x").expect("x should be captured");
        assert!(!chain.captures.contains("y"), "y never crosses a suspension");
        assert_eq!(chain.captures.get(x).map(|v| v.origin), Some(CaptureOrigin::Local));

        // Both the write and the read now go through storage.
        assert_eq!(chain.state(StateId(0)).statements[0], Stmt::store(x, Expr::int(1)));
        assert_eq!(chain.state(StateId(1)).statements[0].to_string(), format!("print({});", x));
    }

    #[test]
    fn parameters_always_hoisted() {
        let chain = lower_with(&["n"], vec![Stmt::yield_value(Expr::local("n"))]);
        assert_eq!(chain.params, vec![Slot(0)]);
        assert_eq!(
            chain.captures.get(Slot(0)).map(|v| v.origin),
            Some(CaptureOrigin::Parameter)
        );
    }

    #[test]
    fn flat_compound_statements_stay_in_open_state() {
        let chain = lower(vec![
            Stmt::if_else(Expr::bool(true), vec![call("a")], vec![call("b")]),
            Stmt::while_loop(Expr::bool(false), vec![call("c"), Stmt::brk()]),
            Stmt::yield_value(Expr::int(1)),
        ]);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.state(StateId(0)).statements.len(), 2);
    }

    #[test]
    fn if_with_suspension_gets_branch_and_merge() {
        let chain = lower(vec![
            Stmt::if_else(
                Expr::local("c"),
                vec![Stmt::yield_value(Expr::int(1))],
                vec![Stmt::yield_value(Expr::int(2))],
            ),
            call("done"),
        ]);

        let Terminator::Branch { then_to, else_to, .. } = chain.state(StateId(0)).terminator.clone() else {
            panic!("entry should branch, got {:?}", chain.state(StateId(0)).terminator);
        };
        assert_ne!(then_to, else_to);

        // Both arms resume into states that converge on one merge state.
        let resume_of = |id: StateId| match &chain.state(id).terminator {
            Terminator::Suspend { resume, .. } => *resume,
            other => panic!("expected suspension, got {:?}", other),
        };
        let merge_a = chain.state(resume_of(then_to)).terminator.clone();
        let merge_b = chain.state(resume_of(else_to)).terminator.clone();
        assert_eq!(merge_a, merge_b);
        let Terminator::Goto(merge) = merge_a else { panic!("arms should fall through") };
        assert_eq!(chain.state(merge).statements[0].to_string(), "done();");
    }

    #[test]
    fn loop_body_has_back_edge_to_condition_state() {
        let chain = lower(vec![
            Stmt::let_binding("i", Expr::int(0)),
            Stmt::while_loop(
                Expr::binary(BinOp::Lt, Expr::local("i"), Expr::int(3)),
                vec![
                    Stmt::yield_value(Expr::local("i")),
                    Stmt::assign("i", Expr::binary(BinOp::Add, Expr::local("i"), Expr::int(1))),
                ],
            ),
        ]);

        let head = match &chain.state(StateId(0)).terminator {
            Terminator::Goto(head) => *head,
            other => panic!("entry should jump to the loop head, got {:?}", other),
        };
        let Terminator::Branch { then_to: body, else_to: exit, .. } = chain.state(head).terminator.clone() else {
            panic!("loop head should branch");
        };
        let Terminator::Suspend { resume, .. } = chain.state(body).terminator.clone() else {
            panic!("loop body should suspend");
        };
        assert_eq!(chain.state(resume).terminator, Terminator::Goto(head), "back-edge");
        assert_eq!(chain.state(exit).terminator, Terminator::Complete);
        assert!(chain.captures.contains("i"));
    }

    #[test]
    fn awaited_loop_condition_is_received_in_head() {
        let chain = lower(vec![Stmt::while_loop(fetch(), vec![call("work")])]);
        let Terminator::Suspend { point: SuspendPoint::Await(_), resume } = chain.state(StateId(0)).terminator.clone() else {
            panic!("condition should be awaited first");
        };
        let Terminator::Branch { cond, then_to, .. } = chain.state(resume).terminator.clone() else {
            panic!("resumed state should test the condition");
        };
        assert_eq!(cond.kind, ExprKind::Resume);
        assert_eq!(chain.state(then_to).terminator, Terminator::Goto(StateId(0)));
    }

    #[test]
    fn break_and_continue_target_loop_states() {
        let chain = lower(vec![Stmt::while_loop(
            Expr::bool(true),
            vec![
                Stmt::yield_value(Expr::int(1)),
                Stmt::if_else(Expr::local("stop"), vec![Stmt::brk()], vec![Stmt::cont()]),
            ],
        )]);
        let gotos: Vec<StateId> = chain
            .states
            .iter()
            .filter_map(|s| match s.terminator {
                Terminator::Goto(t) => Some(t),
                _ => None,
            })
            .collect();
        // break -> exit, continue -> head (state 0)
        assert!(gotos.contains(&StateId(0)));
        assert!(chain
            .states
            .iter()
            .any(|s| s.terminator == Terminator::Complete && gotos.contains(&s.id)));
    }

    #[test]
    fn try_finally_routes_every_exit_through_finally() {
        let chain = lower(vec![Stmt::try_finally(
            vec![Stmt::yield_value(Expr::local("a"))],
            vec![Stmt::expr(Expr::call("record", vec![Expr::local("x")]))],
        )]);

        assert_eq!(chain.handlers.len(), 1);
        let finally = chain.handlers[0].finally.expect("handler should have finally");
        assert_eq!(chain.state(finally).terminator, Terminator::EndFinally);
        assert_eq!(chain.state(finally).statements[0].to_string(), "record(x);");

        // The only way out of the protected states is an EnterFinally route.
        let routes: Vec<&State> = chain
            .states
            .iter()
            .filter(|s| matches!(s.terminator, Terminator::EnterFinally { .. }))
            .collect();
        assert_eq!(routes.len(), 1);
        let Terminator::EnterFinally { finally: f, then } = routes[0].terminator.clone() else { unreachable!() };
        assert_eq!(f, finally);
        assert_eq!(chain.state(then).terminator, Terminator::Complete);

        // The suspended state is covered by the handler.
        let suspended = chain
            .states
            .iter()
            .find(|s| s.terminator.is_suspension())
            .expect("one suspension");
        assert_eq!(chain.enclosing_finally(suspended.id), vec![finally]);
    }

    #[test]
    fn return_inside_nested_try_passes_both_finally_blocks() {
        let chain = lower(vec![Stmt::try_finally(
            vec![Stmt::try_finally(
                vec![Stmt::yield_value(Expr::int(1)), Stmt::yield_break()],
                vec![call("inner")],
            )],
            vec![call("outer")],
        )]);

        // Follow the yield-break path: inner route -> outer route -> complete.
        let inner_route = chain
            .states
            .iter()
            .find_map(|s| match &s.terminator {
                Terminator::Return { target, .. } => *target,
                _ => None,
            })
            .expect("yield break lowers to a return");
        let Terminator::EnterFinally { finally: inner_fin, then } = chain.state(inner_route).terminator.clone() else {
            panic!("return should be routed through the inner finally");
        };
        assert_eq!(chain.state(inner_fin).statements[0].to_string(), "inner();");
        let Terminator::EnterFinally { finally: outer_fin, then: last } = chain.state(then).terminator.clone() else {
            panic!("inner finally should continue into the outer finally");
        };
        assert_eq!(chain.state(outer_fin).statements[0].to_string(), "outer();");
        assert_eq!(chain.state(last).terminator, Terminator::Complete);
    }

    #[test]
    fn catch_binding_is_hoisted_and_recorded() {
        let chain = lower(vec![Stmt::try_catch(
            vec![Stmt::expr(fetch())],
            Some("e"),
            vec![Stmt::expr(Expr::call("log", vec![Expr::local("e")]))],
            None,
        )]);
        let slot = chain.captures.slot_of("e").expect("catch binding hoisted");
        let catch = chain.handlers[0].catch.as_ref().expect("catch target");
        assert_eq!(catch.slot, Some(slot));
        assert_eq!(chain.state(catch.entry).statements[0].to_string(), format!("log({});", slot));
    }

    #[test]
    fn shadowed_locals_get_separate_slots() {
        let chain = lower(vec![
            Stmt::let_binding("x", Expr::int(1)),
            Stmt::yield_value(Expr::int(0)),
            Stmt::block(vec![
                Stmt::let_binding("x", Expr::int(2)),
                Stmt::yield_value(Expr::int(0)),
                Stmt::expr(Expr::call("print", vec![Expr::local("x")])),
            ]),
            Stmt::expr(Expr::call("print", vec![Expr::local("x")])),
        ]);
        assert!(chain.captures.contains("x"));
        assert!(chain.captures.contains("x#1"));
        assert_ne!(chain.captures.slot_of("x"), chain.captures.slot_of("x#1"));
    }

    #[test]
    fn await_in_call_argument_rejected() {
        let err = lower_err(vec![Stmt::expr(Expr::call("print", vec![fetch()]))]);
        assert!(matches!(
            err,
            LoweringError::UnsupportedSuspension { construct: "call argument", .. }
        ));
    }

    #[test]
    fn nested_await_rejected() {
        let err = lower_err(vec![Stmt::expr(Expr::await_on(fetch()))]);
        assert!(matches!(
            err,
            LoweringError::UnsupportedSuspension { construct: "await operand", .. }
        ));
    }

    #[test]
    fn suspension_in_finally_rejected() {
        let err = lower_err(vec![Stmt::try_finally(
            vec![Stmt::yield_value(Expr::int(1))],
            vec![Stmt::yield_value(Expr::int(2))],
        )]);
        assert!(matches!(err, LoweringError::SuspensionInFinally { .. }));
    }

    #[test]
    fn return_out_of_finally_rejected() {
        let err = lower_err(vec![Stmt::try_finally(
            vec![Stmt::yield_value(Expr::int(1))],
            vec![Stmt::yield_break()],
        )]);
        assert!(matches!(err, LoweringError::JumpOutOfFinally { keyword: "yield break", .. }));
    }

    #[test]
    fn break_outside_loop_rejected() {
        let err = lower_err(vec![Stmt::yield_value(Expr::int(1)), Stmt::brk()]);
        assert!(matches!(err, LoweringError::JumpOutsideLoop { keyword: "break", .. }));
    }

    #[test]
    fn iterator_return_value_rejected() {
        let err = lower_err(vec![Stmt::yield_value(Expr::int(1)), Stmt::ret(Some(Expr::int(2)))]);
        assert!(matches!(err, LoweringError::ReturnValueInIterator { .. }));
    }

    #[test]
    fn too_many_states_rejected() {
        let method = Method::new(
            "big",
            &[],
            (0..10).map(|i| Stmt::yield_value(Expr::int(i))).collect(),
        );
        let err = transform(&method, &LowerConfig { max_states: 4 }).unwrap_err();
        assert_eq!(
            err,
            LoweringError::TooManyStates {
                method: "big".to_string(),
                count: 11,
                limit: 4,
            }
        );
    }

    #[test]
    fn dead_code_after_return_is_pruned() {
        let chain = lower(vec![
            Stmt::let_binding("x", fetch()),
            Stmt::ret(Some(Expr::local("x"))),
            call("never"),
        ]);
        assert!(chain
            .states
            .iter()
            .all(|s| s.statements.iter().all(|st| st.to_string() != "never();")));
    }
}
