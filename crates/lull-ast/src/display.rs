// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Display implementations for AST nodes.
//!
//! Renders a compact single-line surface syntax. Used by chain dumps and
//! error messages, not meant to round-trip through a parser.

use crate::*;
use std::fmt;

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{}", sym)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        };
        write!(f, "{}", sym)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_block(f: &mut fmt::Formatter<'_>, stmts: &[Stmt]) -> fmt::Result {
    write!(f, "{{")?;
    for stmt in stmts {
        write!(f, " {}", stmt)?;
    }
    write!(f, " }}")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Unit => write!(f, "()"),
            ExprKind::Bool(v) => write!(f, "{}", v),
            ExprKind::Int(v) => write!(f, "{}", v),
            ExprKind::Str(s) => write!(f, "{:?}", s),
            ExprKind::Local(name) => write!(f, "{}", name),
            ExprKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ExprKind::Unary { op, operand } => write!(f, "{}{}", op, operand),
            ExprKind::Call { callee, args } => {
                write!(f, "{}(", callee)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Await(inner) => write!(f, "await {}", inner),
            ExprKind::Lambda { params, body } => {
                write!(f, "|{}| ", params.join(", "))?;
                write_block(f, body)
            }
            ExprKind::Captured(slot) => write!(f, "{}", slot),
            ExprKind::Resume => write!(f, "<resume>"),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Let { name, init } => write!(f, "let {} = {};", name, init),
            StmtKind::Assign { target, value } => write!(f, "{} = {};", target, value),
            StmtKind::Expr(expr) => write!(f, "{};", expr),
            StmtKind::If { cond, then_branch, else_branch } => {
                write!(f, "if {} ", cond)?;
                write_block(f, then_branch)?;
                if !else_branch.is_empty() {
                    write!(f, " else ")?;
                    write_block(f, else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                write!(f, "while {} ", cond)?;
                write_block(f, body)
            }
            StmtKind::Try { body, catch, finally } => {
                write!(f, "try ")?;
                write_block(f, body)?;
                if let Some(clause) = catch {
                    match &clause.binding {
                        Some(name) => write!(f, " catch {} ", name)?,
                        None => write!(f, " catch ")?,
                    }
                    write_block(f, &clause.body)?;
                }
                if let Some(fin) = finally {
                    write!(f, " finally ")?;
                    write_block(f, fin)?;
                }
                Ok(())
            }
            StmtKind::Yield(value) => write!(f, "yield {};", value),
            StmtKind::YieldBreak => write!(f, "yield break;"),
            StmtKind::Return(Some(value)) => write!(f, "return {};", value),
            StmtKind::Return(None) => write!(f, "return;"),
            StmtKind::Break => write!(f, "break;"),
            StmtKind::Continue => write!(f, "continue;"),
            StmtKind::Throw(value) => write!(f, "throw {};", value),
            StmtKind::Block(stmts) => write_block(f, stmts),
            StmtKind::Store { slot, value } => write!(f, "{} = {};", slot, value),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}({}) ", self.name, self.params.join(", "))?;
        write_block(f, &self.body)
    }
}
