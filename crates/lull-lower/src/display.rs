// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Human-readable state chain dumps.

use std::fmt;

use crate::chain::{CaptureOrigin, HandlerId, StateChain, StateId, SuspendPoint, Terminator};

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

impl fmt::Display for SuspendPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspendPoint::Yield(value) => write!(f, "yield {}", value),
            SuspendPoint::Await(future) => write!(f, "await {}", future),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Goto(target) => write!(f, "goto {}", target),
            Terminator::Branch { cond, then_to, else_to } => {
                write!(f, "branch {} ? {} : {}", cond, then_to, else_to)
            }
            Terminator::Suspend { point, resume } => write!(f, "{} -> {}", point, resume),
            Terminator::Return { value, target } => {
                f.write_str("return")?;
                if let Some(value) = value {
                    write!(f, " {}", value)?;
                }
                match target {
                    Some(target) => write!(f, " -> {}", target),
                    None => Ok(()),
                }
            }
            Terminator::EnterFinally { finally, then } => {
                write!(f, "enter finally {} then {}", finally, then)
            }
            Terminator::EndFinally => write!(f, "end finally"),
            Terminator::Complete => write!(f, "complete"),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl fmt::Display for CaptureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureOrigin::Parameter => "param",
            CaptureOrigin::CatchBinding => "catch",
            CaptureOrigin::Local => "local",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for StateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "chain {} ({:?}, {} states)", self.name, self.kind, self.states.len())?;
        for var in self.captures.iter() {
            writeln!(f, "  {} = {} ({})", var.slot, var.name, var.origin)?;
        }
        for handler in &self.handlers {
            write!(f, "  {}:", handler.id)?;
            if let Some(catch) = &handler.catch {
                write!(f, " catch -> {}", catch.entry)?;
            }
            if let Some(fin) = handler.finally {
                write!(f, " finally {}", fin)?;
            }
            if let Some(parent) = handler.parent {
                write!(f, " in {}", parent)?;
            }
            writeln!(f)?;
        }
        for state in &self.states {
            match state.handler {
                Some(h) => writeln!(f, "  {} [{}]:", state.id, h)?,
                None => writeln!(f, "  {}:", state.id)?,
            }
            for stmt in &state.statements {
                writeln!(f, "    {}", stmt)?;
            }
            writeln!(f, "    {}", state.terminator)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{transform, LowerConfig};
    use lull_ast::{Expr, Method, Stmt};

    #[test]
    fn dumps_small_iterator() {
        let method = Method::new(
            "count",
            &["n"],
            vec![
                Stmt::yield_value(Expr::local("n")),
                Stmt::expr(Expr::call("done", vec![])),
            ],
        );
        let chain = transform(&method, &LowerConfig::default()).unwrap().unwrap();
        let expected = "\
chain count (Iterator, 2 states)
  $0 = n (param)
  s0:
    yield $0 -> s1
  s1:
    done();
    complete
";
        assert_eq!(chain.to_string(), expected);
    }

    #[test]
    fn terminator_forms() {
        let t = Terminator::EnterFinally {
            finally: StateId(4),
            then: StateId(2),
        };
        assert_eq!(t.to_string(), "enter finally s4 then s2");
        let r = Terminator::Return {
            value: None,
            target: Some(StateId(1)),
        };
        assert_eq!(r.to_string(), "return -> s1");
        let done = Terminator::Return {
            value: Some(Expr::int(3)),
            target: None,
        };
        assert_eq!(done.to_string(), "return 3");
    }
}
