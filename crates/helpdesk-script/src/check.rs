//! Static checks run on a parsed script before it is accepted or executed.

use crate::ast::{Expr, Stmt, StmtKind};
use crate::error::{Result, ScriptError};

/// Names a script may never reference, even if a scope happened to bind them.
const BLOCKED_NAMES: &[&str] = &[
    "eval",
    "exec",
    "open",
    "compile",
    "globals",
    "locals",
    "vars",
    "getattr",
    "setattr",
    "delattr",
    "input",
    "breakpoint",
];

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn check_name(name: &str, line: usize) -> Result<()> {
    if is_dunder(name) {
        return Err(ScriptError::forbidden(line, format!("access to '{name}'")));
    }
    if BLOCKED_NAMES.contains(&name) {
        return Err(ScriptError::forbidden(line, format!("use of '{name}'")));
    }
    Ok(())
}

/// Check every statement of a module body.
///
/// # Errors
///
/// Returns [`ScriptError::Forbidden`] for the first blocked name or dunder
/// attribute, with the line of the statement that holds it.
pub fn check_module(body: &[Stmt]) -> Result<()> {
    body.iter().try_for_each(check_stmt)
}

fn check_stmt(stmt: &Stmt) -> Result<()> {
    let line = stmt.line;
    match &stmt.kind {
        StmtKind::Expr(expr) => check_expr(expr, line),
        StmtKind::Assign { targets, value } => {
            for target in targets {
                check_name(target, line)?;
            }
            check_expr(value, line)
        }
        StmtKind::AugAssign { target, value, .. } => {
            check_name(target, line)?;
            check_expr(value, line)
        }
        StmtKind::If { branches, orelse } => {
            for (test, body) in branches {
                check_expr(test, line)?;
                check_module(body)?;
            }
            check_module(orelse)
        }
        StmtKind::For {
            targets,
            iter,
            body,
        } => {
            for target in targets {
                check_name(target, line)?;
            }
            check_expr(iter, line)?;
            check_module(body)
        }
        StmtKind::Pass | StmtKind::Break | StmtKind::Continue => Ok(()),
    }
}

/// Check a single expression, reporting errors at `line`.
///
/// # Errors
///
/// Returns [`ScriptError::Forbidden`] for the first blocked name or dunder
/// attribute.
pub fn check_expr(expr: &Expr, line: usize) -> Result<()> {
    match expr {
        Expr::None | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => Ok(()),
        Expr::Name(name) => check_name(name, line),
        Expr::List(items) | Expr::Tuple(items) => {
            items.iter().try_for_each(|item| check_expr(item, line))
        }
        Expr::Dict(entries) => entries.iter().try_for_each(|(key, value)| {
            check_expr(key, line)?;
            check_expr(value, line)
        }),
        Expr::Attribute(target, attr) => {
            if attr.starts_with("__") {
                return Err(ScriptError::forbidden(line, format!("attribute '{attr}'")));
            }
            check_expr(target, line)
        }
        Expr::Subscript(target, index) => {
            check_expr(target, line)?;
            check_expr(index, line)
        }
        Expr::Call(func, args) => {
            check_expr(func, line)?;
            args.iter().try_for_each(|arg| check_expr(arg, line))
        }
        Expr::Unary(_, operand) => check_expr(operand, line),
        Expr::Binary(_, left, right) | Expr::And(left, right) | Expr::Or(left, right) => {
            check_expr(left, line)?;
            check_expr(right, line)
        }
        Expr::Compare(left, chain) => {
            check_expr(left, line)?;
            chain
                .iter()
                .try_for_each(|(_, right)| check_expr(right, line))
        }
        Expr::IfElse { test, body, orelse } => {
            check_expr(test, line)?;
            check_expr(body, line)?;
            check_expr(orelse, line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, parse_module};

    fn module(source: &str) -> Result<()> {
        check_module(&parse_module(source)?)
    }

    #[test]
    fn plain_scripts_pass() {
        module("domain = [('partner_id', '=', ticket.partner_id.id)]\n").expect("ok");
        module("for t in ticket.tag_ids:\n    ids = ids + [t.id]\n").expect("ok");
        check_expr(&parse_expression("user.company_id.id").expect("parse"), 1).expect("ok");
    }

    #[test]
    fn dunder_access_is_forbidden() {
        let err = module("x = 1\ny = ticket.__class__\n").expect_err("dunder");
        assert_eq!(
            err,
            ScriptError::Forbidden {
                line: 2,
                what: "attribute '__class__'".into()
            }
        );
        assert!(module("x = __builtins__\n").is_err());
        assert!(module("__name__ = 1\n").is_err());
    }

    #[test]
    fn blocked_builtins_are_forbidden_even_uncalled() {
        assert!(module("f = eval\n").is_err());
        assert!(module("open('x')\n").is_err());
        assert!(module("if True:\n    getattr(ticket, 'id')\n").is_err());
    }

    #[test]
    fn single_underscore_names_are_allowed() {
        module("label = _('Open')\n").expect("translator");
        module("_private = 1\n").expect("leading underscore");
    }
}
