//! Sandboxed predicate scripts for helpdesk filters.
//!
//! Scripts are written in a small Python-like language: literals, lists,
//! tuples, dicts, attribute access on records, `if`/`elif`/`else`, `for`
//! loops over finite sequences, assignment and a handful of builtins.
//! Imports, function and class definitions, `while`, exception handling and
//! any dunder access are rejected before anything runs, and execution is
//! bounded in steps and sequence size.
//!
//! A script either *is* a domain expression:
//!
//! ```text
//! [('partner_id', '=', ticket.partner_id.id)]
//! ```
//!
//! or a statement body that assigns `domain`:
//!
//! ```text
//! if ticket.partner_id:
//!     domain = [('partner_id', '=', ticket.partner_id.id)]
//! else:
//!     domain = []
//! ```

pub mod ast;
pub mod check;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::{Result, ScriptError};
pub use interp::Interpreter;
pub use value::Value;

use helpdesk_core::compose::{Bindings, PredicateError, PredicateEvaluator};
use helpdesk_core::domain::Domain;
use helpdesk_core::model::UserId;

/// [`PredicateEvaluator`] backed by the sandbox interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEngine;

impl ScriptEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Evaluate `source` as one expression against `interp`.
    fn eval_expression(source: &str, interp: &mut Interpreter<'_>) -> Result<Value> {
        let expr = parser::parse_expression(source)?;
        check::check_expr(&expr, 1)?;
        interp.eval(&expr)
    }

    fn script_scope<'a>(bindings: &Bindings<'a>) -> Interpreter<'a> {
        let mut interp = Interpreter::new()
            .with_translator(bindings.translator)
            .with_combinators();
        interp.set("env", Value::record(bindings.env()));
        interp.set("ticket", Value::record(bindings.ticket.clone()));
        interp.set("user", Value::record(bindings.user.clone()));
        interp.set("company", Value::record(bindings.company.clone()));
        interp.set("base_domain", Value::from_domain(&bindings.base_domain));
        interp
    }
}

fn script_error(err: &ScriptError) -> PredicateError {
    PredicateError::Script(err.to_string())
}

impl PredicateEvaluator for ScriptEngine {
    fn evaluate_text(&self, text: &str, uid: UserId) -> std::result::Result<Domain, PredicateError> {
        let mut interp = Interpreter::new();
        interp.set("uid", Value::Int(uid.get()));
        Self::eval_expression(text.trim(), &mut interp)
            .map_err(|e| script_error(&e))?
            .to_domain()
    }

    fn evaluate_script(
        &self,
        script: &str,
        bindings: &Bindings<'_>,
    ) -> std::result::Result<Domain, PredicateError> {
        let source = script.trim();

        match Self::eval_expression(source, &mut Self::script_scope(bindings)) {
            Ok(value) if value.as_sequence().is_some() => return value.to_domain(),
            Ok(value) => {
                tracing::debug!(
                    got = value.type_name(),
                    "domain script is not a domain expression, running as statements"
                );
            }
            Err(e) => {
                tracing::debug!(error = %e, "domain script is not an expression, running as statements");
            }
        }

        let body = parser::parse_module(source).map_err(|e| script_error(&e))?;
        check::check_module(&body).map_err(|e| script_error(&e))?;
        let mut interp = Self::script_scope(bindings);
        interp.run(&body).map_err(|e| script_error(&e))?;

        match interp.get("domain") {
            None => Ok(Domain::new()),
            Some(value) if value.as_sequence().is_some() => value.to_domain(),
            Some(value) if value.truthy() => {
                Err(PredicateError::NotADomain(value.type_name().to_string()))
            }
            Some(_) => Ok(Domain::new()),
        }
    }

    fn check_script(&self, script: &str) -> std::result::Result<(), String> {
        parser::parse_module(script.trim())
            .and_then(|body| check::check_module(&body))
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::compose::{IdentityTranslator, Session};
    use helpdesk_core::domain::Operator;

    #[test]
    fn static_text_sees_only_uid() {
        let engine = ScriptEngine::new();
        let domain = engine
            .evaluate_text(" [('user_id', '=', uid)] ", UserId(4))
            .expect("domain");
        assert_eq!(domain, Domain::leaf("user_id", Operator::Eq, 4));

        assert!(matches!(
            engine.evaluate_text("[('x', '=', ticket.id)]", UserId(4)),
            Err(PredicateError::Script(msg)) if msg == "name 'ticket' is not defined"
        ));
        assert_eq!(
            engine.evaluate_text("uid", UserId(4)),
            Err(PredicateError::NotADomain("int".into()))
        );
    }

    #[test]
    fn expression_scripts_short_circuit() {
        let session = Session::new(UserId(3));
        let bindings = Bindings::new(&session, None, &IdentityTranslator);
        let domain = ScriptEngine
            .evaluate_script("[('user_id', '=', user.id)]", &bindings)
            .expect("domain");
        assert_eq!(domain, Domain::leaf("user_id", Operator::Eq, 3));
    }

    #[test]
    fn statement_scripts_read_domain() {
        let session = Session::new(UserId(3));
        let bindings = Bindings::new(&session, None, &IdentityTranslator);
        let engine = ScriptEngine;

        let domain = engine
            .evaluate_script("x = 2\ndomain = [('sequence', '>', x)]", &bindings)
            .expect("domain");
        assert_eq!(domain, Domain::leaf("sequence", Operator::Gt, 2));

        assert_eq!(engine.evaluate_script("x = 1", &bindings), Ok(Domain::new()));
        assert_eq!(engine.evaluate_script("domain = False", &bindings), Ok(Domain::new()));
        assert_eq!(
            engine.evaluate_script("domain = 'abc'", &bindings),
            Err(PredicateError::NotADomain("str".into()))
        );
    }

    #[test]
    fn check_reports_first_problem() {
        let engine = ScriptEngine;
        assert_eq!(engine.check_script("domain = []"), Ok(()));
        assert_eq!(engine.check_script(""), Ok(()));
        assert_eq!(
            engine.check_script("import os"),
            Err("forbidden 'import' statement at line 1".to_string())
        );
    }
}
