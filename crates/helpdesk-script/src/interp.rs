//! Tree-walking interpreter over a fixed scope.

use std::collections::HashMap;

use helpdesk_core::compose::Translate;
use helpdesk_core::domain::{Domain, and_all, or_all};

use crate::ast::{BinaryOp, CompareOp, Expr, Stmt, StmtKind, UnaryOp};
use crate::error::{Result, ScriptError};
use crate::value::{Builtin, Number, Value};

/// Statements executed before a script is stopped.
pub const MAX_STEPS: usize = 100_000;

/// Longest list or string a script may build.
pub const MAX_SEQUENCE: usize = 100_000;

/// Bytes of strings and sequence slots a run may allocate, counting every copy.
pub const MAX_ALLOCATION: usize = 64 * 1024 * 1024;

const SLOT: usize = std::mem::size_of::<Value>();

enum Flow {
    Normal,
    Break,
    Continue,
}

pub struct Interpreter<'a> {
    scope: HashMap<String, Value>,
    translator: Option<&'a dyn Translate>,
    steps: usize,
    allocated: usize,
}

impl<'a> Interpreter<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scope: HashMap::new(),
            translator: None,
            steps: 0,
            allocated: 0,
        }
    }

    /// Bind `_` to `translator`.
    #[must_use]
    pub fn with_translator(mut self, translator: &'a dyn Translate) -> Self {
        self.translator = Some(translator);
        self.scope
            .insert("_".to_string(), Value::Builtin(Builtin::Translate));
        self
    }

    /// Bind the domain combinators `AND`, `OR` and `normalize`.
    #[must_use]
    pub fn with_combinators(mut self) -> Self {
        for builtin in [Builtin::And, Builtin::Or, Builtin::Normalize] {
            self.scope
                .insert(builtin.name().to_string(), Value::Builtin(builtin));
        }
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.scope.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scope.get(name)
    }

    /// Run a module body.
    ///
    /// # Errors
    ///
    /// Returns the first runtime error.
    pub fn run(&mut self, body: &[Stmt]) -> Result<()> {
        self.exec_body(body).map(|_| ())
    }

    /// Evaluate a single expression.
    ///
    /// # Errors
    ///
    /// Returns the first runtime error.
    pub fn eval(&mut self, expr: &Expr) -> Result<Value> {
        let value = self.eval_uncharged(expr)?;
        self.charge(&value)?;
        Ok(value)
    }

    fn eval_uncharged(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::List(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            Expr::Dict(entries) => {
                let mut dict: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    if let Some(slot) = dict.iter_mut().find(|(k, _)| k.py_eq(&key)) {
                        slot.1 = value;
                    } else {
                        dict.push((key, value));
                    }
                }
                Ok(Value::Dict(dict))
            }
            Expr::Attribute(target, name) => self.eval(target)?.attribute(name),
            Expr::Subscript(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                subscript(&target, &index)
            }
            Expr::Call(func, args) => self.call(func, args),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                unary(*op, &value)
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.reserve(projected_size(*op, &left, &right))?;
                binary(*op, &left, &right)
            }
            Expr::Compare(first, chain) => {
                let mut left = self.eval(first)?;
                for (op, right) in chain {
                    let right = self.eval(right)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.truthy() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::IfElse { test, body, orelse } => {
                if self.eval(test)?.truthy() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn exec_body(&mut self, body: &[Stmt]) -> Result<Flow> {
        for stmt in body {
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.steps += 1;
        if self.steps > MAX_STEPS {
            return Err(ScriptError::runtime(format!(
                "script exceeded {MAX_STEPS} steps (line {})",
                stmt.line
            )));
        }

        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                self.bind(targets, value)?;
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.lookup(target)?;
                self.charge(&current)?;
                let value = self.eval(value)?;
                self.reserve(projected_size(*op, &current, &value))?;
                let updated = binary(*op, &current, &value)?;
                self.charge(&updated)?;
                self.scope.insert(target.clone(), updated);
            }
            StmtKind::If { branches, orelse } => {
                for (test, body) in branches {
                    if self.eval(test)?.truthy() {
                        return self.exec_body(body);
                    }
                }
                return self.exec_body(orelse);
            }
            StmtKind::For {
                targets,
                iter,
                body,
            } => {
                let iterable = self.eval(iter)?;
                let items = self.iterate(&iterable)?;
                for item in items {
                    self.bind(targets, item)?;
                    if let Flow::Break = self.exec_body(body)? {
                        break;
                    }
                }
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn bind(&mut self, targets: &[String], value: Value) -> Result<()> {
        if let [target] = targets {
            self.scope.insert(target.clone(), value);
            return Ok(());
        }
        let items = self.iterate(&value)?;
        match items.len().cmp(&targets.len()) {
            std::cmp::Ordering::Greater => Err(ScriptError::runtime(format!(
                "too many values to unpack (expected {})",
                targets.len()
            ))),
            std::cmp::Ordering::Less => Err(ScriptError::runtime(format!(
                "not enough values to unpack (expected {}, got {})",
                targets.len(),
                items.len()
            ))),
            std::cmp::Ordering::Equal => {
                for (target, item) in targets.iter().zip(items) {
                    self.scope.insert(target.clone(), item);
                }
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Names and calls
    // -----------------------------------------------------------------------

    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.scope.get(name) {
            return Ok(value.clone());
        }
        Builtin::lookup(name)
            .map(Value::Builtin)
            .ok_or_else(|| ScriptError::Name(name.to_string()))
    }

    // -----------------------------------------------------------------------
    // Allocation budget
    // -----------------------------------------------------------------------

    /// Count `value`'s heap footprint against the run's budget.
    fn charge(&mut self, value: &Value) -> Result<()> {
        let remaining = MAX_ALLOCATION - self.allocated;
        let cost = footprint(value, remaining).ok_or_else(allocation_exceeded)?;
        self.allocated += cost;
        Ok(())
    }

    fn reserve(&mut self, bytes: usize) -> Result<()> {
        if bytes > MAX_ALLOCATION - self.allocated {
            return Err(allocation_exceeded());
        }
        self.allocated += bytes;
        Ok(())
    }

    /// Elements a `for` loop or a sequence builtin walks over, paid for up front.
    fn iterate(&mut self, value: &Value) -> Result<Vec<Value>> {
        let cost = match value {
            Value::Str(s) => s.len().saturating_mul(SLOT + 4),
            other => footprint(other, usize::MAX).unwrap_or(usize::MAX),
        };
        self.reserve(cost)?;
        iterate(value)
    }

    fn eval_all(&mut self, items: &[Expr]) -> Result<Vec<Value>> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    fn call(&mut self, func: &Expr, args: &[Expr]) -> Result<Value> {
        if let Expr::Attribute(receiver, method) = func {
            let target = self.eval(receiver)?;
            if !matches!(target, Value::Record(_)) {
                let args = self.eval_all(args)?;
                return self.call_method(receiver, target, method, args);
            }
        }
        let func = self.eval(func)?;
        let args = self.eval_all(args)?;
        match func {
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            other => Err(ScriptError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_method(
        &mut self,
        receiver: &Expr,
        target: Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        match (target, method) {
            (Value::List(mut items), "append" | "extend") => {
                let Expr::Name(name) = receiver else {
                    return Err(ScriptError::runtime(format!(
                        "{method}() is only supported on a named list"
                    )));
                };
                let [arg] = take_args::<1>(method, args)?;
                if method == "append" {
                    items.push(arg);
                } else {
                    items.extend(self.iterate(&arg)?);
                }
                check_len(items.len())?;
                self.scope.insert(name.clone(), Value::List(items));
                Ok(Value::None)
            }
            (Value::Dict(entries), "get") => {
                let (key, default) = match args.len() {
                    1 | 2 => {
                        let mut args = args.into_iter();
                        let key = args.next().unwrap_or(Value::None);
                        (key, args.next().unwrap_or(Value::None))
                    }
                    n => return Err(arity("get", "1 or 2", n)),
                };
                Ok(entries
                    .into_iter()
                    .find(|(k, _)| k.py_eq(&key))
                    .map_or(default, |(_, v)| v))
            }
            (Value::Dict(entries), "keys" | "values" | "items") => {
                take_args::<0>(method, args)?;
                Ok(Value::List(
                    entries
                        .into_iter()
                        .map(|(k, v)| match method {
                            "keys" => k,
                            "values" => v,
                            _ => Value::Tuple(vec![k, v]),
                        })
                        .collect(),
                ))
            }
            (Value::Str(s), "lower" | "upper" | "strip") => {
                take_args::<0>(method, args)?;
                Ok(Value::Str(match method {
                    "lower" => s.to_lowercase(),
                    "upper" => s.to_uppercase(),
                    _ => s.trim().to_string(),
                }))
            }
            (Value::Str(s), "startswith" | "endswith") => {
                let [prefix] = take_args::<1>(method, args)?;
                let Value::Str(prefix) = prefix else {
                    return Err(ScriptError::type_error(format!(
                        "{method} arg must be str, not {}",
                        prefix.type_name()
                    )));
                };
                Ok(Value::Bool(if method == "startswith" {
                    s.starts_with(&prefix)
                } else {
                    s.ends_with(&prefix)
                }))
            }
            (target, _) => Err(ScriptError::runtime(format!(
                "'{}' object has no attribute '{method}'",
                target.type_name()
            ))),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value> {
        let name = builtin.name();
        match builtin {
            Builtin::And | Builtin::Or => {
                let [domains] = take_args::<1>(name, args)?;
                let domains = self
                    .iterate(&domains)?
                    .iter()
                    .map(to_domain)
                    .collect::<Result<Vec<Domain>>>()?;
                let combined = if builtin == Builtin::And {
                    and_all(&domains)
                } else {
                    or_all(&domains)
                };
                combined
                    .map(|d| Value::from_domain(&d))
                    .map_err(|e| ScriptError::runtime(e.to_string()))
            }
            Builtin::Normalize => {
                let [domain] = take_args::<1>(name, args)?;
                to_domain(&domain)?
                    .normalize()
                    .map(|d| Value::from_domain(&d))
                    .map_err(|e| ScriptError::runtime(e.to_string()))
            }
            Builtin::Translate => {
                let [source] = take_args::<1>(name, args)?;
                let Value::Str(source) = source else {
                    return Err(ScriptError::type_error("_() expects a string"));
                };
                Ok(Value::Str(self.translator.map_or_else(
                    || source.clone(),
                    |t| t.translate(&source),
                )))
            }
            Builtin::Len => {
                let [value] = take_args::<1>(name, args)?;
                let len = match &value {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) | Value::Tuple(items) => items.len(),
                    Value::Dict(entries) => entries.len(),
                    Value::Record(r) => usize::from(!r.is_empty()),
                    other => {
                        return Err(ScriptError::type_error(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )));
                    }
                };
                Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
            }
            Builtin::Str => match take_optional(name, args)? {
                Some(value) => Ok(Value::Str(value.to_string())),
                None => Ok(Value::Str(String::new())),
            },
            Builtin::Int => match take_optional(name, args)? {
                Some(value) => to_int(&value),
                None => Ok(Value::Int(0)),
            },
            Builtin::Float => match take_optional(name, args)? {
                Some(value) => to_float(&value),
                None => Ok(Value::Float(0.0)),
            },
            Builtin::Bool => Ok(Value::Bool(
                take_optional(name, args)?.is_some_and(|v| v.truthy()),
            )),
            Builtin::List => Ok(Value::List(match take_optional(name, args)? {
                Some(value) => self.iterate(&value)?,
                None => Vec::new(),
            })),
            Builtin::Tuple => Ok(Value::Tuple(match take_optional(name, args)? {
                Some(value) => self.iterate(&value)?,
                None => Vec::new(),
            })),
            Builtin::Any => {
                let [value] = take_args::<1>(name, args)?;
                Ok(Value::Bool(self.iterate(&value)?.iter().any(Value::truthy)))
            }
            Builtin::All => {
                let [value] = take_args::<1>(name, args)?;
                Ok(Value::Bool(self.iterate(&value)?.iter().all(Value::truthy)))
            }
        }
    }
}

impl Default for Interpreter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn to_domain(value: &Value) -> Result<Domain> {
    value
        .to_domain()
        .map_err(|e| ScriptError::runtime(e.to_string()))
}

fn arity(name: &str, expected: &str, got: usize) -> ScriptError {
    ScriptError::type_error(format!(
        "{name}() takes {expected} argument(s) ({got} given)"
    ))
}

fn take_args<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N]> {
    let got = args.len();
    <[Value; N]>::try_from(args).map_err(|_| arity(name, &N.to_string(), got))
}

fn take_optional(name: &str, args: Vec<Value>) -> Result<Option<Value>> {
    match args.len() {
        0 | 1 => Ok(args.into_iter().next()),
        n => Err(arity(name, "at most 1", n)),
    }
}

fn check_len(len: usize) -> Result<()> {
    if len > MAX_SEQUENCE {
        Err(ScriptError::runtime(format!(
            "sequence longer than {MAX_SEQUENCE} items"
        )))
    } else {
        Ok(())
    }
}

fn allocation_exceeded() -> ScriptError {
    ScriptError::runtime(format!(
        "script allocated more than {MAX_ALLOCATION} bytes"
    ))
}

/// Heap bytes held by `value`, or `None` once they pass `limit`.
fn footprint(value: &Value, limit: usize) -> Option<usize> {
    let mut total = 0usize;
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::Str(s) => total = total.saturating_add(s.len()),
            Value::List(items) | Value::Tuple(items) => {
                total = total.saturating_add(items.len().saturating_mul(SLOT));
                pending.extend(items);
            }
            Value::Dict(entries) => {
                total = total.saturating_add(entries.len().saturating_mul(2 * SLOT));
                for (key, value) in entries {
                    pending.push(key);
                    pending.push(value);
                }
            }
            _ => {}
        }
        if total > limit {
            return None;
        }
    }
    Some(total)
}

/// Upper bound on what `binary` allocates for a sequence or string result.
fn projected_size(op: BinaryOp, left: &Value, right: &Value) -> usize {
    let size = |value: &Value| footprint(value, usize::MAX).unwrap_or(usize::MAX);
    let is_seq =
        |value: &Value| matches!(value, Value::Str(_) | Value::List(_) | Value::Tuple(_));
    match op {
        BinaryOp::Add if is_seq(left) => size(left).saturating_add(size(right)),
        BinaryOp::Mod if matches!(left, Value::Str(_)) => {
            size(left).saturating_add(size(right)).saturating_add(SLOT)
        }
        BinaryOp::Mul => {
            let (seq, count) = if is_seq(left) { (left, right) } else { (right, left) };
            match (is_seq(seq), count.number()) {
                (true, Some(Number::Int(n))) => {
                    size(seq).saturating_mul(usize::try_from(n).unwrap_or(0))
                }
                _ => 0,
            }
        }
        _ => 0,
    }
}

/// Elements a `for` loop or a sequence builtin walks over.
fn iterate(value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::List(items) | Value::Tuple(items) => Ok(items.clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(entries) => Ok(entries.iter().map(|(k, _)| k.clone()).collect()),
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn subscript(target: &Value, index: &Value) -> Result<Value> {
    match target {
        Value::List(items) | Value::Tuple(items) => {
            let Some(Number::Int(i)) = index.number() else {
                return Err(ScriptError::type_error(format!(
                    "indices must be integers, not {}",
                    index.type_name()
                )));
            };
            resolve_index(i, items.len())
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| ScriptError::runtime("index out of range"))
        }
        Value::Str(s) => {
            let Some(Number::Int(i)) = index.number() else {
                return Err(ScriptError::type_error("string indices must be integers"));
            };
            let chars: Vec<char> = s.chars().collect();
            resolve_index(i, chars.len())
                .map(|i| Value::Str(chars[i].to_string()))
                .ok_or_else(|| ScriptError::runtime("string index out of range"))
        }
        Value::Dict(entries) => entries
            .iter()
            .find(|(k, _)| k.py_eq(index))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| ScriptError::runtime(format!("KeyError: {}", index.repr()))),
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
        UnaryOp::Neg => match value.number() {
            Some(Number::Int(i)) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| ScriptError::runtime("integer overflow")),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => Err(bad_operand("unary -", value)),
        },
        UnaryOp::Pos => match value.number() {
            Some(Number::Int(i)) => Ok(Value::Int(i)),
            Some(Number::Float(f)) => Ok(Value::Float(f)),
            None => Err(bad_operand("unary +", value)),
        },
    }
}

fn bad_operand(op: &str, value: &Value) -> ScriptError {
    ScriptError::type_error(format!(
        "bad operand type for {op}: '{}'",
        value.type_name()
    ))
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> ScriptError {
    ScriptError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> ScriptError {
    ScriptError::runtime("integer overflow")
}

fn zero_division() -> ScriptError {
    ScriptError::runtime("division by zero")
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            check_len(a.len() + b.len())?;
            return Ok(Value::Str(format!("{a}{b}")));
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            check_len(a.len() + b.len())?;
            return Ok(Value::List(a.iter().chain(b).cloned().collect()));
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            check_len(a.len() + b.len())?;
            return Ok(Value::Tuple(a.iter().chain(b).cloned().collect()));
        }
        (BinaryOp::Mul, seq @ (Value::Str(_) | Value::List(_) | Value::Tuple(_)), count)
        | (BinaryOp::Mul, count, seq @ (Value::Str(_) | Value::List(_) | Value::Tuple(_)))
            if matches!(count.number(), Some(Number::Int(_))) =>
        {
            return repeat(seq, count);
        }
        (BinaryOp::Mod, Value::Str(template), args) => return format_string(template, args),
        _ => {}
    }

    let (Some(a), Some(b)) = (left.number(), right.number()) else {
        return Err(unsupported(op, left, right));
    };
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => int_binary(op, a, b),
        (a, b) => float_binary(op, a.as_f64(), b.as_f64()),
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<Value> {
    let value = match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOp::Div => {
            return float_binary(op, Number::Int(a).as_f64(), Number::Int(b).as_f64());
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(zero_division());
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(zero_division());
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
        }
    };
    Ok(Value::Int(value))
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Result<Value> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => {
            return Err(zero_division());
        }
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => a - b * (a / b).floor(),
    };
    Ok(Value::Float(value))
}

fn repeat(seq: &Value, count: &Value) -> Result<Value> {
    let count = match count.number() {
        Some(Number::Int(n)) => usize::try_from(n).unwrap_or(0),
        _ => 0,
    };
    Ok(match seq {
        Value::Str(s) => {
            check_len(s.len().saturating_mul(count))?;
            Value::Str(s.repeat(count))
        }
        Value::List(items) | Value::Tuple(items) => {
            check_len(items.len().saturating_mul(count))?;
            let repeated: Vec<Value> = std::iter::repeat_n(items.iter(), count)
                .flatten()
                .cloned()
                .collect();
            if matches!(seq, Value::List(_)) {
                Value::List(repeated)
            } else {
                Value::Tuple(repeated)
            }
        }
        _ => return Err(unsupported(BinaryOp::Mul, seq, &Value::Int(0))),
    })
}

/// `template % args` with `%s`, `%r`, `%d` and `%%`.
fn format_string(template: &str, args: &Value) -> Result<Value> {
    let args: Vec<Value> = match args {
        Value::Tuple(items) => items.clone(),
        other => vec![other.clone()],
    };
    let mut args = args.into_iter();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let spec = chars
            .next()
            .ok_or_else(|| ScriptError::runtime("incomplete format"))?;
        if spec == '%' {
            out.push('%');
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| ScriptError::type_error("not enough arguments for format string"))?;
        match spec {
            's' => out.push_str(&arg.to_string()),
            'r' => out.push_str(&arg.repr()),
            'd' | 'i' => match to_int(&arg)? {
                Value::Int(i) => out.push_str(&i.to_string()),
                other => out.push_str(&other.to_string()),
            },
            other => {
                return Err(ScriptError::runtime(format!(
                    "unsupported format character '{other}'"
                )));
            }
        }
    }
    if args.next().is_some() {
        return Err(ScriptError::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(Value::Str(out))
}

fn to_int(value: &Value) -> Result<Value> {
    match value {
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                ScriptError::runtime(format!(
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                ))
            }),
        other => match other.number() {
            Some(Number::Int(i)) => Ok(Value::Int(i)),
            Some(Number::Float(f)) if f.is_finite() => {
                #[allow(clippy::cast_possible_truncation)]
                let truncated = f.trunc() as i64;
                Ok(Value::Int(truncated))
            }
            Some(Number::Float(_)) => Err(ScriptError::runtime(
                "cannot convert float infinity or NaN to integer",
            )),
            None => Err(ScriptError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn to_float(value: &Value) -> Result<Value> {
    match value {
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            ScriptError::runtime(format!(
                "could not convert string to float: {}",
                value.repr()
            ))
        }),
        other => other
            .number()
            .map(|n| Value::Float(n.as_f64()))
            .ok_or_else(|| {
                ScriptError::type_error(format!(
                    "float() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))
            }),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
    let ordered = |symbol: &str, test: fn(std::cmp::Ordering) -> bool| {
        left.py_cmp(right).map(test).ok_or_else(|| {
            ScriptError::type_error(format!(
                "'{symbol}' not supported between instances of '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))
        })
    };
    match op {
        CompareOp::Eq => Ok(left.py_eq(right)),
        CompareOp::Ne => Ok(!left.py_eq(right)),
        CompareOp::Lt => ordered("<", std::cmp::Ordering::is_lt),
        CompareOp::Le => ordered("<=", std::cmp::Ordering::is_le),
        CompareOp::Gt => ordered(">", std::cmp::Ordering::is_gt),
        CompareOp::Ge => ordered(">=", std::cmp::Ordering::is_ge),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
        CompareOp::Is => Ok(identical(left, right)),
        CompareOp::IsNot => Ok(!identical(left, right)),
    }
}

fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        _ => false,
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::List(items) | Value::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
        Value::Dict(entries) => Ok(entries.iter().any(|(k, _)| k.py_eq(item))),
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(ScriptError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        other => Err(ScriptError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, parse_module};
    use helpdesk_core::domain::RecordView;

    fn eval(source: &str) -> Result<Value> {
        let expr = parse_expression(source).expect("parse");
        Interpreter::new().with_combinators().eval(&expr)
    }

    fn run(source: &str) -> Result<Interpreter<'static>> {
        let body = parse_module(source).expect("parse");
        let mut interp = Interpreter::new().with_combinators();
        interp.run(&body)?;
        Ok(interp)
    }

    #[test]
    fn arithmetic_follows_python_rules() {
        assert_eq!(eval("7 // -2").expect("eval"), Value::Int(-4));
        assert_eq!(eval("-7 % 3").expect("eval"), Value::Int(2));
        assert_eq!(eval("7 / 2").expect("eval"), Value::Float(3.5));
        assert_eq!(eval("True + 1").expect("eval"), Value::Int(2));
        assert_eq!(eval("'ab' * 2").expect("eval"), Value::Str("abab".into()));
        assert_eq!(eval("[1] + [2]").expect("eval").repr(), "[1, 2]");
        assert!(matches!(eval("1 / 0"), Err(ScriptError::Runtime(_))));
        assert!(matches!(eval("9223372036854775807 + 1"), Err(ScriptError::Runtime(_))));
        assert!(matches!(eval("'a' + 1"), Err(ScriptError::Type(_))));
    }

    #[test]
    fn logic_returns_operands() {
        assert_eq!(eval("0 or 'x'").expect("eval"), Value::Str("x".into()));
        assert_eq!(eval("[] and 1").expect("eval"), Value::List(vec![]));
        assert_eq!(eval("1 < 2 < 3").expect("eval"), Value::Bool(true));
        assert_eq!(eval("1 < 3 < 2").expect("eval"), Value::Bool(false));
        assert_eq!(eval("'a' if 2 in [1, 2] else 'b'").expect("eval"), Value::Str("a".into()));
        assert_eq!(eval("None is None").expect("eval"), Value::Bool(true));
        assert_eq!(eval("'b' not in 'abc'").expect("eval"), Value::Bool(false));
    }

    #[test]
    fn string_formatting_and_methods() {
        assert_eq!(
            eval("'%s-%d (%r) 100%%' % ('a', 2.9, 'b')").expect("eval"),
            Value::Str("a-2 ('b') 100%".into())
        );
        assert_eq!(eval("'x=%s' % 1").expect("eval"), Value::Str("x=1".into()));
        assert!(eval("'%s %s' % 1").is_err());
        assert_eq!(eval("' Hi '.strip().lower()").expect("eval"), Value::Str("hi".into()));
        assert_eq!(eval("{'a': 1}.get('b', 5)").expect("eval"), Value::Int(5));
        assert_eq!(eval("'abc'[-1]").expect("eval"), Value::Str("c".into()));
    }

    #[test]
    fn statements_update_scope() {
        let interp = run(
            "ids = []\nfor i, name in [(1, 'a'), (2, 'b'), (3, 'c')]:\n    if i == 2:\n        continue\n    ids.append(i)\n    if name == 'c':\n        break\ntotal = 0\nfor i in ids:\n    total += i\n",
        )
        .expect("run");
        assert_eq!(interp.get("ids").map(Value::repr).as_deref(), Some("[1, 3]"));
        assert_eq!(interp.get("total"), Some(&Value::Int(4)));
    }

    #[test]
    fn unpacking_checks_lengths() {
        assert!(run("a, b = 1, 2\n").is_ok());
        assert!(matches!(run("a, b = [1]\n"), Err(ScriptError::Runtime(_))));
        assert!(matches!(run("a, b = 1, 2, 3\n"), Err(ScriptError::Runtime(_))));
    }

    #[test]
    fn unknown_names_and_step_limit() {
        assert_eq!(run("x = y\n").err(), Some(ScriptError::Name("y".into())));
        let err = run("for a in [0] * 1000:\n    for b in [0] * 1000:\n        pass\n")
            .err()
            .expect("step limit");
        assert!(matches!(err, ScriptError::Runtime(msg) if msg.contains("steps")));
        assert!(run("x = [0] * 1000000\n").is_err());
    }

    #[test]
    fn nested_repeat_exhausts_allocation_budget() {
        let err = run("x = 'a' * 100000\ny = [x] * 100000\n")
            .err()
            .expect("allocation limit");
        assert!(matches!(err, ScriptError::Runtime(msg) if msg.contains("allocated")));

        // each copy counts, not just the longest sequence
        let err = run("x = 'a' * 100000\ny = []\nfor i in [0] * 1000:\n    y.append(x)\n")
            .err()
            .expect("allocation limit");
        assert!(matches!(err, ScriptError::Runtime(msg) if msg.contains("allocated")));

        assert!(run("x = 'a' * 1000\ny = [x] * 100\n").is_ok());
    }

    #[test]
    fn combinators_build_domains() {
        let value = eval("AND([[('a', '=', 1)], [('b', '=', 2)]])").expect("and");
        assert_eq!(value.repr(), "['&', ('a', '=', 1), ('b', '=', 2)]");
        let value = eval("OR([[('a', '=', 1)], []])").expect("or");
        assert!(value.to_domain().is_ok());
        let value = eval("normalize([('a', '=', 1), ('b', '=', 2)])").expect("normalize");
        assert_eq!(value.repr(), "['&', ('a', '=', 1), ('b', '=', 2)]");
        assert!(eval("normalize(['|'])").is_err());
    }

    #[test]
    fn records_feed_domain_terms() {
        let mut interp = Interpreter::new();
        interp.set(
            "ticket",
            Value::record(
                RecordView::new("helpdesk.ticket", 1)
                    .with_one("partner_id", RecordView::new("res.partner", 5)),
            ),
        );
        let expr = parse_expression("[('partner_id', '=', ticket.partner_id)]").expect("parse");
        let domain = interp.eval(&expr).expect("eval").to_domain().expect("domain");
        assert_eq!(domain.to_string(), "[('partner_id', '=', 5)]");
    }
}
