//! Runtime values of the script sandbox and their conversion to domains.

use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::rc::Rc;

use helpdesk_core::compose::PredicateError;
use helpdesk_core::domain::{self, Domain, DomainError, DomainItem, Field, RecordView};

use crate::error::{Result, ScriptError};

/// Functions every script can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    And,
    Or,
    Normalize,
    Translate,
    Len,
    Str,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Any,
    All,
}

impl Builtin {
    /// Available in every scope, static filter text included.
    pub const GENERAL: [Self; 9] = [
        Self::Len,
        Self::Str,
        Self::Int,
        Self::Float,
        Self::Bool,
        Self::List,
        Self::Tuple,
        Self::Any,
        Self::All,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Normalize => "normalize",
            Self::Translate => "_",
            Self::Len => "len",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Any => "any",
            Self::All => "all",
        }
    }

    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        Self::GENERAL.into_iter().find(|b| b.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Insertion-ordered; keys compare with [`Value::py_eq`].
    Dict(Vec<(Value, Value)>),
    Record(Rc<RecordView>),
    Builtin(Builtin),
}

/// Numeric view of a value; booleans count as integers.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) const fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

impl Value {
    pub fn record(view: RecordView) -> Self {
        Self::Record(Rc::new(view))
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Record(r) => r.model(),
            Self::Builtin(_) => "builtin_function_or_method",
        }
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) | Self::Tuple(items) => !items.is_empty(),
            Self::Dict(entries) => !entries.is_empty(),
            Self::Record(r) => !r.is_empty(),
            Self::Builtin(_) => true,
        }
    }

    pub(crate) const fn number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(*b as i64)),
            Self::Int(i) => Some(Number::Int(*i)),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Elements of a list or tuple.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Equality as scripts see it: `1 == 1.0 == True`, lists never equal tuples.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
            }
            (Self::Dict(a), Self::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k.py_eq(k2) && v.py_eq(v2)))
            }
            (Self::Record(a), Self::Record(b)) => a.model() == b.model() && a.id() == b.id(),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            _ => match (self.number(), other.number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
                (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                _ => false,
            },
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`; `None` when the types do not order.
    #[must_use]
    pub fn py_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::List(a), Self::List(b)) | (Self::Tuple(a), Self::Tuple(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.py_eq(y) {
                        return x.py_cmp(y);
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => match (self.number()?, other.number()?) {
                (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
                (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
            },
        }
    }

    /// The printable form used by `repr` and in error messages.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out);
        out
    }

    fn write_repr(&self, out: &mut String) {
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => {
                let _ = write!(out, "{f:?}");
            }
            Self::Str(s) => write_quoted(out, s),
            Self::List(items) => {
                out.push('[');
                write_items(out, items);
                out.push(']');
            }
            Self::Tuple(items) => {
                out.push('(');
                write_items(out, items);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Self::Dict(entries) => {
                out.push('{');
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.write_repr(out);
                    out.push_str(": ");
                    v.write_repr(out);
                }
                out.push('}');
            }
            Self::Record(r) => {
                let _ = match r.id() {
                    Some(id) => write!(out, "{}({id},)", r.model()),
                    None => write!(out, "{}()", r.model()),
                };
            }
            Self::Builtin(b) => {
                let _ = write!(out, "<built-in function {}>", b.name());
            }
        }
    }

    /// Read `name` off a value. Only records carry attributes.
    ///
    /// # Errors
    ///
    /// Unknown fields on a non-empty record and attributes of any other
    /// type are runtime errors.
    pub fn attribute(&self, name: &str) -> Result<Self> {
        let Self::Record(record) = self else {
            return Err(ScriptError::runtime(format!(
                "'{}' object has no attribute '{name}'",
                self.type_name()
            )));
        };
        match name {
            "id" => return Ok(record.id().map_or(Self::Bool(false), Self::Int)),
            "ids" => return Ok(Self::List(record.id().into_iter().map(Self::Int).collect())),
            _ => {}
        }
        if record.is_empty() {
            return Ok(Self::record(RecordView::empty(record.model())));
        }
        match record.field(name) {
            Some(Field::Scalar(value)) => Ok(Self::from_term(value)),
            Some(Field::One(related)) => Ok(Self::record(related.clone())),
            Some(Field::Many(related)) => Ok(Self::List(
                related.iter().cloned().map(Self::record).collect(),
            )),
            None => Err(ScriptError::runtime(format!(
                "'{}' object has no attribute '{name}'",
                record.model()
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Domain conversion
    // -----------------------------------------------------------------------

    /// Read a domain term operand.
    #[must_use]
    pub fn from_term(value: &domain::Value) -> Self {
        match value {
            domain::Value::Null => Self::None,
            domain::Value::Bool(b) => Self::Bool(*b),
            domain::Value::Int(i) => Self::Int(*i),
            domain::Value::Float(f) => Self::Float(*f),
            domain::Value::Str(s) => Self::Str(s.clone()),
            domain::Value::List(items) => Self::List(items.iter().map(Self::from_term).collect()),
        }
    }

    /// The value as a term operand. Records stand for their id.
    ///
    /// # Errors
    ///
    /// Dicts and functions have no operand form.
    pub fn to_term(&self) -> std::result::Result<domain::Value, DomainError> {
        Ok(match self {
            Self::None => domain::Value::Null,
            Self::Bool(b) => domain::Value::Bool(*b),
            Self::Int(i) => domain::Value::Int(*i),
            Self::Float(f) => domain::Value::Float(*f),
            Self::Str(s) => domain::Value::Str(s.clone()),
            Self::List(items) | Self::Tuple(items) => domain::Value::List(
                items
                    .iter()
                    .map(Self::to_term)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Self::Record(r) => r.id_value(),
            Self::Dict(_) | Self::Builtin(_) => {
                return Err(DomainError::InvalidTerm(format!(
                    "unsupported operand {}",
                    self.repr()
                )));
            }
        })
    }

    /// The list form of a domain: operators as strings, leaves as tuples,
    /// groups as nested lists.
    #[must_use]
    pub fn from_domain(domain: &Domain) -> Self {
        Self::List(domain.items().iter().map(Self::from_domain_item).collect())
    }

    fn from_domain_item(item: &DomainItem) -> Self {
        match item {
            DomainItem::And => Self::Str("&".into()),
            DomainItem::Or => Self::Str("|".into()),
            DomainItem::Not => Self::Str("!".into()),
            DomainItem::Leaf(cond) => Self::Tuple(vec![
                Self::Str(cond.field.clone()),
                Self::Str(cond.operator.as_str().into()),
                Self::from_term(&cond.value),
            ]),
            DomainItem::Constant(flag) => Self::Tuple(vec![
                Self::Int(i64::from(*flag)),
                Self::Str("=".into()),
                Self::Int(1),
            ]),
            DomainItem::Group(inner) => Self::from_domain(inner),
        }
    }

    /// Interpret the value as a domain.
    ///
    /// # Errors
    ///
    /// [`PredicateError::NotADomain`] when the value is not a list or tuple,
    /// [`PredicateError::Invalid`] when an element is not a valid term.
    pub fn to_domain(&self) -> std::result::Result<Domain, PredicateError> {
        let items = self
            .as_sequence()
            .ok_or_else(|| PredicateError::NotADomain(self.type_name().to_string()))?;
        Ok(domain_items(items)?)
    }
}

fn domain_items(items: &[Value]) -> std::result::Result<Domain, DomainError> {
    items.iter().map(domain_item).collect()
}

fn domain_item(item: &Value) -> std::result::Result<DomainItem, DomainError> {
    let invalid = || DomainError::InvalidTerm(item.repr());
    match item {
        Value::Str(token) => DomainItem::from_operator_token(token).ok_or_else(invalid),
        Value::List(parts) | Value::Tuple(parts) => {
            if let [left, operator, right] = parts.as_slice()
                && left.as_sequence().is_none()
            {
                let Value::Str(operator) = operator else {
                    return Err(invalid());
                };
                return DomainItem::from_parts(left.to_term()?, operator, right.to_term()?);
            }
            if parts.is_empty() {
                return Err(invalid());
            }
            domain_items(parts).map(DomainItem::Group)
        }
        _ => Err(invalid()),
    }
}

fn write_items(out: &mut String, items: &[Value]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_repr(out);
    }
}

fn write_quoted(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

/// `str(value)`: strings print bare, everything else as its repr.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}
