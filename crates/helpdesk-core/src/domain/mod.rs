//! Structured record filters ("domains").
//!
//! A domain is a prefix-notation boolean expression: an ordered list of
//! `&`, `|`, `!` operators and `(field, operator, value)` leaves. Adjacent
//! terms without an operator are implicitly AND-ed, which [`Domain::normalize`]
//! makes explicit.
//!
//! ```text
//! ['&', ('active', '=', True), '|', ('partner_id', '=', 7), ('partner_id', '=', False)]
//! ```
//!
//! Two shapes exist beyond the classic grammar:
//! - [`DomainItem::Constant`] is the always-true `(1, '=', 1)` or always-false
//!   `(0, '=', 1)` leaf, used as the unit of [`and_all`] / [`or_all`].
//! - [`DomainItem::Group`] is a nested sub-list produced by user scripts. It
//!   counts as a single term and matches as the conjunction of its contents.

mod combine;
mod matching;
mod operator;
mod record;
mod render;
mod value;

pub use combine::{and_all, or_all};
pub use operator::Operator;
pub use record::{Field, RecordView};
pub use value::Value;

/// Errors raised while building, normalizing or evaluating a domain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("unknown domain operator '{0}'")]
    UnknownOperator(String),

    #[error("domain {0} is syntactically not correct")]
    Malformed(String),

    #[error("invalid domain term: {0}")]
    InvalidTerm(String),

    #[error("invalid field '{field}' on model {model}")]
    UnknownField { model: String, field: String },
}

/// A single `(field, operator, value)` leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// One token of a prefix-notation domain.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainItem {
    And,
    Or,
    Not,
    Leaf(Condition),
    Constant(bool),
    Group(Domain),
}

impl DomainItem {
    /// Operator tokens as they appear in stored filters.
    #[must_use]
    pub fn from_operator_token(token: &str) -> Option<Self> {
        match token {
            "&" => Some(Self::And),
            "|" => Some(Self::Or),
            "!" => Some(Self::Not),
            _ => None,
        }
    }

    /// Build a term from the three parts of a tuple.
    ///
    /// `(1, '=', 1)` and `(0, '=', 1)` become constants. Any other term must
    /// have a string field name and a known operator.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidTerm`] or [`DomainError::UnknownOperator`]
    /// when the parts do not form a valid leaf.
    pub fn from_parts(left: Value, operator: &str, right: Value) -> Result<Self, DomainError> {
        if operator == "=" {
            if let (Some(l @ (0 | 1)), Value::Int(1)) = (left.as_int(), &right) {
                if !matches!(left, Value::Bool(_)) {
                    return Ok(Self::Constant(l == 1));
                }
            }
        }
        let Value::Str(field) = left else {
            return Err(DomainError::InvalidTerm(format!(
                "({left}, '{operator}', {right})"
            )));
        };
        if field.trim().is_empty() {
            return Err(DomainError::InvalidTerm(format!(
                "('', '{operator}', {right})"
            )));
        }
        Ok(Self::Leaf(Condition {
            field,
            operator: operator.parse()?,
            value: right,
        }))
    }
}

/// An ordered list of domain tokens.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Domain(Vec<DomainItem>);

impl Domain {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub const fn from_items(items: Vec<DomainItem>) -> Self {
        Self(items)
    }

    /// A domain with a single leaf.
    pub fn leaf(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self(vec![DomainItem::Leaf(Condition::new(field, operator, value))])
    }

    /// `[(1, '=', 1)]`, the unit of conjunction.
    #[must_use]
    pub fn true_domain() -> Self {
        Self(vec![DomainItem::Constant(true)])
    }

    /// `[(0, '=', 1)]`, the unit of disjunction.
    #[must_use]
    pub fn false_domain() -> Self {
        Self(vec![DomainItem::Constant(false)])
    }

    #[must_use]
    pub fn items(&self) -> &[DomainItem] {
        &self.0
    }

    #[must_use]
    pub fn into_items(self) -> Vec<DomainItem> {
        self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, item: DomainItem) {
        self.0.push(item);
    }

    /// True for `[]` and `[(1, '=', 1)]`: neither restricts anything.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty() || self.0 == [DomainItem::Constant(true)]
    }

    /// Make implicit conjunctions explicit.
    ///
    /// An empty domain normalizes to `[(1, '=', 1)]`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Malformed`] when operators are missing operands.
    pub fn normalize(&self) -> Result<Self, DomainError> {
        if self.0.is_empty() {
            return Ok(Self::true_domain());
        }

        let mut result: Vec<DomainItem> = Vec::with_capacity(self.0.len() + 1);
        let mut prefix = 0usize;
        let mut expected: i64 = 1;
        for item in &self.0 {
            if expected == 0 {
                prefix += 1;
                expected = 1;
            }
            match item {
                DomainItem::And | DomainItem::Or => expected += 1,
                DomainItem::Not => {}
                _ => expected -= 1,
            }
            result.push(item.clone());
        }

        if expected != 0 {
            return Err(DomainError::Malformed(self.to_string()));
        }

        let mut items = vec![DomainItem::And; prefix];
        items.extend(result);
        Ok(Self(items))
    }

    /// Whether the exact leaf `(field, operator, value)` occurs anywhere,
    /// including inside nested groups at any depth.
    ///
    /// The search is structural: operators around the leaf are not
    /// interpreted, so a leaf under `|` or `!` still counts.
    #[must_use]
    pub fn contains_condition(&self, field: &str, operator: Operator, value: &Value) -> bool {
        self.0.iter().any(|item| match item {
            DomainItem::Leaf(cond) => {
                cond.field == field && cond.operator == operator && cond.value.loose_eq(value)
            }
            DomainItem::Group(inner) => inner.contains_condition(field, operator, value),
            _ => false,
        })
    }

    /// Whether any leaf (at any depth) filters on `field`.
    #[must_use]
    pub fn mentions_field(&self, field: &str) -> bool {
        self.0.iter().any(|item| match item {
            DomainItem::Leaf(cond) => {
                cond.field == field || cond.field.split('.').next() == Some(field)
            }
            DomainItem::Group(inner) => inner.mentions_field(field),
            _ => false,
        })
    }
}

impl From<Vec<DomainItem>> for Domain {
    fn from(items: Vec<DomainItem>) -> Self {
        Self(items)
    }
}

impl FromIterator<DomainItem> for Domain {
    fn from_iter<T: IntoIterator<Item = DomainItem>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
