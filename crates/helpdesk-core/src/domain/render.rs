//! Text and JSON forms of a domain.
//!
//! Text uses the Python-literal syntax that stored filters are written in.
//! JSON is an array of operator strings and `[field, operator, value]`
//! triples, with nested arrays for groups.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::write_quoted;
use super::{Domain, DomainError, DomainItem, Value};

impl fmt::Display for DomainItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("'&'"),
            Self::Or => f.write_str("'|'"),
            Self::Not => f.write_str("'!'"),
            Self::Leaf(cond) => {
                f.write_str("(")?;
                write_quoted(f, &cond.field)?;
                write!(f, ", '{}', {})", cond.operator, cond.value)
            }
            Self::Constant(true) => f.write_str("(1, '=', 1)"),
            Self::Constant(false) => f.write_str("(0, '=', 1)"),
            Self::Group(inner) => write!(f, "{inner}"),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.items().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        f.write_str("]")
    }
}

impl Serialize for DomainItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::And => serializer.serialize_str("&"),
            Self::Or => serializer.serialize_str("|"),
            Self::Not => serializer.serialize_str("!"),
            Self::Leaf(cond) => {
                let mut tup = serializer.serialize_tuple(3)?;
                tup.serialize_element(&cond.field)?;
                tup.serialize_element(cond.operator.as_str())?;
                tup.serialize_element(&cond.value)?;
                tup.end()
            }
            Self::Constant(flag) => {
                let mut tup = serializer.serialize_tuple(3)?;
                tup.serialize_element(&i64::from(*flag))?;
                tup.serialize_element("=")?;
                tup.serialize_element(&1i64)?;
                tup.end()
            }
            Self::Group(inner) => inner.serialize(serializer),
        }
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for item in self.items() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

/// Loosely-typed JSON node used while decoding.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNode {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<RawNode>),
    Null,
}

impl RawNode {
    fn into_value(self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::Int(i),
            Self::Float(x) => Value::Float(x),
            Self::Str(s) => Value::Str(s),
            Self::List(items) => Value::List(items.into_iter().map(Self::into_value).collect()),
            Self::Null => Value::Null,
        }
    }
}

fn item_from_node(node: RawNode) -> Result<DomainItem, DomainError> {
    match node {
        RawNode::Str(token) => DomainItem::from_operator_token(&token)
            .ok_or_else(|| DomainError::InvalidTerm(format!("'{token}'"))),
        RawNode::List(parts) => {
            if let [_, RawNode::Str(_), _] = parts.as_slice() {
                let mut it = parts.into_iter();
                match (it.next(), it.next(), it.next()) {
                    (Some(left), Some(RawNode::Str(op)), Some(right)) => {
                        DomainItem::from_parts(left.into_value(), &op, right.into_value())
                    }
                    _ => Err(DomainError::InvalidTerm("incomplete term".to_string())),
                }
            } else {
                parts
                    .into_iter()
                    .map(item_from_node)
                    .collect::<Result<Domain, _>>()
                    .map(DomainItem::Group)
            }
        }
        other => Err(DomainError::InvalidTerm(other.into_value().to_string())),
    }
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let nodes = Vec::<RawNode>::deserialize(deserializer)?;
        nodes
            .into_iter()
            .map(item_from_node)
            .collect::<Result<Self, _>>()
            .map_err(de::Error::custom)
    }
}
