use std::collections::BTreeMap;

use super::Value;

/// A field of a [`RecordView`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Scalar(Value),
    /// Many-to-one relation. An unset relation is an empty view.
    One(RecordView),
    /// One-to-many / many-to-many relation.
    Many(Vec<RecordView>),
}

/// Read-only snapshot of a record, the shape both the domain matcher and
/// the script sandbox see.
///
/// A view with `id == None` is an empty record: it is falsy, and every
/// field read through it is empty as well.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordView {
    model: String,
    id: Option<i64>,
    fields: BTreeMap<String, Field>,
}

impl RecordView {
    pub fn new(model: impl Into<String>, id: i64) -> Self {
        Self {
            model: model.into(),
            id: Some(id),
            fields: BTreeMap::new(),
        }
    }

    /// The empty record of `model`.
    pub fn empty(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: None,
            fields: BTreeMap::new(),
        }
    }

    /// A bare reference (id only), or an empty record when `id` is `None`.
    pub fn reference(model: impl Into<String>, id: Option<i64>) -> Self {
        Self {
            model: model.into(),
            id,
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), Field::Scalar(value.into()));
        self
    }

    #[must_use]
    pub fn with_one(mut self, name: impl Into<String>, related: Self) -> Self {
        self.fields.insert(name.into(), Field::One(related));
        self
    }

    #[must_use]
    pub fn with_many(mut self, name: impl Into<String>, related: Vec<Self>) -> Self {
        self.fields.insert(name.into(), Field::Many(related));
        self
    }

    pub fn set(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub const fn id(&self) -> Option<i64> {
        self.id
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.id.is_none()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The id as a domain value, `False` for the empty record.
    #[must_use]
    pub fn id_value(&self) -> Value {
        self.id.map_or(Value::Bool(false), Value::Int)
    }
}
