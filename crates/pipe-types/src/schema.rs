//! # Struct Specs and Values
//!
//! A [`StructSpec`] is an ordered list of named, typed fields. Payloads are
//! represented dynamically as a [`StructValue`] whose fields follow the
//! spec's order, so one generic codec routine serves every message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Shared reference to a struct spec.
pub type SpecRef = Rc<StructSpec>;

/// Wire kind of a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Bool,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Double,
    String,
    Bytes,
    /// Homogeneous array of non-nullable elements.
    Array(Box<FieldKind>),
    /// Nested struct.
    Struct(SpecRef),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Int32 => write!(f, "int32"),
            FieldKind::Uint32 => write!(f, "uint32"),
            FieldKind::Int64 => write!(f, "int64"),
            FieldKind::Uint64 => write!(f, "uint64"),
            FieldKind::Double => write!(f, "double"),
            FieldKind::String => write!(f, "string"),
            FieldKind::Bytes => write!(f, "bytes"),
            FieldKind::Array(inner) => write!(f, "array<{}>", inner),
            FieldKind::Struct(spec) => write!(f, "{}", spec.name()),
        }
    }
}

/// One named field of a struct spec.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Nullable fields may hold [`Value::Null`].
    pub nullable: bool,
}

/// Ordered field list describing one payload struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StructSpec {
    name: String,
    fields: Vec<FieldSpec>,
}

impl StructSpec {
    /// Start an empty spec.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a required field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            nullable: false,
        });
        self
    }

    /// Append a nullable field.
    #[must_use]
    pub fn nullable_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            nullable: true,
        });
        self
    }

    /// Finish into a shareable reference.
    pub fn build(self) -> SpecRef {
        Rc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Map positional values onto this spec's fields.
    ///
    /// Missing trailing values become `Null`; the codec rejects them later if
    /// the field is required.
    pub fn value_from_args(
        &self,
        args: Vec<Value>,
    ) -> Result<StructValue, crate::errors::CodecError> {
        if args.len() > self.fields.len() {
            return Err(crate::errors::CodecError::TooManyValues {
                spec: self.name.clone(),
                expected: self.fields.len(),
                got: args.len(),
            });
        }
        let mut args = args.into_iter();
        let fields = self
            .fields
            .iter()
            .map(|field| (field.name.clone(), args.next().unwrap_or(Value::Null)))
            .collect();
        Ok(StructValue { fields })
    }
}

/// Dynamic payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Struct(StructValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Uint32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Struct payload with fields in spec order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructValue {
    fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; replaces an existing field of the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Field values in order, dropping the names.
    pub fn into_values(self) -> Vec<Value> {
        self.fields.into_iter().map(|(_, v)| v).collect()
    }
}

impl From<StructValue> for Value {
    fn from(v: StructValue) -> Self {
        Value::Struct(v)
    }
}
