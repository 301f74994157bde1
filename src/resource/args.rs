//! Flat string map → typed argument value.
//!
//! # Responsibilities
//! - Describe an argument shape as a table of named fields
//! - Convert string values to each field's primitive kind
//! - Report the first field that fails to convert
//!
//! # Design Decisions
//! - Setters are plain fn pointers so tables are `Copy` and allocation-free per call
//! - Names match exactly and case-sensitively
//! - An empty value for a non-string field keeps the default

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Primitive kind a field converts its value to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    UInt,
    Float,
    Bool,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "string",
            FieldKind::Int => "signed integer",
            FieldKind::UInt => "unsigned integer",
            FieldKind::Float => "float",
            FieldKind::Bool => "boolean",
        };
        f.write_str(name)
    }
}

/// A value could not be converted to its field's kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("field {field:?} expects a {kind}, got {value:?}")]
pub struct ArgumentBindError {
    pub field: String,
    pub kind: FieldKind,
    pub value: String,
}

enum Setter<T> {
    String(fn(&mut T, String)),
    Int(fn(&mut T, i64)),
    UInt(fn(&mut T, u64)),
    Float(fn(&mut T, f64)),
    Bool(fn(&mut T, bool)),
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Setter<T> {}

/// One named, typed slot of an argument shape.
pub struct Field<T> {
    name: &'static str,
    setter: Setter<T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

impl<T> Field<T> {
    pub fn string(name: &'static str, set: fn(&mut T, String)) -> Self {
        Self { name, setter: Setter::String(set) }
    }

    pub fn int(name: &'static str, set: fn(&mut T, i64)) -> Self {
        Self { name, setter: Setter::Int(set) }
    }

    pub fn uint(name: &'static str, set: fn(&mut T, u64)) -> Self {
        Self { name, setter: Setter::UInt(set) }
    }

    pub fn float(name: &'static str, set: fn(&mut T, f64)) -> Self {
        Self { name, setter: Setter::Float(set) }
    }

    pub fn boolean(name: &'static str, set: fn(&mut T, bool)) -> Self {
        Self { name, setter: Setter::Bool(set) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> FieldKind {
        match self.setter {
            Setter::String(_) => FieldKind::String,
            Setter::Int(_) => FieldKind::Int,
            Setter::UInt(_) => FieldKind::UInt,
            Setter::Float(_) => FieldKind::Float,
            Setter::Bool(_) => FieldKind::Bool,
        }
    }

    fn apply(&self, target: &mut T, raw: &str) -> Result<(), ArgumentBindError> {
        let invalid = || ArgumentBindError {
            field: self.name.to_string(),
            kind: self.kind(),
            value: raw.to_string(),
        };

        if raw.is_empty() && self.kind() != FieldKind::String {
            return Ok(());
        }

        match self.setter {
            Setter::String(set) => set(target, raw.to_string()),
            Setter::Int(set) => set(target, raw.trim().parse().map_err(|_| invalid())?),
            Setter::UInt(set) => set(target, raw.trim().parse().map_err(|_| invalid())?),
            Setter::Float(set) => set(target, raw.trim().parse().map_err(|_| invalid())?),
            Setter::Bool(set) => set(target, parse_bool(raw).ok_or_else(invalid)?),
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// A type that can be filled from a flat string map.
///
/// ```
/// use endpoint_binder::resource::{Args, Field};
///
/// #[derive(Default)]
/// struct Paging {
///     page: u64,
///     filter: String,
/// }
///
/// impl Args for Paging {
///     fn fields() -> Vec<Field<Self>> {
///         vec![
///             Field::uint("page", |p: &mut Self, v: u64| p.page = v),
///             Field::string("filter", |p: &mut Self, v: String| p.filter = v),
///         ]
///     }
/// }
/// ```
pub trait Args: Default + Send + 'static {
    fn fields() -> Vec<Field<Self>>;
}

impl Args for () {
    fn fields() -> Vec<Field<Self>> {
        Vec::new()
    }
}

/// Compiled field table for one argument shape.
pub struct ArgsBinder<T> {
    fields: Arc<[Field<T>]>,
    init: fn() -> T,
}

impl<T> Clone for ArgsBinder<T> {
    fn clone(&self) -> Self {
        Self {
            fields: Arc::clone(&self.fields),
            init: self.init,
        }
    }
}

impl<T> fmt::Debug for ArgsBinder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields.iter()).finish()
    }
}

impl<T: Args> ArgsBinder<T> {
    /// Build the table from the shape's declared fields.
    pub fn compile() -> Self {
        Self::from_fields(T::fields())
    }
}

impl<T: Default> ArgsBinder<T> {
    pub fn from_fields(fields: Vec<Field<T>>) -> Self {
        Self {
            fields: fields.into(),
            init: T::default,
        }
    }
}

impl<T> ArgsBinder<T> {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    /// Produce a fresh value from `values`.
    pub fn bind(&self, values: &HashMap<String, String>) -> Result<T, ArgumentBindError> {
        let mut target = (self.init)();
        for field in self.fields.iter() {
            if let Some(raw) = values.get(field.name) {
                field.apply(&mut target, raw)?;
            }
        }
        Ok(target)
    }
}
