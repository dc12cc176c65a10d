//! Core data types for featureplan
//!
//! [`DataType`] is the type system shared by schemas, features, the expression
//! oracle and aggregation functions. [`Schema`] is an ordered list of typed
//! fields describing a physical table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Data type of a feature or a table field
///
/// Serialized as an upper-case type string so that definitions stay readable:
/// - `DataType::Int64` → `"INT64"`
/// - `DataType::Vector(String)` → `"VECTOR<STRING>"`
/// - `DataType::Map(String, Int64)` → `"MAP<STRING, INT64>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    Bytes,
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    /// Point in time, independent of the textual timestamp format
    Timestamp,
    /// Ordered collection of values of the element type
    Vector(Box<DataType>),
    /// Key/value mapping
    Map(Box<DataType>, Box<DataType>),
}

impl DataType {
    pub fn vector(element: DataType) -> Self {
        Self::Vector(Box::new(element))
    }

    pub fn map(key: DataType, value: DataType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// True for integer and floating point types
    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    /// Position in the widening order INT32 < INT64 < FLOAT32 < FLOAT64
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            Self::Int32 => Some(0),
            Self::Int64 => Some(1),
            Self::Float32 => Some(2),
            Self::Float64 => Some(3),
            _ => None,
        }
    }

    /// Returns the wider of two numeric types, or None if either is not numeric
    pub fn wider_numeric(&self, other: &DataType) -> Option<DataType> {
        let (a, b) = (self.numeric_rank()?, other.numeric_rank()?);
        Some(if a >= b { self.clone() } else { other.clone() })
    }

    /// Common type two values can be unified into
    ///
    /// Identical types unify to themselves, numerics widen.
    pub fn unify(&self, other: &DataType) -> Option<DataType> {
        if self == other {
            return Some(self.clone());
        }
        self.wider_numeric(other)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes => write!(f, "BYTES"),
            Self::String => write!(f, "STRING"),
            Self::Int32 => write!(f, "INT32"),
            Self::Int64 => write!(f, "INT64"),
            Self::Float32 => write!(f, "FLOAT32"),
            Self::Float64 => write!(f, "FLOAT64"),
            Self::Bool => write!(f, "BOOL"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Vector(element) => write!(f, "VECTOR<{}>", element),
            Self::Map(key, value) => write!(f, "MAP<{}, {}>", key, value),
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let upper = s.to_ascii_uppercase();

        if let Some(inner) = strip_generic(&upper, "VECTOR") {
            return Ok(Self::vector(inner.parse()?));
        }

        if let Some(inner) = strip_generic(&upper, "MAP") {
            let (key, value) = split_top_level_comma(inner)
                .ok_or_else(|| format!("MAP type '{}' must have a key and a value type", s))?;
            return Ok(Self::map(key.parse()?, value.parse()?));
        }

        match upper.as_str() {
            "BYTES" => Ok(Self::Bytes),
            "STRING" => Ok(Self::String),
            "INT32" => Ok(Self::Int32),
            "INT64" => Ok(Self::Int64),
            "FLOAT32" => Ok(Self::Float32),
            "FLOAT64" => Ok(Self::Float64),
            "BOOL" => Ok(Self::Bool),
            "TIMESTAMP" => Ok(Self::Timestamp),
            _ => Err(format!("Unknown data type '{}'", s)),
        }
    }
}

/// Returns the text between `NAME<` and the trailing `>`
fn strip_generic<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('<')?
        .strip_suffix('>')
}

/// Splits `K, V` on the first comma that is not nested inside angle brackets
fn split_top_level_comma(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&s[..i], &s[i + 1..])),
            _ => {}
        }
    }
    None
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

/// A named, typed column of a [`Schema`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub dtype: DataType,
}

/// Ordered field list of a physical table
///
/// # Examples
///
/// ```
/// use featureplan_core::{DataType, Schema};
///
/// let schema = Schema::builder()
///     .column("user_id", DataType::Int64)
///     .column("amount", DataType::Float64)
///     .build();
/// assert_eq!(schema.field_names(), vec!["user_id", "amount"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Data type of the named field, if present
    pub fn field_type(&self, name: &str) -> Option<&DataType> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.dtype)
    }
}

/// Builder for [`Schema`]; a repeated column name replaces the earlier type
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn column(mut self, name: impl Into<String>, dtype: DataType) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.dtype = dtype,
            None => self.fields.push(Field { name, dtype }),
        }
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.fields)
    }
}
