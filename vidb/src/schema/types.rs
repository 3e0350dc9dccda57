use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Column name reserved for the derived row id in listings.
pub const RESERVED_COLUMN: &str = "id";

/// Declared type of a column.
///
/// Persisted by canonical name; the short legacy spellings (`int`, `str`,
/// `bool`, `dict`) are accepted when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeTag {
    Integer,
    Float,
    String,
    Boolean,
    List,
    Mapping,
}

impl TypeTag {
    pub const ALL: [TypeTag; 6] = [
        TypeTag::Integer,
        TypeTag::Float,
        TypeTag::String,
        TypeTag::Boolean,
        TypeTag::List,
        TypeTag::Mapping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Boolean => "boolean",
            TypeTag::List => "list",
            TypeTag::Mapping => "mapping",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "integer" | "int" => Ok(TypeTag::Integer),
            "float" => Ok(TypeTag::Float),
            "string" | "str" => Ok(TypeTag::String),
            "boolean" | "bool" => Ok(TypeTag::Boolean),
            "list" => Ok(TypeTag::List),
            "mapping" | "dict" => Ok(TypeTag::Mapping),
            other => Err(format!("unknown type tag '{other}'")),
        }
    }
}

impl TryFrom<String> for TypeTag {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeTag> for String {
    fn from(tag: TypeTag) -> Self {
        tag.as_str().to_string()
    }
}

/// Per-table mapping from column name to its required type tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: BTreeMap<String, TypeTag>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column declaration.
    pub fn column(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        self.columns.insert(name.into(), tag);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, tag: TypeTag) -> Option<TypeTag> {
        self.columns.insert(name.into(), tag)
    }

    pub fn get(&self, name: &str) -> Option<TypeTag> {
        self.columns.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, TypeTag)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, TypeTag)> for Schema {
    fn from_iter<I: IntoIterator<Item = (S, TypeTag)>>(iter: I) -> Self {
        Schema {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
