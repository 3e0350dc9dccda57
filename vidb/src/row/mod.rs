mod value;

pub use value::Value;

use crate::error::Result;
use crate::schema::RESERVED_COLUMN;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One record: column name to value. Rows never carry their own id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.fields.remove(column)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overwrite this row's fields with those present in `changes`.
    pub fn merge(&mut self, changes: Row) {
        self.fields.extend(changes.fields);
    }

    /// Build a row from a JSON object. Nulls and non-object input are rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        Row {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A row as observed by a reader, annotated with its derived id.
///
/// The id is the row's current position in its table and is only valid until
/// the table's row sequence next changes shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    pub row: Row,
    pub id: usize,
}

impl Record {
    /// Look up a field. `"id"` resolves to the derived id.
    pub fn get(&self, column: &str) -> Option<Value> {
        if column == RESERVED_COLUMN {
            return i64::try_from(self.id).ok().map(Value::Integer);
        }
        self.row.get(column).cloned()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut json = self.row.to_json();
        if let serde_json::Value::Object(map) = &mut json {
            map.insert(RESERVED_COLUMN.to_string(), serde_json::Value::from(self.id));
        }
        json
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.id)?;
        for (k, v) in self.row.fields() {
            write!(f, " {k}={v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_json_includes_id() {
        let record = Record {
            row: Row::new().with("x", 1),
            id: 0,
        };
        assert_eq!(record.to_json(), serde_json::json!({"x": 1, "id": 0}));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({"x": 1, "id": 0})
        );
    }

    #[test]
    fn test_record_get_resolves_id() {
        let record = Record {
            row: Row::new().with("name", "alice"),
            id: 3,
        };
        assert_eq!(record.get("id"), Some(Value::Integer(3)));
        assert_eq!(record.get("name"), Some(Value::from("alice")));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_merge_overwrites_only_given_fields() {
        let mut row = Row::new().with("a", 1).with("b", "keep");
        row.merge(Row::new().with("a", 2));
        assert_eq!(row, Row::new().with("a", 2).with("b", "keep"));
    }

    #[test]
    fn test_from_json_rejects_null_fields() {
        assert!(Row::from_json(serde_json::json!({"a": null})).is_err());
        assert!(Row::from_json(serde_json::json!([1, 2])).is_err());
        let row = Row::from_json(serde_json::json!({"a": 1.5})).unwrap();
        assert_eq!(row.get("a"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn test_record_display() {
        let record = Record {
            row: Row::new().with("a", 1).with("b", "x"),
            id: 2,
        };
        assert_eq!(record.to_string(), "2: a=1 b=x");
    }
}
