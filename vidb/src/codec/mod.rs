//! Whole-file encoding of the table set.
//!
//! The data file is a JSON object keyed by table name, in table order. Each
//! value is an array whose first element is the schema (column to type tag)
//! and whose remaining elements are the rows, without ids:
//!
//! ```json
//! {"people": [{"age": "integer", "name": "string"}, {"age": 30, "name": "Alice"}]}
//! ```

use crate::error::{Result, VidbError};
use crate::row::Row;
use crate::schema::{parse_schema_value, RESERVED_COLUMN};
use crate::table::Table;
use serde::de::{MapAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Encode every table into the data file's text form.
pub fn encode(tables: &[Table]) -> Result<String> {
    Ok(serde_json::to_string(&EncodedTables(tables))?)
}

/// Decode the data file's text form. An unknown type tag, a malformed row,
/// or malformed JSON fails the whole decode.
pub fn decode(text: &str) -> Result<Vec<Table>> {
    let raw: RawTables = serde_json::from_str(text)
        .map_err(|e| VidbError::DataLoad(format!("malformed data file: {e}")))?;

    raw.0
        .into_iter()
        .map(|(name, value)| decode_table(name, value))
        .collect()
}

fn decode_table(name: String, value: serde_json::Value) -> Result<Table> {
    let serde_json::Value::Array(items) = value else {
        return Err(VidbError::DataLoad(format!(
            "table '{name}' must be an array of [schema, rows...]"
        )));
    };

    let mut items = items.into_iter();
    let schema_value = items
        .next()
        .ok_or_else(|| VidbError::DataLoad(format!("table '{name}' has no schema entry")))?;
    let schema = parse_schema_value(&schema_value)
        .map_err(|e| VidbError::DataLoad(format!("table '{name}': {e}")))?;

    let rows = items
        .enumerate()
        .map(|(id, value)| -> Result<Row> {
            let mut row = Row::from_json(value)
                .map_err(|e| VidbError::DataLoad(format!("table '{name}' row {id}: {e}")))?;
            if row.remove(RESERVED_COLUMN).is_some() {
                log::warn!("Dropped stored '{RESERVED_COLUMN}' field from table '{name}' row {id}");
            }
            Ok(row)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Table::from_parts(name, schema, rows))
}

struct EncodedTables<'a>(&'a [Table]);

impl Serialize for EncodedTables<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for table in self.0 {
            map.serialize_entry(table.name(), &EncodedTable(table))?;
        }
        map.end()
    }
}

struct EncodedTable<'a>(&'a Table);

impl Serialize for EncodedTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let table = self.0;
        let mut seq = serializer.serialize_seq(Some(table.len() + 1))?;
        seq.serialize_element(table.schema())?;
        for row in table.rows() {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

/// Top-level object read in document order; a repeated name keeps its first
/// position and its last value.
struct RawTables(Vec<(String, serde_json::Value)>);

impl<'de> Deserialize<'de> for RawTables {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RawTablesVisitor;

        impl<'de> Visitor<'de> for RawTablesVisitor {
            type Value = RawTables;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping table names to [schema, rows...]")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<RawTables, A::Error> {
                let mut entries: Vec<(String, serde_json::Value)> = Vec::new();
                while let Some((name, value)) = access.next_entry::<String, serde_json::Value>()? {
                    match entries.iter_mut().find(|(existing, _)| *existing == name) {
                        Some(entry) => entry.1 = value,
                        None => entries.push((name, value)),
                    }
                }
                Ok(RawTables(entries))
            }
        }

        deserializer.deserialize_map(RawTablesVisitor)
    }
}
