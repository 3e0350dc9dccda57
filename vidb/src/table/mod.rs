use crate::error::{Result, VidbError};
use crate::row::{Record, Row};
use crate::schema::Schema;
use crate::validation;
use std::fmt;

/// A named, schema-checked sequence of rows.
///
/// Rows are addressed by their position. Ids are derived on every read and
/// never stored, so they shift if rows are ever reordered or removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    schema: Schema,
    rows: Vec<Row>,
    validate: bool,
}

impl Table {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Table {
            name: name.into(),
            schema,
            rows: Vec::new(),
            validate: true,
        }
    }

    /// Rebuild a table from previously-persisted rows without re-checking them.
    pub(crate) fn from_parts(name: impl Into<String>, schema: Schema, rows: Vec<Row>) -> Self {
        Table {
            name: name.into(),
            schema,
            rows,
            validate: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn validation_enabled(&self) -> bool {
        self.validate
    }

    /// Turn per-row schema checks on or off, e.g. for bulk loading trusted rows.
    pub fn set_validation(&mut self, enabled: bool) {
        self.validate = enabled;
    }

    /// Append a row, returning its derived id. On a schema violation the
    /// table is left unchanged.
    pub fn insert(&mut self, row: Row) -> Result<usize> {
        validation::check_storable(&self.name, &row)?;
        if self.validate {
            validation::check_row(&self.name, &self.schema, &row)?;
        }
        self.rows.push(row);
        Ok(self.rows.len() - 1)
    }

    /// Merge `changes` into the row at `id`. Only the changed keys are checked.
    pub fn update(&mut self, id: usize, changes: Row) -> Result<()> {
        validation::check_storable(&self.name, &changes)?;
        if self.validate {
            validation::check_changes(&self.name, &self.schema, &changes)?;
        }
        let row = self.rows.get_mut(id).ok_or_else(|| VidbError::RowNotFound {
            table: self.name.clone(),
            id,
        })?;
        row.merge(changes);
        Ok(())
    }

    pub fn get(&self, id: usize) -> Option<Record> {
        self.rows.get(id).map(|row| Record {
            row: row.clone(),
            id,
        })
    }

    /// Every row with its derived id, in table order.
    pub fn all(&self) -> Vec<Record> {
        self.select(|_| true)
    }

    /// Rows matching `predicate`, in table order. The predicate sees the
    /// derived id as well as the fields.
    pub fn select<F>(&self, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        self.rows
            .iter()
            .enumerate()
            .map(|(id, row)| Record {
                row: row.clone(),
                id,
            })
            .filter(|record| predicate(record))
            .collect()
    }

    pub fn listing(&self) -> TableListing {
        TableListing {
            name: self.name.clone(),
            schema: self.schema.clone(),
            records: self.all(),
        }
    }
}

/// Diagnostic snapshot of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableListing {
    pub name: String,
    pub schema: Schema,
    pub records: Vec<Record>,
}

impl fmt::Display for TableListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {}", self.name)?;
        write!(f, "   ")?;
        for (column, tag) in self.schema.columns() {
            write!(f, " {column}:{tag}")?;
        }
        writeln!(f)?;
        for record in &self.records {
            writeln!(f, "    {record}")?;
        }
        Ok(())
    }
}

/// Diagnostic snapshot of a whole database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub tables: Vec<TableListing>,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tables:")?;
        for table in &self.tables {
            write!(f, "{table}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;
    use crate::schema::TypeTag;
    use pretty_assertions::assert_eq;

    fn people() -> Table {
        Table::new(
            "people",
            Schema::new()
                .column("name", TypeTag::String)
                .column("age", TypeTag::Integer),
        )
    }

    #[test]
    fn test_single_insert_then_all() {
        let mut table = Table::new("t", Schema::new().column("x", TypeTag::Integer));
        assert_eq!(table.insert(Row::new().with("x", 1)).unwrap(), 0);
        let all: Vec<_> = table.all().iter().map(Record::to_json).collect();
        assert_eq!(all, vec![serde_json::json!({"x": 1, "id": 0})]);
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let mut table = people();
        table.insert(Row::new().with("name", "a").with("age", 1)).unwrap();
        table.insert(Row::new().with("name", "b").with("age", 2)).unwrap();

        table.update(0, Row::new().with("age", 10)).unwrap();

        let all = table.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 0);
        assert_eq!(all[0].get("age"), Some(Value::Integer(10)));
        assert_eq!(all[0].get("name"), Some(Value::from("a")));
        assert_eq!(all[1].id, 1);
        assert_eq!(all[1].row, Row::new().with("name", "b").with("age", 2));
    }

    #[test]
    fn test_rejected_insert_leaves_table_unchanged() {
        let mut table = people();
        table.insert(Row::new().with("name", "a").with("age", 1)).unwrap();
        let before = table.clone();

        let err = table
            .insert(Row::new().with("name", "b").with("age", "two"))
            .unwrap_err();
        assert!(matches!(err, VidbError::SchemaViolation { .. }));
        assert_eq!(table, before);

        assert!(table.insert(Row::new().with("name", "c")).is_err());
        assert_eq!(table, before);
    }

    #[test]
    fn test_rejected_update_leaves_row_unchanged() {
        let mut table = people();
        table.insert(Row::new().with("name", "a").with("age", 1)).unwrap();
        let before = table.clone();

        assert!(table.update(0, Row::new().with("age", "x")).is_err());
        assert!(table.update(0, Row::new().with("nickname", "x")).is_err());
        assert_eq!(table, before);
    }

    #[test]
    fn test_reserved_and_non_finite_rejected_with_validation_off() {
        let mut table = Table::new("t", Schema::new().column("v", TypeTag::Float));
        table.set_validation(false);
        table.insert(Row::new().with("v", 1.5)).unwrap();
        let before = table.clone();

        assert!(table.insert(Row::new().with("id", 99)).is_err());
        assert!(table.insert(Row::new().with("v", f64::NAN)).is_err());
        assert!(table.update(0, Row::new().with("id", 5)).is_err());
        assert!(table.update(0, Row::new().with("v", f64::INFINITY)).is_err());
        assert_eq!(table, before);

        let json = serde_json::to_string(&table.all()[0]).unwrap();
        assert_eq!(json, r#"{"v":1.5,"id":0}"#);
    }

    #[test]
    fn test_update_missing_row() {
        let mut table = people();
        let err = table.update(5, Row::new().with("age", 1)).unwrap_err();
        assert!(matches!(err, VidbError::RowNotFound { id: 5, .. }));
    }

    #[test]
    fn test_validation_toggle() {
        let mut table = people();
        table.set_validation(false);
        assert_eq!(table.insert(Row::new().with("anything", true)).unwrap(), 0);
        table.set_validation(true);
        assert!(table.insert(Row::new().with("anything", true)).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_select_sees_derived_id() {
        let mut table = people();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            table
                .insert(Row::new().with("name", *name).with("age", i as i64))
                .unwrap();
        }

        let odd = table.select(|r| r.id % 2 == 1);
        assert_eq!(odd.len(), 1);
        assert_eq!(odd[0].get("name"), Some(Value::from("b")));

        let named = table.select(|r| r.get("name") == Some(Value::from("c")));
        assert_eq!(named[0].id, 2);

        assert!(table.select(|r| r.get("age") == Some(Value::Integer(99))).is_empty());
    }

    #[test]
    fn test_listing_display() {
        let mut table = Table::new("t", Schema::new().column("x", TypeTag::Integer));
        table.insert(Row::new().with("x", 1)).unwrap();
        let listing = Listing {
            tables: vec![table.listing()],
        };
        assert_eq!(listing.to_string(), "Tables:\n  t\n    x:integer\n    0: x=1\n");
    }
}
