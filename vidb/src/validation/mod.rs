use crate::error::{Result, VidbError, Violation};
use crate::row::Row;
use crate::schema::{Schema, RESERVED_COLUMN};

/// Result of checking a row against a schema.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turn the first violation into a `SchemaViolation` error for `table`.
    pub fn into_result(self, table: &str) -> Result<()> {
        match self.violations.into_iter().next() {
            None => Ok(()),
            Some(violation) => Err(VidbError::SchemaViolation {
                table: table.to_string(),
                violation,
            }),
        }
    }
}

/// Validate a complete row: its key set must equal the schema's column set
/// and every value must carry the declared type tag.
pub fn validate_row(schema: &Schema, row: &Row) -> ValidationResult {
    let mut result = validate_present(schema, row);

    for (column, expected) in schema.columns() {
        if row.get(column).is_none() {
            result.violations.push(Violation::MissingColumn {
                column: column.to_string(),
                expected,
            });
        }
    }

    result
}

/// Validate a partial update: only the keys present are checked, and each
/// must be a declared column of the right type.
pub fn validate_changes(schema: &Schema, changes: &Row) -> ValidationResult {
    validate_present(schema, changes)
}

fn validate_present(schema: &Schema, row: &Row) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (column, value) in row.fields() {
        let actual = value.type_tag();
        match schema.get(column) {
            None => result.violations.push(Violation::UnknownColumn {
                column: column.to_string(),
                actual,
            }),
            Some(expected) if expected != actual => {
                result.violations.push(Violation::TypeMismatch {
                    column: column.to_string(),
                    expected,
                    actual,
                })
            }
            Some(_) => {}
        }
    }

    result
}

/// Checks that hold for every stored row, whether or not schema validation
/// is enabled: no reserved id column, and every float representable in JSON
/// (anywhere in the value, including nested lists and mappings).
pub fn validate_storable(row: &Row) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (column, value) in row.fields() {
        if column == RESERVED_COLUMN {
            result.violations.push(Violation::ReservedColumn {
                column: column.to_string(),
            });
        } else if !value.is_finite() {
            result.violations.push(Violation::NonFiniteFloat {
                column: column.to_string(),
            });
        }
    }

    result
}

/// Validate storability and convert the outcome to a `Result`.
pub fn check_storable(table: &str, row: &Row) -> Result<()> {
    let result = validate_storable(row);
    if !result.is_ok() {
        log::debug!("Row not storable in table '{table}': {:?}", result.violations);
    }
    result.into_result(table)
}

/// Validate a full row and convert the outcome to a `Result`.
pub fn check_row(table: &str, schema: &Schema, row: &Row) -> Result<()> {
    let result = validate_row(schema, row);
    if !result.is_ok() {
        log::debug!("Row rejected for table '{table}': {:?}", result.violations);
    }
    result.into_result(table)
}

/// Validate partial changes and convert the outcome to a `Result`.
pub fn check_changes(table: &str, schema: &Schema, changes: &Row) -> Result<()> {
    let result = validate_changes(schema, changes);
    if !result.is_ok() {
        log::debug!("Update rejected for table '{table}': {:?}", result.violations);
    }
    result.into_result(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;
    use crate::schema::{parse_schema_str, TypeTag};
    use std::collections::BTreeMap;

    fn test_schema() -> Schema {
        parse_schema_str(
            r#"{
                "name": "string",
                "age": "integer",
                "score": "float",
                "active": "boolean",
                "tags": "list",
                "meta": "mapping"
            }"#,
        )
        .unwrap()
    }

    fn full_row() -> Row {
        Row::new()
            .with("name", "Alice")
            .with("age", 30)
            .with("score", 9.5)
            .with("active", true)
            .with("tags", vec![Value::from("a")])
            .with("meta", BTreeMap::<String, Value>::new())
    }

    #[test]
    fn test_valid_row() {
        let result = validate_row(&test_schema(), &full_row());
        assert!(result.is_ok(), "Violations: {:?}", result.violations);
    }

    #[test]
    fn test_type_mismatch() {
        let mut row = full_row();
        row.insert("age", "thirty");
        let result = validate_row(&test_schema(), &row);
        assert_eq!(
            result.violations,
            vec![Violation::TypeMismatch {
                column: "age".into(),
                expected: TypeTag::Integer,
                actual: TypeTag::String,
            }]
        );
    }

    #[test]
    fn test_integer_is_not_float() {
        let mut row = full_row();
        row.insert("score", 9);
        let result = validate_row(&test_schema(), &row);
        assert!(!result.is_ok());
        assert_eq!(result.violations[0].column(), "score");
    }

    #[test]
    fn test_missing_column() {
        let row = Row::new().with("name", "Alice");
        let result = validate_row(&test_schema(), &row);
        assert!(!result.is_ok());
        assert!(result
            .violations
            .iter()
            .any(|v| matches!(v, Violation::MissingColumn { column, .. } if column == "age")));
    }

    #[test]
    fn test_unknown_column() {
        let mut row = full_row();
        row.insert("extra", 1);
        let result = validate_row(&test_schema(), &row);
        assert!(result
            .violations
            .iter()
            .any(|v| matches!(v, Violation::UnknownColumn { column, .. } if column == "extra")));
    }

    #[test]
    fn test_partial_changes() {
        let schema = test_schema();
        assert!(validate_changes(&schema, &Row::new().with("age", 31)).is_ok());
        assert!(!validate_changes(&schema, &Row::new().with("age", 31.0)).is_ok());
        assert!(!validate_changes(&schema, &Row::new().with("nope", 1)).is_ok());
    }

    #[test]
    fn test_storable_rejects_non_finite_floats() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = validate_storable(&Row::new().with("score", bad));
            assert_eq!(
                result.violations,
                vec![Violation::NonFiniteFloat {
                    column: "score".into()
                }]
            );
        }

        let nested = Row::new().with("tags", vec![Value::from(1.0), Value::from(f64::NAN)]);
        assert!(!validate_storable(&nested).is_ok());
        assert!(validate_storable(&full_row()).is_ok());
    }

    #[test]
    fn test_storable_rejects_reserved_column() {
        let err = check_storable("t", &Row::new().with("id", 99)).unwrap_err();
        assert_eq!(err.column(), Some("id"));
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_check_row_error_names_column() {
        let err = check_row("people", &test_schema(), &full_row().with("active", "yes"))
            .unwrap_err();
        assert_eq!(err.column(), Some("active"));
        let msg = err.to_string();
        assert!(msg.contains("people"));
        assert!(msg.contains("expected boolean, got string"));
    }
}
