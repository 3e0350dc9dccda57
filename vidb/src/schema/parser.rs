use super::types::{Schema, TypeTag};
use crate::error::{Result, VidbError};

/// Parse a schema from its JSON text form, e.g. `{"x": "integer"}`.
pub fn parse_schema_str(content: &str) -> Result<Schema> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    parse_schema_value(&value)
}

/// Parse a schema from an already-decoded JSON value.
/// Every tag must be a recognized type name.
pub fn parse_schema_value(value: &serde_json::Value) -> Result<Schema> {
    let map = value
        .as_object()
        .ok_or_else(|| VidbError::InvalidSchema("schema must be a JSON object".into()))?;

    let mut schema = Schema::new();
    for (column, tag) in map {
        let tag_str = tag.as_str().ok_or_else(|| {
            VidbError::InvalidSchema(format!("type tag for column '{column}' must be a string"))
        })?;
        let tag: TypeTag = tag_str
            .parse()
            .map_err(|e| VidbError::InvalidSchema(format!("column '{column}': {e}")))?;
        schema.insert(column.clone(), tag);
    }
    Ok(schema)
}

/// Parse a `name=type` column declaration, as accepted on the command line.
pub fn parse_column_decl(decl: &str) -> Result<(String, TypeTag)> {
    let (name, tag) = decl.split_once('=').ok_or_else(|| {
        VidbError::InvalidSchema(format!("invalid column declaration '{decl}': expected name=type"))
    })?;
    let tag: TypeTag = tag
        .trim()
        .parse()
        .map_err(|e| VidbError::InvalidSchema(format!("column '{name}': {e}")))?;
    Ok((name.trim().to_string(), tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_tags() {
        let schema = parse_schema_str(
            r#"{"a": "integer", "b": "float", "c": "string", "d": "boolean", "e": "list", "f": "mapping"}"#,
        )
        .unwrap();
        assert_eq!(schema.len(), 6);
        assert_eq!(schema.get("a"), Some(TypeTag::Integer));
        assert_eq!(schema.get("f"), Some(TypeTag::Mapping));
    }

    #[test]
    fn test_parse_legacy_tags() {
        let schema =
            parse_schema_str(r#"{"a": "int", "b": "str", "c": "bool", "d": "dict"}"#).unwrap();
        assert_eq!(schema.get("a"), Some(TypeTag::Integer));
        assert_eq!(schema.get("b"), Some(TypeTag::String));
        assert_eq!(schema.get("c"), Some(TypeTag::Boolean));
        assert_eq!(schema.get("d"), Some(TypeTag::Mapping));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let err = parse_schema_str(r#"{"a": "complex"}"#).unwrap_err();
        assert!(err.to_string().contains("complex"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(parse_schema_str(r#"["integer"]"#).is_err());
        assert!(parse_schema_str(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn test_parse_column_decl() {
        assert_eq!(
            parse_column_decl("age=integer").unwrap(),
            ("age".to_string(), TypeTag::Integer)
        );
        assert!(parse_column_decl("age").is_err());
        assert!(parse_column_decl("age=date").is_err());
    }

    #[test]
    fn test_tag_serde_uses_canonical_names() {
        let json = serde_json::to_string(&TypeTag::Mapping).unwrap();
        assert_eq!(json, "\"mapping\"");
        let tag: TypeTag = serde_json::from_str("\"dict\"").unwrap();
        assert_eq!(tag, TypeTag::Mapping);
        assert!(serde_json::from_str::<TypeTag>("\"NoneType\"").is_err());
    }
}
