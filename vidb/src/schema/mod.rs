mod parser;
mod types;

pub use parser::{parse_column_decl, parse_schema_str, parse_schema_value};
pub use types::{Schema, TypeTag, RESERVED_COLUMN};
