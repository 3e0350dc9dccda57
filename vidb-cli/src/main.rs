use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use vidb::schema::parse_column_decl;
use vidb::store::LOG_FILE;
use vidb::{Database, Record, Row, Schema, Value};

/// ViDB CLI — operate on a ViDB data directory from the command line
#[derive(Parser)]
#[command(name = "vidb", version, about)]
struct Cli {
    /// Path to the data directory (default: current directory)
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    /// Width used for diagnostic banners
    #[arg(long, default_value_t = 80)]
    width: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Create a table
    CreateTable {
        /// Table name
        name: String,
        /// Column declarations (e.g. --column age=integer)
        #[arg(long = "column")]
        columns: Vec<String>,
    },

    /// Drop a table and all its rows
    DropTable {
        /// Table name
        name: String,
    },

    /// Print every table's schema and rows
    Tables,

    /// List every row of a table with its id
    All {
        /// Table name
        table: String,
    },

    /// List rows whose fields equal the given values (all of them, or any
    /// with --any). Without filters every row matches.
    Select {
        /// Table name
        table: String,
        /// Equality filters (e.g. --where name=Alice, --where id=0)
        #[arg(long = "where", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
        /// Match rows satisfying at least one filter instead of all
        #[arg(long)]
        any: bool,
    },

    /// Insert a new row
    Insert {
        /// Table name
        table: String,
        /// Field values (e.g. --field name="Alice Chen")
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Skip schema checks for this insert
        #[arg(long)]
        no_validate: bool,
    },

    /// Update fields of an existing row
    Update {
        /// Table name
        table: String,
        /// Row id
        id: usize,
        /// Field values to update (e.g. --field age=31)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Keep reloading from disk and print the tables after every poll
    Watch {
        /// Stop after this many polls (default: run until interrupted)
        #[arg(long)]
        cycles: Option<u64>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| {
        format!("Invalid key=value pair: no '=' found in '{s}'")
    })?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.dir.exists() {
        return Err(format!("Directory does not exist: {}", cli.dir.display()).into());
    }

    let sink = vidb::file_sink(cli.dir.join(LOG_FILE))?;
    let db = Database::initialize(&cli.dir, sink, cli.width);

    match cli.command {
        Command::CreateTable { name, columns } => {
            let schema = columns
                .iter()
                .map(|decl| parse_column_decl(decl))
                .collect::<vidb::Result<Schema>>()?;
            db.create_table(&name, schema)?;
            print_output(&serde_json::json!({ "ok": true, "created": name }), &cli.format);
        }

        Command::DropTable { name } => {
            db.drop_table(&name)?;
            print_output(&serde_json::json!({ "ok": true, "dropped": name }), &cli.format);
        }

        Command::Tables => {
            print!("{}", db.list_tables());
        }

        Command::All { table } => {
            let rows = db.table(&table)?.all()?;
            print_output(&records_to_value(&rows), &cli.format);
        }

        Command::Select { table, filters, any } => {
            let wanted: Vec<(String, serde_json::Value)> = filters
                .iter()
                .map(|(k, v)| (k.clone(), parse_field_value(v)))
                .collect();
            let rows = db
                .table(&table)?
                .select(|record| record_matches(record, &wanted, any))?;
            print_output(&records_to_value(&rows), &cli.format);
        }

        Command::Insert {
            table,
            fields,
            no_validate,
        } => {
            let row = fields_to_row(&fields)?;
            let handle = db.table(&table)?;
            if no_validate {
                handle.set_validation(false)?;
            }
            let result = handle.insert(row);
            if no_validate {
                handle.set_validation(true)?;
            }
            let id = result?;
            print_output(&serde_json::json!({ "ok": true, "id": id }), &cli.format);
        }

        Command::Update { table, id, fields } => {
            let changes = fields_to_row(&fields)?;
            db.table(&table)?.update(id, changes)?;
            print_output(&serde_json::json!({ "ok": true, "id": id }), &cli.format);
        }

        Command::Watch { cycles } => {
            let _poll = db.poll()?;
            let mut seen = 0u64;
            loop {
                std::thread::sleep(db.config().poll_interval());
                print!("{}", db.list_tables());
                seen += 1;
                if cycles.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn print_output(value: &serde_json::Value, format: &OutputFormat) {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
    };
    match rendered {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => log::error!("Failed to render output: {e}"),
    }
}

/// Equality filters combined with AND, or with OR when `any` is set.
/// An empty filter list matches everything.
fn record_matches(record: &Record, wanted: &[(String, serde_json::Value)], any: bool) -> bool {
    if wanted.is_empty() {
        return true;
    }
    let field_equals = |(column, expected): &(String, serde_json::Value)| {
        record.get(column).map(|v| v.to_json()).as_ref() == Some(expected)
    };
    if any {
        wanted.iter().any(field_equals)
    } else {
        wanted.iter().all(field_equals)
    }
}

fn records_to_value(records: &[Record]) -> serde_json::Value {
    serde_json::Value::Array(records.iter().map(Record::to_json).collect())
}

/// Parse a field as JSON (numbers, booleans, arrays, objects), falling back
/// to a plain string.
fn parse_field_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn fields_to_row(fields: &[(String, String)]) -> vidb::Result<Row> {
    let mut row = Row::new();
    for (key, raw) in fields {
        let value: Value = serde_json::from_value(parse_field_value(raw))?;
        row.insert(key.clone(), value);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("name=Alice=B").unwrap(),
            ("name".to_string(), "Alice=B".to_string())
        );
        assert!(parse_key_value("name").is_err());
    }

    #[test]
    fn test_fields_to_row_types() {
        let row = fields_to_row(&[
            ("n".into(), "3".into()),
            ("f".into(), "1.5".into()),
            ("s".into(), "hello".into()),
            ("b".into(), "true".into()),
            ("l".into(), "[1,2]".into()),
        ])
        .unwrap();
        assert_eq!(row.get("n"), Some(&Value::Integer(3)));
        assert_eq!(row.get("f"), Some(&Value::Float(1.5)));
        assert_eq!(row.get("s"), Some(&Value::from("hello")));
        assert_eq!(row.get("b"), Some(&Value::Boolean(true)));
        assert_eq!(row.get("l").map(Value::type_tag), Some(vidb::TypeTag::List));
    }

    #[test]
    fn test_fields_to_row_rejects_null() {
        assert!(fields_to_row(&[("x".into(), "null".into())]).is_err());
    }

    #[test]
    fn test_record_matches_combinators() {
        let record = Record {
            row: Row::new().with("name", "alice").with("age", 30),
            id: 2,
        };
        fn filters(pairs: &[(&str, &str)]) -> Vec<(String, serde_json::Value)> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), parse_field_value(v)))
                .collect()
        }

        assert!(record_matches(&record, &[], false));
        assert!(record_matches(&record, &[], true));

        let both = filters(&[("name", "alice"), ("age", "30")]);
        assert!(record_matches(&record, &both, false));

        let one_wrong = filters(&[("name", "bob"), ("id", "2")]);
        assert!(!record_matches(&record, &one_wrong, false));
        assert!(record_matches(&record, &one_wrong, true));

        let none = filters(&[("name", "bob"), ("age", "31")]);
        assert!(!record_matches(&record, &none, true));
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "vidb", "--dir", "/tmp/x", "insert", "people", "--field", "age=3", "--no-validate",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Insert { no_validate: true, .. }
        ));
    }
}
