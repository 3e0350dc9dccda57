//! ViDB: an embedded store of typed, named tables persisted as one JSON file
//! and kept in sync with that file by a background reload loop.
//!
//! ```no_run
//! use vidb::{Database, Row, Schema, TypeTag};
//!
//! let db = Database::open("data");
//! db.create_table("people", Schema::new().column("name", TypeTag::String))?;
//! let people = db.table("people")?;
//! let id = people.insert(Row::new().with("name", "Alice"))?;
//! assert_eq!(people.all()?[id].id, id);
//! let _poll = db.poll()?;
//! # Ok::<(), vidb::VidbError>(())
//! ```

pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod gate;
pub mod poll;
pub mod row;
pub mod schema;
pub mod store;
pub mod table;
pub mod validation;
mod util;

pub use config::Config;
pub use diagnostics::{file_sink, noop_sink, LogSink};
pub use error::{Result, VidbError, Violation};
pub use gate::LockGate;
pub use poll::PollLoop;
pub use row::{Record, Row, Value};
pub use schema::{Schema, TypeTag};
pub use store::{Database, TableRef};
pub use table::{Listing, Table, TableListing};
