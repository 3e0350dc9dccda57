use crate::codec;
use crate::config::{self, Config, CONFIG_FILE};
use crate::diagnostics::{Diagnostics, LogSink, DEFAULT_DISPLAY_WIDTH};
use crate::error::{Result, VidbError};
use crate::gate::LockGate;
use crate::poll::PollLoop;
use crate::row::{Record, Row};
use crate::schema::{Schema, RESERVED_COLUMN};
use crate::table::{Listing, Table};
use crate::util::write_atomic;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Name of the persisted table state inside a database directory.
pub const DATA_FILE: &str = "db.json";

/// Name of the conventional diagnostic log inside a database directory.
pub const LOG_FILE: &str = "log.txt";

/// The main entry point for ViDB.
///
/// Owns a directory, its config, and every table in it. All reads and writes
/// go through one whole-store gate, shared with the background [`PollLoop`].
/// Cloning a `Database` yields another handle to the same store.
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    root: PathBuf,
    gate: LockGate<State>,
    diagnostics: Diagnostics,
}

#[derive(Debug, Default)]
struct State {
    config: Config,
    tables: Vec<Table>,
}

impl State {
    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| VidbError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| t.name() == name)
            .ok_or_else(|| VidbError::TableNotFound(name.to_string()))
    }
}

impl Database {
    /// Open the database at `directory`, creating the directory, config and
    /// data file as needed.
    ///
    /// Never fails: every load problem is reported through the sink and the
    /// console, and the instance continues with defaults for whatever could
    /// not be loaded.
    pub fn initialize(directory: impl Into<PathBuf>, sink: LogSink, display_width: usize) -> Self {
        let shared = Arc::new(Shared {
            root: directory.into(),
            gate: LockGate::new(State::default()),
            diagnostics: Diagnostics::new(sink, display_width),
        });
        shared.load();
        Database { shared }
    }

    /// [`Database::initialize`] with a discarding sink and default width.
    pub fn open(directory: impl Into<PathBuf>) -> Self {
        Self::initialize(directory, crate::noop_sink(), DEFAULT_DISPLAY_WIDTH)
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    pub fn config(&self) -> Config {
        self.shared.gate.acquire().config.clone()
    }

    /// Re-run the load sequence, replacing all in-memory state with what is
    /// on disk.
    pub fn reload_from_disk(&self) {
        self.shared.load();
    }

    /// Rewrite the data file from the current in-memory state.
    pub fn persist(&self) -> Result<()> {
        let state = self.shared.gate.acquire();
        self.shared.persist_locked(&state)
    }

    /// Register an empty table and persist.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<()> {
        if name.is_empty() {
            return Err(VidbError::InvalidSchema("table name must not be empty".into()));
        }
        if schema.contains(RESERVED_COLUMN) {
            return Err(VidbError::InvalidSchema(format!(
                "column '{RESERVED_COLUMN}' is reserved for the derived row id"
            )));
        }

        let mut state = self.shared.gate.acquire();
        if state.table(name).is_ok() {
            return Err(VidbError::TableExists(name.to_string()));
        }

        let columns: Vec<String> = schema
            .columns()
            .map(|(column, tag)| format!("{column}:{tag}"))
            .collect();
        state.tables.push(Table::new(name, schema));
        self.shared
            .diagnostics
            .trace(&format!("Created table {name}, types: {}", columns.join(", ")));

        self.shared.commit(&state);
        Ok(())
    }

    /// Remove a table and all its rows, then persist.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut state = self.shared.gate.acquire();
        let index = state
            .tables
            .iter()
            .position(|t| t.name() == name)
            .ok_or_else(|| VidbError::TableNotFound(name.to_string()))?;
        state.tables.remove(index);
        self.shared.diagnostics.trace(&format!("Dropped table {name}"));

        self.shared.commit(&state);
        Ok(())
    }

    /// Snapshot of every table's schema and rows with derived ids.
    pub fn list_tables(&self) -> Listing {
        let state = self.shared.gate.acquire();
        Listing {
            tables: state.tables.iter().map(Table::listing).collect(),
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        let state = self.shared.gate.acquire();
        state.tables.iter().map(|t| t.name().to_string()).collect()
    }

    /// Get a handle to a table. The handle resolves the table by name on
    /// every call, so it observes reloads and drops.
    pub fn table(&self, name: &str) -> Result<TableRef<'_>> {
        self.shared.gate.acquire().table(name)?;
        Ok(TableRef {
            db: self,
            name: name.to_string(),
        })
    }

    /// Start the background reload loop for this database.
    pub fn poll(&self) -> Result<PollLoop> {
        PollLoop::spawn(self)
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }

    #[cfg(test)]
    fn gate_busy(&self) -> bool {
        self.shared.gate.is_busy()
    }
}

impl Shared {
    fn load(&self) {
        let mut state = self.gate.acquire();
        self.load_locked(&mut state);
    }

    fn load_locked(&self, state: &mut State) {
        self.diagnostics
            .trace(&format!("Loading database from {}", self.root.display()));

        if let Err(e) = std::fs::create_dir_all(&self.root) {
            let err = VidbError::DataLoad(format!(
                "failed to create directory {}: {e}",
                self.root.display()
            ));
            self.diagnostics.report("Uploading", &err);
            return;
        }

        state.config = config::load_or_default(&self.root.join(CONFIG_FILE), &self.diagnostics);

        let mut tables = self.load_tables();
        for table in &mut tables {
            if let Ok(previous) = state.table(table.name()) {
                table.set_validation(previous.validation_enabled());
            }
        }
        state.tables = tables;
    }

    fn load_tables(&self) -> Vec<Table> {
        let path = self.root.join(DATA_FILE);
        match std::fs::read_to_string(&path) {
            Ok(text) => match codec::decode(&text) {
                Ok(tables) => tables,
                Err(e) => {
                    self.diagnostics.report("Uploading", &e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.diagnostics
                    .notice(&format!("No {DATA_FILE} found, replacing with empty"));
                if let Err(e) = self.write_data(&path, "{}") {
                    self.diagnostics.report("Uploading", &e);
                }
                Vec::new()
            }
            Err(e) => {
                let err = VidbError::DataLoad(format!("failed to read {}: {e}", path.display()));
                self.diagnostics.report("Uploading", &err);
                Vec::new()
            }
        }
    }

    /// Encode and write every table. Takes the state borrowed from a held
    /// gate guard, so it cannot run unlocked.
    fn persist_locked(&self, state: &State) -> Result<()> {
        self.diagnostics.trace("Updating database");
        let text = codec::encode(&state.tables)?;
        self.write_data(&self.root.join(DATA_FILE), &text)
    }

    /// Persist after a mutation. A failed write is reported, not returned:
    /// memory stays ahead of disk until the next successful persist.
    fn commit(&self, state: &State) {
        if let Err(e) = self.persist_locked(state) {
            self.diagnostics.report("Updating", &e);
        }
    }

    fn write_data(&self, path: &Path, text: &str) -> Result<()> {
        write_atomic(path, text).map_err(|source| VidbError::Persist {
            path: path.display().to_string(),
            source,
        })
    }

    /// One background cycle: reload under the gate, then report how long to
    /// sleep according to the config just loaded.
    pub(crate) fn poll_cycle(&self) -> Duration {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.load())) {
            let err = VidbError::PollCycle(panic_message(payload.as_ref()));
            self.diagnostics.report("Polling", &err);
        }
        self.gate.acquire().config.poll_interval()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "reload panicked".to_string()
    }
}

/// A handle to a table within a database.
///
/// Every operation holds the database gate from lookup through persist.
pub struct TableRef<'a> {
    db: &'a Database,
    name: String,
}

impl<'a> TableRef<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate and append a row, then persist. Returns the row's derived id.
    pub fn insert(&self, row: Row) -> Result<usize> {
        let shared = &self.db.shared;
        let mut state = shared.gate.acquire();
        let table = state.table_mut(&self.name)?;
        shared.diagnostics.trace(&format!(
            "Inserting into {} (checks {})",
            self.name,
            if table.validation_enabled() { "on" } else { "off" }
        ));
        let id = table.insert(row)?;
        shared.commit(&state);
        Ok(id)
    }

    /// Merge `changes` into the row at `id`, then persist.
    pub fn update(&self, id: usize, changes: Row) -> Result<()> {
        let shared = &self.db.shared;
        let mut state = shared.gate.acquire();
        state.table_mut(&self.name)?.update(id, changes)?;
        shared
            .diagnostics
            .trace(&format!("Updated row {id} of {}", self.name));
        shared.commit(&state);
        Ok(())
    }

    pub fn get(&self, id: usize) -> Result<Record> {
        let state = self.db.shared.gate.acquire();
        state
            .table(&self.name)?
            .get(id)
            .ok_or_else(|| VidbError::RowNotFound {
                table: self.name.clone(),
                id,
            })
    }

    /// Rows matching `predicate`, with derived ids, in table order.
    pub fn select<F>(&self, predicate: F) -> Result<Vec<Record>>
    where
        F: Fn(&Record) -> bool,
    {
        let state = self.db.shared.gate.acquire();
        Ok(state.table(&self.name)?.select(predicate))
    }

    /// Every row with its derived id, in table order.
    pub fn all(&self) -> Result<Vec<Record>> {
        let state = self.db.shared.gate.acquire();
        Ok(state.table(&self.name)?.all())
    }

    pub fn schema(&self) -> Result<Schema> {
        let state = self.db.shared.gate.acquire();
        Ok(state.table(&self.name)?.schema().clone())
    }

    pub fn len(&self) -> Result<usize> {
        let state = self.db.shared.gate.acquire();
        Ok(state.table(&self.name)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Turn per-row schema checks on or off. Kept across reloads while the
    /// table exists; not persisted.
    pub fn set_validation(&self, enabled: bool) -> Result<()> {
        let mut state = self.db.shared.gate.acquire();
        state.table_mut(&self.name)?.set_validation(enabled);
        Ok(())
    }
}
