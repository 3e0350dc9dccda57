use crate::error::Result;
use crate::store::{Database, Shared};
use std::sync::Weak;
use std::thread::{self, JoinHandle};

/// Background task that periodically reloads a database from disk, so edits
/// made to `config.vidb` or `db.json` by another process become visible.
///
/// Each cycle acquires the database gate, reloads, releases, then sleeps for
/// the poll interval of the config it just loaded. A failing cycle is
/// reported and the loop carries on.
///
/// There is no stop operation. The thread holds only a weak reference to
/// the store and exits on its next wake-up once every [`Database`] handle
/// has been dropped, or with the process.
pub struct PollLoop {
    /// Handle to the background thread running the poll cycles
    thread: JoinHandle<()>,
}

impl PollLoop {
    /// Spawn the poll thread for `db`. The first reload happens immediately.
    pub fn spawn(db: &Database) -> Result<Self> {
        let shared = db.downgrade();
        let thread = thread::Builder::new()
            .name("vidb-poll".into())
            .spawn(move || run(shared))?;
        Ok(PollLoop { thread })
    }

    /// True once the owning database has been dropped and the loop noticed.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

fn run(shared: Weak<Shared>) {
    log::info!("Poll loop started");
    loop {
        let Some(store) = shared.upgrade() else {
            break;
        };
        let delay = store.poll_cycle();
        // Don't keep the store alive while sleeping
        drop(store);
        log::debug!("Next poll in {}s", delay.as_secs());
        thread::sleep(delay);
    }
    log::info!("Poll loop stopped: database dropped");
}
