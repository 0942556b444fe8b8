use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod clock;
pub(crate) mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use clock::{Clock, SystemClock};
pub use models::{Alert, Collection, NewAlert, NewReading, NewRecord, Reading, Record};

use crate::error::StoreError;
use migrations::run_migrations;

/// Window size used by `recent` when the caller does not pass a limit.
pub const DEFAULT_RECENT_LIMIT: usize = 20;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

/// A dedicated thread owning one SQLite connection. Commands run in order,
/// so every task submitted to the same worker is serialized.
struct Worker {
    sender: mpsc::Sender<DbCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let mut guard = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

type InitFn = fn(&mut Connection) -> Result<(), StoreError>;

fn configure_connection(conn: &mut Connection) -> Result<(), StoreError> {
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(StoreError::unavailable)?;
    Ok(())
}

fn initialize_schema(conn: &mut Connection) -> Result<(), StoreError> {
    configure_connection(conn)?;
    run_migrations(conn).map_err(|err| StoreError::unavailable(format!("{err:#}")))
}

fn spawn_worker(name: &str, path: &Path, init: InitFn) -> Result<Worker, StoreError> {
    let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
    let (ready_tx, ready_rx) = mpsc::channel();
    let path_for_thread = path.to_path_buf();
    let thread_name = name.to_string();

    let handle = thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let mut conn = match Connection::open(&path_for_thread) {
                Ok(connection) => connection,
                Err(err) => {
                    let _ = ready_tx.send(Err(StoreError::unavailable(format!(
                        "failed to open SQLite database: {err}"
                    ))));
                    return;
                }
            };

            if ready_tx.send(init(&mut conn)).is_err() {
                error!("{thread_name}: initialization receiver dropped before ready signal");
                return;
            }

            while let Ok(command) = command_rx.recv() {
                match command {
                    DbCommand::Execute(task) => task(&mut conn),
                    DbCommand::Shutdown => break,
                }
            }

            info!("{thread_name} thread shutting down");
        })
        .map_err(|err| StoreError::unavailable(format!("failed to spawn {name}: {err}")))?;

    let worker = Worker {
        sender: command_tx,
        handle: Mutex::new(Some(handle)),
    };

    // Dropping `worker` on failure joins the thread, which has already exited.
    ready_rx.recv().map_err(|_| {
        StoreError::unavailable("database worker exited before signaling readiness")
    })??;

    Ok(worker)
}

struct DatabaseInner {
    readings: Worker,
    alerts: Worker,
    clock: Arc<dyn Clock>,
}

/// Durable store for readings and alerts.
///
/// Each collection has its own worker thread and connection, so a burst of
/// reading writes never queues alert writes behind it. Cloning is cheap and
/// shares the workers.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn open(db_path: PathBuf) -> Result<Self, StoreError> {
        Self::open_with_clock(db_path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(db_path: PathBuf, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    StoreError::unavailable(format!(
                        "failed to create database directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }

        // Migrations run on the first worker; the second only opens once the
        // schema is in place.
        let readings = spawn_worker("tracker-db-readings", &db_path, initialize_schema)?;
        let alerts = spawn_worker("tracker-db-alerts", &db_path, configure_connection)?;

        info!("Database initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                readings,
                alerts,
                clock,
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock.clone()
    }

    /// Runs `task` on the worker that owns `collection`.
    pub(crate) async fn execute<F, T>(&self, collection: Collection, task: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let worker = match collection {
            Collection::Readings => &self.inner.readings,
            Collection::Alerts => &self.inner.alerts,
        };
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        worker.sender.send(command).map_err(|err| {
            StoreError::unavailable(format!("failed to send command to DB thread: {err}"))
        })?;

        reply_rx
            .await
            .map_err(|_| StoreError::unavailable("database thread terminated unexpectedly"))?
    }
}
