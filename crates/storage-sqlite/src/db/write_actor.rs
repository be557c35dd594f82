use super::DbPool;
use crate::errors::StorageError;
use diesel::SqliteConnection;
use log::{debug, error, warn};
use std::any::Any;
use tokio::sync::{mpsc, oneshot};
use walletcache_core::errors::{DatabaseError, Error, Result};
use walletcache_core::live::{LiveQueryBus, TableChange};

// Type alias for the job to be executed by the writer actor.
// It takes a mutable reference to a SqliteConnection and returns a Result.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type Reply = oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>;

struct WriteRequest {
    job: Job<Box<dyn Any + Send + 'static>>,
    // Published to the live query bus once the job has committed.
    changes: Vec<TableChange>,
    reply: Reply,
}

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<WriteRequest>,
}

impl WriteHandle {
    /// Executes a database job on the writer actor's dedicated connection.
    ///
    /// The job runs inside an immediate transaction. Jobs are applied in the
    /// order they are submitted. When the transaction commits, `changes` are
    /// published to the live query bus before this call returns, so any
    /// refresh it triggers observes the write.
    pub async fn exec<F, T>(&self, changes: Vec<TableChange>, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send(WriteRequest {
                job: Box::new(move |c| job(c).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                changes,
                reply: ret_tx,
            })
            .await
            .map_err(|_| {
                Error::Database(DatabaseError::WriterUnavailable(
                    "writer actor has stopped".to_string(),
                ))
            })?;

        let boxed = ret_rx.await.map_err(|_| {
            Error::Database(DatabaseError::WriterUnavailable(
                "writer actor dropped the reply".to_string(),
            ))
        })??;

        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::Unexpected("writer actor returned an unexpected type".to_string()))
    }
}

/// Spawns a background Tokio task that acts as the single writer to the database.
/// This actor owns one database connection from the pool and processes write jobs serially.
///
/// # Arguments
/// * `pool`: The database connection pool.
/// * `bus`: Receives the table changes of every committed job.
/// * `capacity`: Bound of the job queue.
///
/// # Returns
/// A `WriteHandle` to send jobs to the spawned actor.
pub fn spawn_writer(pool: DbPool, bus: LiveQueryBus, capacity: usize) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<WriteRequest>(capacity);

    tokio::spawn(async move {
        // Held for the lifetime of the actor.
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("Writer actor could not acquire a database connection: {}", e);
                return;
            }
        };

        while let Some(WriteRequest {
            job,
            changes,
            reply,
        }) = rx.recv().await
        {
            let result: Result<Box<dyn Any + Send + 'static>> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(|e: StorageError| e.into());

            match &result {
                Ok(_) => bus.publish(&changes),
                Err(e) => warn!("Write job rolled back: {}", e),
            }

            // The requester may have been cancelled; nothing to do then.
            let _ = reply.send(result);
        }
        debug!("Writer actor stopped: all handles dropped");
    });

    WriteHandle { tx }
}
