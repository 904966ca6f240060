use crate::decoder;
use crate::materializer;
use crate::source::RawLog;
use crate::store::{Database, DeltaRepository};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Work item flowing through the queue. Delivery is at least once: the same
/// log or address may arrive multiple times and handlers must tolerate it.
/// Materialize tasks are deliberately not deduplicated; recomputation is
/// idempotent, so redundant execution is safe.
#[derive(Debug)]
pub enum TaskKind {
    DecodeAndWrite(RawLog),
    Materialize(Address),
}

#[derive(Debug)]
struct Task {
    kind: TaskKind,
    attempts: u32,
}

/// A task that exhausted its retry budget. Routed to the dead-letter channel
/// so operators see it; never silently dropped.
#[derive(Debug)]
pub struct DeadLetter {
    pub kind: TaskKind,
    pub attempts: u32,
    pub error: String,
}

/// Cloneable producer side of the queue.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: UnboundedSender<Task>,
    in_flight: Arc<AtomicUsize>,
}

impl DispatchHandle {
    pub fn decode_and_write(&self, log: RawLog) -> Result<()> {
        self.send_new(TaskKind::DecodeAndWrite(log))
    }

    pub fn materialize(&self, address: Address) -> Result<()> {
        self.send_new(TaskKind::Materialize(address))
    }

    /// Tasks queued or executing right now. Reaches zero only once every
    /// task and all tasks it fanned out have settled.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn send_new(&self, kind: TaskKind) -> Result<()> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.tx.send(Task { kind, attempts: 0 }).map_err(|_| {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            anyhow::anyhow!("task queue closed")
        })
    }

    /// Redelivery of a task already counted in `in_flight`.
    fn resend(&self, task: Task) -> Result<(), Task> {
        self.tx.send(task).map_err(|e| e.0)
    }

    fn settle(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded pool of workers draining an in-process at-least-once queue.
/// Failed or timed-out tasks are redelivered up to the attempt budget, then
/// routed to the dead-letter channel.
pub struct Dispatcher {
    handle: DispatchHandle,
    workers: Vec<JoinHandle<()>>,
    dead_rx: Option<UnboundedReceiver<DeadLetter>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Dispatcher {
    pub fn start(
        db: Database,
        workers: usize,
        task_timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = DispatchHandle {
            tx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        };
        let rx = Arc::new(Mutex::new(rx));

        let mut worker_handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            worker_handles.push(tokio::spawn(worker_loop(
                worker_id,
                db.clone(),
                handle.clone(),
                Arc::clone(&rx),
                dead_tx.clone(),
                shutdown_rx.clone(),
                task_timeout,
                max_attempts,
            )));
        }

        Dispatcher {
            handle,
            workers: worker_handles,
            dead_rx: Some(dead_rx),
            shutdown_tx,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Receiver for tasks that exhausted their retry budget. Yields the
    /// channel once; later calls return None.
    pub fn take_dead_letters(&mut self) -> Option<UnboundedReceiver<DeadLetter>> {
        self.dead_rx.take()
    }

    /// Signal workers to stop and wait for them. Tasks already in hand
    /// finish; queued tasks are discarded.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        join_all(self.workers).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    db: Database,
    handle: DispatchHandle,
    rx: Arc<Mutex<UnboundedReceiver<Task>>>,
    dead_tx: UnboundedSender<DeadLetter>,
    mut shutdown_rx: watch::Receiver<bool>,
    task_timeout: Duration,
    max_attempts: u32,
) {
    loop {
        let task = {
            let mut rx = rx.lock().await;
            tokio::select! {
                task = rx.recv() => task,
                _ = shutdown_rx.changed() => None,
            }
        };
        let Some(mut task) = task else { break };

        task.attempts += 1;
        let outcome = timeout(task_timeout, run_task(&db, &handle, &task.kind)).await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            // the blocking statement behind a timed-out task may still
            // finish; idempotent writes make the overlap safe
            Err(_) => Some(format!("timed out after {task_timeout:?}")),
        };

        match failure {
            None => handle.settle(),
            Some(error) if task.attempts < max_attempts => {
                warn!(
                    "Worker {}: task failed (attempt {}/{}), redelivering: {}",
                    worker_id, task.attempts, max_attempts, error
                );
                if let Err(task) = handle.resend(task) {
                    dead_letter(&dead_tx, task, error);
                    handle.settle();
                }
            }
            Some(error) => {
                error!(
                    "Worker {}: task exhausted {} attempt(s), dead-lettering: {}",
                    worker_id, task.attempts, error
                );
                dead_letter(&dead_tx, task, error);
                handle.settle();
            }
        }
    }
}

fn dead_letter(dead_tx: &UnboundedSender<DeadLetter>, task: Task, error: String) {
    let dead = DeadLetter {
        kind: task.kind,
        attempts: task.attempts,
        error,
    };
    if let Err(unsent) = dead_tx.send(dead) {
        error!("Dead-letter channel closed, task lost: {:?}", unsent.0);
    }
}

async fn run_task(db: &Database, handle: &DispatchHandle, kind: &TaskKind) -> Result<()> {
    match kind {
        TaskKind::DecodeAndWrite(log) => {
            let deltas = decoder::decode_deltas(log);
            if deltas.is_empty() {
                return Ok(());
            }

            // every decoded address gets a materialize trigger even when the
            // insert deduplicates to a no-op: an earlier attempt may have
            // crashed between the write and the trigger
            let touched: BTreeSet<Address> = deltas.iter().map(|d| d.address).collect();

            let db = db.clone();
            let inserted = tokio::task::spawn_blocking(move || -> Result<usize> {
                let conn = db.lock()?;
                DeltaRepository::new(&conn).insert_batch(&deltas)
            })
            .await
            .context("delta write task panicked")??;

            debug!(
                "Wrote {} new delta(s), {} address(es) touched",
                inserted,
                touched.len()
            );

            for address in touched {
                handle.materialize(address)?;
            }
            Ok(())
        }
        TaskKind::Materialize(address) => {
            let db = db.clone();
            let address = *address;
            tokio::task::spawn_blocking(move || {
                materializer::materialize_address(&db, &address).map(|_| ())
            })
            .await
            .context("materialize task panicked")?
        }
    }
}
