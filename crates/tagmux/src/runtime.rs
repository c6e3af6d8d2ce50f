//! Async front for the scheduler: one task owns the pool and ticks it, and
//! each slot is exposed as a private call handle.
//!
//! The pool task never blocks on a caller. Offers are polled non-blockingly
//! each tick and deliveries are pushed the same way; consumer readiness is
//! simply free capacity in that slot's delivery channel. Channels are one
//! deep in both directions, mirroring the one-deep slot buffers, and a
//! handle needs `&mut self` to call, so a second outstanding request per
//! slot is unrepresentable.

use std::sync::Arc;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::RuntimeConfig;
use crate::engine::Engine;
use crate::error::PoolError;
use crate::pool::{PoolStats, SlotPool};
use crate::port::{Response, Tag};

/// Errors surfaced to callers of [`SlotHandle::call`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The pool task failed and shut down.
    #[error("scheduler failed: {0}")]
    Pool(#[from] PoolError),

    /// The pool task is gone (shut down or panicked).
    #[error("scheduler task stopped")]
    Closed,
}

/// Private async handle to one slot.
pub struct SlotHandle<T> {
    tag: Tag,
    offer_tx: mpsc::Sender<T>,
    delivery_rx: mpsc::Receiver<Response<T>>,
    error_rx: watch::Receiver<Option<PoolError>>,
}

impl<T> SlotHandle<T> {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Submit a payload and await the matching response.
    ///
    /// Holds `&mut self` for the full round trip, which is what enforces
    /// the single-outstanding-request-per-tag invariant at compile time.
    pub async fn call(&mut self, payload: T) -> Result<T, RuntimeError> {
        if self.offer_tx.send(payload).await.is_err() {
            return Err(self.closed_error());
        }
        match self.delivery_rx.recv().await {
            Some(response) => Ok(response.payload),
            None => Err(self.closed_error()),
        }
    }

    fn closed_error(&self) -> RuntimeError {
        match self.error_rx.borrow().clone() {
            Some(error) => RuntimeError::Pool(error),
            None => RuntimeError::Closed,
        }
    }
}

/// The running pool task.
pub struct Runtime {
    shutdown: Arc<Notify>,
    task: JoinHandle<Result<PoolStats, PoolError>>,
}

impl Runtime {
    /// Move the pool into its own task and hand back one handle per slot.
    pub fn spawn<T, E>(
        pool: SlotPool<T, E>,
        config: RuntimeConfig,
    ) -> (Self, Vec<SlotHandle<T>>)
    where
        T: Send + 'static,
        E: Engine<T> + Send + 'static,
    {
        let num_slots = pool.num_slots();
        let (error_tx, error_rx) = watch::channel(None);

        let mut handles = Vec::with_capacity(num_slots);
        let mut offer_rxs = Vec::with_capacity(num_slots);
        let mut delivery_txs = Vec::with_capacity(num_slots);
        for i in 0..num_slots {
            let (offer_tx, offer_rx) = mpsc::channel(1);
            let (delivery_tx, delivery_rx) = mpsc::channel(1);
            handles.push(SlotHandle {
                tag: Tag::new(i),
                offer_tx,
                delivery_rx,
                error_rx: error_rx.clone(),
            });
            offer_rxs.push(offer_rx);
            delivery_txs.push(delivery_tx);
        }

        let shutdown = Arc::new(Notify::new());
        tracing::debug!(
            num_slots,
            tick_interval = ?config.tick_interval(),
            "Scheduler runtime starting"
        );
        let task = tokio::spawn(drive(
            pool,
            offer_rxs,
            delivery_txs,
            error_tx,
            Arc::clone(&shutdown),
            config,
        ));

        (Self { shutdown, task }, handles)
    }

    /// Stop the pool task and return its lifetime counters.
    pub async fn shutdown(self) -> Result<PoolStats, RuntimeError> {
        self.shutdown.notify_one();
        match self.task.await {
            Ok(result) => result.map_err(RuntimeError::Pool),
            Err(_) => Err(RuntimeError::Closed),
        }
    }
}

async fn drive<T, E>(
    mut pool: SlotPool<T, E>,
    mut offer_rxs: Vec<mpsc::Receiver<T>>,
    delivery_txs: Vec<mpsc::Sender<Response<T>>>,
    error_tx: watch::Sender<Option<PoolError>>,
    shutdown: Arc<Notify>,
    config: RuntimeConfig,
) -> Result<PoolStats, PoolError>
where
    T: Send + 'static,
    E: Engine<T> + Send + 'static,
{
    let num_slots = pool.num_slots();
    let mut offers: Vec<Option<T>> =
        std::iter::repeat_with(|| None).take(num_slots).collect();

    let mut interval = tokio::time::interval(config.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.notified() => {
                tracing::debug!("Scheduler runtime shutting down");
                break;
            }

            _ = interval.tick() => {
                for (i, offer_rx) in offer_rxs.iter_mut().enumerate() {
                    if offers[i].is_none()
                        && let Ok(payload) = offer_rx.try_recv()
                    {
                        offers[i] = Some(payload);
                    }
                }

                let ready: Vec<bool> = delivery_txs
                    .iter()
                    .map(|tx| !tx.is_closed() && tx.capacity() > 0)
                    .collect();

                match pool.step(&mut offers, &ready) {
                    Ok(report) => {
                        for response in report.deliveries {
                            let i = response.tag.index();
                            if delivery_txs[i].try_send(response).is_err() {
                                // Capacity was checked before the step, so
                                // the handle must have been dropped mid-step.
                                tracing::debug!(tag = i, "Dropping delivery for dead handle");
                            }
                        }
                    }
                    Err(error) => {
                        tracing::error!(%error, "Scheduler step failed");
                        let _ = error_tx.send(Some(error.clone()));
                        return Err(error);
                    }
                }
            }
        }
    }

    Ok(pool.stats())
}
