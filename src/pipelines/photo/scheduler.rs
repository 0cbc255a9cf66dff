// SPDX-License-Identifier: GPL-3.0-only

//! Save scheduler
//!
//! One dedicated worker thread drains a bounded FIFO of [`SaveRequest`]s.
//! Producers block while the queue is full, so at most `capacity + 1`
//! requests are resident (queued plus the one being processed).
//!
//! The in-flight count is raised before a request is enqueued and lowered only
//! after the worker has finished with it, so [`Scheduler::wait_until_done`]
//! never observes a request that is about to be queued as "done".

use super::processing::Finisher;
use super::request::{FinishedArtifact, SaveRequest};
use crate::app::ApplicationState;
use crate::config::SaverConfig;
use crate::errors::{AppError, AppResult, PhotoError};
use crate::storage::StorageSink;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tracing::{debug, error, info};

/// What a submission resulted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted for background processing; failures surface only as app state
    Queued,
    /// Processed on the calling thread
    Finished(FinishedArtifact),
}

/// Number of accepted requests not yet fully processed
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    drained: Condvar,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn increment(&self) {
        *self.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.lock();
        let Some(next) = count.checked_sub(1) else {
            panic!("in-flight save count went negative");
        };
        *count = next;
        if next == 0 {
            debug!("All saves finished");
        }
        self.drained.notify_all();
    }

    fn get(&self) -> usize {
        *self.lock()
    }

    fn wait_until_zero(&self) {
        let mut count = self.lock();
        // Loop guards against spurious wake-ups
        while *count > 0 {
            count = self
                .drained
                .wait(count)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

/// Bounded background save queue with a single worker
pub struct Scheduler {
    sender: Mutex<Option<SyncSender<SaveRequest>>>,
    in_flight: Arc<InFlight>,
    queued: Arc<AtomicUsize>,
    finisher: Arc<Finisher>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler and start its worker thread
    pub fn new(
        storage: Arc<dyn StorageSink>,
        state: Arc<dyn ApplicationState>,
        config: SaverConfig,
    ) -> AppResult<Self> {
        let capacity = config.effective_queue_capacity();
        let finisher = Arc::new(Finisher::new(storage, state, config));
        let in_flight = Arc::new(InFlight::default());
        let queued = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = sync_channel::<SaveRequest>(capacity);

        let worker = {
            let finisher = Arc::clone(&finisher);
            let in_flight = Arc::clone(&in_flight);
            let queued = Arc::clone(&queued);
            std::thread::Builder::new()
                .name("photo-saver".to_string())
                .spawn(move || worker_main(receiver, finisher, in_flight, queued))?
        };

        info!(capacity, "Save scheduler started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            in_flight,
            queued,
            finisher,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Submit a request
    ///
    /// With `background` the request is queued (blocking while the queue is
    /// full) and `Queued` is returned. Otherwise all earlier background work is
    /// drained first and the request is processed on the calling thread.
    pub fn submit(&self, request: SaveRequest, background: bool) -> Result<SubmitOutcome, AppError> {
        if !background {
            self.wait_until_done();
            debug!(kind = request.kind(), "Processing save synchronously");
            return self.finisher.finish(request).map(SubmitOutcome::Finished);
        }

        let Some(sender) = self.sender() else {
            return Err(PhotoError::QueueClosed.into());
        };

        let kind = request.kind();
        self.in_flight.increment();
        self.queued.fetch_add(1, Ordering::SeqCst);

        // Blocks while the queue is full; never called with the counter locked
        if sender.send(request).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            self.in_flight.decrement();
            return Err(PhotoError::QueueClosed.into());
        }

        debug!(kind, in_flight = self.in_flight(), "Save queued");
        Ok(SubmitOutcome::Queued)
    }

    /// Block until every accepted request has been processed
    pub fn wait_until_done(&self) {
        self.in_flight.wait_until_zero();
    }

    /// Requests accepted but not yet fully processed
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    /// Requests accepted but not yet picked up by the worker
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn finisher(&self) -> &Finisher {
        &self.finisher
    }

    /// Stop accepting background work, drain the queue and join the worker
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(worker) = worker
            && let Err(e) = worker.join()
        {
            error!("Save worker panicked: {:?}", e);
        }
        info!("Save scheduler stopped");
    }

    fn sender(&self) -> Option<SyncSender<SaveRequest>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_main(
    receiver: Receiver<SaveRequest>,
    finisher: Arc<Finisher>,
    in_flight: Arc<InFlight>,
    queued: Arc<AtomicUsize>,
) {
    debug!("Save worker running");

    // Ends once every sender is gone and the queue is empty
    while let Ok(request) = receiver.recv() {
        queued.fetch_sub(1, Ordering::SeqCst);
        let kind = request.kind();

        match catch_unwind(AssertUnwindSafe(|| finisher.finish(request))) {
            Ok(Ok(artifact)) => debug!(kind, bytes = artifact.bytes_written, "Background save finished"),
            Ok(Err(e)) => debug!(kind, error = %e, "Background save failed"),
            Err(_) => error!(kind, "Background save panicked"),
        }

        in_flight.decrement();
    }

    debug!("Save worker exiting");
}
