use std::mem;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;

use crate::batch::run_batch;
use crate::error::CompileError;
use crate::job::{CompileJob, CompileReply, CompileRequest};
use crate::toolchain::CompileConfig;

/// Jobs queued for the next dispatch. Reaching the threshold hands the
/// whole accumulated list out and leaves the queue empty for the next
/// round.
#[derive(Debug)]
struct PendingJobs {
    jobs: Vec<CompileJob>,
    threshold: usize,
}

impl PendingJobs {
    fn new(threshold: usize) -> Self {
        Self {
            jobs: Vec::new(),
            threshold: threshold.max(1),
        }
    }

    fn push(&mut self, job: CompileJob) -> Option<Vec<CompileJob>> {
        self.jobs.push(job);
        if self.jobs.len() >= self.threshold {
            Some(mem::take(&mut self.jobs))
        } else {
            None
        }
    }

    fn drain(&mut self) -> Option<Vec<CompileJob>> {
        if self.jobs.is_empty() {
            None
        } else {
            Some(mem::take(&mut self.jobs))
        }
    }
}

/// Coalesces compile requests into shared toolchain invocations.
///
/// Requests queue up until `batch_size` of them are waiting; the full
/// batch then runs on its own thread while the requesters stay parked on
/// their reply channels. A batch is removed from the queue under the
/// lock, so no job can land in two dispatches. `flush` forces out a
/// short remainder, `wait` joins every dispatch thread spawned so far.
///
/// Dropping the scheduler with jobs still queued disconnects their reply
/// channels; a blocked requester comes back with `BatchAborted` rather
/// than hanging.
#[derive(Debug)]
pub struct Scheduler {
    config: Arc<CompileConfig>,
    pending: Mutex<PendingJobs>,
    dispatches: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: CompileConfig, batch_size: usize) -> Self {
        Self {
            config: Arc::new(config),
            pending: Mutex::new(PendingJobs::new(batch_size)),
            dispatches: Mutex::new(Vec::new()),
        }
    }

    /// Queues one request and returns the receiving half of its reply
    /// channel. The call that completes a batch also dispatches it.
    pub fn submit(&self, request: CompileRequest) -> Receiver<CompileReply> {
        let (job, receiver) = CompileJob::new(request);
        let ready = self.pending.lock().unwrap().push(job);
        if let Some(batch) = ready {
            self.dispatch(batch);
        }
        receiver
    }

    /// Queues one request and blocks until its batch has run.
    pub fn compile(&self, request: CompileRequest) -> CompileReply {
        self.submit(request)
            .recv()
            .unwrap_or(Err(CompileError::BatchAborted))
    }

    /// Dispatches whatever is queued regardless of the threshold. Needed
    /// after the final submission when the total is not a multiple of
    /// the batch size.
    pub fn flush(&self) {
        let ready = self.pending.lock().unwrap().drain();
        if let Some(batch) = ready {
            self.dispatch(batch);
        }
    }

    /// Blocks until every dispatch spawned so far has finished, scratch
    /// cleanup included.
    pub fn wait(&self) {
        let handles = mem::take(&mut *self.dispatches.lock().unwrap());
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn dispatch(&self, batch: Vec<CompileJob>) {
        let config = Arc::clone(&self.config);
        let handle = thread::spawn(move || run_batch(&config, batch));
        self.dispatches.lock().unwrap().push(handle);
    }
}
