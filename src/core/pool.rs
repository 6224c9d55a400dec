//! Fixed-size worker pool
//!
//! Every worker is one thread of a dedicated rayon pool. Worker `i` walks
//! chunk `i` and writes CSV lines into its own spool, a crossbeam channel
//! whose receiver stays with the pool until the merge. Workers share only
//! the immutable resolver and skip set.

use crate::error::{Result, StatWalkerError};
use crate::fs::{
    FailureCounts, MetadataSource, OwnerLookup, RecordSink, SkipSet, StatRecord, StatResolver, Walker,
};
use crossbeam::channel::{self, Receiver, Sender};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Spool batch size that triggers a hand-off to the channel
pub const SPOOL_FLUSH_BYTES: usize = 4 * 1024 * 1024;

/// Worker thread stack; the walker recurses once per directory level and
/// must reach the deepest tree a full path can describe
pub const WORKER_STACK_BYTES: usize = 64 * 1024 * 1024;

/// Totals for one top-level item of a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSummary {
    /// Leaf path
    pub root: PathBuf,
    /// Entries recorded beneath it, itself included
    pub count: u64,
    /// Logical size of the files beneath it
    pub size: u64,
}

/// What one worker did
#[derive(Debug, Clone)]
pub struct WorkerResult {
    /// Pool-assignment index
    pub worker_id: usize,
    /// Wall time spent on the chunk, zero for a lost worker
    pub elapsed: Duration,
    /// Leaves assigned to the worker
    pub chunk: Vec<PathBuf>,
    /// One summary per leaf, in chunk order
    pub summaries: Vec<LeafSummary>,
    /// Records written to the spool
    pub records: u64,
    /// Entry-level failures
    pub failures: FailureCounts,
    /// The worker died and its chunk output was discarded
    pub lost: bool,
}

impl WorkerResult {
    fn lost_worker(worker_id: usize, chunk: Vec<PathBuf>) -> Self {
        Self {
            worker_id,
            elapsed: Duration::ZERO,
            chunk,
            summaries: Vec::new(),
            records: 0,
            failures: FailureCounts::default(),
            lost: true,
        }
    }

    /// Entries counted across all summaries
    pub fn total_count(&self) -> u64 {
        self.summaries.iter().map(|s| s.count).sum()
    }

    /// Logical size across all summaries
    pub fn total_size(&self) -> u64 {
        self.summaries.iter().map(|s| s.size).sum()
    }
}

/// Encoded CSV lines handed from a worker to its spool
#[derive(Debug, Default)]
pub struct SpoolBatch {
    /// Complete CSV lines
    pub bytes: Vec<u8>,
    /// Lines in `bytes`
    pub records: u64,
}

/// Worker side of a spool
pub struct SpoolSink {
    sender: Sender<SpoolBatch>,
    batch: SpoolBatch,
    flush_bytes: usize,
    written: u64,
}

impl SpoolSink {
    /// Sink flushing every [`SPOOL_FLUSH_BYTES`]
    pub fn new(sender: Sender<SpoolBatch>) -> Self {
        Self::with_flush_bytes(sender, SPOOL_FLUSH_BYTES)
    }

    /// Sink flushing every `flush_bytes`
    pub fn with_flush_bytes(sender: Sender<SpoolBatch>, flush_bytes: usize) -> Self {
        Self {
            sender,
            batch: SpoolBatch::default(),
            flush_bytes,
            written: 0,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.batch.records == 0 {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        let records = batch.records;
        self.sender
            .send(batch)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "spool closed"))?;
        self.written += records;
        Ok(())
    }

    /// Flush the last batch and return the records delivered
    pub fn finish(mut self) -> io::Result<u64> {
        self.flush()?;
        Ok(self.written)
    }
}

impl RecordSink for SpoolSink {
    fn write_record(&mut self, record: &StatRecord) -> io::Result<()> {
        record.write_csv(&mut self.batch.bytes)?;
        self.batch.records += 1;
        if self.batch.bytes.len() >= self.flush_bytes {
            self.flush()?;
        }
        Ok(())
    }
}

/// Merger side of a spool
#[derive(Debug)]
pub struct Spool {
    receiver: Option<Receiver<SpoolBatch>>,
}

impl Spool {
    /// Spool draining `receiver`
    pub fn new(receiver: Receiver<SpoolBatch>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }

    /// Drop everything queued in this spool
    pub fn discard(&mut self) {
        self.receiver = None;
    }

    /// Was the spool's content thrown away
    pub fn is_discarded(&self) -> bool {
        self.receiver.is_none()
    }

    /// Copy every queued batch into `out` verbatim, returning the line count.
    /// Must be called after the producing worker has finished.
    pub fn drain_into<W: Write>(&mut self, out: &mut W) -> io::Result<u64> {
        let Some(receiver) = self.receiver.take() else {
            return Ok(0);
        };
        let mut lines = 0;
        for batch in receiver.try_iter() {
            out.write_all(&batch.bytes)?;
            lines += batch.records;
        }
        Ok(lines)
    }
}

/// A worker's result together with its spool
#[derive(Debug)]
pub struct WorkerOutput {
    /// Timing and summaries
    pub result: WorkerResult,
    /// Records waiting for the merge
    pub spool: Spool,
}

/// Pool of exactly `size` worker threads
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    size: usize,
}

impl WorkerPool {
    /// Build a pool of `size` threads
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(StatWalkerError::config("Worker pool needs at least one worker"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("statwalker-worker-{}", i))
            .stack_size(WORKER_STACK_BYTES)
            .build()
            .map_err(|e| StatWalkerError::ThreadPool(e.to_string()))?;
        Ok(Self { pool, size })
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run one chunk per worker and block until all of them are done.
    /// Outputs are in pool-assignment order, whatever the completion order.
    pub fn run<M, L>(
        &self,
        chunks: Vec<Vec<PathBuf>>,
        resolver: &StatResolver<M, L>,
        skip: &SkipSet,
    ) -> Result<Vec<WorkerOutput>>
    where
        M: MetadataSource,
        L: OwnerLookup,
    {
        if chunks.len() != self.size {
            return Err(StatWalkerError::config(format!(
                "Expected {} chunks, got {}",
                self.size,
                chunks.len()
            )));
        }

        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..self.size).map(|_| channel::unbounded::<SpoolBatch>()).unzip();

        let results = self.pool.broadcast(|ctx| {
            let id = ctx.index();
            let chunk = &chunks[id];
            let sender = senders[id].clone();

            panic::catch_unwind(AssertUnwindSafe(|| {
                run_worker(id, chunk, resolver, skip, sender)
            }))
            .unwrap_or_else(|_| {
                error!("Worker {} died, its {} work items are lost", id, chunk.len());
                WorkerResult::lost_worker(id, chunk.clone())
            })
        });
        drop(senders);

        Ok(results
            .into_iter()
            .zip(receivers)
            .map(|(result, receiver)| {
                let mut spool = Spool::new(receiver);
                if result.lost {
                    spool.discard();
                }
                WorkerOutput { result, spool }
            })
            .collect())
    }
}

fn run_worker<M, L>(
    id: usize,
    chunk: &[PathBuf],
    resolver: &StatResolver<M, L>,
    skip: &SkipSet,
    sender: Sender<SpoolBatch>,
) -> WorkerResult
where
    M: MetadataSource,
    L: OwnerLookup,
{
    let start = Instant::now();
    debug!("Worker {} starting on {} work items", id, chunk.len());

    let mut sink = SpoolSink::new(sender);
    let mut walker = Walker::new(resolver, skip);
    let summaries: Vec<LeafSummary> = chunk
        .iter()
        .map(|leaf| {
            let (count, size) = walker.walk(leaf, &mut sink);
            LeafSummary {
                root: leaf.clone(),
                count,
                size,
            }
        })
        .collect();

    let mut failures = walker.failures();
    let records = sink.finish().unwrap_or_else(|e| {
        error!("Worker {} could not flush its spool: {}", id, e);
        failures.write_errors += 1;
        0
    });

    let elapsed = start.elapsed();
    debug!("Worker {} finished: {} records in {:?}", id, records, elapsed);

    WorkerResult {
        worker_id: id,
        elapsed,
        chunk: chunk.to_vec(),
        summaries,
        records,
        failures,
        lost: false,
    }
}
