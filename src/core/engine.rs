//! Scan engine
//!
//! Runs the three phases of a scan: the single-threaded partitioning
//! prepass (plus chunking), the parallel walk, and the merge of all
//! partial outputs into the final CSV.

use crate::config::ScanConfig;
use crate::core::{sort_output, Chunker, MergeStats, Merger, Partitioner, WorkerPool, WorkerResult};
use crate::error::{IoResultExt, Result};
use crate::fs::{FailureCounts, MetadataSource, OsMetadata, OwnerLookup, SkipSet, StatResolver, Unresolved};
use crate::progress::{ParallelReport, ScanProgress};
use chrono::{DateTime, Local};
use humansize::{format_size, BINARY};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Wall time of each phase, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseTimes {
    /// Partitioning and chunking
    pub pre_process: f64,
    /// Worker pool
    pub parallel: f64,
    /// Merge and optional sort
    pub post_process: f64,
}

impl PhaseTimes {
    /// Sum of all phases
    pub fn total(&self) -> Duration {
        Duration::from_secs_f64(self.pre_process + self.parallel + self.post_process)
    }
}

/// Outcome of a scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    /// When the scan started
    pub started_at: DateTime<Local>,
    /// Roots scanned
    pub roots: Vec<PathBuf>,
    /// Final output file
    pub output: PathBuf,
    /// Output file size in bytes
    pub output_size: u64,
    /// Shuffle seed used
    pub seed: u64,
    /// Worker count
    pub workers: usize,
    /// Balance depth
    pub balance: u32,
    /// Phase durations
    pub phases: PhaseTimes,
    /// Line counts of the output file
    pub merge: MergeStats,
    /// Entry-level failures over the whole run
    pub failures: FailureCounts,
    /// Work items removed to keep leaves and rest records disjoint
    pub removed_duplicates: usize,
    /// Load-balance diagnostics
    pub report: ParallelReport,
}

impl ScanSummary {
    /// Records written to the output
    pub fn total_records(&self) -> u64 {
        self.merge.total
    }

    /// Records per second over the whole run
    pub fn rate(&self) -> f64 {
        let secs = self.phases.total().as_secs_f64();
        if secs > 0.0 {
            self.total_records() as f64 / secs
        } else {
            0.0
        }
    }

    /// Workers that died during the parallel phase
    pub fn lost_workers(&self) -> usize {
        self.report.lost_workers().count()
    }

    /// Summary as a JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        let total = self.phases.total();

        println!("Pre-process:  \t\t{:.2} sec", self.phases.pre_process);
        print!("{}", self.report.render());
        println!(
            "Post-process: \t\t{:.2} sec [{} files]",
            self.phases.post_process, self.merge.rest_records
        );
        println!("Total files: \t\t{}", self.total_records());
        println!(
            "Total time spent: \t{:.2} sec [{}]",
            total.as_secs_f64(),
            humantime::format_duration(Duration::from_secs(total.as_secs()))
        );
        println!("Rate: \t\t\t{} files/sec", self.rate() as u64);
        println!(
            "Output: {} [{}]",
            self.output.display(),
            format_size(self.output_size, BINARY)
        );

        if self.failures.total() > 0 {
            println!(
                "Skipped entries: \t{} unreadable, {} unlistable, {} unwritten",
                self.failures.stat_errors, self.failures.list_errors, self.failures.write_errors
            );
        }
        if self.removed_duplicates > 0 {
            println!("Overlapping work items dropped: {}", self.removed_duplicates);
        }
    }
}

/// Main scan engine
pub struct ScanEngine<M = OsMetadata, L = Unresolved> {
    config: ScanConfig,
    resolver: StatResolver<M, L>,
    progress: Option<ScanProgress>,
}

impl ScanEngine {
    /// Engine scanning the real filesystem
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            resolver: StatResolver::new(),
            progress: None,
        }
    }
}

impl<M: MetadataSource, L: OwnerLookup> ScanEngine<M, L> {
    /// Replace the stat resolver
    pub fn with_resolver<M2, L2>(self, resolver: StatResolver<M2, L2>) -> ScanEngine<M2, L2> {
        ScanEngine {
            config: self.config,
            resolver,
            progress: self.progress,
        }
    }

    /// Set progress spinner
    pub fn with_progress(mut self, progress: ScanProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn set_phase(&self, phase: &str) {
        if let Some(progress) = &self.progress {
            progress.set_phase(phase);
        }
    }

    /// Execute the scan
    pub fn execute(&self) -> Result<ScanSummary> {
        self.config.validate()?;
        let started_at = Local::now();
        let config = &self.config;
        let skip = SkipSet::new(config.skip.iter().cloned());

        // Pre-process: partition and chunk
        let start = Instant::now();
        self.set_phase("Partitioning");
        let mut partition =
            Partitioner::new(&self.resolver, &skip).partition_roots(&config.roots, config.balance);
        let removed_duplicates = partition.enforce_disjoint();
        let leaf_count = partition.leaves.len();
        let chunks = Chunker::new(config.seed).chunk(std::mem::take(&mut partition.leaves), config.workers);
        let pre_process = start.elapsed();

        tracing::info!(
            leaves = leaf_count,
            rest = partition.rest.len(),
            workers = config.workers,
            seed = config.seed,
            "Partitioned work in {:?}",
            pre_process
        );

        // Parallel walk
        let start = Instant::now();
        self.set_phase(&format!("Walking {} work items on {} workers", leaf_count, config.workers));
        let pool = WorkerPool::new(config.workers)?;
        let outputs = pool.run(chunks, &self.resolver, &skip)?;
        let parallel = start.elapsed();

        let (results, mut spools): (Vec<WorkerResult>, Vec<_>) =
            outputs.into_iter().map(|o| (o.result, o.spool)).unzip();

        // Post-process: merge, then sort if asked
        let start = Instant::now();
        self.set_phase("Merging");
        let merge = Merger::new(&config.output).merge(&partition.rest, &mut spools)?;
        if config.sort {
            self.set_phase("Sorting");
            sort_output(&config.output)?;
        }
        let post_process = start.elapsed();

        if let Some(progress) = &self.progress {
            progress.finish();
        }

        let output_size = std::fs::metadata(&config.output).with_path(&config.output)?.len();

        let mut failures = partition.failures;
        for result in &results {
            failures.merge(&result.failures);
        }

        let report = ParallelReport::compute(&results, parallel);
        if report.advisory {
            tracing::warn!(
                "Work division unbalanced ({:.0}% spread), consider another balance depth",
                report.imbalance * 100.0
            );
        }

        tracing::info!(
            records = merge.total,
            failures = failures.total(),
            "Scan complete, output written to '{}'",
            config.output.display()
        );

        Ok(ScanSummary {
            started_at,
            roots: config.roots.clone(),
            output: config.output.clone(),
            output_size,
            seed: config.seed,
            workers: config.workers,
            balance: config.balance,
            phases: PhaseTimes {
                pre_process: pre_process.as_secs_f64(),
                parallel: parallel.as_secs_f64(),
                post_process: post_process.as_secs_f64(),
            },
            merge,
            failures,
            removed_duplicates,
            report,
        })
    }
}
