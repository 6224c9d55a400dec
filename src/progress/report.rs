//! Load-balance diagnostics for the parallel phase

use crate::core::WorkerResult;
use console::style;
use humansize::{format_size, BINARY};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Share spread above which the work division is reported as unbalanced
pub const IMBALANCE_THRESHOLD: f64 = 0.30;

const BAR_WIDTH: usize = 10;

/// One worker's line in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerRow {
    /// Pool-assignment index
    pub worker_id: usize,
    /// Seconds spent on the chunk
    pub elapsed_secs: f64,
    /// Fraction of the parallel phase
    pub share: f64,
    /// Entries counted by the worker
    pub files: u64,
    /// The worker died and its output is missing
    pub lost: bool,
}

/// Leaf holding the largest value of some measure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Heaviest {
    /// Leaf path, `None` when no worker reported anything
    pub path: Option<PathBuf>,
    /// Entry count or byte size of that leaf
    pub value: u64,
}

impl Heaviest {
    /// Keep `path` if `value` is strictly larger, so the first maximum wins
    fn offer(&mut self, path: &Path, value: u64) {
        if self.path.is_none() || value > self.value {
            self.path = Some(path.to_path_buf());
            self.value = value;
        }
    }
}

/// Diagnostics computed from the worker results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParallelReport {
    /// Rows in pool-assignment order
    pub workers: Vec<WorkerRow>,
    /// Entries counted by all workers
    pub total_files: u64,
    /// Leaf with the most entries
    pub max_files: Heaviest,
    /// Leaf with the largest logical size
    pub max_size: Heaviest,
    /// Mean worker elapsed seconds
    pub average_secs: f64,
    /// `max(share) - min(share)`
    pub imbalance: f64,
    /// Imbalance is above [`IMBALANCE_THRESHOLD`]
    pub advisory: bool,
}

impl ParallelReport {
    /// Build the report for a parallel phase lasting `parallel`
    pub fn compute(results: &[WorkerResult], parallel: Duration) -> Self {
        let phase = parallel.as_secs_f64();
        let mut max_files = Heaviest::default();
        let mut max_size = Heaviest::default();
        let mut total_files = 0;

        let workers: Vec<WorkerRow> = results
            .iter()
            .map(|result| {
                let elapsed = result.elapsed.as_secs_f64();
                for summary in &result.summaries {
                    max_files.offer(&summary.root, summary.count);
                    max_size.offer(&summary.root, summary.size);
                }
                let files = result.total_count();
                total_files += files;

                WorkerRow {
                    worker_id: result.worker_id,
                    elapsed_secs: elapsed,
                    share: if phase > 0.0 { elapsed / phase } else { 0.0 },
                    files,
                    lost: result.lost,
                }
            })
            .collect();

        let average_secs = if workers.is_empty() {
            0.0
        } else {
            workers.iter().map(|w| w.elapsed_secs).sum::<f64>() / workers.len() as f64
        };

        let shares = workers.iter().map(|w| w.share);
        let imbalance = match (
            shares.clone().reduce(f64::max),
            shares.reduce(f64::min),
        ) {
            (Some(max), Some(min)) => max - min,
            _ => 0.0,
        };

        Self {
            workers,
            total_files,
            max_files,
            max_size,
            average_secs,
            imbalance,
            advisory: imbalance > IMBALANCE_THRESHOLD,
        }
    }

    /// Workers whose output was lost
    pub fn lost_workers(&self) -> impl Iterator<Item = &WorkerRow> {
        self.workers.iter().filter(|w| w.lost)
    }

    /// Human-readable report
    pub fn render(&self) -> String {
        let mut out = String::new();

        for row in &self.workers {
            let filled = ((row.share * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
            let bar = format!("{:<width$}", "=".repeat(filled), width = BAR_WIDTH);
            let _ = write!(
                out,
                "Worker {:>3}:\t{:.1} sec [{}] {:>6.2}% [{} files]",
                row.worker_id,
                row.elapsed_secs,
                style(bar).green(),
                row.share * 100.0,
                row.files
            );
            if row.lost {
                let _ = write!(out, " {}", style("LOST").red().bold());
            }
            out.push('\n');
        }

        let path_of = |h: &Heaviest| {
            h.path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        };

        let _ = writeln!(out, "Total files by workers: {}", self.total_files);
        let _ = writeln!(
            out,
            "Folder with max files: \t{} [{} files]",
            path_of(&self.max_files),
            self.max_files.value
        );
        let _ = writeln!(
            out,
            "Folder with max size: \t{} [{}]",
            path_of(&self.max_size),
            format_size(self.max_size.value, BINARY)
        );
        let _ = writeln!(out, "Avg time by workers: \t{:.2} sec", self.average_secs);
        let _ = writeln!(out, "Difference (Max-Min): \t{:.2}%", self.imbalance * 100.0);

        let lost = self.lost_workers().count();
        if lost > 0 {
            let _ = writeln!(
                out,
                "{}",
                style(format!("{} worker(s) died; their work items are missing from the output", lost))
                    .red()
            );
        }

        if self.advisory {
            let _ = writeln!(
                out,
                "{}",
                style("Task division unbalanced. Use the -b parameter to fix it.").yellow()
            );
        } else {
            let _ = writeln!(out, "Work balance OK.");
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LeafSummary;
    use crate::fs::FailureCounts;

    fn worker(id: usize, secs: f64, summaries: Vec<(&str, u64, u64)>) -> WorkerResult {
        WorkerResult {
            worker_id: id,
            elapsed: Duration::from_secs_f64(secs),
            chunk: summaries.iter().map(|s| PathBuf::from(s.0)).collect(),
            summaries: summaries
                .into_iter()
                .map(|(root, count, size)| LeafSummary {
                    root: PathBuf::from(root),
                    count,
                    size,
                })
                .collect(),
            records: 0,
            failures: FailureCounts::default(),
            lost: false,
        }
    }

    #[test]
    fn test_balanced_run_has_no_advisory() {
        let results: Vec<WorkerResult> = [10.0, 10.0, 10.0, 1.0]
            .iter()
            .enumerate()
            .map(|(i, secs)| worker(i, *secs, vec![]))
            .collect();

        let report = ParallelReport::compute(&results, Duration::from_secs(31));
        assert!((report.imbalance - 0.290).abs() < 0.001);
        assert!(!report.advisory);
        assert!(report.render().contains("Work balance OK."));
    }

    #[test]
    fn test_unbalanced_run_has_advisory() {
        let results: Vec<WorkerResult> = [10.0, 10.0, 10.0, 0.1]
            .iter()
            .enumerate()
            .map(|(i, secs)| worker(i, *secs, vec![]))
            .collect();

        let report = ParallelReport::compute(&results, Duration::from_secs_f64(30.1));
        assert!(report.imbalance > IMBALANCE_THRESHOLD);
        assert!(report.advisory);
        assert!(report.render().contains("Task division unbalanced"));
    }

    #[test]
    fn test_heaviest_first_occurrence_wins() {
        let results = vec![
            worker(0, 1.0, vec![("/a", 5, 100), ("/b", 7, 50)]),
            worker(1, 1.0, vec![("/c", 7, 100), ("/d", 1, 10)]),
        ];

        let report = ParallelReport::compute(&results, Duration::from_secs(1));
        assert_eq!(report.total_files, 20);
        assert_eq!(report.max_files.path, Some(PathBuf::from("/b")));
        assert_eq!(report.max_files.value, 7);
        assert_eq!(report.max_size.path, Some(PathBuf::from("/a")));
        assert_eq!(report.max_size.value, 100);
        assert!((report.average_secs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_phase_and_empty_results() {
        let results = vec![worker(0, 0.0, vec![])];
        let report = ParallelReport::compute(&results, Duration::ZERO);
        assert_eq!(report.workers[0].share, 0.0);
        assert_eq!(report.imbalance, 0.0);

        let report = ParallelReport::compute(&[], Duration::from_secs(1));
        assert!(report.workers.is_empty());
        assert_eq!(report.average_secs, 0.0);
        assert!(!report.advisory);
        assert_eq!(report.max_files.path, None);
    }

    #[test]
    fn test_lost_worker_is_flagged() {
        let mut lost = worker(1, 0.0, vec![]);
        lost.lost = true;
        let results = vec![worker(0, 2.0, vec![("/a", 3, 3)]), lost];

        let report = ParallelReport::compute(&results, Duration::from_secs(2));
        assert_eq!(report.lost_workers().count(), 1);
        assert!(report.advisory);

        console::set_colors_enabled(false);
        let text = report.render();
        assert!(text.contains("LOST"));
        assert!(text.contains("1 worker(s) died"));
        assert!(text.contains("[==========]"));
    }
}
