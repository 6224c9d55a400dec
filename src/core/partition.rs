//! Bounded-depth partitioning prepass
//!
//! Descends single-threaded from each root for at most `balance` directory
//! levels. Directories visited here are stat'ed once and kept as rest
//! records; everything at the depth limit (files, and whole directory
//! subtrees) becomes a leaf for the worker pool.

use crate::fs::{FailureCounts, MetadataSource, OwnerLookup, SkipSet, StatRecord, StatResolver};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Output of the prepass
#[derive(Debug, Default, Clone)]
pub struct Partition {
    /// Paths handed whole to one worker
    pub leaves: Vec<PathBuf>,
    /// Directory records produced during the prepass, in discovery order
    pub rest: Vec<StatRecord>,
    /// Entry-level failures seen during the prepass
    pub failures: FailureCounts,
}

impl Partition {
    /// Append another partition's leaves, rest records and failures
    pub fn extend(&mut self, other: Partition) {
        self.leaves.extend(other.leaves);
        self.rest.extend(other.rest);
        self.failures.merge(&other.failures);
    }

    /// Drop work that would duplicate output: a leaf equal to a rest
    /// record's path, a leaf already listed, a leaf inside another leaf's
    /// subtree, and rest records inside a leaf's subtree. Returns how many
    /// items were removed.
    pub fn enforce_disjoint(&mut self) -> usize {
        let mut seen: HashSet<PathBuf> = self.rest.iter().map(|r| r.path.clone()).collect();
        let before = self.leaves.len() + self.rest.len();

        self.leaves.retain(|leaf| {
            if seen.insert(leaf.clone()) {
                true
            } else {
                warn!("Dropping duplicate work item '{}'", leaf.display());
                false
            }
        });

        let leaf_set: HashSet<PathBuf> = self.leaves.iter().cloned().collect();
        let covered = |path: &Path| path.ancestors().skip(1).any(|a| leaf_set.contains(a));

        self.leaves.retain(|leaf| {
            let nested = covered(leaf);
            if nested {
                warn!("Dropping nested work item '{}'", leaf.display());
            }
            !nested
        });
        self.rest.retain(|record| !covered(&record.path));

        before - self.leaves.len() - self.rest.len()
    }
}

/// Single-threaded bounded-depth partitioner
pub struct Partitioner<'a, M, L> {
    resolver: &'a StatResolver<M, L>,
    skip: &'a SkipSet,
}

impl<'a, M: MetadataSource, L: OwnerLookup> Partitioner<'a, M, L> {
    /// Create a partitioner over a resolver and skip set
    pub fn new(resolver: &'a StatResolver<M, L>, skip: &'a SkipSet) -> Self {
        Self { resolver, skip }
    }

    /// Partition every root in order. A root that is not a directory
    /// becomes a single leaf; the roots' own records are not emitted.
    pub fn partition_roots(&self, roots: &[PathBuf], level: u32) -> Partition {
        let mut partition = Partition::default();

        for root in roots {
            match self.resolver.resolve(root) {
                Ok(resolved) if resolved.is_dir => partition.extend(self.partition(root, level)),
                Ok(_) => partition.leaves.push(root.clone()),
                Err(err) => partition.failures.note(&err),
            }
        }

        debug!(
            leaves = partition.leaves.len(),
            rest = partition.rest.len(),
            "Partitioning complete"
        );
        partition
    }

    /// Partition the children of directory `dir` with `level` directory
    /// levels of budget left
    pub fn partition(&self, dir: &Path, level: u32) -> Partition {
        let mut partition = Partition::default();

        let children = match self.resolver.list(dir) {
            Ok(children) => children,
            Err(err) => {
                partition.failures.note(&err);
                return partition;
            }
        };

        for child in children {
            if self.skip.matches(&child) {
                continue;
            }
            match self.resolver.resolve(&child) {
                Ok(resolved) if resolved.is_dir && level > 0 => {
                    let below = self.partition(&child, level - 1);
                    partition.rest.push(resolved.record);
                    partition.extend(below);
                }
                Ok(_) => partition.leaves.push(child),
                Err(err) => partition.failures.note(&err),
            }
        }

        partition
    }
}
