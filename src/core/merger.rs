//! Final output assembly
//!
//! Writes the header, the partitioner's rest records and then every
//! worker spool in pool-assignment order. The file is built next to the
//! target as `<output>.partial` and only renamed into place once complete.

use crate::core::pool::Spool;
use crate::error::{IoResultExt, Result};
use crate::fs::{StatRecord, HEADER};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const WRITE_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// What ended up in the output file
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Records written from the partitioner
    pub rest_records: u64,
    /// Lines copied from each worker spool, in assignment order
    pub worker_records: Vec<u64>,
    /// Spools thrown away because their worker was lost
    pub dropped_spools: usize,
    /// All data lines in the file
    pub total: u64,
}

impl MergeStats {
    /// Lines contributed by workers
    pub fn worker_total(&self) -> u64 {
        self.worker_records.iter().sum()
    }
}

/// Writes the merged output file
#[derive(Debug, Clone)]
pub struct Merger {
    output: PathBuf,
}

impl Merger {
    /// Merger targeting `output`
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    /// Target path
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Write header, rest records, then each spool verbatim. Any write
    /// failure aborts and leaves no output behind.
    pub fn merge(&self, rest: &[StatRecord], spools: &mut [Spool]) -> Result<MergeStats> {
        let partial = partial_path(&self.output);

        let stats = write_atomically(&partial, &self.output, |out| {
            let mut stats = MergeStats::default();

            out.write_all(HEADER.as_bytes())?;
            out.write_all(b"\n")?;

            for record in rest {
                record.write_csv(out)?;
            }
            stats.rest_records = rest.len() as u64;

            for spool in spools.iter_mut() {
                if spool.is_discarded() {
                    stats.dropped_spools += 1;
                }
                stats.worker_records.push(spool.drain_into(out)?);
            }

            stats.total = stats.rest_records + stats.worker_total();
            Ok(stats)
        })?;

        relax_permissions(&self.output);
        debug!(
            "Merged {} records into '{}'",
            stats.total,
            self.output.display()
        );
        Ok(stats)
    }
}

/// Sort the data lines of a finished output bytewise, keeping the header
/// line first
pub fn sort_output(path: &Path) -> Result<()> {
    let content = fs::read(path).with_path(path)?;

    let (header, body) = match content.iter().position(|b| *b == b'\n') {
        Some(pos) => content.split_at(pos + 1),
        None => (&content[..], &[][..]),
    };

    let mut lines: Vec<&[u8]> = body.split_inclusive(|b| *b == b'\n').collect();
    lines.sort_unstable();

    write_atomically(&partial_path(path), path, |out| {
        out.write_all(header)?;
        for line in &lines {
            out.write_all(line)?;
            if !line.ends_with(b"\n") {
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    })?;

    relax_permissions(path);
    debug!("Sorted {} lines in '{}'", lines.len(), path.display());
    Ok(())
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Run `fill` against a buffered writer on `partial`, then rename it onto
/// `target`. The partial file is removed on any failure.
fn write_atomically<T, F>(partial: &Path, target: &Path, fill: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<T>,
{
    let result: std::io::Result<T> = (|| {
        let file = File::create(partial)?;
        let mut out = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let value = fill(&mut out)?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(partial, target)?;
        Ok(value)
    })();

    if result.is_err() {
        let _ = fs::remove_file(partial);
    }
    result.with_path(target)
}

#[cfg(unix)]
fn relax_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o666)) {
        warn!("Cannot change permissions of '{}': {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn relax_permissions(_path: &Path) {}
