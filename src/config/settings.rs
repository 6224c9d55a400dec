//! Configuration settings for Statwalker
//!
//! Defines the CLI arguments, the validated runtime configuration and the
//! parsing helpers that turn one into the other.

use crate::error::{Result, StatWalkerError};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Default balance depth for the partitioning prepass
pub const DEFAULT_BALANCE: u32 = 3;

/// Allowed balance depths
pub const BALANCE_RANGE: std::ops::RangeInclusive<u32> = 1..=9;

/// Upper bound on an explicit worker count
pub const MAX_WORKERS: usize = 1024;

/// Statwalker - parallel filesystem metadata scanner
#[derive(Parser, Debug, Clone)]
#[command(name = "statwalker")]
#[command(author = "Statwalker Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Walk paths recursively and write one stat record per entry")]
#[command(long_about = r#"
Statwalker walks one or more paths recursively and writes the raw stat()
metadata of every entry (files, directories, links, devices, sockets, pipes)
to a CSV file. Symbolic links are never followed.

Output columns: INODE,ATIME,MTIME,UID,GID,MODE,SIZE,DISK,PATH

Examples:
  statwalker /data                         # All cores, balance depth 3
  statwalker /data,/home -n 16 -b 4        # Two roots, 16 workers
  statwalker /data --skip .snapshot,tmp    # Skip paths containing substrings
  statwalker /data --sort -o data.csv      # Sorted, diffable output
"#)]
pub struct CliArgs {
    /// Paths to walk, separated by comma
    #[arg(value_name = "PATHS")]
    pub paths: String,

    /// Balance depth for task assignment (1-9)
    #[arg(short = 'b', long, default_value_t = DEFAULT_BALANCE, value_name = "DEPTH")]
    pub balance: u32,

    /// Number of workers to run in parallel (integer or MAX)
    #[arg(short = 'n', long, default_value = "MAX", value_name = "NP")]
    pub processes: String,

    /// CSV file to write stats (default: full-path-to-folder.csv)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Skip paths containing any of these substrings, separated by comma
    #[arg(long, value_name = "PATTERNS")]
    pub skip: Option<String>,

    /// Sort output lines after the scan
    #[arg(long)]
    pub sort: bool,

    /// Seed for the work shuffle (random when omitted)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Format of the run report printed on stdout
    #[arg(long, value_enum, default_value = "text")]
    pub report_format: ReportFormat,

    /// Disable colors in the report
    #[arg(short = 'c', long)]
    pub no_color: bool,

    /// Quiet mode (no report, no spinner)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose logging (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Output format for the run report
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON document
    Json,
}

/// Requested worker count before resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCount {
    /// One worker per host CPU core
    Max,
    /// Exactly this many workers
    Fixed(usize),
}

impl WorkerCount {
    /// Resolve to a concrete positive worker count
    pub fn resolve(self) -> usize {
        match self {
            Self::Max => num_cpus::get().clamp(1, MAX_WORKERS),
            Self::Fixed(n) => n,
        }
    }
}

impl FromStr for WorkerCount {
    type Err = StatWalkerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("max") || s.eq_ignore_ascii_case("all") {
            return Ok(Self::Max);
        }

        let n: i64 = s
            .parse()
            .map_err(|_| StatWalkerError::config(format!("Invalid worker count: {}", s)))?;

        if n < 1 || n as usize > MAX_WORKERS {
            return Err(StatWalkerError::config(format!(
                "Worker count must be between 1 and {}, got {}",
                MAX_WORKERS, n
            )));
        }

        Ok(Self::Fixed(n as usize))
    }
}

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Absolute roots to scan, in the order given
    pub roots: Vec<PathBuf>,
    /// Balance depth for partitioning
    pub balance: u32,
    /// Resolved worker count
    pub workers: usize,
    /// Final CSV output path
    pub output: PathBuf,
    /// Skip substrings
    pub skip: Vec<String>,
    /// Sort output after merge
    pub sort: bool,
    /// Shuffle seed
    pub seed: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from(".")],
            balance: DEFAULT_BALANCE,
            workers: WorkerCount::Max.resolve(),
            output: PathBuf::from("stats.csv"),
            skip: Vec::new(),
            sort: false,
            seed: 0,
        }
    }
}

impl ScanConfig {
    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| StatWalkerError::config(format!("Cannot read current directory: {}", e)))?;

        let roots = parse_roots(&args.paths, &cwd);
        let first = roots
            .first()
            .ok_or_else(|| StatWalkerError::config("At least one path is required"))?;

        let output = match &args.output {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => cwd.join(p),
            None => cwd.join(default_output_name(first)),
        };

        let config = Self {
            output,
            balance: args.balance,
            workers: args.processes.parse::<WorkerCount>()?.resolve(),
            skip: args.skip.as_deref().map(parse_list).unwrap_or_default(),
            sort: args.sort,
            seed: args.seed.unwrap_or_else(rand::random),
            roots,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.roots.is_empty() {
            return Err(StatWalkerError::config("At least one path is required"));
        }
        if !BALANCE_RANGE.contains(&self.balance) {
            return Err(StatWalkerError::config(format!(
                "Balance must be between {} and {}, got {}",
                BALANCE_RANGE.start(),
                BALANCE_RANGE.end(),
                self.balance
            )));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(StatWalkerError::config(format!(
                "Worker count must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        Ok(())
    }
}

/// Split a comma-separated list, dropping blank items
pub fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse comma-separated roots into absolute, de-duplicated paths
pub fn parse_roots(list: &str, cwd: &Path) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    for item in parse_list(list) {
        let path = PathBuf::from(item);
        let path = if path.is_absolute() { path } else { cwd.join(path) };
        let path = normalize(&path);
        if !roots.contains(&path) {
            roots.push(path);
        }
    }
    roots
}

/// Drop `.` and resolve `..` without touching the filesystem, so a
/// symlinked root keeps its own name
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// Output file name derived from the first root
pub fn default_output_name(root: &Path) -> PathBuf {
    let resolved = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let text = resolved.to_string_lossy();

    #[cfg(windows)]
    let name: String = {
        let text = text.trim_start_matches(r"\\?\");
        text.replace('\\', "-").replace(':', "").chars().skip(2).collect()
    };

    #[cfg(not(windows))]
    let name = text.trim_start_matches('/').replace('/', "-");

    if name.is_empty() {
        PathBuf::from("root.csv")
    } else {
        PathBuf::from(format!("{}.csv", name))
    }
}
