// src/cli.rs
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, Result, WrapErr};

use crate::config::options::{AppOptions, TableShape};
use crate::progress::Progress;
use crate::record::Status;
use crate::runner::{self, Pipeline};
use crate::store::CheckpointedStore;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ShapeArg {
    Auto,
    Article,
    Author,
}

impl From<ShapeArg> for TableShape {
    fn from(s: ShapeArg) -> Self {
        match s {
            ShapeArg::Auto => TableShape::Auto,
            ShapeArg::Article => TableShape::Article,
            ShapeArg::Author => TableShape::Author,
        }
    }
}

/// Fill researcher identity and demographics into a bibliographic table.
#[derive(Debug, Parser)]
#[command(name = "rschr_enrich", version, about)]
pub struct Args {
    /// Table to enrich (CSV). Overrides `run.input`.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Table key: article ids or author ids.
    #[arg(long, value_enum)]
    pub shape: Option<ShapeArg>,

    /// Snapshot and temp results every N records.
    #[arg(long)]
    pub snapshot_every: Option<usize>,

    /// Directory for snapshots and results files.
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,

    /// Visit records left `failed` by an earlier run.
    #[arg(long)]
    pub retry_failed: bool,

    /// Process at most N records.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print status counts and failed ids, then exit. No login.
    #[arg(long)]
    pub report: bool,

    /// Log filter, e.g. `debug` or `rschr_enrich=trace`.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// File (or defaults), then environment credentials, then flags.
    pub fn options(&self) -> Result<AppOptions> {
        let mut opts = match &self.config {
            Some(p) => AppOptions::load(p)?,
            None => AppOptions::default(),
        }
        .with_env_credentials();

        let run = &mut opts.run;
        if let Some(i) = &self.input {
            run.input = Some(i.clone());
        }
        if let Some(s) = self.shape {
            run.shape = s.into();
        }
        if let Some(n) = self.snapshot_every {
            run.snapshot_every = n;
        }
        if let Some(d) = &self.snapshot_dir {
            run.snapshot_dir = d.clone();
        }
        if self.retry_failed {
            run.retry_failed = true;
        }
        if self.limit.is_some() {
            run.limit = self.limit;
        }
        if let Some(l) = &self.log_level {
            opts.log.level = l.clone();
        }
        opts.validate()?;
        Ok(opts)
    }
}

/// Prints one line per record to stdout.
pub struct ConsoleProgress {
    total: usize,
    done: usize,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self { total: 0, done: 0 }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for ConsoleProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
        println!("{total} records to process");
    }

    fn log(&mut self, msg: &str) {
        println!("{msg}");
    }

    fn item_done(&mut self, record_id: &str, status: Status) {
        self.done += 1;
        println!("[{}/{}] {} {}", self.done, self.total, record_id, status);
    }

    fn item_failed(&mut self, record_id: &str, stage: &str, reason: &str) {
        self.done += 1;
        println!("[{}/{}] {} FAILED at {}: {}", self.done, self.total, record_id, stage, reason);
    }

    fn finish(&mut self) {
        println!("done: {} of {}", self.done, self.total);
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let opts = args.options()?;
    crate::log::init(&opts.log).wrap_err("could not open the debug log")?;

    let input = opts
        .run
        .input
        .clone()
        .ok_or_else(|| eyre!("no input table (use --input or run.input)"))?;
    let mut store = CheckpointedStore::load(&input, opts.run.shape)?
        .with_snapshot_dir(&opts.run.snapshot_dir);

    if args.report {
        print!("{}", runner::report(&store));
        return Ok(());
    }

    let (mut biblio, mut demo) = runner::connect(&opts)?;
    let mut console = ConsoleProgress::new();
    let progress: &mut dyn Progress = &mut console;
    let summary = Pipeline::new(&mut store, &mut biblio, &mut demo, &opts).run(Some(progress))?;

    if let Some(p) = &summary.results_file {
        println!("results: {}", p.display());
    }
    print!("{}", runner::report(&store));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "rschr_enrich",
            "--input",
            "kor.csv",
            "--shape",
            "author",
            "--snapshot-every",
            "5",
            "--retry-failed",
            "--limit",
            "3",
        ]);
        let opts = args.options().unwrap();
        assert_eq!(opts.run.input, Some(PathBuf::from("kor.csv")));
        assert_eq!(opts.run.shape, TableShape::Author);
        assert_eq!(opts.run.snapshot_every, 5);
        assert!(opts.run.retry_failed);
        assert_eq!(opts.run.limit, Some(3));
    }

    #[test]
    fn zero_snapshot_interval_is_rejected() {
        let args = Args::parse_from(["rschr_enrich", "--snapshot-every", "0"]);
        assert!(args.options().is_err());
    }
}
