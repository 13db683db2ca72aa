// src/runner.rs
//
// The enrichment pipeline: for each eligible record, identity (bibliographic
// registry) then attributes (demographic registry), merged into the store and
// flushed before moving on. Per-record failures land in the record's status
// and the results list; only login and persistence failures end the run.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::info_span;

use crate::config::options::{AppOptions, TableShape};
use crate::config::field_specs;
use crate::core::sanitize::normalize_name;
use crate::error::{AuthError, RunError, SessionError, StoreError};
use crate::extract::FieldSpec;
use crate::progress::Progress;
use crate::record::{Field, Record, RecordPatch, Status};
use crate::resolve::{AttributeResolver, IdentityOutcome, IdentityResolver, SearchOutcome};
use crate::session::{HttpSession, Session};
use crate::store::{self, CheckpointedStore};

/// One line of the per-run results file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub record_id: String,
    pub stage: String,
    pub outcome: String,
    pub detail: String,
    pub cross_registry_id: String,
    pub author_name_native: String,
    pub status: String,
}

impl ResultRow {
    fn new(record: &Record, stage: &str, outcome: &str, detail: impl Into<String>) -> Self {
        Self {
            record_id: record.record_id.clone(),
            stage: s!(stage),
            outcome: s!(outcome),
            detail: detail.into(),
            cross_registry_id: record.cross_registry_id.clone().unwrap_or_default(),
            author_name_native: record.author_name_native.clone().unwrap_or_default(),
            status: s!(record.status.as_str()),
        }
    }
}

/// Summary of what a run did.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub results: Vec<ResultRow>,
    pub snapshots: Vec<PathBuf>,
    pub results_file: Option<PathBuf>,
}

/// Log in to both registries. Either failing is fatal.
pub fn connect(opts: &AppOptions) -> Result<(HttpSession, HttpSession), AuthError> {
    let debug = Some(opts.run.debug_dir.clone());
    let b = &opts.bibliographic;
    let biblio = HttpSession::open("KCI", b.session.clone(), &b.login, opts.credentials.bibliographic.as_ref(), debug.clone())?;
    let d = &opts.demographic;
    let demo = HttpSession::open("KRI", d.session.clone(), &d.login, opts.credentials.demographic.as_ref(), debug)?;
    Ok((biblio, demo))
}

/// Ids the run will visit, in table order.
pub fn eligible(store: &CheckpointedStore, retry_failed: bool, limit: Option<usize>) -> Vec<String> {
    store
        .records()
        .iter()
        .filter(|r| !r.status.is_terminal() || (retry_failed && r.status == Status::Failed))
        .map(|r| r.record_id.clone())
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

pub struct Pipeline<'a> {
    store: &'a mut CheckpointedStore,
    biblio: &'a mut dyn Session,
    demo: &'a mut dyn Session,
    opts: &'a AppOptions,
    specs: Vec<FieldSpec>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a mut CheckpointedStore,
        biblio: &'a mut dyn Session,
        demo: &'a mut dyn Session,
        opts: &'a AppOptions,
    ) -> Self {
        let specs = field_specs(&opts.fields);
        Self { store, biblio, demo, opts, specs }
    }

    pub fn run(&mut self, mut progress: Option<&mut dyn Progress>) -> Result<RunSummary, RunError> {
        let opts = self.opts;
        let run = &opts.run;
        let ids = eligible(self.store, run.retry_failed, run.limit);
        let mut summary = RunSummary::default();

        logf!("Run: {} of {} records eligible in {}", ids.len(), self.store.len(), self.store.path().display());
        if let Some(p) = progress.as_deref_mut() {
            p.begin(ids.len());
        }

        let stem = self.store.stem();
        let temp_results = run.snapshot_dir.join(format!("fill_missing_temp_{stem}.csv"));
        let final_results = run.snapshot_dir.join(format!("fill_missing_results_{stem}.csv"));

        for (n, id) in ids.iter().enumerate() {
            let row = self.process(id)?;
            let status = self.store.get(id).map(|r| r.status).unwrap_or_default();
            if let Some(p) = progress.as_deref_mut() {
                match row.outcome.as_str() {
                    "failed" | "aborted" | "merge_conflict" => p.item_failed(id, &row.stage, &row.detail),
                    _ => p.item_done(id, status),
                }
            }
            summary.results.push(row);
            summary.processed += 1;

            if summary.processed % run.snapshot_every.max(1) == 0 {
                let snap = self.store.snapshot("temp")?;
                store::write_csv(&temp_results, &summary.results)?;
                logf!("Run: {} processed, results so far in {}", summary.processed, temp_results.display());
                if let Some(p) = progress.as_deref_mut() {
                    p.log(&format!("Snapshot {} ({} processed)", snap.display(), summary.processed));
                }
                summary.snapshots.push(snap);
            }
            if n + 1 < ids.len() {
                pause(run.pause_ms);
            }
        }

        store::write_csv(&final_results, &summary.results)?;
        if let Some(p) = progress.as_deref_mut() {
            p.log(&format!("Results written to {}", final_results.display()));
        }
        summary.results_file = Some(final_results);
        for (status, count) in self.store.counts() {
            logf!("Run: {:<20} {}", status.as_str(), count);
        }
        if let Some(p) = progress.as_deref_mut() {
            p.finish();
        }
        Ok(summary)
    }

    /// Resolve one record end to end. Only persistence errors escape.
    pub fn process(&mut self, record_id: &str) -> Result<ResultRow, StoreError> {
        let span = info_span!("record", id = %record_id);
        let _enter = span.enter();

        let record = self.snapshot_of(record_id)?;
        let needs_identity = record.cross_registry_id.is_none() || record.author_name_native.is_none();

        if needs_identity {
            let _stage = info_span!("stage", stage = "identity").entered();
            if let Some(row) = self.identity(&record)? {
                return Ok(row);
            }
        }

        let record = self.snapshot_of(record_id)?;
        let Some(cross_id) = record.cross_registry_id.clone() else {
            logf!("Run: {} has no cross id, attributes skipped", record_id);
            return Ok(ResultRow::new(&record, "identity", "no_cross_id", ""));
        };

        let _stage = info_span!("stage", stage = "attributes").entered();
        let outcome = AttributeResolver::new(&mut *self.demo, &self.opts.demographic.search, &self.specs)
            .resolve(&cross_id, record.author_name_native.as_deref());

        match outcome {
            Err(e) => self.fail(record_id, "attributes", &e),
            Ok(SearchOutcome::Found(hit)) => {
                let mut patch = RecordPatch::new();
                for (a, v) in &hit.values {
                    patch.set_opt(Field::Attr(*a), v.as_deref());
                }
                self.keep_existing(&record, &mut patch, "Attributes");
                let found = patch.len();
                if let Some(row) = self.merge(record_id, &patch, "attributes")? {
                    return Ok(row);
                }
                self.finish(record_id, Status::AttributesResolved, "attributes", "found", format!("{found} fields"))
            }
            Ok(SearchOutcome::NoResult) => {
                self.finish(record_id, Status::NoAttributes, "attributes", "no_result", "")
            }
            Ok(SearchOutcome::Aborted(reason)) => {
                loge!("Run: {} attribute search aborted: {}", record_id, reason);
                self.finish(record_id, Status::Failed, "attributes", "aborted", reason)
            }
        }
    }

    /// Identity stage. `Some(row)` ends the record here.
    fn identity(&mut self, record: &Record) -> Result<Option<ResultRow>, StoreError> {
        let id = record.record_id.as_str();
        let mut resolver = IdentityResolver::new(&mut *self.biblio, &self.opts.bibliographic.routes);
        let outcome = match self.store.shape() {
            TableShape::Author => resolver.resolve_author(record.local_author_id.as_deref().unwrap_or(id)),
            _ => resolver.resolve(id),
        };

        match outcome {
            Err(e) => self.fail(id, "identity", &e).map(Some),
            Ok(IdentityOutcome::NotFound) if record.cross_registry_id.is_none() => {
                self.finish(id, Status::NoIdentity, "identity", "no_identity", "").map(Some)
            }
            Ok(IdentityOutcome::NotFound) => {
                logw!("Run: {} name lookup found nothing, continuing with known cross id", id);
                Ok(None)
            }
            Ok(IdentityOutcome::Found(found)) => {
                let native = found.author_name_raw.as_deref().map(normalize_name);
                let mut patch = RecordPatch::new();
                patch
                    .set(Field::LocalAuthorId, &found.local_author_id)
                    .set_opt(Field::CrossRegistryId, found.cross_registry_id.as_deref())
                    .set_opt(Field::AuthorNameRaw, found.author_name_raw.as_deref())
                    .set_opt(Field::AuthorNameNative, native.as_deref());
                self.keep_existing(record, &mut patch, "Identity");

                if let Some(row) = self.merge(id, &patch, "identity")? {
                    return Ok(Some(row));
                }
                self.advance(id, Status::IdentityResolved)?;
                self.store.flush()?;
                Ok(None)
            }
        }
    }

    /// Drop proposals for fields the record already holds; log disagreements.
    fn keep_existing(&self, record: &Record, patch: &mut RecordPatch, stage: &str) {
        for c in patch.retain_missing(record) {
            logw!(
                "{}: {} registry reports {} = {:?}, keeping {:?}",
                stage, record.record_id, c.field, c.proposed, c.existing
            );
        }
    }

    /// Merge, turning a conflict into a result row with the record untouched.
    fn merge(&mut self, id: &str, patch: &RecordPatch, stage: &str) -> Result<Option<ResultRow>, StoreError> {
        match self.store.merge(id, patch) {
            Ok(_) => Ok(None),
            Err(e @ StoreError::MergeConflict { .. }) => {
                loge!("Run: {} {}", id, e);
                let record = self.snapshot_of(id)?;
                Ok(Some(ResultRow::new(&record, stage, "merge_conflict", e.to_string())))
            }
            Err(e) => Err(e),
        }
    }

    fn fail(&mut self, id: &str, stage: &str, e: &SessionError) -> Result<ResultRow, StoreError> {
        loge!("Run: {} {} failed: {}", id, stage, e);
        self.finish(id, Status::Failed, stage, "failed", e.to_string())
    }

    /// Advance, flush, report.
    fn finish(
        &mut self,
        id: &str,
        status: Status,
        stage: &str,
        outcome: &str,
        detail: impl Into<String>,
    ) -> Result<ResultRow, StoreError> {
        let _stage = info_span!("stage", stage = "store").entered();
        self.advance(id, status)?;
        self.store.flush()?;
        let record = self.snapshot_of(id)?;
        logf!("Run: {} -> {} ({})", id, record.status, outcome);
        Ok(ResultRow::new(&record, stage, outcome, detail))
    }

    /// Move forward when allowed; a retried `failed` record stays failed
    /// until it reaches a terminal state.
    fn advance(&mut self, id: &str, status: Status) -> Result<(), StoreError> {
        let current = self.snapshot_of(id)?.status;
        if current.can_advance_to(status) {
            self.store.set_status(id, status)?;
        } else {
            logd!("Run: {} stays {} (not moving to {})", id, current, status);
        }
        Ok(())
    }

    fn snapshot_of(&self, id: &str) -> Result<Record, StoreError> {
        self.store.get(id).cloned().ok_or_else(|| StoreError::UnknownRecord(s!(id)))
    }
}

fn pause([lo, hi]: [u64; 2]) {
    let ms = if hi > lo { rand::rng().random_range(lo..=hi) } else { lo };
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/* ---------------- Report ---------------- */

/// Per-status counts and the failed ids of a persisted table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub total: usize,
    pub counts: Vec<(Status, usize)>,
    pub failed: Vec<String>,
}

pub fn report(store: &CheckpointedStore) -> StatusReport {
    StatusReport {
        total: store.len(),
        counts: store.counts(),
        failed: store
            .records()
            .iter()
            .filter(|r| r.status == Status::Failed)
            .map(|r| r.record_id.clone())
            .collect(),
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} records", self.total)?;
        for (status, count) in &self.counts {
            writeln!(f, "  {:<20} {}", status.as_str(), count)?;
        }
        if !self.failed.is_empty() {
            writeln!(f, "failed: {}", self.failed.join(","))?;
        }
        Ok(())
    }
}
