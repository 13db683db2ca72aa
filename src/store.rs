// src/store.rs
//
// Checkpointed table store.
//
// The table on disk is the source of truth between runs. Columns are bound to
// record fields by name (canonical names or the legacy aliases older tables
// use); anything else in the table is carried through untouched. Enrichment
// only ever adds columns, appended at the end under their canonical names.
//
// Flush is write-new-then-rename in the target directory, so a reader never
// sees a half-written table.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::options::TableShape;
use crate::core::sanitize::normalize_id;
use crate::error::StoreError;
use crate::record::{Attribute, Field, Record, RecordPatch, Status};

const BOM: char = '\u{feff}';

const ARTICLE_KEYS: &[&str] = &["record_id", "article-id", "article_id", "artid"];
const AUTHOR_KEYS: &[&str] = &["author-id", "author_id", "local_author_id"];
const STATUS_COLUMN: &str = "status";

/// Column names accepted for a field, canonical first.
fn aliases(field: Field) -> &'static [&'static str] {
    match field {
        Field::LocalAuthorId => &["local_author_id", "author-id", "author_id", "crt_id", "cret_id"],
        Field::CrossRegistryId => &["cross_registry_id", "kri_num", "kri_id"],
        Field::AuthorNameRaw => &["author_name_raw", "author_name"],
        Field::AuthorNameNative => &["author_name_native", "author_name_kor", "name"],
        Field::Attr(a) => match a {
            Attribute::BirthYear => &["birth_year", "birth"],
            Attribute::Gender => &["gender"],
            Attribute::Affiliation => &["affiliation", "univ"],
            Attribute::Department => &["department"],
            Attribute::Rank => &["rank", "job"],
            Attribute::Field => &["field", "major"],
            Attribute::AlmaMater => &["alma_mater", "grad"],
            Attribute::Degree => &["degree", "diploma"],
        },
    }
}

fn is_id_field(field: Field) -> bool {
    matches!(field, Field::LocalAuthorId | Field::CrossRegistryId)
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| headers.iter().position(|h| h.eq_ignore_ascii_case(n)))
}

/// Column bound to `names`, appended under the first name if none exists.
fn ensure_column(names: &[&str], headers: &mut Vec<String>, rows: &mut [Vec<String>]) -> usize {
    if let Some(c) = find_column(headers, names) {
        return c;
    }
    headers.push(s!(names[0]));
    for row in rows.iter_mut() {
        row.resize(headers.len(), s!());
    }
    logd!("Store: adding column {}", names[0]);
    headers.len() - 1
}

pub struct CheckpointedStore {
    path: PathBuf,
    shape: TableShape,
    bom: bool,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    bindings: Vec<(Field, usize)>,
    status_col: usize,
    records: Vec<Record>,
    index: HashMap<String, usize>,
    /// Record index -> rows carrying that record id.
    owners: Vec<Vec<usize>>,
    snapshot_dir: Option<PathBuf>,
}

impl CheckpointedStore {
    /// Read the table and rebuild every record. Missing enrichment columns are
    /// added (empty); rows sharing an id become one record.
    pub fn load(path: &Path, shape: TableShape) -> Result<Self, StoreError> {
        let raw = fs::read_to_string(path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
        let (bom, text) = match raw.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, raw.as_str()),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut headers: Vec<String> = rdr.headers()?.iter().map(|h| s!(h.trim())).collect();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for rec in rdr.records() {
            let rec = rec?;
            let mut row: Vec<String> = rec.iter().map(str::to_string).collect();
            row.resize(headers.len().max(row.len()), s!());
            rows.push(row);
        }

        let (shape, key_col) = match shape {
            TableShape::Article => (TableShape::Article, find_column(&headers, ARTICLE_KEYS)),
            TableShape::Author => (TableShape::Author, find_column(&headers, AUTHOR_KEYS)),
            TableShape::Auto => match find_column(&headers, ARTICLE_KEYS) {
                Some(c) => (TableShape::Article, Some(c)),
                None => (TableShape::Author, find_column(&headers, AUTHOR_KEYS)),
            },
        };
        let key_col = key_col.ok_or_else(|| StoreError::MissingKey {
            candidates: match shape {
                TableShape::Author => AUTHOR_KEYS,
                _ => ARTICLE_KEYS,
            }
            .iter()
            .map(|k| s!(*k))
            .collect(),
        })?;

        let bindings: Vec<(Field, usize)> = Field::all()
            .map(|f| (f, ensure_column(aliases(f), &mut headers, &mut rows)))
            .collect();
        let had_status = find_column(&headers, &[STATUS_COLUMN]).is_some();
        let status_col = ensure_column(&[STATUS_COLUMN], &mut headers, &mut rows);
        for row in rows.iter_mut() {
            row.resize(headers.len(), s!());
        }

        let mut records: Vec<Record> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut owners: Vec<Vec<usize>> = Vec::new();
        let mut explicit: Vec<bool> = Vec::new();

        for (ri, row) in rows.iter().enumerate() {
            let key = normalize_id(&row[key_col]);
            if key.is_empty() {
                logw!("Store: row {} has no id, left as-is", ri + 2);
                continue;
            }
            let idx = *index.entry(key.clone()).or_insert_with(|| {
                records.push(Record::new(key.clone()));
                owners.push(Vec::new());
                explicit.push(false);
                records.len() - 1
            });
            owners[idx].push(ri);
            let record = &mut records[idx];

            for &(field, col) in &bindings {
                let cell = row[col].trim();
                let value = if is_id_field(field) { normalize_id(cell) } else { s!(cell) };
                if value.is_empty() {
                    continue;
                }
                match record.get(field) {
                    Some(existing) if existing != value => {
                        logd!("Store: {} duplicate row disagrees on {} ({:?} kept)", key, field, existing);
                    }
                    _ => record.load_field(field, value),
                }
            }

            let cell = row[status_col].trim();
            if !cell.is_empty() && !explicit[idx] {
                match cell.parse::<Status>() {
                    Ok(st) => {
                        record.status = st;
                        explicit[idx] = true;
                    }
                    Err(_) => logw!("Store: {} unknown status {:?}, deriving", key, cell),
                }
            }
        }

        for (record, explicit) in records.iter_mut().zip(&explicit) {
            if !explicit && record.is_complete() {
                record.status = Status::AttributesResolved;
            }
        }

        logf!(
            "Store: loaded {} records from {} ({} rows, {:?} table{})",
            records.len(),
            path.display(),
            rows.len(),
            shape,
            if had_status { "" } else { ", status derived" }
        );

        let mut store = Self {
            path: path.to_path_buf(),
            shape,
            bom,
            headers,
            rows,
            bindings,
            status_col,
            records,
            index,
            owners,
            snapshot_dir: None,
        };
        // Duplicates and normalized ids go back to every owning row.
        for i in 0..store.records.len() {
            store.write_back(i);
        }
        Ok(store)
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The detected (or requested) table shape; never `Auto`.
    pub fn shape(&self) -> TableShape {
        self.shape
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, record_id: &str) -> Option<&Record> {
        self.index.get(record_id).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Per-status counts, every status listed.
    pub fn counts(&self) -> Vec<(Status, usize)> {
        Status::ALL
            .into_iter()
            .map(|s| (s, self.records.iter().filter(|r| r.status == s).count()))
            .collect()
    }

    fn position(&self, record_id: &str) -> Result<usize, StoreError> {
        self.index
            .get(record_id)
            .copied()
            .ok_or_else(|| StoreError::UnknownRecord(s!(record_id)))
    }

    /// Fill empty fields of `record_id` from `patch`. A conflict rejects the
    /// whole patch and leaves the record as it was.
    pub fn merge(&mut self, record_id: &str, patch: &RecordPatch) -> Result<usize, StoreError> {
        let i = self.position(record_id)?;
        let changed = self.records[i].apply(patch).map_err(|c| StoreError::MergeConflict {
            record_id: s!(record_id),
            field: c.field.to_string(),
            existing: c.existing,
            proposed: c.proposed,
        })?;
        if changed > 0 {
            self.write_back(i);
        }
        Ok(changed)
    }

    /// Move `record_id` forward to `status`.
    pub fn set_status(&mut self, record_id: &str, status: Status) -> Result<bool, StoreError> {
        let i = self.position(record_id)?;
        let changed = self.records[i].advance(status).map_err(|from| StoreError::StatusRegression {
            record_id: s!(record_id),
            from,
            to: status,
        })?;
        if changed {
            self.write_back(i);
        }
        Ok(changed)
    }

    fn write_back(&mut self, i: usize) {
        let record = &self.records[i];
        for &ri in &self.owners[i] {
            let row = &mut self.rows[ri];
            for &(field, col) in &self.bindings {
                if let Some(v) = record.get(field) {
                    row[col] = s!(v);
                }
            }
            row[self.status_col] = s!(record.status.as_str());
        }
    }

    /// Durably replace the canonical table.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.write_table(&self.path)
    }

    /// Dated copy next to the canonical table (or in the snapshot directory):
    /// `<stem>_<tag>_<YYYYmmdd_HHMMSS>.csv`.
    pub fn snapshot(&self, tag: &str) -> Result<PathBuf, StoreError> {
        let dir = self.snapshot_dir.clone().unwrap_or_else(|| parent_dir(&self.path).to_path_buf());
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}_{}.csv", self.stem(), tag, stamp));
        self.write_table(&path)?;
        logf!("Store: snapshot {}", path.display());
        Ok(path)
    }

    /// File stem of the canonical table.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| s!("table"))
    }

    fn write_table(&self, path: &Path) -> Result<(), StoreError> {
        atomic_write(path, |out| {
            if self.bom {
                write!(out, "{BOM}").map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
            }
            let mut w = csv::Writer::from_writer(out);
            w.write_record(&self.headers)?;
            for row in &self.rows {
                w.write_record(row)?;
            }
            w.flush().map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
            Ok(())
        })
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Write through a temp file in the target directory, then rename over `path`.
fn atomic_write<F>(path: &Path, fill: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), StoreError>,
{
    let dir = parent_dir(path);
    let io_err = |source| StoreError::Io { path: path.to_path_buf(), source };
    fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    fill(&mut tmp)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|source| StoreError::Persist { path: path.to_path_buf(), source })?;
    Ok(())
}

/// Serialize `rows` (with a header row) to `path`, atomically.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    atomic_write(path, |out| {
        let mut w = csv::Writer::from_writer(out);
        for row in rows {
            w.serialize(row)?;
        }
        w.flush().map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let p = dir.path().join(name);
        fs::write(&p, text).unwrap();
        p
    }

    #[test]
    fn legacy_columns_bind_and_float_ids_normalize() {
        let dir = tempfile::tempdir().unwrap();
        let p = table(
            &dir,
            "kor.csv",
            "\u{feff}artid,title,author-id,kri_num,author_name,birth,gender\n\
             ART1,제목,CRT1,10032099.0,\"김용수\n/YONGSOO KIM\",1975,남\n\
             ART2,다른,,,,,\n",
        );
        let store = CheckpointedStore::load(&p, TableShape::Auto).unwrap();
        assert_eq!(store.shape(), TableShape::Article);
        let r1 = store.get("ART1").unwrap();
        assert_eq!(r1.cross_registry_id.as_deref(), Some("10032099"));
        assert_eq!(r1.local_author_id.as_deref(), Some("CRT1"));
        assert_eq!(r1.attribute(Attribute::BirthYear), Some("1975"));
        assert_eq!(r1.status, Status::AttributesResolved);
        assert_eq!(store.get("ART2").unwrap().status, Status::Unresolved);

        // Additive: old columns kept in place, new canonical ones appended.
        assert_eq!(&store.headers()[..7], &["artid", "title", "author-id", "kri_num", "author_name", "birth", "gender"]);
        assert!(store.headers().iter().any(|h| h == "affiliation"));
        assert!(store.headers().iter().any(|h| h == "status"));
    }

    #[test]
    fn flush_keeps_bom_and_unknown_columns() {
        let dir = tempfile::tempdir().unwrap();
        let p = table(&dir, "t.csv", "\u{feff}record_id,note\nR1,keep me\n");
        let mut store = CheckpointedStore::load(&p, TableShape::Auto).unwrap();
        let mut patch = RecordPatch::new();
        patch.set(Field::CrossRegistryId, "77");
        store.merge("R1", &patch).unwrap();
        store.set_status("R1", Status::IdentityResolved).unwrap();
        store.flush().unwrap();

        let text = fs::read_to_string(&p).unwrap();
        assert!(text.starts_with('\u{feff}'));
        assert!(text.contains("keep me"));
        let again = CheckpointedStore::load(&p, TableShape::Auto).unwrap();
        let r = again.get("R1").unwrap();
        assert_eq!(r.cross_registry_id.as_deref(), Some("77"));
        assert_eq!(r.status, Status::IdentityResolved);
    }

    #[test]
    fn duplicate_ids_share_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let p = table(&dir, "d.csv", "record_id,cross_registry_id,gender\nR1,5,\nR1,,여\n");
        let mut store = CheckpointedStore::load(&p, TableShape::Article).unwrap();
        assert_eq!(store.len(), 1);
        let mut patch = RecordPatch::new();
        patch.set(Field::Attr(Attribute::BirthYear), "1980");
        store.merge("R1", &patch).unwrap();
        store.flush().unwrap();

        let mut rdr = csv::Reader::from_path(&p).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(&row[1], "5");
            assert_eq!(&row[2], "여");
        }
    }

    #[test]
    fn conflicting_merge_is_rejected_whole() {
        let dir = tempfile::tempdir().unwrap();
        let p = table(&dir, "c.csv", "record_id,cross_registry_id,birth_year\nR1,5,\n");
        let mut store = CheckpointedStore::load(&p, TableShape::Auto).unwrap();
        let mut patch = RecordPatch::new();
        patch.set(Field::CrossRegistryId, "6").set(Field::Attr(Attribute::BirthYear), "1970");
        assert!(matches!(store.merge("R1", &patch), Err(StoreError::MergeConflict { .. })));
        assert_eq!(store.get("R1").unwrap().attribute(Attribute::BirthYear), None);
    }

    #[test]
    fn status_never_regresses() {
        let dir = tempfile::tempdir().unwrap();
        let p = table(&dir, "s.csv", "record_id,status\nR1,no_identity\n");
        let mut store = CheckpointedStore::load(&p, TableShape::Auto).unwrap();
        assert!(matches!(
            store.set_status("R1", Status::Unresolved),
            Err(StoreError::StatusRegression { .. })
        ));
        assert!(matches!(store.set_status("nope", Status::Failed), Err(StoreError::UnknownRecord(_))));
    }

    #[test]
    fn author_tables_key_on_author_id() {
        let dir = tempfile::tempdir().unwrap();
        let p = table(&dir, "a.csv", "author-id,author_name_kor\nCRT9,홍길동\n");
        let store = CheckpointedStore::load(&p, TableShape::Auto).unwrap();
        assert_eq!(store.shape(), TableShape::Author);
        let r = store.get("CRT9").unwrap();
        assert_eq!(r.local_author_id.as_deref(), Some("CRT9"));
        assert_eq!(r.author_name_native.as_deref(), Some("홍길동"));
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = table(&dir, "m.csv", "title\nx\n");
        assert!(matches!(
            CheckpointedStore::load(&p, TableShape::Auto),
            Err(StoreError::MissingKey { .. })
        ));
    }

    #[test]
    fn snapshot_is_named_after_table_and_tag() {
        let dir = tempfile::tempdir().unwrap();
        let p = table(&dir, "kor.csv", "record_id\nR1\n");
        let snaps = dir.path().join("revise_data");
        let store = CheckpointedStore::load(&p, TableShape::Auto).unwrap().with_snapshot_dir(&snaps);
        let s = store.snapshot("temp").unwrap();
        assert!(s.starts_with(&snaps));
        let name = s.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("kor_temp_") && name.ends_with(".csv"));
        assert!(s.exists());
    }
}
