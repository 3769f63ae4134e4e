use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::{self, LoadPolicy, LoadReport};
use crate::error::{Result, StoreError};
use crate::record::{IdentityRecord, Match};
use crate::similarity::dot;

/// Embedding dimension produced by the face encoder.
pub const DEFAULT_DIM: usize = 128;

/// Options for [`FeatureStore::open_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Embedding dimension. Fixed for the lifetime of the store.
    pub dim: usize,
    /// Treatment of malformed content in the backing file.
    pub policy: LoadPolicy,
    /// Create the backing file's parent directory on open.
    pub create_dirs: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            dim: DEFAULT_DIM,
            policy: LoadPolicy::Lenient,
            create_dirs: false,
        }
    }
}

/// Whether an upsert created or replaced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
}

/// File-backed registry of named face embeddings.
///
/// Every mutating call persists the resulting state before it returns. The
/// new state is written to a temporary file, synced and renamed over the
/// backing file; memory is only updated once that succeeded, so a
/// [`StoreError::Persistence`] leaves memory and disk in agreement.
///
/// Not synchronized: one instance per backing file, callers serialize
/// access themselves.
#[derive(Debug)]
pub struct FeatureStore {
    path: PathBuf,
    opts: StoreOptions,
    records: Vec<IdentityRecord>,
    report: LoadReport,
}

impl FeatureStore {
    /// Open the store at `path` with the default options.
    /// A missing file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, opts: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if opts.dim == 0 {
            return Err(StoreError::InvalidField {
                field: "dim",
                reason: "must be positive".into(),
            });
        }

        if opts.create_dirs {
            if let Some(parent) = non_empty_parent(&path) {
                fs::create_dir_all(parent).map_err(|source| StoreError::Persistence {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut store = Self {
            path,
            opts,
            records: Vec::new(),
            report: LoadReport::default(),
        };

        let text = match fs::read_to_string(&store.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %store.path.display(), "facedb: database file not found, starting empty");
                return Ok(store);
            }
            Err(source) => {
                return Err(StoreError::Load {
                    path: store.path,
                    source,
                });
            }
        };

        let decoded = codec::decode(&text, store.opts.dim, store.opts.policy)?;
        if decoded.report.truncated > 0 {
            // Writing these records back would drop their extra components.
            warn!(
                path = %store.path.display(),
                lines = decoded.report.truncated,
                widest = decoded.widest,
                dim = store.opts.dim,
                "facedb: database holds wider embeddings than the store dimension"
            );
            return Err(StoreError::DimensionMismatch {
                got: decoded.widest,
                want: store.opts.dim,
            });
        }
        store.records = decoded.records;
        store.report = decoded.report;

        info!(
            path = %store.path.display(),
            loaded = store.report.loaded,
            skipped = store.report.skipped,
            duplicates = store.report.duplicates,
            "facedb: loaded persons from database"
        );
        Ok(store)
    }

    /// Open the store, run `f`, then flush on every exit path of `f`.
    ///
    /// An error from `f` takes precedence over a failed final flush; the
    /// flush failure is then only logged. After a successful `f`, a
    /// failed flush is returned.
    pub fn session<T, E, F>(path: impl AsRef<Path>, opts: StoreOptions, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut FeatureStore) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut store = Self::open_with(path, opts)?;
        let result = f(&mut store);
        let flushed = store.close();

        match (result, flushed) {
            (Ok(v), Ok(())) => Ok(v),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(flush_err)) => {
                warn!(error = %flush_err, "facedb: final flush failed");
                Err(e)
            }
        }
    }

    /// Add a person, or replace the image path, embedding and confidence of
    /// an existing person with the same name. The record keeps its position.
    pub fn upsert(
        &mut self,
        name: &str,
        source_image_path: &str,
        embedding: &[f32],
        confidence: f32,
    ) -> Result<Upsert> {
        self.upsert_record(IdentityRecord::new(
            name,
            source_image_path,
            embedding.to_vec(),
            confidence,
        ))
    }

    pub fn upsert_record(&mut self, record: IdentityRecord) -> Result<Upsert> {
        record.validate(self.opts.dim)?;
        let name = record.name.clone();

        let mut next = self.records.clone();
        let outcome = match next.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => {
                existing.source_image_path = record.source_image_path;
                existing.embedding = record.embedding;
                existing.confidence = record.confidence;
                Upsert::Updated
            }
            None => {
                next.push(record);
                Upsert::Added
            }
        };

        self.commit(next)?;
        match outcome {
            Upsert::Added => info!(%name, "facedb: added new person"),
            Upsert::Updated => info!(%name, "facedb: updated person"),
        }
        Ok(outcome)
    }

    /// Find the best stored identity for `query`.
    ///
    /// Scores are raw dot products. A record wins only if its score is
    /// strictly greater than the best so far (starting at 0.0) and at least
    /// `threshold`; on ties the earlier record wins. Returns `None` when
    /// nothing qualifies.
    pub fn search(&self, query: &[f32], threshold: f32) -> Result<Option<Match>> {
        if query.len() != self.opts.dim {
            return Err(StoreError::DimensionMismatch {
                got: query.len(),
                want: self.opts.dim,
            });
        }
        if self.records.is_empty() {
            return Ok(None);
        }

        let mut best: Option<&IdentityRecord> = None;
        let mut best_score: f32 = 0.0;
        for r in &self.records {
            let score = dot(query, &r.embedding);
            if score > best_score && score >= threshold {
                best_score = score;
                best = Some(r);
            }
        }

        debug!(
            candidates = self.records.len(),
            threshold,
            best = best.map(|r| r.name.as_str()).unwrap_or(crate::UNKNOWN),
            score = best_score,
            "facedb: search"
        );
        Ok(best.map(|r| Match {
            name: r.name.clone(),
            score: best_score,
        }))
    }

    /// Bulk query path: like [`search`](Self::search) but never fails.
    /// No match and ill-shaped queries both yield [`Match::unknown`].
    pub fn identify(&self, query: &[f32], threshold: f32) -> Match {
        match self.search(query, threshold) {
            Ok(Some(m)) => m,
            Ok(None) => Match::unknown(),
            Err(e) => {
                debug!(error = %e, "facedb: rejecting query");
                Match::unknown()
            }
        }
    }

    /// Remove the person called `name`. Returns false if absent.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        if !self.contains(name) {
            info!(name, "facedb: person not found");
            return Ok(false);
        }

        let next: Vec<IdentityRecord> = self
            .records
            .iter()
            .filter(|r| r.name != name)
            .cloned()
            .collect();
        self.commit(next)?;
        info!(name, "facedb: removed person");
        Ok(true)
    }

    /// Remove every record and persist the empty state.
    pub fn clear(&mut self) -> Result<()> {
        let n = self.records.len();
        self.commit(Vec::new())?;
        info!(removed = n, "facedb: cleared database");
        Ok(())
    }

    /// Snapshot of all records in insertion order.
    pub fn list(&self) -> Vec<IdentityRecord> {
        self.records.clone()
    }

    /// Borrowed view of all records in insertion order.
    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    pub fn get(&self, name: &str) -> Option<&IdentityRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.opts.dim
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Statistics from the initial load.
    pub fn load_report(&self) -> LoadReport {
        self.report
    }

    /// Re-persist the current state.
    pub fn flush(&self) -> Result<()> {
        self.persist(&self.records)
    }

    /// Flush and release the store.
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    fn commit(&mut self, next: Vec<IdentityRecord>) -> Result<()> {
        self.persist(&next)?;
        self.records = next;
        Ok(())
    }

    fn persist(&self, records: &[IdentityRecord]) -> Result<()> {
        let tmp = tmp_path(&self.path);
        write_atomic(&self.path, &tmp, records).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StoreError::Persistence {
                path: self.path.clone(),
                source,
            }
        })?;

        // The rename already replaced the file; the new state is what
        // memory must reflect from here on.
        if let Err(e) = sync_parent(&self.path) {
            warn!(path = %self.path.display(), error = %e, "facedb: directory sync failed");
        }
        Ok(())
    }
}

/// Write to `tmp`, fsync, then rename over `path`.
fn write_atomic(path: &Path, tmp: &Path, records: &[IdentityRecord]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp)?;
    codec::encode(records, &mut file)?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp, path)
}

/// Make a rename in the parent directory of `path` durable.
fn sync_parent(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let parent = non_empty_parent(path).unwrap_or_else(|| Path::new("."));
        fs::File::open(parent)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn opts(dim: usize) -> StoreOptions {
        StoreOptions {
            dim,
            ..StoreOptions::default()
        }
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let store = FeatureStore::open(dir.path().join("db.txt")).unwrap();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.dim(), DEFAULT_DIM);
        assert!(store.load_report().is_clean());
    }

    #[test]
    fn test_upsert_add_then_update() {
        let dir = tempdir().unwrap();
        let mut store = FeatureStore::open_with(dir.path().join("db.txt"), opts(3)).unwrap();

        assert_eq!(store.upsert("a", "a1.jpg", &[1.0, 0.0, 0.0], 0.9).unwrap(), Upsert::Added);
        assert_eq!(store.upsert("b", "b.jpg", &[0.0, 1.0, 0.0], 0.8).unwrap(), Upsert::Added);
        assert_eq!(store.upsert("a", "a2.jpg", &[0.0, 0.0, 1.0], 0.7).unwrap(), Upsert::Updated);

        assert_eq!(store.len(), 2);
        let list = store.list();
        assert_eq!(list[0].name, "a");
        assert_eq!(list[0].source_image_path, "a2.jpg");
        assert_eq!(list[0].embedding, vec![0.0, 0.0, 1.0]);
        assert_eq!(list[0].confidence, 0.7);
        assert_eq!(list[1].name, "b");
    }

    #[test]
    fn test_upsert_rejects_bad_input_without_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.txt");
        let mut store = FeatureStore::open_with(&path, opts(3)).unwrap();
        store.upsert("a", "a.jpg", &[1.0, 0.0, 0.0], 1.0).unwrap();

        let err = store.upsert("b", "b.jpg", &[1.0, 0.0], 1.0).unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { got: 2, want: 3 }));
        assert!(err.is_input_error());

        assert!(matches!(
            store.upsert("", "x.jpg", &[1.0, 0.0, 0.0], 1.0),
            Err(StoreError::InvalidName(_))
        ));
        assert!(store.upsert("c|d", "x.jpg", &[1.0, 0.0, 0.0], 1.0).is_err());
        assert!(matches!(
            store.upsert(crate::UNKNOWN, "x.jpg", &[1.0, 0.0, 0.0], 1.0),
            Err(StoreError::InvalidName(_))
        ));

        assert_eq!(store.len(), 1);
        assert_eq!(FeatureStore::open_with(&path, opts(3)).unwrap().len(), 1);
    }

    #[test]
    fn test_mutations_are_persisted_immediately() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.txt");
        let mut store = FeatureStore::open_with(&path, opts(2)).unwrap();

        store.upsert("a", "a.jpg", &[0.5, 0.25], 0.9).unwrap();
        let reopened = FeatureStore::open_with(&path, opts(2)).unwrap();
        assert_eq!(reopened.list(), store.list());

        assert!(store.remove("a").unwrap());
        assert!(FeatureStore::open_with(&path, opts(2)).unwrap().is_empty());
    }

    #[test]
    fn test_search_picks_best() {
        let dir = tempdir().unwrap();
        let mut store = FeatureStore::open_with(dir.path().join("db.txt"), opts(2)).unwrap();
        store.upsert("far", "", &[0.7, 0.0], 1.0).unwrap();
        store.upsert("near", "", &[0.9, 0.0], 1.0).unwrap();

        let m = store.search(&[1.0, 0.0], 0.5).unwrap().unwrap();
        assert_eq!(m.name, "near");
        assert!((m.score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_search_tie_first_wins() {
        let dir = tempdir().unwrap();
        let mut store = FeatureStore::open_with(dir.path().join("db.txt"), opts(2)).unwrap();
        store.upsert("first", "", &[0.5, 0.5], 1.0).unwrap();
        store.upsert("second", "", &[0.5, 0.5], 1.0).unwrap();

        let m = store.search(&[1.0, 1.0], 0.1).unwrap().unwrap();
        assert_eq!(m.name, "first");
    }

    #[test]
    fn test_search_below_threshold() {
        let dir = tempdir().unwrap();
        let mut store = FeatureStore::open_with(dir.path().join("db.txt"), opts(2)).unwrap();
        store.upsert("a", "", &[0.3, 0.0], 1.0).unwrap();

        assert!(store.search(&[1.0, 0.0], 0.6).unwrap().is_none());
        assert!(store.identify(&[1.0, 0.0], 0.6).is_unknown());
    }

    #[test]
    fn test_search_non_positive_scores_never_match() {
        let dir = tempdir().unwrap();
        let mut store = FeatureStore::open_with(dir.path().join("db.txt"), opts(2)).unwrap();
        store.upsert("a", "", &[-1.0, 0.0], 1.0).unwrap();

        assert!(store.search(&[1.0, 0.0], -5.0).unwrap().is_none());
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let mut store = FeatureStore::open_with(dir.path().join("db.txt"), opts(2)).unwrap();
        store.upsert("a", "", &[1.0, 0.0], 1.0).unwrap();

        assert!(matches!(
            store.search(&[1.0], 0.0),
            Err(StoreError::DimensionMismatch { got: 1, want: 2 })
        ));
        assert_eq!(store.identify(&[1.0], 0.0), Match::unknown());
    }

    #[test]
    fn test_remove_missing() {
        let dir = tempdir().unwrap();
        let mut store = FeatureStore::open_with(dir.path().join("db.txt"), opts(2)).unwrap();
        store.upsert("a", "", &[1.0, 0.0], 1.0).unwrap();

        assert!(!store.remove("X").unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.txt");
        let mut store = FeatureStore::open_with(&path, opts(2)).unwrap();
        store.upsert("a", "", &[1.0, 0.0], 1.0).unwrap();
        store.upsert("b", "", &[0.0, 1.0], 1.0).unwrap();

        store.clear().unwrap();
        assert_eq!(store.len(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n");
    }

    #[test]
    fn test_persistence_failure_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("db.txt");
        let mut store = FeatureStore::open_with(&path, opts(2)).unwrap();

        let err = store.upsert("a", "", &[1.0, 0.0], 1.0).unwrap_err();
        assert!(matches!(err, StoreError::Persistence { .. }));
        assert!(store.is_empty());
        assert!(store.flush().is_err());
    }

    #[test]
    fn test_create_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("db.txt");
        let mut store = FeatureStore::open_with(
            &path,
            StoreOptions {
                dim: 2,
                create_dirs: true,
                ..StoreOptions::default()
            },
        )
        .unwrap();

        store.upsert("a", "", &[1.0, 0.0], 1.0).unwrap();
        assert!(path.exists());
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_zero_dim_rejected() {
        let dir = tempdir().unwrap();
        assert!(FeatureStore::open_with(dir.path().join("db.txt"), opts(0)).is_err());
    }

    #[test]
    fn test_strict_load_fails_on_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.txt");
        fs::write(&path, "2\na||1|1|0\nbad\n").unwrap();

        let lenient = FeatureStore::open_with(&path, opts(2)).unwrap();
        assert_eq!(lenient.len(), 1);
        assert_eq!(lenient.load_report().skipped, 1);

        let strict = FeatureStore::open_with(
            &path,
            StoreOptions {
                dim: 2,
                policy: LoadPolicy::Strict,
                create_dirs: false,
            },
        );
        assert!(matches!(strict, Err(StoreError::Parse { line: 3, .. })));
    }

    #[test]
    fn test_wider_records_are_not_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.txt");
        let original = "1\nA|a.jpg|0.9|1|2|3|4|5|6|7|8\n";
        fs::write(&path, original).unwrap();

        let res = FeatureStore::session(&path, opts(4), |store| -> Result<usize> { Ok(store.len()) });
        assert!(matches!(res, Err(StoreError::DimensionMismatch { got: 8, want: 4 })));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);

        // The matching dimension still opens the file unchanged.
        let store = FeatureStore::open_with(&path, opts(8)).unwrap();
        assert_eq!(store.get("A").unwrap().embedding.len(), 8);
        assert!(store.load_report().is_clean());
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_sync_is_not_part_of_the_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.txt");
        write_atomic(&path, &tmp_path(&path), &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n");
        sync_parent(&path).unwrap();

        // A failing directory sync surfaces only from sync_parent, which
        // persist downgrades to a warning once the rename has happened.
        assert!(sync_parent(&dir.path().join("gone").join("db.txt")).is_err());
    }

    #[test]
    fn test_session_flushes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.txt");

        let n = FeatureStore::session(&path, opts(2), |store| -> Result<usize> {
            store.upsert("a", "", &[1.0, 0.0], 1.0)?;
            Ok(store.len())
        })
        .unwrap();
        assert_eq!(n, 1);

        // A read-only session still leaves a well-formed file behind.
        fs::remove_file(&path).unwrap();
        FeatureStore::session(&path, opts(2), |store| -> Result<()> {
            assert!(store.is_empty());
            Ok(())
        })
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n");
    }

    #[test]
    fn test_session_propagates_closure_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.txt");

        let err = FeatureStore::session(&path, opts(2), |store| -> Result<()> {
            store.upsert("a", "", &[1.0, 0.0], 1.0)?;
            store.upsert("b", "", &[1.0], 1.0)?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));

        // Work done before the error is durable.
        assert_eq!(FeatureStore::open_with(&path, opts(2)).unwrap().len(), 1);
    }
}
