//! File-backed content store.
//!
//! Layout inside the store directory:
//! ```text
//! store.meta.json                  - schema versions
//! subjects/<key>/                  - key is a hash prefix of the subject id
//!   subject.meta.json              - counts, head, version index
//!   versions/000001.version.cbor.zst   - CBOR+zstd version records
//!   activity/000001.activity.cbor.zst  - CBOR+zstd activity entries
//!   integrity/manifest.json        - hash chain manifest
//! ```
//!
//! `subject.meta.json` is written last, so a segment only counts once the
//! metadata naming it is on disk. Manifest entries past the committed
//! counts are dropped on load.

use chronicle_codec::sha256_hex;
use chronicle_common::{
    ActivityFilter, CollaboratorActivity, HistoryFilter, Page, SubjectId, VersionRecord,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::{ContentStore, StoreError, check_write, newest_first};

/// Current schema versions.
const STORE_SCHEMA_VERSION: u32 = 1;
const RECORD_SCHEMA_VERSION: u32 = 1;

const STORE_META: &str = "store.meta.json";
const SUBJECT_META: &str = "subject.meta.json";
const MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Version,
    Activity,
}

impl Segment {
    fn dir(self) -> &'static str {
        match self {
            Self::Version => "versions",
            Self::Activity => "activity",
        }
    }

    fn filename(self, index: u32) -> String {
        match self {
            Self::Version => format!("{index:06}.version.cbor.zst"),
            Self::Activity => format!("{index:06}.activity.cbor.zst"),
        }
    }

    fn parse(filename: &str) -> Option<(Self, u32)> {
        let mut parts = filename.split('.');
        let index = parts.next()?.parse().ok()?;
        let kind = match parts.next()? {
            "version" => Self::Version,
            "activity" => Self::Activity,
            _ => return None,
        };
        Some((kind, index))
    }
}

/// Metadata stored in store.meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreMeta {
    store_schema_version: u32,
    record_schema_version: u32,
}

/// Metadata stored in each subject.meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectMeta {
    pub subject_id: SubjectId,
    pub record_schema_version: u32,
    pub version_count: u32,
    pub activity_count: u32,
    /// Newest non-snapshot version.
    pub head: Option<String>,
    /// Version string to segment index.
    pub versions: BTreeMap<String, u32>,
}

impl SubjectMeta {
    fn new(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            record_schema_version: RECORD_SCHEMA_VERSION,
            version_count: 0,
            activity_count: 0,
            head: None,
            versions: BTreeMap::new(),
        }
    }

    fn is_committed(&self, entry: &ManifestEntry) -> bool {
        match Segment::parse(&entry.filename) {
            Some((Segment::Version, index)) => index <= self.version_count,
            Some((Segment::Activity, index)) => index <= self.activity_count,
            None => false,
        }
    }
}

/// A single entry in the integrity manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Integrity manifest tracking all segment hashes of a subject in a chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

impl IntegrityManifest {
    fn push(&mut self, filename: String, data: &[u8]) {
        let prev_hash = self.entries.last().map(|e| e.sha256.clone());
        self.entries.push(ManifestEntry {
            filename,
            sha256: sha256_hex(data),
            prev_hash,
        });
    }
}

/// File-backed content store with schema versioning and integrity checking.
///
/// Every operation reads subject state from disk, so handles opened on the
/// same directory within one process see each other's writes. Writes are
/// serialized per handle.
pub struct FileStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open or create a content store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("subjects"))?;

        let meta_path = root.join(STORE_META);
        if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.store_schema_version != STORE_SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    file_version: meta.store_schema_version,
                    expected_version: STORE_SCHEMA_VERSION,
                });
            }
            if meta.record_schema_version != RECORD_SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    file_version: meta.record_schema_version,
                    expected_version: RECORD_SCHEMA_VERSION,
                });
            }
        } else {
            let meta = StoreMeta {
                store_schema_version: STORE_SCHEMA_VERSION,
                record_schema_version: RECORD_SCHEMA_VERSION,
            };
            write_json(&meta_path, &meta)?;
        }
        tracing::debug!(root = %root.display(), "opened file store");

        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    /// Get the path to the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every subject with at least one committed write.
    pub fn subjects(&self) -> Result<Vec<SubjectMeta>, StoreError> {
        let _guard = self.lock.lock();
        let mut subjects = Vec::new();
        for entry in std::fs::read_dir(self.root.join("subjects"))? {
            let meta_path = entry?.path().join(SUBJECT_META);
            if meta_path.exists() {
                subjects.push(read_subject_meta(&meta_path)?);
            }
        }
        subjects.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        Ok(subjects)
    }

    /// Metadata for one subject, if it has been written to.
    pub fn subject_meta(&self, subject: &SubjectId) -> Result<Option<SubjectMeta>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.load_subject(subject)?.map(|(meta, _)| meta))
    }

    /// Verify the hash chain and every segment hash of `subject`.
    pub fn verify_integrity(&self, subject: &SubjectId) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let Some((_, manifest)) = self.load_subject(subject)? else {
            return Ok(());
        };
        let dir = self.subject_dir(subject);
        let mut prev_hash: Option<String> = None;
        for entry in &manifest.entries {
            if entry.prev_hash != prev_hash {
                return Err(StoreError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: prev_hash.unwrap_or_else(|| "None".into()),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }

            let Some((segment, _)) = Segment::parse(&entry.filename) else {
                return Err(StoreError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: "segment file name".into(),
                    actual: entry.filename.clone(),
                });
            };
            let data = std::fs::read(dir.join(segment.dir()).join(&entry.filename))?;
            let actual_hash = sha256_hex(&data);
            if actual_hash != entry.sha256 {
                tracing::error!(
                    subject = %subject,
                    file = %entry.filename,
                    "segment hash mismatch"
                );
                return Err(StoreError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: entry.sha256.clone(),
                    actual: actual_hash,
                });
            }

            prev_hash = Some(entry.sha256.clone());
        }
        Ok(())
    }

    fn subject_dir(&self, subject: &SubjectId) -> PathBuf {
        let key = sha256_hex(subject.as_str().as_bytes());
        self.root.join("subjects").join(&key[..32])
    }

    fn load_subject(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<(SubjectMeta, IntegrityManifest)>, StoreError> {
        let dir = self.subject_dir(subject);
        let meta_path = dir.join(SUBJECT_META);
        if !meta_path.exists() {
            return Ok(None);
        }
        let meta = read_subject_meta(&meta_path)?;
        if &meta.subject_id != subject {
            return Ok(None);
        }
        let manifest_path = dir.join("integrity").join(MANIFEST);
        let mut manifest: IntegrityManifest = if manifest_path.exists() {
            serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
        } else {
            IntegrityManifest::default()
        };
        let before = manifest.entries.len();
        manifest.entries.retain(|e| meta.is_committed(e));
        if manifest.entries.len() != before {
            tracing::warn!(
                subject = %subject,
                dropped = before - manifest.entries.len(),
                "ignoring uncommitted manifest entries"
            );
        }
        Ok(Some((meta, manifest)))
    }

    fn load_or_init(
        &self,
        subject: &SubjectId,
    ) -> Result<(SubjectMeta, IntegrityManifest), StoreError> {
        if let Some(state) = self.load_subject(subject)? {
            return Ok(state);
        }
        let dir = self.subject_dir(subject);
        std::fs::create_dir_all(dir.join(Segment::Version.dir()))?;
        std::fs::create_dir_all(dir.join(Segment::Activity.dir()))?;
        std::fs::create_dir_all(dir.join("integrity"))?;
        Ok((SubjectMeta::new(subject.clone()), IntegrityManifest::default()))
    }

    /// Write a segment and its manifest entry, then commit the metadata.
    fn append_segment<T: Serialize>(
        &self,
        subject: &SubjectId,
        meta: &mut SubjectMeta,
        manifest: &mut IntegrityManifest,
        segment: Segment,
        value: &T,
    ) -> Result<u32, StoreError> {
        let dir = self.subject_dir(subject);
        let index = match segment {
            Segment::Version => meta.version_count + 1,
            Segment::Activity => meta.activity_count + 1,
        };
        let filename = segment.filename(index);

        let cbor_bytes = cbor_serialize(value)?;
        let compressed = zstd_compress(&cbor_bytes)?;

        std::fs::write(dir.join(segment.dir()).join(&filename), &compressed)?;
        manifest.push(filename, &compressed);
        write_json(&dir.join("integrity").join(MANIFEST), manifest)?;

        match segment {
            Segment::Version => meta.version_count = index,
            Segment::Activity => meta.activity_count = index,
        }
        Ok(index)
    }

    fn read_segment<T: for<'de> Deserialize<'de>>(
        &self,
        subject: &SubjectId,
        manifest: &IntegrityManifest,
        segment: Segment,
        index: u32,
    ) -> Result<T, StoreError> {
        let filename = segment.filename(index);
        let path = self.subject_dir(subject).join(segment.dir()).join(&filename);
        let compressed = std::fs::read(&path)?;

        verify_file_hash(manifest, &filename, &compressed)?;

        let cbor_bytes = zstd_decompress(&compressed)?;
        cbor_deserialize(&cbor_bytes)
    }

    fn read_all<T: for<'de> Deserialize<'de>>(
        &self,
        subject: &SubjectId,
        manifest: &IntegrityManifest,
        segment: Segment,
        count: u32,
    ) -> Result<Vec<T>, StoreError> {
        (1..=count)
            .map(|index| self.read_segment(subject, manifest, segment, index))
            .collect()
    }
}

impl ContentStore for FileStore {
    fn save(&self, record: &VersionRecord, expected_head: Option<&str>) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let subject = &record.subject_id;
        let (mut meta, mut manifest) = self.load_or_init(subject)?;
        check_write(
            record,
            expected_head,
            meta.head.as_deref(),
            meta.versions.contains_key(&record.version),
        )?;

        let index =
            self.append_segment(subject, &mut meta, &mut manifest, Segment::Version, record)?;
        meta.versions.insert(record.version.clone(), index);
        if !record.is_snapshot() {
            meta.head = Some(record.version.clone());
        }
        write_json(&self.subject_dir(subject).join(SUBJECT_META), &meta)?;
        tracing::debug!(
            subject = %subject,
            version = %record.version,
            segment = index,
            "stored version"
        );
        Ok(())
    }

    fn load_latest(&self, subject: &SubjectId) -> Result<Option<VersionRecord>, StoreError> {
        let _guard = self.lock.lock();
        let Some((meta, manifest)) = self.load_subject(subject)? else {
            return Ok(None);
        };
        let Some(index) = meta.head.as_ref().and_then(|v| meta.versions.get(v)) else {
            return Ok(None);
        };
        self.read_segment(subject, &manifest, Segment::Version, *index)
            .map(Some)
    }

    fn load_version(
        &self,
        subject: &SubjectId,
        version: &str,
    ) -> Result<Option<VersionRecord>, StoreError> {
        let _guard = self.lock.lock();
        let Some((meta, manifest)) = self.load_subject(subject)? else {
            return Ok(None);
        };
        let Some(index) = meta.versions.get(version) else {
            return Ok(None);
        };
        self.read_segment(subject, &manifest, Segment::Version, *index)
            .map(Some)
    }

    fn list(
        &self,
        subject: &SubjectId,
        filter: &HistoryFilter,
    ) -> Result<Page<VersionRecord>, StoreError> {
        let _guard = self.lock.lock();
        let Some((meta, manifest)) = self.load_subject(subject)? else {
            return Ok(Page::paginate(Vec::new(), filter.offset, filter.limit));
        };
        let records: Vec<VersionRecord> =
            self.read_all(subject, &manifest, Segment::Version, meta.version_count)?;
        let matches: Vec<VersionRecord> =
            records.into_iter().filter(|r| filter.matches(r)).collect();
        Ok(newest_first(
            matches,
            |r| r.created_at,
            filter.offset,
            filter.limit,
        ))
    }

    fn append_activity(&self, activity: &CollaboratorActivity) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let subject = &activity.subject_id;
        let (mut meta, mut manifest) = self.load_or_init(subject)?;
        self.append_segment(subject, &mut meta, &mut manifest, Segment::Activity, activity)?;
        write_json(&self.subject_dir(subject).join(SUBJECT_META), &meta)?;
        Ok(())
    }

    fn list_activity(
        &self,
        subject: &SubjectId,
        filter: &ActivityFilter,
    ) -> Result<Page<CollaboratorActivity>, StoreError> {
        let _guard = self.lock.lock();
        let Some((meta, manifest)) = self.load_subject(subject)? else {
            return Ok(Page::paginate(Vec::new(), filter.offset, filter.limit));
        };
        let activities: Vec<CollaboratorActivity> =
            self.read_all(subject, &manifest, Segment::Activity, meta.activity_count)?;
        let matches: Vec<CollaboratorActivity> = activities
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        Ok(newest_first(
            matches,
            |a| a.timestamp,
            filter.offset,
            filter.limit,
        ))
    }
}

fn read_subject_meta(path: &Path) -> Result<SubjectMeta, StoreError> {
    let meta: SubjectMeta = serde_json::from_reader(std::fs::File::open(path)?)?;
    if meta.record_schema_version != RECORD_SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            file_version: meta.record_schema_version,
            expected_version: RECORD_SCHEMA_VERSION,
        });
    }
    Ok(meta)
}

/// Segments without a manifest entry are rejected.
fn verify_file_hash(
    manifest: &IntegrityManifest,
    filename: &str,
    data: &[u8],
) -> Result<(), StoreError> {
    let actual = sha256_hex(data);
    let Some(entry) = manifest.entries.iter().find(|e| e.filename == filename) else {
        return Err(StoreError::IntegrityMismatch {
            file: filename.to_string(),
            expected: "manifest entry".into(),
            actual,
        });
    };
    if entry.sha256 != actual {
        tracing::error!(file = %filename, "segment hash mismatch");
        return Err(StoreError::IntegrityMismatch {
            file: filename.to_string(),
            expected: entry.sha256.clone(),
            actual,
        });
    }
    Ok(())
}

/// Write to a sibling temp file, then rename over `path`.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    serde_json::to_writer_pretty(std::fs::File::create(&tmp)?, value)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StoreError> {
    ciborium::from_reader(data).map_err(|e| StoreError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{activity, record};
    use chronicle_common::VersionKind;

    fn subject() -> SubjectId {
        SubjectId::new("game-1")
    }

    fn versions_dir(store: &FileStore) -> PathBuf {
        store.subject_dir(&subject()).join("versions")
    }

    #[test]
    fn store_open_creates_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path().join("content")).unwrap();
        assert!(store.root().join("subjects").is_dir());
        assert!(store.root().join(STORE_META).is_file());
        assert!(store.subjects().unwrap().is_empty());
    }

    #[test]
    fn store_save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("content");
        let original = record("1.0.0", VersionKind::Auto, 0);
        {
            let store = FileStore::open(&path).unwrap();
            store.save(&original, None).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        let loaded = store.load_latest(&subject()).unwrap().unwrap();
        assert_eq!(loaded, original);
        assert_eq!(
            store.load_version(&subject(), "1.0.0").unwrap(),
            Some(original)
        );
        assert!(store.load_version(&subject(), "9.9.9").unwrap().is_none());
        assert!(
            store
                .load_latest(&SubjectId::new("other"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn store_keeps_explicit_null_change_values() {
        use chronicle_common::{ActorId, Change, ChangeId, ChangeKind};

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("content");
        let mut original = record("1.0.0", VersionKind::Auto, 0);
        original.changes.push(Change {
            id: ChangeId::new(),
            kind: ChangeKind::Update,
            path: "/notes".into(),
            old_value: Some(serde_json::Value::Null),
            new_value: Some(serde_json::json!("ready")),
            description: "set notes".into(),
            timestamp: original.created_at,
            actor_id: ActorId::new("ada"),
            actor_name: "ada".into(),
            location: None,
        });
        FileStore::open(&path).unwrap().save(&original, None).unwrap();

        let loaded = FileStore::open(&path)
            .unwrap()
            .load_version(&subject(), "1.0.0")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.changes[0].old_value, Some(serde_json::Value::Null));
        assert_eq!(loaded, original);
    }

    #[test]
    fn store_head_skips_snapshots() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store
            .save(&record("1.0.0", VersionKind::Auto, 0), None)
            .unwrap();
        store
            .save(
                &record("1.0.0-snapshot-1000", VersionKind::Snapshot, 1),
                Some("1.0.0"),
            )
            .unwrap();

        let meta = store.subject_meta(&subject()).unwrap().unwrap();
        assert_eq!(meta.head.as_deref(), Some("1.0.0"));
        assert_eq!(meta.version_count, 2);
        assert_eq!(
            store.load_latest(&subject()).unwrap().unwrap().version,
            "1.0.0"
        );
    }

    #[test]
    fn store_rejects_stale_head() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store
            .save(&record("1.0.0", VersionKind::Auto, 0), None)
            .unwrap();
        let err = store
            .save(&record("1.0.1", VersionKind::Auto, 1), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::HeadMismatch { .. }));
        assert_eq!(
            store.subject_meta(&subject()).unwrap().unwrap().version_count,
            1
        );
    }

    #[test]
    fn store_lists_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store
            .save(&record("1.0.0", VersionKind::Auto, 0), None)
            .unwrap();
        store
            .save(&record("1.1.0", VersionKind::Minor, 5), Some("1.0.0"))
            .unwrap();
        let page = store.list(&subject(), &HistoryFilter::default()).unwrap();
        let versions: Vec<_> = page.items.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["1.1.0", "1.0.0"]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn store_activity_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.append_activity(&activity("ada", 1)).unwrap();
        store.append_activity(&activity("bob", 2)).unwrap();

        let page = store
            .list_activity(&subject(), &ActivityFilter::default())
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].actor_id.as_str(), "bob");
        assert!(store.load_latest(&subject()).unwrap().is_none());
        store.verify_integrity(&subject()).unwrap();
    }

    #[test]
    fn store_integrity_verification() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store
            .save(&record("1.0.0", VersionKind::Auto, 0), None)
            .unwrap();
        store.append_activity(&activity("ada", 0)).unwrap();
        store
            .save(&record("1.0.1", VersionKind::Auto, 1), Some("1.0.0"))
            .unwrap();
        store.verify_integrity(&subject()).unwrap();
    }

    #[test]
    fn store_integrity_fail_closed_on_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("content");
        let store = FileStore::open(&path).unwrap();
        store
            .save(&record("1.0.0", VersionKind::Auto, 0), None)
            .unwrap();

        // Corrupt the version segment
        let segment = versions_dir(&store).join("000001.version.cbor.zst");
        let mut data = std::fs::read(&segment).unwrap();
        if let Some(byte) = data.last_mut() {
            *byte ^= 0xff;
        }
        std::fs::write(&segment, &data).unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(matches!(
            store.verify_integrity(&subject()),
            Err(StoreError::IntegrityMismatch { .. })
        ));
        assert!(matches!(
            store.load_latest(&subject()),
            Err(StoreError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn uncommitted_manifest_entries_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store
            .save(&record("1.0.0", VersionKind::Auto, 0), None)
            .unwrap();

        // A write that reached the manifest but not the subject metadata
        let manifest_path = store
            .subject_dir(&subject())
            .join("integrity")
            .join(MANIFEST);
        let mut manifest: IntegrityManifest =
            serde_json::from_reader(std::fs::File::open(&manifest_path).unwrap()).unwrap();
        manifest.push(Segment::Version.filename(2), b"torn write");
        write_json(&manifest_path, &manifest).unwrap();

        store
            .save(&record("1.0.1", VersionKind::Auto, 1), Some("1.0.0"))
            .unwrap();
        store.verify_integrity(&subject()).unwrap();
        assert_eq!(
            store.load_latest(&subject()).unwrap().unwrap().version,
            "1.0.1"
        );
    }

    #[test]
    fn store_lists_subjects() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        let mut other = record("1.0.0", VersionKind::Auto, 0);
        other.subject_id = SubjectId::new("game-2");
        store.save(&other, None).unwrap();
        store
            .save(&record("1.0.0", VersionKind::Auto, 0), None)
            .unwrap();

        let subjects: Vec<_> = store
            .subjects()
            .unwrap()
            .into_iter()
            .map(|m| m.subject_id)
            .collect();
        assert_eq!(
            subjects,
            vec![SubjectId::new("game-1"), SubjectId::new("game-2")]
        );
    }

    #[test]
    fn schema_mismatch_fail_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("content");

        // Create a valid store
        let _store = FileStore::open(&path).unwrap();

        // Tamper with the meta file to have a wrong version
        let meta_path = path.join(STORE_META);
        let mut meta: StoreMeta =
            serde_json::from_reader(std::fs::File::open(&meta_path).unwrap()).unwrap();
        meta.store_schema_version = 999;
        serde_json::to_writer_pretty(std::fs::File::create(&meta_path).unwrap(), &meta).unwrap();

        // Must fail to open
        match FileStore::open(&path) {
            Err(StoreError::SchemaMismatch {
                file_version,
                expected_version,
            }) => {
                assert_eq!(file_version, 999);
                assert_eq!(expected_version, STORE_SCHEMA_VERSION);
            }
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn subject_schema_mismatch_fail_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store
            .save(&record("1.0.0", VersionKind::Auto, 0), None)
            .unwrap();

        let meta_path = store.subject_dir(&subject()).join(SUBJECT_META);
        let mut meta = read_subject_meta(&meta_path).unwrap();
        meta.record_schema_version = 7;
        write_json(&meta_path, &meta).unwrap();

        assert!(matches!(
            store.load_latest(&subject()),
            Err(StoreError::SchemaMismatch {
                file_version: 7,
                ..
            })
        ));
    }
}
