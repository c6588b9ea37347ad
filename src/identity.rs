use indexmap::IndexSet;
use rand::Rng;
use simd_r_drive::storage_engine::DataStore;
use simd_r_drive::storage_engine::traits::{DataStoreReader, DataStoreWriter};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::constants::identity::{
    ANNOTATED_ENTRY_PREFIX, ANNOTATED_IDS_KEY, ANNOTATED_PENDING_KEY, DEFAULT_STORE_DIR, DEFAULT_STORE_FILENAME, HUMAN_ID_KEY, HUMAN_ID_PREFIX,
    HUMAN_ID_SUFFIX_LEN, IDENTITY_RECORD_TOMBSTONE, IDENTITY_RECORD_VERSION,
};
use crate::errors::AnnotateError;
use crate::types::{HumanId, ItemId};

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Durable rater identity and the set of items the rater already annotated.
///
/// `record_annotated` is write-through: once it returns `Ok`, the id survives
/// a restart of the process.
pub trait IdentityStore: Send + Sync {
    /// Return the persisted rater id, generating and persisting one when absent.
    fn ensure_identity(&self) -> Result<HumanId, AnnotateError>;
    /// Return every annotated item id (empty when nothing was persisted).
    fn load_annotated(&self) -> Result<HashSet<ItemId>, AnnotateError>;
    /// Add `id` to the annotated set. Returns `false` when it was already present.
    fn record_annotated(&self, id: &str) -> Result<bool, AnnotateError>;
    /// Forget the rater id and the annotated set.
    fn clear(&self) -> Result<(), AnnotateError>;
    /// Whether values outlive the current process.
    fn is_persistent(&self) -> bool;
}

/// Generate a collision-resistant rater id: `user-<unix millis>-<base36 suffix>`.
pub fn generate_human_id() -> HumanId {
    let mut rng = rand::rng();
    let suffix: String = (0..HUMAN_ID_SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!(
        "{HUMAN_ID_PREFIX}-{}-{suffix}",
        chrono::Utc::now().timestamp_millis()
    )
}

/// Per-process identity used when no durable storage is available.
#[derive(Default)]
pub struct MemoryIdentityStore {
    human_id: RwLock<Option<HumanId>>,
    annotated: RwLock<IndexSet<ItemId>>,
}

impl MemoryIdentityStore {
    /// Create an empty, non-persistent store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn ensure_identity(&self) -> Result<HumanId, AnnotateError> {
        let mut guard = self
            .human_id
            .write()
            .map_err(|_| AnnotateError::Store("identity lock poisoned".into()))?;
        Ok(guard.get_or_insert_with(generate_human_id).clone())
    }

    fn load_annotated(&self) -> Result<HashSet<ItemId>, AnnotateError> {
        self.annotated
            .read()
            .map_err(|_| AnnotateError::Store("annotated lock poisoned".into()))
            .map(|guard| guard.iter().cloned().collect())
    }

    fn record_annotated(&self, id: &str) -> Result<bool, AnnotateError> {
        Ok(self
            .annotated
            .write()
            .map_err(|_| AnnotateError::Store("annotated lock poisoned".into()))?
            .insert(id.to_string()))
    }

    fn clear(&self) -> Result<(), AnnotateError> {
        *self
            .human_id
            .write()
            .map_err(|_| AnnotateError::Store("identity lock poisoned".into()))? = None;
        self.annotated
            .write()
            .map_err(|_| AnnotateError::Store("annotated lock poisoned".into()))?
            .clear();
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

/// File-backed identity store.
///
/// `annotatedIds` holds the JSON array as of the last open. Each insert
/// appends one `annotated:<n>` journal entry and bumps `annotatedPending`;
/// `open` folds pending entries back into the array.
pub struct FileIdentityStore {
    store: DataStore,
    path: PathBuf,
    annotated: RwLock<AnnotatedLog>,
}

struct AnnotatedLog {
    ids: IndexSet<ItemId>,
    pending: usize,
}

impl fmt::Debug for FileIdentityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileIdentityStore")
            .field("path", &self.path)
            .finish()
    }
}

impl FileIdentityStore {
    /// Open (or create) a file-backed identity store at `path`.
    ///
    /// Fails when the file cannot be opened or the persisted annotated set is corrupt.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, AnnotateError> {
        let path = coerce_store_path(path.into());
        ensure_parent_dir(&path)?;
        let store = DataStore::open(path.as_path()).map_err(map_store_err)?;
        let annotated = compact_annotated(&store)?;
        debug!(
            path = %path.display(),
            annotated = annotated.len(),
            "[annotator:identity] store opened"
        );
        Ok(Self {
            store,
            path,
            annotated: RwLock::new(AnnotatedLog {
                ids: annotated,
                pending: 0,
            }),
        })
    }

    /// Default store path under the crate's default store directory.
    pub fn default_path() -> PathBuf {
        Self::default_path_in_dir(DEFAULT_STORE_DIR)
    }

    /// Default store path inside a custom directory.
    pub fn default_path_in_dir<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join(DEFAULT_STORE_FILENAME)
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn ensure_identity(&self) -> Result<HumanId, AnnotateError> {
        if let Some(existing) = read_value(&self.store, HUMAN_ID_KEY)?
            && !existing.trim().is_empty()
        {
            return Ok(existing);
        }
        let human_id = generate_human_id();
        write_value(&self.store, HUMAN_ID_KEY, Some(&human_id))?;
        debug!(human_id = %human_id, "[annotator:identity] generated rater id");
        Ok(human_id)
    }

    fn load_annotated(&self) -> Result<HashSet<ItemId>, AnnotateError> {
        self.annotated
            .read()
            .map_err(|_| AnnotateError::Store("annotated lock poisoned".into()))
            .map(|guard| guard.ids.iter().cloned().collect())
    }

    fn record_annotated(&self, id: &str) -> Result<bool, AnnotateError> {
        let mut guard = self
            .annotated
            .write()
            .map_err(|_| AnnotateError::Store("annotated lock poisoned".into()))?;
        if !guard.ids.insert(id.to_string()) {
            return Ok(false);
        }
        let slot = guard.pending;
        let written = write_value(&self.store, &entry_key(slot), Some(id)).and_then(|()| {
            write_value(
                &self.store,
                ANNOTATED_PENDING_KEY,
                Some(&(slot + 1).to_string()),
            )
        });
        if let Err(err) = written {
            guard.ids.shift_remove(id);
            return Err(err);
        }
        guard.pending = slot + 1;
        Ok(true)
    }

    fn clear(&self) -> Result<(), AnnotateError> {
        write_value(&self.store, HUMAN_ID_KEY, None)?;
        write_value(&self.store, ANNOTATED_IDS_KEY, None)?;
        write_value(&self.store, ANNOTATED_PENDING_KEY, None)?;
        let mut guard = self
            .annotated
            .write()
            .map_err(|_| AnnotateError::Store("annotated lock poisoned".into()))?;
        guard.ids.clear();
        guard.pending = 0;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

/// Open the file store at `path`, degrading to a per-session memory store when that fails.
pub fn open_identity_store<P: Into<PathBuf>>(path: P) -> Box<dyn IdentityStore> {
    let path = path.into();
    match FileIdentityStore::open(path.clone()) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "[annotator:identity] persistent store unavailable; progress will not survive restarts"
            );
            Box::new(MemoryIdentityStore::new())
        }
    }
}

/// Merge journal entries into the persisted array and reset the journal.
///
/// A crash between the two writes only replays entries already in the array.
fn compact_annotated(store: &DataStore) -> Result<IndexSet<ItemId>, AnnotateError> {
    let mut ids = match read_value(store, ANNOTATED_IDS_KEY)? {
        Some(raw) => decode_annotated(&raw)?,
        None => IndexSet::new(),
    };
    let pending = match read_value(store, ANNOTATED_PENDING_KEY)? {
        Some(raw) => raw.trim().parse::<usize>().map_err(|err| {
            AnnotateError::Store(format!("corrupt annotated journal length: {err}"))
        })?,
        None => 0,
    };
    if pending == 0 {
        return Ok(ids);
    }
    for slot in 0..pending {
        if let Some(id) = read_value(store, &entry_key(slot))? {
            ids.insert(id);
        }
    }
    write_value(store, ANNOTATED_IDS_KEY, Some(&encode_annotated(&ids)?))?;
    write_value(store, ANNOTATED_PENDING_KEY, None)?;
    debug!(
        folded = pending,
        annotated = ids.len(),
        "[annotator:identity] annotated journal compacted"
    );
    Ok(ids)
}

fn entry_key(slot: usize) -> Vec<u8> {
    let suffix = slot.to_string();
    let mut key = Vec::with_capacity(ANNOTATED_ENTRY_PREFIX.len() + suffix.len());
    key.extend_from_slice(ANNOTATED_ENTRY_PREFIX);
    key.extend_from_slice(suffix.as_bytes());
    key
}

fn encode_annotated(ids: &IndexSet<ItemId>) -> Result<String, AnnotateError> {
    serde_json::to_string(&ids.iter().collect::<Vec<_>>())
        .map_err(|err| AnnotateError::Store(format!("failed encoding annotated ids: {err}")))
}

fn decode_annotated(raw: &str) -> Result<IndexSet<ItemId>, AnnotateError> {
    serde_json::from_str::<Vec<ItemId>>(raw)
        .map(|ids| ids.into_iter().collect())
        .map_err(|err| AnnotateError::Store(format!("corrupt annotated ids record: {err}")))
}

fn encode_value(value: Option<&str>) -> Vec<u8> {
    match value {
        None => vec![IDENTITY_RECORD_TOMBSTONE],
        Some(value) => {
            let mut buf = Vec::with_capacity(1 + value.len());
            buf.push(IDENTITY_RECORD_VERSION);
            buf.extend_from_slice(value.as_bytes());
            buf
        }
    }
}

fn decode_value(bytes: &[u8]) -> Result<Option<String>, AnnotateError> {
    if bytes.is_empty() || bytes[0] == IDENTITY_RECORD_TOMBSTONE {
        return Ok(None);
    }
    if bytes[0] != IDENTITY_RECORD_VERSION {
        return Err(AnnotateError::Store(
            "identity record version mismatch".into(),
        ));
    }
    String::from_utf8(bytes[1..].to_vec())
        .map(Some)
        .map_err(|err| AnnotateError::Store(format!("identity record is not UTF-8: {err}")))
}

fn read_value(store: &DataStore, key: &[u8]) -> Result<Option<String>, AnnotateError> {
    match store.read(key).map_err(map_store_err)? {
        None => Ok(None),
        Some(entry) => decode_value(entry.as_ref()),
    }
}

fn write_value(store: &DataStore, key: &[u8], value: Option<&str>) -> Result<(), AnnotateError> {
    let payload = encode_value(value);
    store
        .write(key, payload.as_slice())
        .map_err(map_store_err)?;
    Ok(())
}

fn coerce_store_path(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        return path.join(DEFAULT_STORE_FILENAME);
    }
    path
}

fn ensure_parent_dir(path: &Path) -> Result<(), AnnotateError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn map_store_err(err: io::Error) -> AnnotateError {
    AnnotateError::Store(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generated_ids_have_prefix_timestamp_and_suffix() {
        let id = generate_human_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "user");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[2].len(), HUMAN_ID_SUFFIX_LEN);
        assert!(
            parts[2]
                .bytes()
                .all(|byte| byte.is_ascii_digit() || byte.is_ascii_lowercase())
        );
        assert_ne!(generate_human_id(), id);
    }

    #[test]
    fn memory_store_is_idempotent_but_not_persistent() {
        let store = MemoryIdentityStore::new();
        let first = store.ensure_identity().unwrap();
        assert_eq!(store.ensure_identity().unwrap(), first);
        assert!(store.record_annotated("q1_minimum_1").unwrap());
        assert!(!store.record_annotated("q1_minimum_1").unwrap());
        assert_eq!(store.load_annotated().unwrap().len(), 1);
        assert!(!store.is_persistent());

        store.clear().unwrap();
        assert!(store.load_annotated().unwrap().is_empty());
        assert_ne!(store.ensure_identity().unwrap(), first);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("identity.bin");
        let human_id = {
            let store = FileIdentityStore::open(&path).unwrap();
            let human_id = store.ensure_identity().unwrap();
            store.record_annotated("q1_minimum_1").unwrap();
            store.record_annotated("q2_detailed_1").unwrap();
            store.record_annotated("q1_minimum_1").unwrap();
            human_id
        };

        let reopened = FileIdentityStore::open(&path).unwrap();
        assert_eq!(reopened.ensure_identity().unwrap(), human_id);
        let annotated = reopened.load_annotated().unwrap();
        assert_eq!(annotated.len(), 2);
        assert!(annotated.contains("q1_minimum_1"));
        assert!(annotated.contains("q2_detailed_1"));
        assert!(reopened.is_persistent());
    }

    #[test]
    fn journal_is_folded_into_the_array_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.bin");
        {
            let store = FileIdentityStore::open(&path).unwrap();
            store.record_annotated("q1_minimum_1").unwrap();
            store.record_annotated("q2_detailed_1").unwrap();
            assert_eq!(
                read_value(&store.store, ANNOTATED_PENDING_KEY).unwrap(),
                Some("2".to_string())
            );
        }

        let reopened = FileIdentityStore::open(&path).unwrap();
        assert_eq!(read_value(&reopened.store, ANNOTATED_PENDING_KEY).unwrap(), None);
        let array = read_value(&reopened.store, ANNOTATED_IDS_KEY)
            .unwrap()
            .unwrap();
        let folded = decode_annotated(&array).unwrap();
        assert_eq!(folded.len(), 2);
        assert!(folded.contains("q2_detailed_1"));

        reopened.record_annotated("q3_structured_1").unwrap();
        drop(reopened);
        let again = FileIdentityStore::open(&path).unwrap();
        assert_eq!(again.load_annotated().unwrap().len(), 3);
    }

    #[test]
    fn store_file_grows_linearly_with_annotations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.bin");
        let store = FileIdentityStore::open(&path).unwrap();
        for idx in 0..200 {
            store.record_annotated(&format!("q{idx}_minimum_1")).unwrap();
        }
        drop(store);
        // Rewriting the whole array per insert would take roughly 340 KB here.
        let size = fs::metadata(&path).unwrap().len();
        assert!(size < 150_000, "store file is {size} bytes");
        assert_eq!(
            FileIdentityStore::open(&path).unwrap().load_annotated().unwrap().len(),
            200
        );
    }

    #[test]
    fn clear_tombstones_both_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.bin");
        let store = FileIdentityStore::open(&path).unwrap();
        let before = store.ensure_identity().unwrap();
        store.record_annotated("q1_minimum_1").unwrap();
        store.clear().unwrap();
        drop(store);

        let reopened = FileIdentityStore::open(&path).unwrap();
        assert!(reopened.load_annotated().unwrap().is_empty());
        assert_ne!(reopened.ensure_identity().unwrap(), before);
    }

    #[test]
    fn directory_paths_get_default_filename() {
        let dir = tempdir().unwrap();
        let store = FileIdentityStore::open(dir.path()).unwrap();
        assert_eq!(store.path(), dir.path().join(DEFAULT_STORE_FILENAME));
        assert_eq!(
            FileIdentityStore::default_path(),
            PathBuf::from(DEFAULT_STORE_DIR).join(DEFAULT_STORE_FILENAME)
        );
    }

    #[test]
    fn open_falls_back_to_memory_when_path_is_unusable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let store = open_identity_store(blocker.join("identity.bin"));
        assert!(!store.is_persistent());
        assert!(store.ensure_identity().unwrap().starts_with("user-"));
    }

    #[test]
    fn value_codec_handles_tombstone_and_version_mismatch() {
        assert_eq!(decode_value(&[]).unwrap(), None);
        assert_eq!(decode_value(&[IDENTITY_RECORD_TOMBSTONE]).unwrap(), None);
        assert_eq!(
            decode_value(&encode_value(Some("user-1-abc"))).unwrap(),
            Some("user-1-abc".to_string())
        );
        assert!(matches!(
            decode_value(&[IDENTITY_RECORD_VERSION.wrapping_add(7), b'x']),
            Err(AnnotateError::Store(msg)) if msg.contains("version mismatch")
        ));
        assert!(matches!(
            decode_annotated("{not json"),
            Err(AnnotateError::Store(msg)) if msg.contains("corrupt")
        ));
    }
}
