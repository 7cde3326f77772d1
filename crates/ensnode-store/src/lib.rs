//! File-backed ensemble store.
//!
//! Node records are checkpointed under
//! `<root>/step_NNNN/member_NNNN/<parameter>`, each framed with a timestamp
//! and an xxh3 checksum (see [`record`]). `<root>/store.json` holds the
//! mount metadata.
//!
//! A key is reserved for the whole lifetime of a [`StoreWriter`] and for the
//! duration of a read; overlapping access to the same key is refused with
//! `ExternalIo`. Writes land in a temporary file that is renamed into place
//! on commit, so readers never observe a partial record.

pub mod key;
pub mod record;

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ensnode_buffer::BufferWriter;
use ensnode_error::{EnsError, Result};
use ensnode_node::Node;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use key::NodeKey;
pub use record::StoredRecord;

/// On-disk layout version written to `store.json`.
pub const STORE_FORMAT_VERSION: u32 = 1;

const META_FILE: &str = "store.json";
const TMP_SUFFIX: &str = ".tmp";

/// Contents of `store.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub format_version: u32,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

#[derive(Debug)]
pub struct EnsembleStore {
    root: PathBuf,
    meta: StoreMeta,
    in_flight: Mutex<HashSet<NodeKey>>,
}

impl EnsembleStore {
    /// Mount the store at `root`, creating it if it does not exist yet.
    pub fn open_or_create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let meta_path = root.join(META_FILE);
        let meta = match fs::read(&meta_path) {
            Ok(bytes) => parse_meta(&meta_path, &bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&root).map_err(|err| io_failure("creating", &root, &err))?;
                let meta = StoreMeta {
                    format_version: STORE_FORMAT_VERSION,
                    created_at: unix_secs(SystemTime::now()),
                };
                let json = serde_json::to_vec_pretty(&meta)
                    .map_err(|err| EnsError::internal(format!("encoding store meta: {err}")))?;
                write_atomic(&meta_path, &json)?;
                info!(root = %root.display(), "ensemble store created");
                meta
            }
            Err(err) => return Err(io_failure("reading", &meta_path, &err)),
        };
        Ok(Self {
            root,
            meta,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Mount an existing store; fails if `store.json` is missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let meta_path = root.join(META_FILE);
        let bytes = fs::read(&meta_path).map_err(|err| io_failure("reading", &meta_path, &err))?;
        let meta = parse_meta(&meta_path, &bytes)?;
        Ok(Self {
            root,
            meta,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    #[must_use]
    pub fn path_for(&self, key: &NodeKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    #[must_use]
    pub fn has_node(&self, key: &NodeKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Reserve `key` and start a record. Nothing is visible until
    /// [`StoreWriter::commit`].
    pub fn open_for_write(&self, key: NodeKey) -> Result<StoreWriter<'_>> {
        let guard = self.reserve(key)?;
        Ok(StoreWriter {
            guard,
            buffer: BufferWriter::new(),
        })
    }

    /// Read and verify the record at `key`.
    pub fn open_for_read(&self, key: &NodeKey) -> Result<StoredRecord> {
        let guard = self.reserve(key.clone())?;
        let path = self.path_for(&guard.key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(EnsError::external(format!("no record stored for {key}")));
            }
            Err(err) => return Err(io_failure("reading", &path, &err)),
        };
        record::decode(&bytes).inspect_err(|err| {
            warn!(
                parameter = %key.parameter,
                member = key.member,
                report_step = key.report_step,
                error = %err,
                "stored record rejected"
            );
        })
    }

    /// Checkpoint `node` for `member` at `report_step`.
    pub fn save_node(&self, node: &Node, member: usize, report_step: usize) -> Result<()> {
        let key = NodeKey::new(node.name(), member, report_step)?;
        let mut writer = self.open_for_write(key)?;
        node.store(writer.buffer())?;
        writer.commit()
    }

    /// Restore `node` from the checkpoint for `member` at `report_step`.
    pub fn load_node(&self, node: &mut Node, member: usize, report_step: usize) -> Result<()> {
        let key = NodeKey::new(node.name(), member, report_step)?;
        let record = self.open_for_read(&key)?;
        node.load_record(record.bytes())
    }

    /// Delete the record at `key`. Returns whether one existed.
    pub fn remove(&self, key: &NodeKey) -> Result<bool> {
        let guard = self.reserve(key.clone())?;
        let path = self.path_for(&guard.key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key = %key, "record removed");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_failure("removing", &path, &err)),
        }
    }

    fn reserve(&self, key: NodeKey) -> Result<KeyGuard<'_>> {
        let mut in_flight = self.in_flight.lock();
        if in_flight.contains(&key) {
            return Err(EnsError::external(format!(
                "{key} is already being accessed"
            )));
        }
        in_flight.insert(key.clone());
        drop(in_flight);
        Ok(KeyGuard { store: self, key })
    }
}

/// Holds a key reservation until dropped.
#[derive(Debug)]
struct KeyGuard<'a> {
    store: &'a EnsembleStore,
    key: NodeKey,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.lock().remove(&self.key);
    }
}

/// An uncommitted record. Dropping it without [`StoreWriter::commit`]
/// discards the record and releases the key.
#[derive(Debug)]
pub struct StoreWriter<'a> {
    guard: KeyGuard<'a>,
    buffer: BufferWriter,
}

impl StoreWriter<'_> {
    #[must_use]
    pub const fn key(&self) -> &NodeKey {
        &self.guard.key
    }

    /// The record body; write the node encoding here.
    pub fn buffer(&mut self) -> &mut BufferWriter {
        &mut self.buffer
    }

    /// Frame, write and publish the record.
    pub fn commit(self) -> Result<()> {
        let key = &self.guard.key;
        let path = self.guard.store.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_failure("creating", parent, &err))?;
        }
        let framed = record::encode(self.buffer.as_bytes(), SystemTime::now())?;
        write_atomic(&path, &framed)?;
        info!(
            parameter = %key.parameter,
            member = key.member,
            report_step = key.report_step,
            bytes = self.buffer.len(),
            "record committed"
        );
        Ok(())
    }
}

fn parse_meta(path: &Path, bytes: &[u8]) -> Result<StoreMeta> {
    let meta: StoreMeta = serde_json::from_slice(bytes)
        .map_err(|err| EnsError::corrupt(format!("{}: {err}", path.display())))?;
    if meta.format_version != STORE_FORMAT_VERSION {
        return Err(EnsError::corrupt(format!(
            "{} has format version {}, expected {STORE_FORMAT_VERSION}",
            path.display(),
            meta.format_version
        )));
    }
    Ok(meta)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|err| io_failure("writing", &tmp, &err))?;
    fs::rename(&tmp, path).map_err(|err| io_failure("renaming", &tmp, &err))
}

fn io_failure(action: &str, path: &Path, err: &std::io::Error) -> EnsError {
    EnsError::external(format!("{action} {}: {err}", path.display()))
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}
