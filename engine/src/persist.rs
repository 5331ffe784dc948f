use crate::index::{Document, SearchIndex};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Bumped whenever the snapshot layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub total_docs: u64,
    pub created_at: String,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn snapshot(&self) -> PathBuf { self.root.join("snapshot.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

type SnapshotData = (
    HashMap<String, Document>,
    HashMap<String, HashMap<String, u32>>,
);

/// Write the index to `paths` as a bincode snapshot plus a small JSON
/// meta file. Derived statistics are not persisted; `load` recomputes
/// them from the documents.
pub fn save(paths: &IndexPaths, index: &SearchIndex) -> Result<()> {
    create_dir_all(&paths.root)?;

    let bytes = bincode::serialize(&(&index.docs, &index.inverted))?;
    let mut f = File::create(paths.snapshot())?;
    f.write_all(&bytes)?;

    let meta = MetaFile {
        version: SNAPSHOT_VERSION,
        total_docs: index.total_docs() as u64,
        created_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    };
    let mut f = File::create(paths.meta())?;
    f.write_all(serde_json::to_string_pretty(&meta)?.as_bytes())?;

    tracing::info!(
        docs = index.total_docs(),
        terms = index.num_terms(),
        root = %paths.root.display(),
        "saved index snapshot"
    );
    Ok(())
}

/// Read a snapshot back. A missing snapshot is the normal first-run case
/// and comes back as `Ok(None)`; an unreadable or inconsistent one is an
/// error so corruption never silently loses an index.
pub fn load(paths: &IndexPaths) -> Result<Option<SearchIndex>> {
    if !paths.snapshot().exists() || !paths.meta().exists() {
        return Ok(None);
    }

    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    if meta.version != SNAPSHOT_VERSION {
        bail!("unsupported snapshot version {}", meta.version);
    }

    let mut f = File::open(paths.snapshot())?;
    let mut bytes = Vec::new();
    f.read_to_end(&mut bytes)?;
    let (docs, inverted): SnapshotData = bincode::deserialize(&bytes)?;

    if docs.len() as u64 != meta.total_docs {
        bail!(
            "snapshot holds {} documents but meta records {}",
            docs.len(),
            meta.total_docs
        );
    }

    let index = SearchIndex::from_parts(docs, inverted);
    tracing::info!(
        docs = index.total_docs(),
        terms = index.num_terms(),
        root = %paths.root.display(),
        "loaded index snapshot"
    );
    Ok(Some(index))
}
