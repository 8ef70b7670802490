use crate::error::PersistError;
use crate::lexical::LexicalIndex;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const ARTIFACT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: usize,
    pub avgdl: f64,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn describe(index: &LexicalIndex) -> Self {
        Self {
            num_docs: index.index.doc_count,
            num_terms: index.index.vocab.len(),
            avgdl: index.index.avgdl,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: ARTIFACT_VERSION,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn lexical(&self) -> PathBuf { self.root.join("lexical.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// Write `bytes` next to `path` and rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, PersistError> {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PersistError::Missing { path: path.to_path_buf() })
        }
        Err(e) => return Err(e.into()),
    };
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Persist the lexical artifact; `meta.json` is written last so it only ever
/// describes a complete `lexical.bin`.
pub fn save_index(paths: &IndexPaths, index: &LexicalIndex) -> Result<MetaFile, PersistError> {
    create_dir_all(&paths.root)?;
    let bytes = bincode::serialize(index).map_err(|e| PersistError::corrupt(paths.lexical(), e.to_string()))?;
    write_atomic(&paths.lexical(), &bytes)?;
    let meta = MetaFile::describe(index);
    let json = serde_json::to_string_pretty(&meta).map_err(|e| PersistError::corrupt(paths.meta(), e.to_string()))?;
    write_atomic(&paths.meta(), json.as_bytes())?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, "saved index artifact");
    Ok(meta)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile, PersistError> {
    let buf = read_file(&paths.meta())?;
    serde_json::from_slice(&buf).map_err(|e| PersistError::corrupt(paths.meta(), e.to_string()))
}

/// Load and validate the artifact. Any decode failure or inconsistency between
/// header and body is [`PersistError::Corrupt`].
pub fn load_index(paths: &IndexPaths) -> Result<(LexicalIndex, MetaFile), PersistError> {
    let meta = load_meta(paths)?;
    if meta.version != ARTIFACT_VERSION {
        return Err(PersistError::corrupt(
            paths.meta(),
            format!("artifact version {} but this build reads {ARTIFACT_VERSION}", meta.version),
        ));
    }
    let buf = read_file(&paths.lexical())?;
    let mut index: LexicalIndex =
        bincode::deserialize(&buf).map_err(|e| PersistError::corrupt(paths.lexical(), e.to_string()))?;
    index.validate().map_err(|reason| PersistError::corrupt(paths.lexical(), reason))?;
    if index.index.doc_count != meta.num_docs {
        return Err(PersistError::corrupt(
            paths.lexical(),
            format!("meta says {} docs, artifact has {}", meta.num_docs, index.index.doc_count),
        ));
    }
    index.rebuild_lookup();
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, created_at = %meta.created_at, "loaded index artifact");
    Ok((index, meta))
}
