
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Well-known file name for the persisted corpus embeddings
pub const CACHE_FILE_NAME: &str = "ottoman_embeddings.json";

/// One embedded corpus segment. Never mutated after creation; a changed
/// corpus regenerates the whole cache rather than patching records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRecord {
    pub text: String,
    pub vector: Vec<f32>,
}

/// Outcome of loading the persisted cache. Anything short of a well-formed,
/// uniform-dimension record sequence is `Absent` and means "regenerate
/// everything" - there is no partial repair.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState {
    Absent,
    Valid(Vec<EmbeddingRecord>),
}

/// Durable store mapping segment text to its embedding vector, persisted as
/// a single JSON blob at a fixed path.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    path: PathBuf,
}

impl EmbeddingCache {
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted blob. Returns `Absent` if the file does not exist
    /// or fails to parse into a well-formed record sequence.
    #[inline]
    pub fn load(&self) -> CacheState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("Embedding cache not readable at {}: {}", self.path.display(), e);
                return CacheState::Absent;
            }
        };

        let records: Vec<EmbeddingRecord> = match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Embedding cache at {} is malformed, will regenerate: {}",
                    self.path.display(),
                    e
                );
                return CacheState::Absent;
            }
        };

        if !is_well_formed(&records) {
            warn!(
                "Embedding cache at {} has empty or mixed-dimension vectors, will regenerate",
                self.path.display()
            );
            return CacheState::Absent;
        }

        info!("Loaded {} embeddings from {}", records.len(), self.path.display());
        CacheState::Valid(records)
    }

    /// Atomically overwrite the persisted blob. Callers treat a write
    /// failure as non-fatal; the in-memory records stay usable for the
    /// process lifetime.
    #[inline]
    pub fn save(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string(records).context("Failed to serialize embedding records")?;

        // Write to a sibling temp file, then rename over the target so a
        // crash mid-write never leaves a truncated blob behind.
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write cache file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("Failed to move cache file into place: {}", self.path.display())
        })?;

        info!("Saved {} embeddings to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// A usable cache is a non-empty sequence of records sharing one non-zero
/// vector dimension.
fn is_well_formed(records: &[EmbeddingRecord]) -> bool {
    let Some(first) = records.first() else {
        return false;
    };
    let dimension = first.vector.len();
    dimension > 0 && records.iter().all(|r| r.vector.len() == dimension)
}
