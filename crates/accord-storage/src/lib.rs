//! Atomic run-output storage + NDJSON codec for Accord.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

pub const CRATE_NAME: &str = "accord-storage";

#[derive(Debug, Clone)]
pub struct StoredOutput {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutputStore {
    root: PathBuf,
}

impl RunOutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Write bytes under `root/relative_path` via temp file + rename, replacing any previous file.
    pub async fn write_bytes(&self, relative_path: impl AsRef<Path>, bytes: &[u8]) -> Result<StoredOutput> {
        let relative_path = relative_path.as_ref().to_path_buf();
        let absolute_path = self.root.join(&relative_path);
        let parent = absolute_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating output directory {}", parent.display()))?;

        let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp output file {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing temp output file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp output file {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &absolute_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!(
                    "atomically renaming temp output {} -> {}",
                    temp_path.display(),
                    absolute_path.display()
                )
            });
        }

        debug!(path = %absolute_path.display(), bytes = bytes.len(), "run output written");
        Ok(StoredOutput {
            content_hash: Self::sha256_hex(bytes),
            relative_path,
            absolute_path,
            byte_size: bytes.len(),
        })
    }

    pub async fn write_ndjson<T: Serialize>(&self, relative_path: impl AsRef<Path>, rows: &[T]) -> Result<StoredOutput> {
        let bytes = encode_ndjson(rows)?;
        self.write_bytes(relative_path, &bytes).await
    }

    pub async fn write_json_pretty<T: Serialize>(&self, relative_path: impl AsRef<Path>, value: &T) -> Result<StoredOutput> {
        let bytes = serde_json::to_vec_pretty(value).context("serializing pretty JSON output")?;
        self.write_bytes(relative_path, &bytes).await
    }
}

/// One compact JSON object per line. serde_json leaves non-ASCII text unescaped.
pub fn encode_ndjson<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        serde_json::to_writer(&mut out, row).with_context(|| format!("serializing NDJSON row {idx}"))?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Parse NDJSON text, skipping blank lines. Errors name the 1-based line number.
pub fn decode_ndjson<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| serde_json::from_str(line).with_context(|| format!("parsing NDJSON line {}", idx + 1)))
        .collect()
}
