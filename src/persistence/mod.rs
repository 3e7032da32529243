//! On-disk cache of tool embeddings.
//!
//! Embedding a catalog costs one network round-trip (or one batch of local
//! inference) per build. The cache lets a rebuilt index skip that step when
//! neither the embedding model nor any tool text changed. A hit still yields a
//! complete matrix: the index is always rebuilt whole.

use ndarray::Array2;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Cache file format version. Increment when format changes.
const CACHE_VERSION: u32 = 2;

/// Magic bytes to identify valid cache files.
const CACHE_MAGIC: &[u8; 8] = b"TOOLSIFT";

/// Magic, version, key, rows and dims.
const HEADER_LEN: u64 = 8 + 4 + 32 + 8 + 8;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed at {stage}: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cache file is corrupt: {0}")]
    Corrupt(String),
}

fn io_err(stage: &'static str) -> impl FnOnce(io::Error) -> CacheError {
    move |source| CacheError::Io { stage, source }
}

/// Cached embeddings with the key they were computed for.
#[derive(Debug)]
pub struct EmbeddingsCache {
    /// SHA-256 over the embedding model id and every embedded text, in order.
    pub key: [u8; 32],
    pub embeddings: Array2<f32>,
}

impl EmbeddingsCache {
    /// Cache key for a model and an ordered list of embedded texts.
    pub fn compute_key(model_id: &str, texts: &[String]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        hasher.update(b"\n");

        for text in texts {
            hasher.update((text.len() as u64).to_le_bytes());
            hasher.update(text.as_bytes());
        }

        hasher.finalize().into()
    }

    pub fn new(model_id: &str, texts: &[String], embeddings: Array2<f32>) -> Self {
        Self {
            key: Self::compute_key(model_id, texts),
            embeddings,
        }
    }

    /// Save cache to a binary file.
    ///
    /// File format:
    /// - 8 bytes: magic "TOOLSIFT"
    /// - 4 bytes: version (u32 LE)
    /// - 32 bytes: key
    /// - 8 bytes: rows (u64 LE)
    /// - 8 bytes: dims (u64 LE)
    /// - rows * dims * 4 bytes: f32 LE, row-major
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err("create directory"))?;
        }

        let (rows, dims) = self.embeddings.dim();
        let mut writer = BufWriter::new(File::create(path).map_err(io_err("create file"))?);

        writer.write_all(CACHE_MAGIC).map_err(io_err("write header"))?;
        writer
            .write_all(&CACHE_VERSION.to_le_bytes())
            .map_err(io_err("write header"))?;
        writer.write_all(&self.key).map_err(io_err("write header"))?;
        writer
            .write_all(&(rows as u64).to_le_bytes())
            .map_err(io_err("write header"))?;
        writer
            .write_all(&(dims as u64).to_le_bytes())
            .map_err(io_err("write header"))?;

        for &val in self.embeddings.iter() {
            writer
                .write_all(&val.to_le_bytes())
                .map_err(io_err("write embeddings"))?;
        }
        writer.flush().map_err(io_err("flush"))?;

        tracing::info!(
            path = %path.display(),
            rows,
            dims,
            size_bytes = 8 + 4 + 32 + 8 + 8 + rows * dims * 4,
            "Embeddings cache saved"
        );

        Ok(())
    }

    /// Load a cache file. Missing files and foreign or outdated formats are `None`.
    pub fn load(path: &Path) -> Result<Option<Self>, CacheError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Cache file does not exist");
            return Ok(None);
        }

        let mut reader = BufReader::new(File::open(path).map_err(io_err("open file"))?);

        let mut magic = [0u8; 8];
        if reader.read_exact(&mut magic).is_err() || &magic != CACHE_MAGIC {
            tracing::warn!(path = %path.display(), "Invalid cache magic, ignoring");
            return Ok(None);
        }

        let version = u32::from_le_bytes(read_array(&mut reader)?);
        if version != CACHE_VERSION {
            tracing::warn!(
                path = %path.display(),
                cache_version = version,
                expected_version = CACHE_VERSION,
                "Cache version mismatch, ignoring"
            );
            return Ok(None);
        }

        let key: [u8; 32] = read_array(&mut reader)?;
        let rows = u64::from_le_bytes(read_array(&mut reader)?) as usize;
        let dims = u64::from_le_bytes(read_array(&mut reader)?) as usize;

        let total = rows
            .checked_mul(dims)
            .ok_or_else(|| CacheError::Corrupt(format!("{rows}x{dims} overflows")))?;
        let expected_len = (total as u64)
            .checked_mul(4)
            .and_then(|body| body.checked_add(HEADER_LEN))
            .ok_or_else(|| CacheError::Corrupt(format!("{rows}x{dims} overflows")))?;
        let file_len = fs::metadata(path).map_err(io_err("stat file"))?.len();
        if expected_len > file_len {
            return Err(CacheError::Corrupt(format!(
                "header declares {rows}x{dims} but file holds {file_len} bytes"
            )));
        }

        let mut data = Vec::with_capacity(total);
        for _ in 0..total {
            data.push(f32::from_le_bytes(read_array(&mut reader)?));
        }

        let embeddings = Array2::from_shape_vec((rows, dims), data)
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;

        tracing::debug!(path = %path.display(), rows, dims, "Embeddings cache loaded");

        Ok(Some(Self { key, embeddings }))
    }

    pub fn is_valid_for(&self, model_id: &str, texts: &[String]) -> bool {
        self.embeddings.nrows() == texts.len() && self.key == Self::compute_key(model_id, texts)
    }
}

fn read_array<const N: usize>(reader: &mut impl Read) -> Result<[u8; N], CacheError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CacheError::Corrupt("file truncated".to_string()),
        _ => CacheError::Io {
            stage: "read",
            source: e,
        },
    })?;
    Ok(buf)
}

/// Load cached embeddings for exactly these texts, or `None` on a miss.
///
/// A corrupt cache file is reported as a miss so the caller re-embeds and overwrites it.
pub fn try_load_embeddings_cache(
    cache_path: &Path,
    model_id: &str,
    texts: &[String],
) -> Result<Option<Array2<f32>>, CacheError> {
    let cache = match EmbeddingsCache::load(cache_path) {
        Ok(cache) => cache,
        Err(CacheError::Corrupt(reason)) => {
            tracing::warn!(path = %cache_path.display(), %reason, "Ignoring corrupt embeddings cache");
            None
        }
        Err(e) => return Err(e),
    };

    match cache {
        Some(cache) if cache.is_valid_for(model_id, texts) => {
            tracing::info!(rows = texts.len(), "Using cached embeddings (cache hit)");
            Ok(Some(cache.embeddings))
        }
        Some(_) => {
            tracing::info!("Cache stale (model or tools changed), will recompute");
            Ok(None)
        }
        None => {
            tracing::info!("No cache found, will compute embeddings");
            Ok(None)
        }
    }
}

pub fn save_embeddings_cache(
    cache_path: &Path,
    model_id: &str,
    texts: &[String],
    embeddings: &Array2<f32>,
) -> Result<(), CacheError> {
    EmbeddingsCache::new(model_id, texts, embeddings.clone()).save(cache_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_key_depends_on_model_and_texts() {
        let a = texts(&["InventoryLookup: stock"]);
        let b = texts(&["PriceCompare: prices"]);

        assert_ne!(
            EmbeddingsCache::compute_key("m1", &a),
            EmbeddingsCache::compute_key("m1", &b)
        );
        assert_ne!(
            EmbeddingsCache::compute_key("m1", &a),
            EmbeddingsCache::compute_key("m2", &a)
        );
        // Boundaries between texts are part of the key.
        assert_ne!(
            EmbeddingsCache::compute_key("m1", &texts(&["ab", "c"])),
            EmbeddingsCache::compute_key("m1", &texts(&["a", "bc"]))
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("nested").join("cache.bin");

        let tools = texts(&["A: one", "B: two"]);
        let embeddings =
            Array2::from_shape_vec((2, 4), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();

        save_embeddings_cache(&cache_path, "m1", &tools, &embeddings).unwrap();
        let loaded = EmbeddingsCache::load(&cache_path).unwrap().unwrap();

        assert_eq!(loaded.embeddings, embeddings);
        assert!(loaded.is_valid_for("m1", &tools));
        assert!(!loaded.is_valid_for("m2", &tools));
    }

    #[test]
    fn test_stale_cache_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("cache.bin");
        let embeddings = Array2::from_shape_vec((1, 2), vec![1.0, 0.0]).unwrap();

        save_embeddings_cache(&cache_path, "m1", &texts(&["A: one"]), &embeddings).unwrap();

        let hit = try_load_embeddings_cache(&cache_path, "m1", &texts(&["A: one"])).unwrap();
        assert_eq!(hit, Some(embeddings));
        let miss = try_load_embeddings_cache(&cache_path, "m1", &texts(&["A: changed"])).unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_truncated_file_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("cache.bin");
        let embeddings = Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let tools = texts(&["A: one", "B: two"]);
        save_embeddings_cache(&cache_path, "m1", &tools, &embeddings).unwrap();

        let bytes = fs::read(&cache_path).unwrap();
        fs::write(&cache_path, &bytes[..bytes.len() - 3]).unwrap();

        assert!(matches!(
            EmbeddingsCache::load(&cache_path),
            Err(CacheError::Corrupt(_))
        ));
        assert!(try_load_embeddings_cache(&cache_path, "m1", &tools)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_oversized_header_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("cache.bin");
        let tools = texts(&["A: one"]);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(CACHE_MAGIC);
        bytes.extend_from_slice(&CACHE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&EmbeddingsCache::compute_key("m1", &tools));
        bytes.extend_from_slice(&(1u64 << 31).to_le_bytes());
        bytes.extend_from_slice(&(1u64 << 31).to_le_bytes());
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        fs::write(&cache_path, &bytes).unwrap();

        assert!(matches!(
            EmbeddingsCache::load(&cache_path),
            Err(CacheError::Corrupt(_))
        ));
        assert!(try_load_embeddings_cache(&cache_path, "m1", &tools)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_foreign_file_is_ignored() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("cache.bin");
        fs::write(&cache_path, b"not a cache").unwrap();

        assert!(EmbeddingsCache::load(&cache_path).unwrap().is_none());
    }
}
