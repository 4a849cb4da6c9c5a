//! In-memory embedding cache keyed by SHA-256 of (framework, model, text).
//!
//! Lookups take the entry lock only. Misses are computed under a separate
//! compute lock and re-checked once it is held, so concurrent identical
//! requests trigger at most one backend call per key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use super::{Vectoriser, VectoriserError};
use crate::errors::ContractViolation;
use crate::model::EmbeddingVector;

type CacheKey = [u8; 32];

pub struct CachedVectoriser<V> {
    inner: V,
    entries: Mutex<HashMap<CacheKey, EmbeddingVector>>,
    compute: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    /// Texts actually sent to the wrapped vectoriser.
    pub misses: u64,
}

impl<V: Vectoriser> CachedVectoriser<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
            compute: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(&self, text: &str) -> CacheKey {
        let mut hasher = Sha256::new();
        for part in [self.inner.framework(), self.inner.model(), text] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.finalize().into()
    }

    fn lookup(&self, keys: &[CacheKey]) -> Result<Vec<Option<EmbeddingVector>>, VectoriserError> {
        let entries = self.entries.lock().map_err(lock_poisoned)?;
        Ok(keys.iter().map(|k| entries.get(k).cloned()).collect())
    }

    /// Compute every missing entry with one backend call.
    fn fill(&self, texts: &[String], keys: &[CacheKey]) -> Result<(), VectoriserError> {
        let _guard = self.compute.lock().map_err(lock_poisoned)?;

        let mut pending: Vec<(CacheKey, String)> = Vec::new();
        {
            let entries = self.entries.lock().map_err(lock_poisoned)?;
            for (key, text) in keys.iter().zip(texts) {
                if !entries.contains_key(key) && !pending.iter().any(|(k, _)| k == key) {
                    pending.push((*key, text.clone()));
                }
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        let batch: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();
        let vectors = self.inner.vectorise(&batch)?;
        if vectors.len() != batch.len() {
            return Err(VectoriserError::Contract(ContractViolation::Count {
                expected: batch.len(),
                got: vectors.len(),
            }));
        }

        self.misses.fetch_add(batch.len() as u64, Ordering::Relaxed);
        log::debug!("embedding cache filled {} entries", batch.len());

        let mut entries = self.entries.lock().map_err(lock_poisoned)?;
        for ((key, _), vector) in pending.into_iter().zip(vectors) {
            entries.insert(key, vector);
        }

        Ok(())
    }
}

impl<V: Vectoriser> Vectoriser for CachedVectoriser<V> {
    fn framework(&self) -> &str {
        self.inner.framework()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn vectorise(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, VectoriserError> {
        let keys: Vec<CacheKey> = texts.iter().map(|t| self.key(t)).collect();

        let cached = self.lookup(&keys)?;
        if cached.iter().all(Option::is_some) {
            self.hits.fetch_add(texts.len() as u64, Ordering::Relaxed);
            return Ok(cached.into_iter().flatten().collect());
        }

        self.fill(texts, &keys)?;
        let filled = self.lookup(&keys)?;

        let hits = cached.iter().filter(|v| v.is_some()).count();
        self.hits.fetch_add(hits as u64, Ordering::Relaxed);

        Ok(filled.into_iter().flatten().collect())
    }
}

fn lock_poisoned<T>(e: std::sync::PoisonError<T>) -> VectoriserError {
    VectoriserError::EmbeddingFailed(format!("Embedding cache lock poisoned: {}", e))
}
