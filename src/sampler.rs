use rand::prelude::*;
use std::collections::HashMap;

use crate::config::AnnotatorConfig;
use crate::constants::sampler::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_PER_BASE_ID};
use crate::data::{Batch, Item};
use crate::errors::AnnotateError;
use crate::types::BaseId;

#[derive(Debug, Clone)]
/// Small seedable RNG so batch order can be replayed from a seed.
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl rand::RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let bytes = self.next_u64_internal().to_le_bytes();
            let copy_len = (dest.len() - offset).min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}

/// Uniform in-place permutation (Fisher–Yates).
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for idx in (1..items.len()).rev() {
        let swap_with = rng.random_range(0..=idx);
        items.swap(idx, swap_with);
    }
}

/// Greedily take items in pool order, capping each base id at `max_per_base_id`.
///
/// Stops at `size` items or when the pool is exhausted. An empty pool yields
/// [`AnnotateError::NoSamplesAvailable`]. `size` and `max_per_base_id` are
/// treated as at least 1, so a non-empty pool always yields a non-empty batch.
pub fn build_batch(
    available: &[Item],
    size: usize,
    max_per_base_id: usize,
) -> Result<Batch, AnnotateError> {
    if available.is_empty() {
        return Err(AnnotateError::NoSamplesAvailable);
    }
    let size = size.max(1);
    let max_per_base_id = max_per_base_id.max(1);
    let mut per_base: HashMap<&BaseId, usize> = HashMap::new();
    let mut items = Vec::with_capacity(size.min(available.len()));
    for item in available {
        if items.len() >= size {
            break;
        }
        let taken = per_base.entry(&item.base_id).or_insert(0);
        if *taken >= max_per_base_id {
            continue;
        }
        *taken += 1;
        items.push(item.clone());
    }
    Ok(Batch { items })
}

/// Shuffles the available pool and cuts batches from it.
pub struct BatchSampler {
    rng: DeterministicRng,
    batch_size: usize,
    max_per_base_id: usize,
}

impl Default for BatchSampler {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_MAX_PER_BASE_ID, None)
    }
}

impl BatchSampler {
    /// Create a sampler; `seed = None` draws a fresh seed from the thread RNG.
    ///
    /// Zero limits are raised to 1.
    pub fn new(batch_size: usize, max_per_base_id: usize, seed: Option<u64>) -> Self {
        Self {
            rng: DeterministicRng::new(seed.unwrap_or_else(rand::random)),
            batch_size: batch_size.max(1),
            max_per_base_id: max_per_base_id.max(1),
        }
    }

    /// Create a sampler from the annotator configuration.
    pub fn from_config(config: &AnnotatorConfig) -> Self {
        Self::new(config.batch_size, config.max_per_base_id, config.seed)
    }

    /// Configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Shuffle `pool` in place, then build the next batch from it.
    pub fn next_batch(&mut self, pool: &mut [Item]) -> Result<Batch, AnnotateError> {
        if pool.is_empty() {
            return Err(AnnotateError::NoSamplesAvailable);
        }
        shuffle(pool, &mut self.rng);
        build_batch(pool, self.batch_size, self.max_per_base_id)
    }
}
