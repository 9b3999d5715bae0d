//! Mutable generation state: the random source and the entry id allocator.
//!
//! Everything that changes from one patient to the next lives in a
//! `GenerationContext`. There is no global state, so two contexts built from
//! the same seed produce the same dataset.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Hands out dataset-unique ids for comorbidity entries.
///
/// Ids are consumed in generation order and never reused. Parallel producers
/// must be given disjoint ranges via [`EntryIdAllocator::starting_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryIdAllocator {
    next: u64,
}

impl EntryIdAllocator {
    /// An allocator whose first id is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Take the next id.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next call to `next_id` will return.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for EntryIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run generation state threaded through every patient.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub rng: ChaCha8Rng,
    pub ids: EntryIdAllocator,
}

impl GenerationContext {
    /// A context seeded from `seed`, with ids starting at 1.
    pub fn seeded(seed: u64) -> Self {
        Self::with_ids(seed, EntryIdAllocator::new())
    }

    pub fn with_ids(seed: u64, ids: EntryIdAllocator) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            ids,
        }
    }
}
