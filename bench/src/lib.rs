//! Synthetic posting-list generation for the kernel benchmarks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use text_fusion_common::{EntityId, TextRecordId, WordId};
use text_fusion_model::WordEntityPostings;

/// Generates a word-only posting stream of `len` postings over `distinct_records`
/// record ids. Deterministic for a given seed.
pub fn synthetic_word_stream(len: usize, distinct_records: u64, seed: u64) -> WordEntityPostings {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cids: Vec<u64> = (0..len).map(|_| rng.random_range(0..distinct_records)).collect();
    cids.sort_unstable();
    WordEntityPostings {
        cids: cids.into_iter().map(TextRecordId).collect(),
        scores: (0..len).map(|_| rng.random_range(1..16)).collect(),
        wids: vec![(0..len).map(|_| WordId(rng.random_range(0..1000))).collect()],
        ..Default::default()
    }
}

/// Generates an entity posting stream with `distinct_entities` entities.
pub fn synthetic_entity_postings(
    len: usize,
    distinct_records: u64,
    distinct_entities: u64,
    seed: u64,
) -> WordEntityPostings {
    let mut stream = synthetic_word_stream(len, distinct_records, seed);
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    stream.eids = (0..len)
        .map(|_| EntityId(rng.random_range(0..distinct_entities)))
        .collect();
    stream
}
