use itertools::izip;
use text_fusion_common::{KernelError, KernelResult};
use text_fusion_model::{WordEntityPostings, WordIdRange};
use tracing::debug;

/// Restricts a single-term posting stream to the word ids in `range`.
///
/// Word-id ranges come from prefix expansion: the stream of a `word*` term covers the
/// whole prefix class, and range-sorted posting blocks can be reused across several
/// prefix queries by filtering them per query.
///
/// The input must carry exactly one word column. Matching rows are retained in their
/// original order, without deduplication; the operation is linear and idempotent.
pub fn filter_by_range(
    range: &WordIdRange,
    wep: &WordEntityPostings,
) -> KernelResult<WordEntityPostings> {
    wep.ensure_valid()?;
    if wep.num_word_columns() != 1 {
        return Err(KernelError::WordColumnMismatch {
            expected: 1,
            actual: wep.num_word_columns(),
        });
    }
    debug!(postings = wep.len(), "filtering postings by word id range");

    let mut result = WordEntityPostings {
        wids: vec![Vec::new()],
        ..Default::default()
    };
    result.cids.reserve(wep.len());
    result.scores.reserve(wep.len());
    result.wids[0].reserve(wep.len());

    for (&cid, &score, &wid) in izip!(&wep.cids, &wep.scores, &wep.wids[0]) {
        if range.contains(wid) {
            result.cids.push(cid);
            result.scores.push(score);
            result.wids[0].push(wid);
        }
    }

    debug!(postings = result.len(), "range filter done");
    Ok(result)
}
