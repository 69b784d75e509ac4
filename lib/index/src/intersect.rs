use std::ops::Range;
use text_fusion_common::{EntityId, KernelError, KernelResult, Score};
use text_fusion_model::WordEntityPostings;
use tracing::debug;

/// Intersects a word-match stream with an entity block by text record, keeping the
/// cross-product of matching rows within each record.
///
/// `left` contributes its word columns, `right` contributes entities and scores. For a
/// record hosting several matching word occurrences and several entity postings, every
/// (word row, entity row) pairing is emitted, because downstream aggregation must see
/// each co-occurrence. The output `cids` stay non-decreasing.
///
/// Runs in O(|left| + |right| + |output|); the output itself can be quadratic in the
/// run lengths, which is optimal for an actual cross-product.
pub fn cross_intersect(
    left: &WordEntityPostings,
    right: &WordEntityPostings,
) -> KernelResult<WordEntityPostings> {
    left.ensure_valid()?;
    right.ensure_valid()?;
    debug!(
        left = left.len(),
        right = right.len(),
        "cross-intersecting a word stream with an entity block"
    );

    let mut result = WordEntityPostings {
        wids: vec![Vec::new(); left.num_word_columns()],
        ..Default::default()
    };
    if left.is_empty() || right.is_empty() {
        return Ok(result);
    }
    result.cids.reserve(right.len());
    result.scores.reserve(right.len());

    let mut i = 0;
    let mut j = 0;
    while i < left.len() && j < right.len() {
        match left.cids[i].cmp(&right.cids[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                let left_run = left.context_run(i);
                let right_run = right.context_run(j);
                for r in right_run.clone() {
                    for l in left_run.clone() {
                        result.cids.push(right.cids[r]);
                        if right.has_entities() {
                            result.eids.push(right.eids[r]);
                        }
                        result.scores.push(right.scores[r]);
                        for (column, input) in result.wids.iter_mut().zip(&left.wids) {
                            column.push(input[l]);
                        }
                    }
                }
                i = left_run.end;
                j = right_run.end;
            }
        }
    }

    debug!(postings = result.len(), "cross-intersect done");
    Ok(result)
}

/// Intersects k posting streams by text record and materializes the full cross-product
/// of every k-fold match.
///
/// Each input must carry exactly one word column; the output carries k word columns,
/// one per input, and the score of a row is the sum of the scores at the rows the
/// combination selects. With `last_eids`, the given entity column (parallel to the
/// *last* list) joins the entity dimension in: output rows additionally carry the
/// entity at the selected last-list row.
///
/// No priority queue is needed: only k-fold matches produce output, so any list sitting
/// on a higher record pulls all others forward. The scan starts at the last list, which
/// is expected to have the fewest distinct records.
pub fn cross_intersect_k_way(
    weps: &[WordEntityPostings],
    last_eids: Option<&[EntityId]>,
) -> KernelResult<WordEntityPostings> {
    let Some(last) = weps.last() else {
        return Err(KernelError::NoInputLists);
    };
    for wep in weps {
        wep.ensure_valid()?;
        if wep.num_word_columns() != 1 {
            return Err(KernelError::WordColumnMismatch {
                expected: 1,
                actual: wep.num_word_columns(),
            });
        }
    }
    if let Some(eids) = last_eids
        && eids.len() != last.len()
    {
        return Err(KernelError::EntityColumnMismatch {
            expected: last.len(),
            actual: eids.len(),
        });
    }

    let k = weps.len();
    let mut result = WordEntityPostings {
        wids: vec![Vec::new(); k],
        ..Default::default()
    };
    if weps.iter().any(WordEntityPostings::is_empty) {
        debug!("empty list involved, no intersection necessary");
        return Ok(result);
    }
    let smallest = weps.iter().map(WordEntityPostings::len).min().unwrap_or(0);
    debug!(lists = k, smallest, "k-way cross-intersection");
    result.cids.reserve(smallest);

    // Round-robin streak scan. `next[i]` always points at the first unexamined posting
    // of list i; a list that matched the current record keeps its cursor on the first
    // row of its run until the match is materialized.
    let mut next = vec![0usize; k];
    let mut current_context = last.cids[0];
    let mut current_list = k - 1;
    let mut streak = 0usize;

    loop {
        let cids = &weps[current_list].cids;
        while next[current_list] < cids.len() && cids[next[current_list]] < current_context {
            next[current_list] += 1;
        }
        let Some(&at) = cids.get(next[current_list]) else {
            // One list cannot advance to the current record; no further match exists.
            break;
        };

        if at == current_context {
            streak += 1;
        } else {
            current_context = at;
            streak = 1;
        }
        if streak == k {
            let runs: Vec<Range<usize>> =
                (0..k).map(|i| weps[i].context_run(next[i])).collect();
            materialize_match(weps, last_eids, &runs, &mut result);
            for (cursor, run) in next.iter_mut().zip(&runs) {
                *cursor = run.end;
            }
            streak = 0;
            current_list = k - 1;
            continue;
        }
        current_list = (current_list + 1) % k;
    }

    debug!(postings = result.len(), "k-way cross-intersection done");
    Ok(result)
}

/// Emits every combination of rows across the matched runs, last list varying fastest.
fn materialize_match(
    weps: &[WordEntityPostings],
    last_eids: Option<&[EntityId]>,
    runs: &[Range<usize>],
    result: &mut WordEntityPostings,
) {
    let k = weps.len();
    let total: usize = runs.iter().map(|run| run.len()).product();
    let mut positions = vec![0usize; k];
    for n in 0..total {
        let mut rem = n;
        for i in (0..k).rev() {
            positions[i] = runs[i].start + rem % runs[i].len();
            rem /= runs[i].len();
        }

        let mut score: Score = 0;
        result.cids.push(weps[k - 1].cids[runs[k - 1].start]);
        for (i, &position) in positions.iter().enumerate() {
            score += weps[i].scores[position];
            result.wids[i].push(weps[i].wids[0][position]);
        }
        result.scores.push(score);
        if let Some(eids) = last_eids {
            result.eids.push(eids[positions[k - 1]]);
        }
    }
}

/// Restricts an entity block to the text records present in a word-match stream.
///
/// Every entity posting of a matching record is kept once; the word stream only
/// contributes the record membership. This is the cheap join used when the word
/// dimension itself is not part of the result.
pub fn intersect_postings_with_entity_block(
    matching: &WordEntityPostings,
    entity_block: &WordEntityPostings,
) -> KernelResult<WordEntityPostings> {
    matching.ensure_valid()?;
    entity_block.ensure_valid()?;
    debug!(
        matching = matching.len(),
        block = entity_block.len(),
        "restricting an entity block to matching records"
    );

    let mut result = WordEntityPostings::new();
    if matching.is_empty() || entity_block.is_empty() {
        return Ok(result);
    }
    result.cids.reserve(entity_block.len());

    let mut i = 0;
    let mut j = 0;
    while i < matching.len() && j < entity_block.len() {
        match matching.cids[i].cmp(&entity_block.cids[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                let run = entity_block.context_run(j);
                for r in run.clone() {
                    result.cids.push(entity_block.cids[r]);
                    if entity_block.has_entities() {
                        result.eids.push(entity_block.eids[r]);
                    }
                    result.scores.push(entity_block.scores[r]);
                }
                i += 1;
                j = run.end;
            }
        }
    }
    Ok(result)
}

/// Intersects two word-only posting lists, summing the scores of paired rows.
pub fn intersect_two_posting_lists(
    a: &WordEntityPostings,
    b: &WordEntityPostings,
) -> KernelResult<WordEntityPostings> {
    a.ensure_valid()?;
    b.ensure_valid()?;
    debug!(a = a.len(), b = b.len(), "intersecting two posting lists");

    let mut result = WordEntityPostings::new();
    if a.is_empty() || b.is_empty() {
        return Ok(result);
    }
    result.cids.reserve(a.len().min(b.len()));

    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        match a.cids[i].cmp(&b.cids[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                result.cids.push(a.cids[i]);
                result.scores.push(a.scores[i] + b.scores[j]);
                i += 1;
                j += 1;
            }
        }
    }
    Ok(result)
}
