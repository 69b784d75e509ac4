use crate::limits::AggregationLimits;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use text_fusion_common::{
    EntityId, KernelError, KernelResult, Score, TextRecordId, ValueId, WordId,
};
use text_fusion_model::{ValueTable, WordEntityPostings};
use tracing::debug;

/// Per-group state of an aggregation: the posting count and the up-to-k best records.
///
/// The ordered set never exceeds k entries. Its transitions are: below capacity every
/// record is accepted; at capacity a record is accepted only if its score strictly
/// exceeds the minimum's, evicting the minimum (smallest score, then smallest record
/// id).
pub(crate) struct GroupState {
    pub count: u64,
    pub top: BTreeSet<(Score, TextRecordId)>,
}

impl GroupState {
    fn accept(&mut self, score: Score, cid: TextRecordId, k: usize) {
        let entry = (score, cid);
        if self.top.contains(&entry) {
            return;
        }
        if self.top.len() < k {
            self.top.insert(entry);
        } else if let Some(&(min_score, _)) = self.top.first()
            && score > min_score
        {
            self.top.pop_first();
            self.top.insert(entry);
        }
    }
}

/// Groups postings by an arbitrary key, keeping a count and the top-k records each.
pub(crate) struct GroupAggregator<K> {
    k: usize,
    groups: FxHashMap<K, GroupState>,
}

impl<K: Eq + Hash> GroupAggregator<K> {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            groups: FxHashMap::default(),
        }
    }

    /// Feeds one observation into the group of `key`. The count is only bumped when
    /// `count_posting` is set; the caller decides what counts (for the single-variable
    /// aggregation, each (entity, record) pair counts once).
    pub fn observe(&mut self, key: K, score: Score, cid: TextRecordId, count_posting: bool) {
        let state = self.groups.entry(key).or_insert_with(|| GroupState {
            count: 0,
            top: BTreeSet::new(),
        });
        if count_posting {
            state.count += 1;
        }
        state.accept(score, cid, self.k);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &GroupState)> {
        self.groups.iter()
    }
}

/// Checks that a non-empty stream carries the entity column the aggregators group by.
pub(crate) fn ensure_entities(wep: &WordEntityPostings) -> KernelResult<()> {
    if !wep.is_empty() && !wep.has_entities() {
        return Err(KernelError::ColumnLengthMismatch {
            column: "eids",
            expected: wep.len(),
            actual: 0,
        });
    }
    Ok(())
}

/// Aggregates a word-entity posting stream into one group per distinct entity, keeping
/// the records with the k highest posting scores per group.
///
/// The emitted entity score is the number of (entity, record) pairs of the group; a
/// record mentioning the entity through several words counts once. For every selected
/// record, one output row is emitted per word tuple observed at that (entity, record)
/// pair: `[record, entityScore, entity, word…]` (just `[record, entityScore, entity]`
/// for word-free streams).
///
/// The output is not sorted; resorting is a separate operation. Not sorting here keeps
/// the common case cheap, and the result can be much smaller than the input.
pub fn agg_scores_and_take_top_k_contexts(
    wep: &WordEntityPostings,
    k: usize,
    result: &mut ValueTable,
) -> KernelResult<()> {
    wep.ensure_valid()?;
    ensure_entities(wep)?;
    debug!(
        postings = wep.len(),
        k, "aggregating scores, keeping the top records per entity"
    );
    if wep.is_empty() {
        return Ok(());
    }

    if k == 1 {
        return agg_scores_and_take_top_context(wep, result);
    }

    let mut ctx_words: FxHashMap<(EntityId, TextRecordId), Vec<Vec<WordId>>> =
        FxHashMap::default();
    let mut aggregator = GroupAggregator::new(k);
    for i in 0..wep.len() {
        let eid = wep.eids[i];
        let cid = wep.cids[i];
        let words = ctx_words.entry((eid, cid)).or_default();
        words.push(wep.word_tuple(i));
        let new_pair = words.len() == 1;
        aggregator.observe(eid, wep.scores[i], cid, new_pair);
    }

    result.reserve(aggregator.len() * k);
    let mut row = Vec::with_capacity(3 + wep.num_word_columns());
    for (&eid, state) in aggregator.iter() {
        let entity_score = ValueId::from_int(state.count);
        for &(_, cid) in state.top.iter().rev() {
            for words in &ctx_words[&(eid, cid)] {
                row.clear();
                row.push(ValueId::from_text_record(cid));
                row.push(entity_score);
                row.push(ValueId::from_entity(eid));
                row.extend(words.iter().copied().map(ValueId::from_word));
                result.push_row(&row)?;
            }
        }
    }

    debug!(rows = result.len(), "aggregation done");
    Ok(())
}

/// The k = 1 case: a single hash map pass, no ordered set.
fn agg_scores_and_take_top_context(
    wep: &WordEntityPostings,
    result: &mut ValueTable,
) -> KernelResult<()> {
    struct Best {
        score: Score,
        cid: TextRecordId,
        words: Vec<WordId>,
    }

    let mut map: FxHashMap<EntityId, (u64, TextRecordId, Best)> = FxHashMap::default();
    for i in 0..wep.len() {
        let cid = wep.cids[i];
        let score = wep.scores[i];
        match map.entry(wep.eids[i]) {
            Entry::Vacant(vacant) => {
                vacant.insert((
                    1,
                    cid,
                    Best {
                        score,
                        cid,
                        words: wep.word_tuple(i),
                    },
                ));
            }
            Entry::Occupied(mut occupied) => {
                let (count, last_counted, best) = occupied.get_mut();
                // A repeated (entity, record) pair can only occur within one record
                // run, so the last counted record id suffices for the count rule.
                if *last_counted != cid {
                    *count += 1;
                    *last_counted = cid;
                }
                if score > best.score {
                    *best = Best {
                        score,
                        cid,
                        words: wep.word_tuple(i),
                    };
                }
            }
        }
    }

    result.reserve(map.len());
    let mut row = Vec::with_capacity(3 + wep.num_word_columns());
    for (&eid, (count, _, best)) in &map {
        row.clear();
        row.push(ValueId::from_text_record(best.cid));
        row.push(ValueId::from_int(*count));
        row.push(ValueId::from_entity(eid));
        row.extend(best.words.iter().copied().map(ValueId::from_word));
        result.push_row(&row)?;
    }

    debug!(rows = result.len(), "aggregation done");
    Ok(())
}

/// Returns the number of grouping tuples of one record, or an error beyond the cap.
pub(crate) fn context_tuple_count(
    entities: usize,
    nof_vars: usize,
    limits: &AggregationLimits,
) -> KernelResult<usize> {
    let mut total = 1usize;
    for _ in 0..nof_vars {
        total = total
            .checked_mul(entities)
            .filter(|&t| t <= limits.max_tuples_per_context)
            .ok_or(KernelError::TupleFanOutExceeded {
                entities,
                nof_vars,
                limit: limits.max_tuples_per_context,
            })?;
    }
    Ok(total)
}

/// Builds the n-th grouping tuple over `entities` via mixed-radix decomposition: slot
/// zero cycles fastest.
pub(crate) fn grouping_tuple(entities: &[EntityId], nof_vars: usize, n: usize) -> Vec<EntityId> {
    let mut key = Vec::with_capacity(nof_vars);
    let mut rem = n;
    for _ in 0..nof_vars {
        key.push(entities[rem % entities.len()]);
        rem /= entities.len();
    }
    key
}

/// Aggregates with a grouping key of `nof_vars` entity slots.
///
/// For every record, each slot ranges independently over the record's entities (tuples
/// with replacement), which models SPARQL patterns where several variables co-occur in
/// the same text record. All grouping tuples of a record share the record's score (the
/// score of its first posting). Output rows are `[record, entityScore, e1…eN]`.
///
/// A record with many entities enumerates `|E|^nofVars` tuples; the cap in `limits`
/// bounds that fan-out and exceeding it is a precondition violation.
pub fn mult_vars_agg_scores_and_take_top_k_contexts(
    wep: &WordEntityPostings,
    nof_vars: usize,
    k: usize,
    limits: &AggregationLimits,
    result: &mut ValueTable,
) -> KernelResult<()> {
    wep.ensure_valid()?;
    ensure_entities(wep)?;
    debug!(
        postings = wep.len(),
        nof_vars, k, "aggregating scores over entity tuples"
    );
    if wep.is_empty() {
        return Ok(());
    }
    if k == 1 {
        return mult_vars_agg_scores_and_take_top_context(wep, nof_vars, limits, result);
    }

    let mut aggregator: GroupAggregator<Vec<EntityId>> = GroupAggregator::new(k);
    let mut start = 0;
    while start < wep.len() {
        let run = wep.context_run(start);
        let cid = wep.cids[start];
        let record_score = wep.scores[start];
        let entities = &wep.eids[run.clone()];
        let tuples = context_tuple_count(entities.len(), nof_vars, limits)?;
        for n in 0..tuples {
            aggregator.observe(grouping_tuple(entities, nof_vars, n), record_score, cid, true);
        }
        start = run.end;
    }

    result.reserve(aggregator.len() * k);
    let mut row = Vec::with_capacity(2 + nof_vars);
    for (key, state) in aggregator.iter() {
        let entity_score = ValueId::from_int(state.count);
        for &(_, cid) in state.top.iter().rev() {
            row.clear();
            row.push(ValueId::from_text_record(cid));
            row.push(entity_score);
            row.extend(key.iter().copied().map(ValueId::from_entity));
            result.push_row(&row)?;
        }
    }

    debug!(rows = result.len(), "aggregation done");
    Ok(())
}

/// The k = 1 case of the multi-variable aggregation.
fn mult_vars_agg_scores_and_take_top_context(
    wep: &WordEntityPostings,
    nof_vars: usize,
    limits: &AggregationLimits,
    result: &mut ValueTable,
) -> KernelResult<()> {
    let mut map: FxHashMap<Vec<EntityId>, (u64, Score, TextRecordId)> = FxHashMap::default();
    let mut start = 0;
    while start < wep.len() {
        let run = wep.context_run(start);
        let cid = wep.cids[start];
        let record_score = wep.scores[start];
        let entities = &wep.eids[run.clone()];
        let tuples = context_tuple_count(entities.len(), nof_vars, limits)?;
        for n in 0..tuples {
            match map.entry(grouping_tuple(entities, nof_vars, n)) {
                Entry::Vacant(vacant) => {
                    vacant.insert((1, record_score, cid));
                }
                Entry::Occupied(mut occupied) => {
                    let (count, best_score, best_cid) = occupied.get_mut();
                    *count += 1;
                    if record_score > *best_score {
                        *best_score = record_score;
                        *best_cid = cid;
                    }
                }
            }
        }
        start = run.end;
    }

    result.reserve(map.len());
    let mut row = Vec::with_capacity(2 + nof_vars);
    for (key, &(count, _, cid)) in &map {
        row.clear();
        row.push(ValueId::from_text_record(cid));
        row.push(ValueId::from_int(count));
        row.extend(key.iter().copied().map(ValueId::from_entity));
        result.push_row(&row)?;
    }

    debug!(rows = result.len(), "aggregation done");
    Ok(())
}

/// Aggregates already-materialized result rows, used after the full-text result has
/// been joined with other operators.
///
/// Rows are sorted by `(col0, col3…, col1)` and walked in runs of equal
/// `(col0, col3…)`; each run emits its first k rows, whose column 1 is then rewritten
/// to the run length (the records-per-group count). `result` must be empty; rows need
/// at least three columns.
pub fn agg_rows_and_take_top_k_contexts(
    rows: &mut Vec<Vec<ValueId>>,
    k: usize,
    result: &mut Vec<Vec<ValueId>>,
) {
    debug_assert!(result.is_empty());
    debug!(rows = rows.len(), k, "aggregating materialized rows");
    if rows.is_empty() {
        return;
    }

    rows.sort_by(|l, r| {
        l[0].cmp(&r[0])
            .then_with(|| l[3..].cmp(&r[3..]))
            .then_with(|| l[1].cmp(&r[1]))
    });

    result.push(rows[0].clone());
    let mut contexts_in_group = 1usize;
    for i in 1..rows.len() {
        let same_group = rows[i][0] == rows[i - 1][0] && rows[i][3..] == rows[i - 1][3..];
        if same_group {
            contexts_in_group += 1;
            if contexts_in_group <= k {
                result.push(rows[i].clone());
            }
        } else {
            finalize_group(result, contexts_in_group, k);
            result.push(rows[i].clone());
            contexts_in_group = 1;
        }
    }
    finalize_group(result, contexts_in_group, k);

    debug!(rows = result.len(), "row aggregation done");
}

/// Rewrites column 1 of the group's emitted rows to the group's record count.
fn finalize_group(result: &mut [Vec<ValueId>], contexts_in_group: usize, k: usize) {
    let emitted = contexts_in_group.min(k);
    let count = ValueId::from_int(contexts_in_group as u64);
    let len = result.len();
    for row in &mut result[len - emitted..] {
        row[1] = count;
    }
}

/// Returns the ids of the k records with the highest scores of a word-only stream.
///
/// Ties are broken towards the earlier posting. Partial selection, so the stream is
/// never fully sorted.
pub fn top_k_by_scores(wep: &WordEntityPostings, k: usize) -> KernelResult<Vec<TextRecordId>> {
    wep.ensure_valid()?;
    let k = k.min(wep.len());
    debug!(postings = wep.len(), k, "selecting the top records by score");

    let mut indices: Vec<usize> = (0..wep.len()).collect();
    let by_score_desc = |a: &usize, b: &usize| {
        wep.scores[*b]
            .cmp(&wep.scores[*a])
            .then_with(|| a.cmp(b))
    };
    if k > 0 && k < indices.len() {
        indices.select_nth_unstable_by(k - 1, by_score_desc);
    }
    indices.truncate(k);
    indices.sort_unstable_by(by_score_desc);
    Ok(indices.into_iter().map(|i| wep.cids[i]).collect())
}
