use crate::aggregate::{GroupAggregator, ensure_entities};
use crate::limits::AggregationLimits;
use rustc_hash::FxHashMap;
use text_fusion_common::{EntityId, KernelError, KernelResult, TextRecordId, ValueId, WordId};
use text_fusion_model::{EntityFilterMap, EntityFilterSet, ValueTable, WordEntityPostings};
use tracing::debug;

/// Like [crate::agg_scores_and_take_top_k_contexts], restricted to the entities of a
/// sub-result set.
///
/// Postings whose entity is not in `filter` do not contribute to any group. The
/// resulting groups are a subset of the unfiltered aggregation's. Output rows are
/// `[record, entityScore, entity, word…]`.
pub fn one_var_filter_agg_scores_and_take_top_k_contexts(
    wep: &WordEntityPostings,
    filter: &EntityFilterSet,
    k: usize,
    result: &mut ValueTable,
) -> KernelResult<()> {
    wep.ensure_valid()?;
    ensure_entities(wep)?;
    debug!(
        postings = wep.len(),
        filter = filter.len(),
        k,
        "aggregating scores over filtered entities"
    );
    if wep.is_empty() || filter.is_empty() {
        return Ok(());
    }

    let (aggregator, ctx_words) = accumulate_filtered(wep, k, |eid| filter.contains(eid));

    result.reserve(aggregator.len() * k.max(1));
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

    debug!(rows = result.len(), "filtered aggregation done");
    Ok(())
}

/// The filter-map flavor of the one-variable filtered aggregation.
///
/// Each emitted (record, word tuple) combination is repeated once per bound sub-result
/// row of the entity, with the row's columns taking the entity's place:
/// `[record, entityScore, filterRow…, word…]`. The filter rows carry the entity
/// binding in their first column, as materialized by the joining operator.
pub fn one_var_filter_agg_scores_and_take_top_k_contexts_map(
    wep: &WordEntityPostings,
    filter: &EntityFilterMap,
    k: usize,
    result: &mut ValueTable,
) -> KernelResult<()> {
    wep.ensure_valid()?;
    ensure_entities(wep)?;
    debug!(
        postings = wep.len(),
        filter = filter.len(),
        k,
        "aggregating scores over filter-map entities"
    );
    if wep.is_empty() || filter.is_empty() {
        return Ok(());
    }

    let (aggregator, ctx_words) = accumulate_filtered(wep, k, |eid| filter.contains(eid));

    result.reserve(aggregator.len() * k.max(1));
    let mut row = Vec::new();
    for (&eid, state) in aggregator.iter() {
        let entity_score = ValueId::from_int(state.count);
        let filter_rows = filter
            .rows(eid)
            .expect("aggregated entities come from the filter map");
        for &(_, cid) in state.top.iter().rev() {
            for words in &ctx_words[&(eid, cid)] {
                for filter_row in filter_rows {
                    row.clear();
                    row.push(ValueId::from_text_record(cid));
                    row.push(entity_score);
                    row.extend_from_slice(filter_row);
                    row.extend(words.iter().copied().map(ValueId::from_word));
                    result.push_row(&row)?;
                }
            }
        }
    }

    debug!(rows = result.len(), "filtered aggregation done");
    Ok(())
}

/// One pass over the stream, feeding only accepted entities into the group state.
fn accumulate_filtered(
    wep: &WordEntityPostings,
    k: usize,
    mut accept: impl FnMut(EntityId) -> bool,
) -> (
    GroupAggregator<EntityId>,
    FxHashMap<(EntityId, TextRecordId), Vec<Vec<WordId>>>,
) {
    let mut ctx_words: FxHashMap<(EntityId, TextRecordId), Vec<Vec<WordId>>> =
        FxHashMap::default();
    let mut aggregator = GroupAggregator::new(k);
    for i in 0..wep.len() {
        let eid = wep.eids[i];
        if !accept(eid) {
            continue;
        }
        let cid = wep.cids[i];
        let words = ctx_words.entry((eid, cid)).or_default();
        words.push(wep.word_tuple(i));
        let new_pair = words.len() == 1;
        aggregator.observe(eid, wep.scores[i], cid, new_pair);
    }
    (aggregator, ctx_words)
}

/// Multi-variable aggregation where the first grouping slot only ranges over filtered
/// entities.
///
/// For every record, slot 0 draws from the record's entities that are in `filter`
/// (records without any filtered entity contribute nothing); the remaining slots draw
/// from all of the record's entities, as in
/// [crate::mult_vars_agg_scores_and_take_top_k_contexts]. Output rows are
/// `[record, entityScore, e1(filtered), e2…eN]`.
pub fn mult_vars_filter_agg_scores_and_take_top_k_contexts(
    wep: &WordEntityPostings,
    filter: &EntityFilterSet,
    nof_vars: usize,
    k: usize,
    limits: &AggregationLimits,
    result: &mut ValueTable,
) -> KernelResult<()> {
    wep.ensure_valid()?;
    ensure_entities(wep)?;
    debug!(
        postings = wep.len(),
        filter = filter.len(),
        nof_vars,
        k,
        "aggregating scores over filtered entity tuples"
    );
    if wep.is_empty() || filter.is_empty() || nof_vars == 0 {
        return Ok(());
    }

    let aggregator =
        accumulate_mult_vars_filtered(wep, nof_vars, k, limits, |eid| filter.contains(eid))?;

    result.reserve(aggregator.len() * k.max(1));
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

    debug!(rows = result.len(), "filtered aggregation done");
    Ok(())
}

/// The filter-map flavor of the multi-variable filtered aggregation.
///
/// The slot-0 entity is represented by its bound sub-result rows: per selected record,
/// one output row is emitted per filter row of the slot-0 entity, shaped
/// `[record, entityScore, e2…eN, filterRow…]`.
pub fn mult_vars_filter_agg_scores_and_take_top_k_contexts_map(
    wep: &WordEntityPostings,
    filter: &EntityFilterMap,
    nof_vars: usize,
    k: usize,
    limits: &AggregationLimits,
    result: &mut ValueTable,
) -> KernelResult<()> {
    wep.ensure_valid()?;
    ensure_entities(wep)?;
    debug!(
        postings = wep.len(),
        filter = filter.len(),
        nof_vars,
        k,
        "aggregating scores over filter-map entity tuples"
    );
    if wep.is_empty() || filter.is_empty() || nof_vars == 0 {
        return Ok(());
    }

    let aggregator =
        accumulate_mult_vars_filtered(wep, nof_vars, k, limits, |eid| filter.contains(eid))?;

    result.reserve(aggregator.len() * k.max(1));
    let mut row = Vec::new();
    for (key, state) in aggregator.iter() {
        let entity_score = ValueId::from_int(state.count);
        let filter_rows = filter
            .rows(key[0])
            .expect("slot-0 entities come from the filter map");
        for &(_, cid) in state.top.iter().rev() {
            for filter_row in filter_rows {
                row.clear();
                row.push(ValueId::from_text_record(cid));
                row.push(entity_score);
                row.extend(key[1..].iter().copied().map(ValueId::from_entity));
                row.extend_from_slice(filter_row);
                result.push_row(&row)?;
            }
        }
    }

    debug!(rows = result.len(), "filtered aggregation done");
    Ok(())
}

/// Walks the record runs and enumerates grouping tuples whose slot 0 is filtered.
fn accumulate_mult_vars_filtered(
    wep: &WordEntityPostings,
    nof_vars: usize,
    k: usize,
    limits: &AggregationLimits,
    mut accept: impl FnMut(EntityId) -> bool,
) -> KernelResult<GroupAggregator<Vec<EntityId>>> {
    let mut aggregator: GroupAggregator<Vec<EntityId>> = GroupAggregator::new(k);
    let mut filtered = Vec::new();
    let mut start = 0;
    while start < wep.len() {
        let run = wep.context_run(start);
        let cid = wep.cids[start];
        let record_score = wep.scores[start];
        let entities = &wep.eids[run.clone()];

        filtered.clear();
        filtered.extend(entities.iter().copied().filter(|&eid| accept(eid)));
        if filtered.is_empty() {
            start = run.end;
            continue;
        }

        let tuples = (1..nof_vars)
            .try_fold(filtered.len(), |acc, _| acc.checked_mul(entities.len()))
            .filter(|&t| t <= limits.max_tuples_per_context)
            .ok_or(KernelError::TupleFanOutExceeded {
                entities: entities.len(),
                nof_vars,
                limit: limits.max_tuples_per_context,
            })?;
        for n in 0..tuples {
            let mut key = Vec::with_capacity(nof_vars);
            key.push(filtered[n % filtered.len()]);
            let mut rem = n / filtered.len();
            for _ in 1..nof_vars {
                key.push(entities[rem % entities.len()]);
                rem /= entities.len();
            }
            aggregator.observe(key, record_score, cid, true);
        }
        start = run.end;
    }
    Ok(aggregator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agg_scores_and_take_top_k_contexts;

    #[test]
    fn empty_filter_yields_empty_output() {
        let wep = postings(
            &[0, 1, 1, 2, 2, 2],
            &[0, 0, 1, 0, 1, 2],
            &[10, 1, 3, 1, 1, 1],
            &[1, 1, 2, 1, 3, 5],
        );
        let mut result = ValueTable::new(4);
        one_var_filter_agg_scores_and_take_top_k_contexts(
            &wep,
            &EntityFilterSet::new(),
            1,
            &mut result,
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn set_filter_keeps_only_member_entities() {
        let wep = postings(
            &[0, 1, 1, 2, 2, 2],
            &[0, 0, 1, 0, 1, 2],
            &[10, 1, 3, 1, 1, 1],
            &[1, 1, 2, 1, 3, 5],
        );
        let filter: EntityFilterSet = [EntityId(1)].into_iter().collect();

        let mut result = ValueTable::new(4);
        one_var_filter_agg_scores_and_take_top_k_contexts(&wep, &filter, 1, &mut result)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.cell(0, 0), ValueId::from_text_record(TextRecordId(1)));
        assert_eq!(result.cell(0, 1), ValueId::from_int(2));
        assert_eq!(result.cell(0, 2), ValueId::from_entity(EntityId(1)));
        assert_eq!(result.cell(0, 3), ValueId::from_word(WordId(2)));

        let mut result = ValueTable::new(4);
        one_var_filter_agg_scores_and_take_top_k_contexts(&wep, &filter, 10, &mut result)
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn filtered_groups_are_a_subset_of_unfiltered_groups() {
        let wep = postings(
            &[0, 1, 1, 2, 2, 2],
            &[0, 0, 1, 0, 1, 2],
            &[10, 1, 3, 1, 1, 1],
            &[1, 1, 2, 1, 3, 5],
        );
        let filter: EntityFilterSet = [EntityId(0), EntityId(2)].into_iter().collect();

        let mut unfiltered = ValueTable::new(4);
        agg_scores_and_take_top_k_contexts(&wep, 10, &mut unfiltered).unwrap();
        let mut filtered = ValueTable::new(4);
        one_var_filter_agg_scores_and_take_top_k_contexts(&wep, &filter, 10, &mut filtered)
            .unwrap();

        let unfiltered_rows = unfiltered.to_rows();
        for row in filtered.to_rows() {
            assert!(unfiltered_rows.contains(&row));
        }
    }

    #[test]
    fn map_filter_emits_the_bound_rows() {
        let wep = postings(
            &[0, 1, 1, 2, 2, 2],
            &[0, 0, 1, 0, 1, 2],
            &[10, 1, 3, 1, 1, 1],
            &[1, 1, 2, 1, 3, 5],
        );
        let mut filter = EntityFilterMap::new();
        filter.push_row(EntityId(1), vec![ValueId::from_entity(EntityId(1))]);

        let mut result = ValueTable::new(4);
        one_var_filter_agg_scores_and_take_top_k_contexts_map(&wep, &filter, 1, &mut result)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.cell(0, 2), ValueId::from_entity(EntityId(1)));
        assert_eq!(result.cell(0, 3), ValueId::from_word(WordId(2)));

        let mut result = ValueTable::new(4);
        one_var_filter_agg_scores_and_take_top_k_contexts_map(&wep, &filter, 10, &mut result)
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn map_filter_with_multi_row_entities_repeats_combinations() {
        let wep = postings(
            &[0, 1, 1, 2, 2, 2],
            &[0, 0, 1, 0, 1, 2],
            &[10, 1, 3, 1, 1, 1],
            &[1, 1, 2, 1, 3, 5],
        );
        let mut filter = EntityFilterMap::new();
        for second in [0u64, 1, 2] {
            filter.push_row(
                EntityId(0),
                vec![
                    ValueId::from_entity(EntityId(0)),
                    ValueId::from_entity(EntityId(second)),
                ],
            );
        }

        // Entity 0 appears in three records; k = 1 selects one record and emits one
        // row per bound filter row.
        let mut result = ValueTable::new(5);
        one_var_filter_agg_scores_and_take_top_k_contexts_map(&wep, &filter, 1, &mut result)
            .unwrap();
        assert_eq!(result.len(), 3);
        for row in 0..3 {
            assert_eq!(result.cell(row, 0), ValueId::from_text_record(TextRecordId(0)));
            assert_eq!(result.cell(row, 1), ValueId::from_int(3));
        }
    }

    #[test]
    fn mult_vars_filter_restricts_the_first_slot() {
        let wep = postings(
            &[0, 1, 1, 2, 2, 2],
            &[0, 0, 1, 0, 1, 2],
            &[10, 3, 3, 1, 1, 1],
            &[1, 1, 2, 1, 3, 5],
        );
        let filter: EntityFilterSet = [EntityId(1)].into_iter().collect();

        let mut result = ValueTable::new(4);
        mult_vars_filter_agg_scores_and_take_top_k_contexts(
            &wep,
            &filter,
            2,
            1,
            &AggregationLimits::default(),
            &mut result,
        )
        .unwrap();

        // Keys 1-0 and 1-1 from records 1 and 2, key 1-2 from record 2 only.
        assert_eq!(result.len(), 3);
        let mut rows = result.to_rows();
        rows.sort_by(|a, b| b[1].cmp(&a[1]).then_with(|| a[3].cmp(&b[3])));
        assert_eq!(
            rows[0],
            vec![
                ValueId::from_text_record(TextRecordId(1)),
                ValueId::from_int(2),
                ValueId::from_entity(EntityId(1)),
                ValueId::from_entity(EntityId(0)),
            ]
        );
        assert_eq!(
            rows[1],
            vec![
                ValueId::from_text_record(TextRecordId(1)),
                ValueId::from_int(2),
                ValueId::from_entity(EntityId(1)),
                ValueId::from_entity(EntityId(1)),
            ]
        );
        assert_eq!(
            rows[2],
            vec![
                ValueId::from_text_record(TextRecordId(2)),
                ValueId::from_int(1),
                ValueId::from_entity(EntityId(1)),
                ValueId::from_entity(EntityId(2)),
            ]
        );
    }

    #[test]
    fn mult_vars_filter_map_appends_bound_rows() {
        let wep = postings(
            &[0, 1, 1, 2, 2, 2],
            &[0, 0, 1, 0, 1, 2],
            &[10, 3, 3, 1, 1, 1],
            &[1, 1, 2, 1, 3, 5],
        );
        let mut filter = EntityFilterMap::new();
        filter.push_row(EntityId(1), vec![ValueId::from_entity(EntityId(1))]);

        let mut result = ValueTable::new(4);
        mult_vars_filter_agg_scores_and_take_top_k_contexts_map(
            &wep,
            &filter,
            2,
            1,
            &AggregationLimits::default(),
            &mut result,
        )
        .unwrap();
        assert_eq!(result.len(), 3);

        let mut result = ValueTable::new(4);
        mult_vars_filter_agg_scores_and_take_top_k_contexts_map(
            &wep,
            &filter,
            2,
            2,
            &AggregationLimits::default(),
            &mut result,
        )
        .unwrap();
        // Two records each for keys 1-0 and 1-1, one for key 1-2.
        assert_eq!(result.len(), 5);
    }

    fn postings(cids: &[u64], eids: &[u64], scores: &[u64], wids: &[u64]) -> WordEntityPostings {
        WordEntityPostings {
            cids: cids.iter().copied().map(TextRecordId).collect(),
            eids: eids.iter().copied().map(EntityId).collect(),
            scores: scores.to_vec(),
            wids: vec![wids.iter().copied().map(WordId).collect()],
        }
    }
}
