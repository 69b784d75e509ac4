use rustc_hash::FxHashSet;
use text_fusion_common::{EntityId, ValueId};
use text_fusion_model::{EntityFilterMap, EntityFilterSet, WordEntityPostings};
use tracing::trace;

/// Emits, for one context run `[from, to)`, every combination of a posting row with an
/// entity from each of the two sub-result sets that co-occurs in the same record.
///
/// The run's entities are deduplicated before the sets are probed, so an entity that
/// appears in several postings of the record contributes to the combinations once.
/// Output rows have the shape `(entity, score, record, a, b)`.
pub fn append_cross_product_with_sets(
    wep: &WordEntityPostings,
    from: usize,
    to: usize,
    sub_res1: &EntityFilterSet,
    sub_res2: &EntityFilterSet,
    rows: &mut Vec<Vec<ValueId>>,
) {
    trace!(postings = to - from, "appending cross-product for one record");

    let mut context_sub_res1 = Vec::new();
    let mut context_sub_res2 = Vec::new();
    let mut seen = FxHashSet::default();
    for i in from..to {
        let eid = wep.eids[i];
        if !seen.insert(eid) {
            continue;
        }
        if sub_res1.contains(eid) {
            context_sub_res1.push(eid);
        }
        if sub_res2.contains(eid) {
            context_sub_res2.push(eid);
        }
    }

    for i in from..to {
        for &a in &context_sub_res1 {
            for &b in &context_sub_res2 {
                rows.push(vec![
                    ValueId::from_entity(wep.eids[i]),
                    ValueId::from_score(wep.scores[i]),
                    ValueId::from_text_record(wep.cids[i]),
                    ValueId::from_entity(a),
                    ValueId::from_entity(b),
                ]);
            }
        }
    }
}

/// Emits, for one context run `[from, to)`, the cross-product of the sub-result rows
/// that each filter map holds for the record's entities.
///
/// Every posting row is prefixed as `(entity, score, record)` and combined with one row
/// from each map. The n-th combination picks row `n % |rows1|` from the first map,
/// `(n / |rows1|) % |rows2|` from the second, and so on (mixed-radix decomposition).
pub fn append_cross_product_with_maps(
    wep: &WordEntityPostings,
    from: usize,
    to: usize,
    sub_res_maps: &[EntityFilterMap],
    rows: &mut Vec<Vec<ValueId>>,
) {
    trace!(
        postings = to - from,
        maps = sub_res_maps.len(),
        "appending cross-product for one record"
    );

    let mut matches: Vec<Vec<&Vec<ValueId>>> = vec![Vec::new(); sub_res_maps.len()];
    let mut seen = FxHashSet::default();
    for i in from..to {
        let eid = wep.eids[i];
        if !seen.insert(eid) {
            continue;
        }
        for (map_matches, map) in matches.iter_mut().zip(sub_res_maps) {
            if let Some(map_rows) = map.rows(eid) {
                map_matches.extend(map_rows.iter());
            }
        }
    }

    let combinations: usize = matches.iter().map(Vec::len).product();
    for i in from..to {
        for n in 0..combinations {
            let mut row = vec![
                ValueId::from_entity(wep.eids[i]),
                ValueId::from_score(wep.scores[i]),
                ValueId::from_text_record(wep.cids[i]),
            ];
            let mut index = n;
            for map_matches in &matches {
                row.extend_from_slice(map_matches[index % map_matches.len()]);
                index /= map_matches.len();
            }
            rows.push(row);
        }
    }
}
