use rustc_hash::{FxHashMap, FxHashSet};
use text_fusion_common::{EntityId, ValueId};

/// An unordered set of entities that restricts an aggregation.
///
/// Produced by a joined sub-result; the kernel only probes membership and never
/// mutates the set.
#[derive(Debug, Clone, Default)]
pub struct EntityFilterSet(FxHashSet<EntityId>);

impl EntityFilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, eid: EntityId) {
        self.0.insert(eid);
    }

    pub fn contains(&self, eid: EntityId) -> bool {
        self.0.contains(&eid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<EntityId> for EntityFilterSet {
    fn from_iter<T: IntoIterator<Item = EntityId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A mapping from entities to the bound rows of a joined sub-result.
///
/// Each entity carries one or more rows of already-bound values; the aggregators emit
/// those rows alongside the contexts they select. Like [EntityFilterSet], the map is
/// borrowed read-only by the kernel.
#[derive(Debug, Clone, Default)]
pub struct EntityFilterMap(FxHashMap<EntityId, Vec<Vec<ValueId>>>);

impl EntityFilterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a bound row for `eid`. All rows of a map must share one arity.
    pub fn push_row(&mut self, eid: EntityId, row: Vec<ValueId>) {
        self.0.entry(eid).or_default().push(row);
    }

    pub fn contains(&self, eid: EntityId) -> bool {
        self.0.contains_key(&eid)
    }

    /// Returns the bound rows of `eid`, if any.
    pub fn rows(&self, eid: EntityId) -> Option<&[Vec<ValueId>]> {
        self.0.get(&eid).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_map_accumulates_rows_per_entity() {
        let mut map = EntityFilterMap::new();
        map.push_row(EntityId(1), vec![ValueId::from_entity(EntityId(1))]);
        map.push_row(EntityId(1), vec![ValueId::from_entity(EntityId(2))]);
        assert!(map.contains(EntityId(1)));
        assert!(!map.contains(EntityId(2)));
        assert_eq!(map.rows(EntityId(1)).unwrap().len(), 2);
        assert_eq!(map.rows(EntityId(2)), None);
    }
}
