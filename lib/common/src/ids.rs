/// Identifies a text record (sentence, snippet, passage) in the text index.
///
/// Text records are assigned monotonically increasing ids at indexing time, so posting
/// streams sorted by [TextRecordId] reflect the order of the underlying records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextRecordId(pub u64);

impl TextRecordId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for TextRecordId {
    fn from(id: u64) -> Self {
        TextRecordId(id)
    }
}

/// Identifies an entity of the knowledge graph that is mentioned in text records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id)
    }
}

/// Identifies a word in the text vocabulary.
///
/// Contiguous ranges of word ids represent prefix classes, as the vocabulary is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WordId(pub u64);

impl WordId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for WordId {
    fn from(id: u64) -> Self {
        WordId(id)
    }
}

/// The ranking weight of a single posting.
///
/// Aggregation adds scores; the accumulator is assumed to be wide enough for any single
/// query (bounding the inputs is the caller's responsibility).
pub type Score = u64;
