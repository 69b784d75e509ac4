use crate::ids::{EntityId, Score, TextRecordId, WordId};
use std::fmt;

const TAG_SHIFT: u32 = 61;
const PAYLOAD_MASK: u64 = (1 << TAG_SHIFT) - 1;

const TAG_TEXT_RECORD: u64 = 0;
const TAG_INT: u64 = 1;
const TAG_ENTITY: u64 = 2;
const TAG_WORD: u64 = 3;

/// A value in an output table cell.
///
/// The kernel's result tables mix values from several id spaces (text records, counts,
/// entities, words). A [ValueId] packs a 3-bit datatype tag into the high bits of a
/// `u64` so that values from different spaces never compare equal and a whole column
/// fits a primitive Arrow array.
///
/// The ordering is total: first by tag, then by payload. Within a column that holds a
/// single datatype (the usual case) this is simply the payload order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u64);

impl ValueId {
    /// Creates a [ValueId] from a text record id.
    pub fn from_text_record(cid: TextRecordId) -> Self {
        Self::pack(TAG_TEXT_RECORD, cid.as_u64())
    }

    /// Creates a [ValueId] from a plain non-negative integer (e.g. an entity score).
    pub fn from_int(value: u64) -> Self {
        Self::pack(TAG_INT, value)
    }

    /// Creates a [ValueId] from an entity id.
    pub fn from_entity(eid: EntityId) -> Self {
        Self::pack(TAG_ENTITY, eid.as_u64())
    }

    /// Creates a [ValueId] from a word id.
    pub fn from_word(wid: WordId) -> Self {
        Self::pack(TAG_WORD, wid.as_u64())
    }

    /// Creates a [ValueId] from a score accumulator.
    pub fn from_score(score: Score) -> Self {
        Self::from_int(score)
    }

    fn pack(tag: u64, payload: u64) -> Self {
        debug_assert!(payload <= PAYLOAD_MASK, "payload exceeds 61 bits");
        ValueId((tag << TAG_SHIFT) | (payload & PAYLOAD_MASK))
    }

    /// Returns the raw bit pattern. Used when exporting columns as Arrow arrays.
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Reconstructs a [ValueId] from a bit pattern produced by [ValueId::to_bits].
    pub fn from_bits(bits: u64) -> Self {
        ValueId(bits)
    }

    fn tag(self) -> u64 {
        self.0 >> TAG_SHIFT
    }

    fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    /// Returns the text record id if this value holds one.
    pub fn as_text_record(self) -> Option<TextRecordId> {
        (self.tag() == TAG_TEXT_RECORD).then(|| TextRecordId(self.payload()))
    }

    /// Returns the integer payload if this value holds one.
    pub fn as_int(self) -> Option<u64> {
        (self.tag() == TAG_INT).then(|| self.payload())
    }

    /// Returns the entity id if this value holds one.
    pub fn as_entity(self) -> Option<EntityId> {
        (self.tag() == TAG_ENTITY).then(|| EntityId(self.payload()))
    }

    /// Returns the word id if this value holds one.
    pub fn as_word(self) -> Option<WordId> {
        (self.tag() == TAG_WORD).then(|| WordId(self.payload()))
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            TAG_TEXT_RECORD => write!(f, "TextRecord({})", self.payload()),
            TAG_INT => write!(f, "Int({})", self.payload()),
            TAG_ENTITY => write!(f, "Entity({})", self.payload()),
            TAG_WORD => write!(f, "Word({})", self.payload()),
            _ => unreachable!("unknown value tag"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_spaces_never_compare_equal() {
        assert_ne!(
            ValueId::from_int(7),
            ValueId::from_text_record(TextRecordId(7))
        );
        assert_ne!(ValueId::from_entity(EntityId(7)), ValueId::from_int(7));
        assert_ne!(ValueId::from_word(WordId(7)), ValueId::from_entity(EntityId(7)));
    }

    #[test]
    fn accessors_round_trip() {
        assert_eq!(
            ValueId::from_text_record(TextRecordId(42)).as_text_record(),
            Some(TextRecordId(42))
        );
        assert_eq!(ValueId::from_int(42).as_int(), Some(42));
        assert_eq!(ValueId::from_entity(EntityId(42)).as_entity(), Some(EntityId(42)));
        assert_eq!(ValueId::from_word(WordId(42)).as_word(), Some(WordId(42)));
        assert_eq!(ValueId::from_int(42).as_entity(), None);
    }

    #[test]
    fn bits_round_trip() {
        let id = ValueId::from_entity(EntityId(123));
        assert_eq!(ValueId::from_bits(id.to_bits()), id);
    }

    #[test]
    fn payload_order_within_tag() {
        assert!(ValueId::from_int(1) < ValueId::from_int(2));
        assert!(
            ValueId::from_text_record(TextRecordId(3))
                < ValueId::from_text_record(TextRecordId(4))
        );
    }
}
