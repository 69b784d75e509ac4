use std::ops::Range;
use text_fusion_common::{EntityId, KernelError, KernelResult, Score, TextRecordId, WordId};

/// A sorted stream of postings from the text index, stored as parallel columns.
///
/// `cids` is the sort key and must be non-decreasing. `eids` is either empty (a
/// word-only stream has no entity dimension) or parallel to `cids`. `scores` is always
/// parallel to `cids`. `wids` holds one word column per query term that has been carried
/// through the pipeline so far; each present column is parallel to `cids`.
///
/// Within a run of equal `cids` there is no ordering requirement on `eids` or `wids`.
///
/// Bundles are created per intersection step, consumed by the next, and dropped when
/// the enclosing operator returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordEntityPostings {
    pub cids: Vec<TextRecordId>,
    pub eids: Vec<EntityId>,
    pub scores: Vec<Score>,
    pub wids: Vec<Vec<WordId>>,
}

impl WordEntityPostings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of postings in the stream.
    pub fn len(&self) -> usize {
        self.cids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cids.is_empty()
    }

    /// Returns the number of word columns.
    pub fn num_word_columns(&self) -> usize {
        self.wids.len()
    }

    /// Checks the bundle invariants: all present columns parallel to `cids`, and `cids`
    /// non-decreasing.
    ///
    /// Kernel operations call this at entry; a violation is a contract error of the
    /// caller, not a recoverable condition.
    pub fn ensure_valid(&self) -> KernelResult<()> {
        let expected = self.cids.len();
        if !self.eids.is_empty() && self.eids.len() != expected {
            return Err(KernelError::ColumnLengthMismatch {
                column: "eids",
                expected,
                actual: self.eids.len(),
            });
        }
        if self.scores.len() != expected {
            return Err(KernelError::ColumnLengthMismatch {
                column: "scores",
                expected,
                actual: self.scores.len(),
            });
        }
        for column in &self.wids {
            if column.len() != expected {
                return Err(KernelError::ColumnLengthMismatch {
                    column: "wids",
                    expected,
                    actual: column.len(),
                });
            }
        }
        if let Some(index) = self.cids.windows(2).position(|w| w[0] > w[1]) {
            return Err(KernelError::UnsortedContexts { index: index + 1 });
        }
        Ok(())
    }

    /// Returns whether the stream carries an entity column.
    pub fn has_entities(&self) -> bool {
        !self.eids.is_empty()
    }

    /// Returns the maximal run `start..end` of postings sharing `cids[start]`.
    pub fn context_run(&self, start: usize) -> Range<usize> {
        let cid = self.cids[start];
        let mut end = start + 1;
        while end < self.cids.len() && self.cids[end] == cid {
            end += 1;
        }
        start..end
    }

    /// Collects the word tuple of posting `index`, one word per word column.
    pub fn word_tuple(&self, index: usize) -> Vec<WordId> {
        self.wids.iter().map(|column| column[index]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_valid_accepts_empty() {
        assert_eq!(WordEntityPostings::new().ensure_valid(), Ok(()));
    }

    #[test]
    fn ensure_valid_rejects_short_scores() {
        let wep = WordEntityPostings {
            cids: vec![TextRecordId(0), TextRecordId(1)],
            scores: vec![1],
            ..Default::default()
        };
        assert_eq!(
            wep.ensure_valid(),
            Err(KernelError::ColumnLengthMismatch {
                column: "scores",
                expected: 2,
                actual: 1,
            })
        );
    }

    #[test]
    fn ensure_valid_rejects_decreasing_cids() {
        let wep = WordEntityPostings {
            cids: vec![TextRecordId(3), TextRecordId(1)],
            scores: vec![1, 1],
            ..Default::default()
        };
        assert_eq!(
            wep.ensure_valid(),
            Err(KernelError::UnsortedContexts { index: 1 })
        );
    }

    #[test]
    fn context_run_covers_equal_cids() {
        let wep = WordEntityPostings {
            cids: vec![
                TextRecordId(1),
                TextRecordId(4),
                TextRecordId(4),
                TextRecordId(7),
            ],
            scores: vec![1, 1, 1, 1],
            ..Default::default()
        };
        assert_eq!(wep.context_run(0), 0..1);
        assert_eq!(wep.context_run(1), 1..3);
        assert_eq!(wep.context_run(3), 3..4);
    }
}
