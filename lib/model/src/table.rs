use datafusion::arrow::array::{ArrayRef, UInt64Array};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use std::sync::Arc;
use text_fusion_common::{DFResult, KernelError, KernelResult, ValueId};

/// An append-only columnar result table with a column count fixed at construction.
///
/// The kernel appends rows; the caller owns the table and decides the column layout
/// (typically `[context, entityScore, entity…, filterColumns…, word…]`). Rows are never
/// updated or removed. The table must not be accessed while a kernel invocation is
/// appending to it.
///
/// The column count is a runtime value checked on every appended row; callers that know
/// their width statically pay only the per-row arity comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTable {
    num_rows: usize,
    columns: Vec<Vec<ValueId>>,
}

impl ValueTable {
    /// Creates an empty table with `num_columns` columns.
    pub fn new(num_columns: usize) -> Self {
        Self {
            num_rows: 0,
            columns: vec![Vec::new(); num_columns],
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Reserves capacity for `additional` more rows in every column.
    pub fn reserve(&mut self, additional: usize) {
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }

    /// Appends one row. The row arity must match the table's column count.
    pub fn push_row(&mut self, row: &[ValueId]) -> KernelResult<()> {
        if row.len() != self.columns.len() {
            return Err(KernelError::RowArityMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(*value);
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Returns the cell at `(row, column)`.
    ///
    /// Panics if the position is out of bounds.
    pub fn cell(&self, row: usize, column: usize) -> ValueId {
        self.columns[column][row]
    }

    /// Returns one column as a slice.
    pub fn column(&self, column: usize) -> &[ValueId] {
        &self.columns[column]
    }

    /// Materializes the table row-wise. Intended for re-sorting and for tests; the
    /// columnar representation stays untouched.
    pub fn to_rows(&self) -> Vec<Vec<ValueId>> {
        (0..self.num_rows)
            .map(|row| self.columns.iter().map(|column| column[row]).collect())
            .collect()
    }

    /// Exports the table as an Arrow record batch of packed value bits, one `UInt64`
    /// column per table column, named `col0..colN`.
    pub fn into_record_batch(self) -> DFResult<RecordBatch> {
        let fields = (0..self.columns.len())
            .map(|i| Field::new(format!("col{i}"), DataType::UInt64, false))
            .collect::<Vec<_>>();
        let arrays = self
            .columns
            .into_iter()
            .map(|column| {
                Arc::new(UInt64Array::from_iter_values(
                    column.into_iter().map(ValueId::to_bits),
                )) as ArrayRef
            })
            .collect::<Vec<_>>();
        Ok(RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            arrays,
        )?)
    }
}
