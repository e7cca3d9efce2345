use std::sync::Arc;

use arrow::array::{ArrayRef, UInt32Array};
use arrow::compute;
use arrow::compute::kernels::partition::partition;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow_row::{RowConverter, SortField};
use tracing::debug;

use crate::common::GroupKey;
use crate::error::Result;
use crate::functions::{column, resolve_columns, KeyByFunctionTrait, KeyedBatch};

/// Partitions a batch by the values of a set of key columns. Partitions come
/// back in ascending [`GroupKey`] order and rows keep their relative order
/// within a partition. Null key values form their own partition.
#[derive(Debug, Clone)]
pub struct ArrowKeyByFunction {
    key_columns: Vec<String>,
}

impl ArrowKeyByFunction {
    pub fn new(key_columns: Vec<String>) -> Self {
        Self { key_columns }
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Stable lexicographic sort using arrow-row.
    fn lexsort_indices(arrays: &[ArrayRef]) -> Result<UInt32Array> {
        let fields: Vec<SortField> = arrays
            .iter()
            .map(|a| SortField::new(a.data_type().clone()))
            .collect();
        let converter = RowConverter::new(fields)?;
        let rows = converter.convert_columns(arrays)?;

        let mut indices: Vec<_> = rows.iter().enumerate().collect();
        indices.sort_by(|(_, a), (_, b)| a.cmp(b));
        Ok(UInt32Array::from_iter_values(indices.iter().map(|(i, _)| *i as u32)))
    }
}

impl KeyByFunctionTrait for ArrowKeyByFunction {
    fn key_by(&self, batch: &RecordBatch) -> Result<Vec<KeyedBatch>> {
        let schema = batch.schema();
        let mut resolved = resolve_columns(&schema, &self.key_columns)?;
        if batch.num_rows() == 0 {
            return Ok(Vec::new());
        }
        if resolved.is_empty() {
            return Ok(vec![KeyedBatch::new(GroupKey::empty(), batch.clone())]);
        }

        // Sorting by label puts rows in the same order GroupKey compares them.
        resolved.sort_by(|(_, a), (_, b)| a.label.cmp(&b.label));
        let key_indices: Vec<usize> = resolved.iter().map(|(idx, _)| *idx).collect();
        let key_arrays: Vec<ArrayRef> = key_indices.iter().map(|&idx| column(batch, idx)).collect();

        let sorted_indices = Self::lexsort_indices(&key_arrays)?;
        let sorted_columns = batch
            .columns()
            .iter()
            .map(|c| compute::take(c.as_ref(), &sorted_indices, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let sorted_batch = RecordBatch::try_new(schema.clone(), sorted_columns)?;

        let sorted_key_arrays: Vec<ArrayRef> = key_indices
            .iter()
            .map(|&idx| column(&sorted_batch, idx))
            .collect();
        let ranges = partition(&sorted_key_arrays)?.ranges();

        let key_fields: Vec<Field> = key_indices
            .iter()
            .map(|&idx| schema.field(idx).clone())
            .collect();
        let key_schema = Arc::new(Schema::new(key_fields));

        let mut keyed = Vec::with_capacity(ranges.len());
        for range in ranges {
            let group_batch = sorted_batch.slice(range.start, range.end - range.start);
            let first_row: Vec<ArrayRef> = key_indices
                .iter()
                .map(|&idx| group_batch.column(idx).slice(0, 1))
                .collect();
            let key_batch = RecordBatch::try_new(key_schema.clone(), first_row)?;
            keyed.push(KeyedBatch::new(GroupKey::from_record_batch(&key_batch)?, group_batch));
        }

        debug!(
            rows = batch.num_rows(),
            partitions = keyed.len(),
            key_columns = ?self.key_columns,
            "keyed batch"
        );
        Ok(keyed)
    }
}
