pub mod key_by;
pub mod window;

use std::fmt;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::common::{ColMeta, ColType, GroupKey};
use crate::error::{Error, Result};

pub use key_by::ArrowKeyByFunction;
pub use window::WindowFunction;

/// A slice of an input batch whose rows all belong to one partition.
#[derive(Debug, Clone)]
pub struct KeyedBatch {
    pub key: GroupKey,
    pub batch: RecordBatch,
}

impl KeyedBatch {
    pub fn new(key: GroupKey, batch: RecordBatch) -> Self {
        Self { key, batch }
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Splits a batch into per-partition batches.
pub trait KeyByFunctionTrait: Send + Sync + fmt::Debug {
    fn key_by(&self, batch: &RecordBatch) -> Result<Vec<KeyedBatch>>;
}

#[derive(Debug, Clone)]
pub enum KeyByFunction {
    Columns(ArrowKeyByFunction),
    Window(WindowFunction),
    Custom(Arc<dyn KeyByFunctionTrait>),
}

impl KeyByFunction {
    pub fn new_custom<F>(function: F) -> Self
    where
        F: KeyByFunctionTrait + 'static,
    {
        Self::Custom(Arc::new(function))
    }

    pub fn key_by(&self, batch: &RecordBatch) -> Result<Vec<KeyedBatch>> {
        match self {
            KeyByFunction::Columns(function) => function.key_by(batch),
            KeyByFunction::Window(function) => function.key_by(batch),
            KeyByFunction::Custom(function) => function.key_by(batch),
        }
    }
}

/// Position and key metadata of each named column.
pub(crate) fn resolve_columns(schema: &SchemaRef, names: &[String]) -> Result<Vec<(usize, ColMeta)>> {
    names
        .iter()
        .map(|name| {
            let (idx, field) = schema
                .column_with_name(name)
                .ok_or_else(|| Error::ColumnNotFound(name.clone()))?;
            let col_type = ColType::try_from(field.data_type())?;
            Ok((idx, ColMeta::new(name.clone(), col_type)))
        })
        .collect()
}

pub(crate) fn column(batch: &RecordBatch, idx: usize) -> ArrayRef {
    batch.column(idx).clone()
}
