use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, TimestampNanosecondArray, UInt32Array};
use arrow::compute;
use arrow::datatypes::{DataType, Field, FieldRef, Int64Type, Schema, TimeUnit, TimestampNanosecondType};
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::common::{ColMeta, ColType, Duration, GroupKey, Time, Value};
use crate::error::{Error, Result};
use crate::functions::{resolve_columns, KeyByFunctionTrait, KeyedBatch};
use crate::lookup::{AnyLookup, KeyLookup, LookupKind};
use crate::window::{Bounds, Window};

pub const START_COLUMN: &str = "_start";
pub const STOP_COLUMN: &str = "_stop";

/// Assigns every row to each window bound containing its timestamp. Output
/// batches carry the row's group columns plus `_start`/`_stop` in their key,
/// and get `_start`/`_stop` columns appended. Rows with a null timestamp or
/// falling between underlapping windows are dropped.
#[derive(Debug, Clone)]
pub struct WindowFunction {
    window: Window,
    time_column: String,
    group_columns: Vec<String>,
    lookup: LookupKind,
}

impl WindowFunction {
    pub fn new(window: Window, time_column: impl Into<String>) -> Self {
        Self {
            window,
            time_column: time_column.into(),
            group_columns: Vec::new(),
            lookup: LookupKind::Ordered,
        }
    }

    /// Columns kept in the output key next to the window bounds.
    pub fn with_group_columns(mut self, group_columns: Vec<String>) -> Self {
        self.group_columns = group_columns;
        self
    }

    /// With [`LookupKind::Ordered`] partitions come back in ascending key
    /// order, otherwise in the order they were first seen.
    pub fn with_lookup(mut self, lookup: LookupKind) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    fn timestamps(&self, batch: &RecordBatch) -> Result<Vec<Option<i64>>> {
        let schema = batch.schema();
        let (idx, field) = schema
            .column_with_name(&self.time_column)
            .ok_or_else(|| Error::ColumnNotFound(self.time_column.clone()))?;
        let array = batch.column(idx);
        match field.data_type() {
            DataType::Timestamp(TimeUnit::Nanosecond, _) => {
                Ok(array.as_primitive::<TimestampNanosecondType>().iter().collect())
            }
            DataType::Int64 => Ok(array.as_primitive::<Int64Type>().iter().collect()),
            other => Err(Error::UnsupportedType(format!(
                "{} as time column '{}'",
                other, self.time_column
            ))),
        }
    }

    fn window_batch(batch: &RecordBatch, kept: &[usize], bounds: &Bounds, rows: &[u32]) -> Result<RecordBatch> {
        let schema = batch.schema();
        let indices = UInt32Array::from(rows.to_vec());

        let mut fields: Vec<FieldRef> = kept.iter().map(|&i| schema.fields()[i].clone()).collect();
        let mut columns = kept
            .iter()
            .map(|&i| compute::take(batch.column(i).as_ref(), &indices, None))
            .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;

        let time_type = ColType::Time.data_type();
        for (name, t) in [(START_COLUMN, bounds.start()), (STOP_COLUMN, bounds.stop())] {
            fields.push(Arc::new(Field::new(name, time_type.clone(), false)));
            columns.push(Arc::new(TimestampNanosecondArray::from_value(t.nanos(), indices.len())));
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

impl KeyByFunctionTrait for WindowFunction {
    fn key_by(&self, batch: &RecordBatch) -> Result<Vec<KeyedBatch>> {
        let times = self.timestamps(batch)?;
        let schema = batch.schema();
        let group = resolve_columns(&schema, &self.group_columns)?;

        let mut cols: Vec<ColMeta> = group.iter().map(|(_, meta)| meta.clone()).collect();
        cols.push(ColMeta::new(START_COLUMN, ColType::Time));
        cols.push(ColMeta::new(STOP_COLUMN, ColType::Time));

        // Existing bound columns are replaced.
        let kept: Vec<usize> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.name() != START_COLUMN && f.name() != STOP_COLUMN)
            .map(|(i, _)| i)
            .collect();

        let mut partitions: AnyLookup<(Bounds, Vec<u32>)> = AnyLookup::new(self.lookup);
        for (row, t) in times.iter().enumerate() {
            let Some(t) = t.map(Time) else {
                continue;
            };
            let containing = self.window.get_overlapping_bounds(t, t.add(Duration::from_nanos(1)));
            if containing.is_empty() {
                continue;
            }

            let group_values = group
                .iter()
                .map(|(idx, _)| Value::from_array(batch.column(*idx).as_ref(), row))
                .collect::<Result<Vec<_>>>()?;
            for bounds in containing {
                let mut values = group_values.clone();
                values.push(Value::Time(bounds.start()));
                values.push(Value::Time(bounds.stop()));
                let key = GroupKey::new(cols.clone(), values)?;
                partitions
                    .lookup_or_create(&key, || (bounds, Vec::new()))
                    .1
                    .push(row as u32);
            }
        }

        let mut keyed = Vec::with_capacity(partitions.len());
        let mut failed = None;
        partitions.range(|key, (bounds, rows)| {
            if failed.is_some() {
                return;
            }
            match Self::window_batch(batch, &kept, bounds, rows) {
                Ok(b) => keyed.push(KeyedBatch::new(key.clone(), b)),
                Err(e) => failed = Some(e),
            }
        });
        if let Some(e) = failed {
            return Err(e);
        }

        debug!(
            rows = batch.num_rows(),
            partitions = keyed.len(),
            every = %self.window.every(),
            period = %self.window.period(),
            "windowed batch"
        );
        Ok(keyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use crate::error::ErrorCode;

    const SEC: i64 = 1_000_000_000;

    fn window(every: &str, period: &str) -> Window {
        Window::new(
            Duration::parse(every).unwrap(),
            Duration::parse(period).unwrap(),
            Duration::ZERO,
        )
        .unwrap()
    }

    fn batch(times: Vec<Option<i64>>, hosts: Vec<&str>) -> RecordBatch {
        let n = times.len() as i64;
        let schema = Arc::new(Schema::new(vec![
            Field::new("_time", DataType::Timestamp(TimeUnit::Nanosecond, None), true),
            Field::new("host", DataType::Utf8, false),
            Field::new("value", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampNanosecondArray::from(times)),
                Arc::new(StringArray::from(hosts)),
                Arc::new(Int64Array::from_iter_values(0..n)),
            ],
        )
        .unwrap()
    }

    fn summary(keyed: &[KeyedBatch]) -> Vec<(i64, i64, Vec<i64>)> {
        keyed
            .iter()
            .map(|kb| {
                let start = kb.key.label_value(START_COLUMN).and_then(Value::as_time).unwrap();
                let stop = kb.key.label_value(STOP_COLUMN).and_then(Value::as_time).unwrap();
                let idx = kb.batch.schema().index_of("value").unwrap();
                let values = kb.batch.column(idx).as_primitive::<Int64Type>().values().to_vec();
                (start.nanos() / SEC, stop.nanos() / SEC, values)
            })
            .collect()
    }

    #[test]
    fn test_tumbling_window() {
        let f = WindowFunction::new(window("1m", "1m"), "_time");
        let b = batch(vec![Some(61 * SEC), Some(0), None, Some(30 * SEC)], vec!["a"; 4]);
        let keyed = f.key_by(&b).unwrap();
        assert_eq!(summary(&keyed), vec![(0, 60, vec![1, 3]), (60, 120, vec![0])]);

        let out = &keyed[0].batch;
        assert_eq!(out.schema().field(out.num_columns() - 2).name(), START_COLUMN);
        let stop = out.column(out.num_columns() - 1).as_primitive::<TimestampNanosecondType>();
        assert!(stop.values().iter().all(|&v| v == 60 * SEC));
    }

    #[test]
    fn test_overlapping_window_duplicates_rows() {
        let f = WindowFunction::new(window("1m", "2m"), "_time");
        let keyed = f.key_by(&batch(vec![Some(90 * SEC)], vec!["a"])).unwrap();
        assert_eq!(summary(&keyed), vec![(0, 120, vec![0]), (60, 180, vec![0])]);
    }

    #[test]
    fn test_underlapping_window_drops_gap_rows() {
        let f = WindowFunction::new(window("2m", "1m"), "_time");
        let keyed = f
            .key_by(&batch(vec![Some(30 * SEC), Some(90 * SEC), Some(150 * SEC)], vec!["a"; 3]))
            .unwrap();
        assert_eq!(summary(&keyed), vec![(0, 60, vec![0]), (120, 180, vec![2])]);
    }

    #[test]
    fn test_group_columns_in_key() {
        let f = WindowFunction::new(window("1m", "1m"), "_time").with_group_columns(vec!["host".to_string()]);
        let b = batch(vec![Some(0), Some(10 * SEC), Some(20 * SEC)], vec!["b", "a", "b"]);
        let keyed = f.key_by(&b).unwrap();
        assert_eq!(keyed.len(), 2);
        assert_eq!(keyed[0].key.label_value("host"), Some(&Value::from("a")));
        assert_eq!(summary(&keyed)[1].2, vec![0, 2]);
        assert_eq!(keyed[0].key.len(), 3);
    }

    #[test]
    fn test_random_access_keeps_first_seen_order() {
        let f = WindowFunction::new(window("1m", "1m"), "_time").with_lookup(LookupKind::RandomAccess);
        let keyed = f.key_by(&batch(vec![Some(70 * SEC), Some(10 * SEC)], vec!["a"; 2])).unwrap();
        assert_eq!(summary(&keyed), vec![(60, 120, vec![0]), (0, 60, vec![1])]);
    }

    #[test]
    fn test_int64_time_column() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("t", DataType::Int64, false),
            Field::new("value", DataType::Int64, false),
        ]));
        let b = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![5 * SEC, -5 * SEC])),
                Arc::new(Int64Array::from(vec![0, 1])),
            ],
        )
        .unwrap();
        let keyed = WindowFunction::new(window("10s", "10s"), "t").key_by(&b).unwrap();
        assert_eq!(summary(&keyed), vec![(-10, 0, vec![1]), (0, 10, vec![0])]);
    }

    #[test]
    fn test_bad_time_column() {
        let b = batch(vec![Some(0)], vec!["a"]);
        let err = WindowFunction::new(window("1m", "1m"), "missing").key_by(&b).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = WindowFunction::new(window("1m", "1m"), "host").key_by(&b).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }
}
