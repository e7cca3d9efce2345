use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use arrow::array::RecordBatchOptions;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use xxhash_rust::xxh3::Xxh3;

use crate::common::time::Time;
use crate::common::value::{ColMeta, ColType, Value};
use crate::error::{Error, Result};

/// Written in place of a value encoding so that a null and an empty string
/// never hash the same.
const NULL_MARKER: u8 = 0xFF;

/// The identity of a table partition: a set of labeled, typed, nullable
/// column values.
///
/// Keys are immutable and cheap to clone; clones share the same columns and
/// the same memoized hash. Equality, ordering and hashing walk the columns in
/// label order, so the order the columns were supplied in never matters.
#[derive(Clone)]
pub struct GroupKey {
    inner: Arc<GroupKeyInner>,
}

struct GroupKeyInner {
    cols: Vec<ColMeta>,
    values: Vec<Value>,
    /// Column indices sorted by label.
    sorted: Vec<usize>,
    hash: OnceLock<u64>,
}

impl GroupKey {
    pub fn new(cols: Vec<ColMeta>, values: Vec<Value>) -> Result<Self> {
        if cols.len() != values.len() {
            return Err(Error::InvalidGroupKey(format!(
                "{} columns but {} values",
                cols.len(),
                values.len()
            )));
        }

        let mut seen = HashSet::with_capacity(cols.len());
        for (col, value) in cols.iter().zip(values.iter()) {
            if !seen.insert(col.label.as_str()) {
                return Err(Error::InvalidGroupKey(format!("duplicate column '{}'", col.label)));
            }
            if !value.is_compatible(col.col_type) {
                return Err(Error::InvalidGroupKey(format!(
                    "value {} is not a {} for column '{}'",
                    value, col.col_type, col.label
                )));
            }
        }

        let mut sorted: Vec<usize> = (0..cols.len()).collect();
        sorted.sort_by(|&i, &j| cols[i].label.cmp(&cols[j].label));

        Ok(Self {
            inner: Arc::new(GroupKeyInner {
                cols,
                values,
                sorted,
                hash: OnceLock::new(),
            }),
        })
    }

    /// A key with no columns. Every ungrouped table shares it.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(GroupKeyInner {
                cols: Vec::new(),
                values: Vec::new(),
                sorted: Vec::new(),
                hash: OnceLock::new(),
            }),
        }
    }

    /// Creates a key from a RecordBatch with exactly one row.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        if batch.num_rows() != 1 {
            return Err(Error::InvalidGroupKey(format!(
                "key batch must have exactly one row, found {}",
                batch.num_rows()
            )));
        }

        let schema = batch.schema();
        let mut cols = Vec::with_capacity(batch.num_columns());
        let mut values = Vec::with_capacity(batch.num_columns());
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            cols.push(ColMeta::new(field.name().clone(), ColType::try_from(field.data_type())?));
            values.push(Value::from_array(array.as_ref(), 0)?);
        }
        Self::new(cols, values)
    }

    /// Materializes the key as a one-row RecordBatch with nullable fields,
    /// in construction order.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let fields: Vec<Field> = self
            .cols()
            .iter()
            .map(|c| Field::new(c.label.clone(), c.col_type.data_type(), true))
            .collect();
        let arrays = self
            .cols()
            .iter()
            .zip(self.values())
            .map(|(c, v)| Value::to_array(std::slice::from_ref(v), c.col_type))
            .collect::<Result<Vec<_>>>()?;

        let options = RecordBatchOptions::new().with_row_count(Some(1));
        Ok(RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?)
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.inner.cols
    }

    pub fn values(&self) -> &[Value] {
        &self.inner.values
    }

    pub fn len(&self) -> usize {
        self.inner.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.cols.is_empty()
    }

    pub fn value(&self, j: usize) -> &Value {
        &self.inner.values[j]
    }

    pub fn is_null(&self, j: usize) -> bool {
        self.inner.values[j].is_null()
    }

    pub fn col_index(&self, label: &str) -> Option<usize> {
        self.inner.cols.iter().position(|c| c.label == label)
    }

    pub fn has_col(&self, label: &str) -> bool {
        self.col_index(label).is_some()
    }

    pub fn label_value(&self, label: &str) -> Option<&Value> {
        self.col_index(label).map(|j| self.value(j))
    }

    pub fn value_bool(&self, j: usize) -> Option<bool> {
        self.value(j).as_bool()
    }

    pub fn value_int(&self, j: usize) -> Option<i64> {
        self.value(j).as_int()
    }

    pub fn value_uint(&self, j: usize) -> Option<u64> {
        self.value(j).as_uint()
    }

    pub fn value_float(&self, j: usize) -> Option<f64> {
        self.value(j).as_float()
    }

    pub fn value_str(&self, j: usize) -> Option<&str> {
        self.value(j).as_str()
    }

    pub fn value_time(&self, j: usize) -> Option<Time> {
        self.value(j).as_time()
    }

    pub fn less(&self, other: &GroupKey) -> bool {
        self.cmp(other) == Ordering::Less
    }

    /// 64-bit hash of the key, computed on first use and memoized.
    pub fn hash64(&self) -> u64 {
        *self.inner.hash.get_or_init(|| self.compute_hash())
    }

    fn sorted_entries(&self) -> impl Iterator<Item = (&ColMeta, &Value)> + '_ {
        self.inner
            .sorted
            .iter()
            .map(move |&i| (&self.inner.cols[i], &self.inner.values[i]))
    }

    fn compute_hash(&self) -> u64 {
        let mut hasher = Xxh3::new();
        for (col, value) in self.sorted_entries() {
            hasher.update(col.label.as_bytes());
            hasher.update(&[0, col.col_type.ordinal()]);

            match value {
                Value::Null => hasher.update(&[NULL_MARKER]),
                Value::Bool(v) => hasher.update(&[*v as u8]),
                Value::Int(v) => hasher.update(&v.to_le_bytes()),
                Value::UInt(v) => hasher.update(&v.to_le_bytes()),
                Value::Float(v) => hasher.update(&v.to_bits().to_le_bytes()),
                Value::String(v) => hasher.update(v.as_bytes()),
                Value::Time(v) => hasher.update(&v.nanos().to_le_bytes()),
            }
            hasher.update(&[0]);
        }
        hasher.digest()
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        // Both sides null counts as equal so rows with null key values land
        // in the same table.
        self.sorted_entries()
            .zip(other.sorted_entries())
            .all(|((ac, av), (bc, bv))| ac == bc && av == bv)
    }
}

impl Eq for GroupKey {}

impl Ord for GroupKey {
    /// Lexicographic order over the label-sorted columns.
    fn cmp(&self, other: &Self) -> Ordering {
        for ((ac, av), (bc, bv)) in self.sorted_entries().zip(other.sorted_entries()) {
            if ac.label != bc.label {
                // The key with the greater label is the one missing the
                // smaller label, so it sorts first.
                return bc.label.cmp(&ac.label);
            }
            if ac.col_type != bc.col_type {
                return ac.col_type.cmp(&bc.col_type);
            }
            let ord = match (av.is_null(), bv.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => av.cmp_same_type(bv),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.len().cmp(&other.len())
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash64());
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (j, (c, v)) in self.cols().iter().zip(self.values()).enumerate() {
            if j != 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", c.label, v)?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupKey{}", self)
    }
}

/// Convenience builder for keys assembled column by column.
#[derive(Debug, Default)]
pub struct GroupKeyBuilder {
    cols: Vec<ColMeta>,
    values: Vec<Value>,
}

impl GroupKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, label: impl Into<String>, col_type: ColType, value: impl Into<Value>) -> Self {
        self.cols.push(ColMeta::new(label, col_type));
        self.values.push(value.into());
        self
    }

    pub fn build(self) -> Result<GroupKey> {
        GroupKey::new(self.cols, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::DataType;

    fn key(entries: &[(&str, Value)]) -> GroupKey {
        let cols = entries
            .iter()
            .map(|(label, v)| ColMeta::new(*label, v.col_type().unwrap_or(ColType::String)))
            .collect();
        let values = entries.iter().map(|(_, v)| v.clone()).collect();
        GroupKey::new(cols, values).unwrap()
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let a = key(&[("host", "h1".into()), ("_m", "cpu".into()), ("id", 7i64.into())]);
        let b = key(&[("id", 7i64.into()), ("host", "h1".into()), ("_m", "cpu".into())]);
        assert_eq!(a, b);
        assert_eq!(a.hash64(), b.hash64());
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_nulls_coalesce() {
        let a = key(&[("a", "x".into()), ("b", Value::Null)]);
        let b = key(&[("a", "x".into()), ("b", Value::Null)]);
        let c = key(&[("a", "x".into()), ("b", "".into())]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.hash64(), c.hash64());
        // null sorts before any value
        assert!(a.less(&c));
        assert!(!c.less(&a));
    }

    #[test]
    fn test_less_by_label() {
        // Missing "b" means the key with "c" at that position is less.
        let ab = key(&[("a", "x".into()), ("b", "y".into())]);
        let ac = key(&[("a", "x".into()), ("c", "y".into())]);
        assert!(ac.less(&ab));
        assert!(!ab.less(&ac));
    }

    #[test]
    fn test_less_by_type_then_length() {
        let int_key = key(&[("a", 5i64.into())]);
        let str_key = key(&[("a", "5".into())]);
        assert!(int_key.less(&str_key));

        let short = key(&[("a", 1i64.into())]);
        let long = key(&[("a", 1i64.into()), ("b", 1i64.into())]);
        assert!(short.less(&long));
        assert!(!long.less(&short));
    }

    #[test]
    fn test_bool_order() {
        let f = key(&[("a", false.into())]);
        let t = key(&[("a", true.into())]);
        assert!(f.less(&t));
    }

    #[test]
    fn test_new_validates() {
        let dup = GroupKey::new(
            vec![ColMeta::new("a", ColType::Int), ColMeta::new("a", ColType::Int)],
            vec![Value::Int(1), Value::Int(2)],
        );
        assert!(matches!(dup, Err(Error::InvalidGroupKey(_))));

        let mismatch = GroupKey::new(vec![ColMeta::new("a", ColType::Int)], vec![Value::from("x")]);
        assert!(mismatch.is_err());

        let short = GroupKey::new(vec![ColMeta::new("a", ColType::Int)], vec![]);
        assert!(short.is_err());
    }

    #[test]
    fn test_accessors_and_display() {
        let k = GroupKeyBuilder::new()
            .add("_m", ColType::String, "cpu")
            .add("n", ColType::Int, Value::Null)
            .add("t", ColType::Time, Time(5))
            .build()
            .unwrap();
        assert_eq!(k.to_string(), "{_m=cpu,n=null,t=1970-01-01T00:00:00.000000005Z}");
        assert!(k.has_col("n"));
        assert!(!k.has_col("x"));
        assert!(k.is_null(1));
        assert_eq!(k.value_str(0), Some("cpu"));
        assert_eq!(k.value_int(1), None);
        assert_eq!(k.value_time(2), Some(Time(5)));
        assert_eq!(k.label_value("_m"), Some(&Value::from("cpu")));
    }

    #[test]
    fn test_record_batch_round_trip() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(42)])),
                Arc::new(StringArray::from(vec![None::<&str>])),
            ],
        )
        .unwrap();

        let k = GroupKey::from_record_batch(&batch).unwrap();
        assert_eq!(k.value_int(0), Some(42));
        assert!(k.is_null(1));

        let back = k.to_record_batch().unwrap();
        assert_eq!(back.num_rows(), 1);
        assert_eq!(GroupKey::from_record_batch(&back).unwrap(), k);
        assert_eq!(GroupKey::empty().to_record_batch().unwrap().num_rows(), 1);
    }

    #[test]
    fn test_from_record_batch_requires_one_row() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
        assert!(GroupKey::from_record_batch(&batch).is_err());
    }

    #[test]
    fn test_hash_is_shared_between_clones() {
        let k = key(&[("a", 1i64.into())]);
        let clone = k.clone();
        let h = k.hash64();
        assert_eq!(clone.hash64(), h);
        let handle = std::thread::spawn(move || clone.hash64());
        assert_eq!(handle.join().unwrap(), h);
    }
}
