pub mod common;
pub mod config;
pub mod error;
pub mod functions;
pub mod lookup;
pub mod window;

pub use common::{ColMeta, ColType, Duration, GroupKey, GroupKeyBuilder, Time, Value};
pub use config::{GroupingSpec, WindowSpec};
pub use error::{Error, ErrorCode, Result};
pub use functions::{ArrowKeyByFunction, KeyByFunction, KeyByFunctionTrait, KeyedBatch, WindowFunction};
pub use lookup::{AnyLookup, KeyLookup, Lookup, LookupKind, RandomAccessLookup};
pub use window::{Bounds, Window};
