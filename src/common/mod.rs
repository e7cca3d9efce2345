pub mod key;
pub mod time;
pub mod value;

pub use key::{GroupKey, GroupKeyBuilder};
pub use time::{Duration, Time};
pub use value::{ColMeta, ColType, Value};
