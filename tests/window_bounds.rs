use std::sync::Arc;

use arrow::array::{AsArray, Float64Array, StringArray, TimestampNanosecondArray};
use arrow::datatypes::{DataType, Field, Float64Type, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use groupwin::{Bounds, Duration, ErrorCode, GroupingSpec, Time, Window};

fn dur(s: &str) -> Duration {
    Duration::parse(s).unwrap()
}

fn t(s: &str) -> Time {
    Time::parse(s).unwrap()
}

fn minutes(m: i64) -> Time {
    Time::EPOCH.add(Duration::minutes(m))
}

#[test]
fn test_containment_scenario() {
    let w = Window::new(dur("5m"), dur("5m"), Duration::ZERO).unwrap();
    let b = w.get_latest_bounds(minutes(6));
    assert_eq!(b, Bounds::new(minutes(5), minutes(10)));
    assert!(b.contains(minutes(6)));
}

#[test]
fn test_negative_period_scenario() {
    let w = Window::new(dur("5m"), dur("-5m"), dur("30s")).unwrap();
    let b = w.get_latest_bounds(minutes(5));
    assert_eq!(b, Bounds::new(t("1970-01-01T00:00:30Z"), t("1970-01-01T00:05:30Z")));
    assert_eq!(b.to_string(), "[1970-01-01T00:00:30Z, 1970-01-01T00:05:30Z)");
}

#[test]
fn test_contiguous_windows_contain_every_instant() {
    let w = Window::new(dur("7m"), dur("7m"), dur("-3m")).unwrap();
    for m in -30..30 {
        let at = minutes(m).add(Duration::seconds(17));
        let b = w.get_latest_bounds(at);
        assert!(b.contains(at), "{} not in {}", at, b);
        assert_eq!(w.next_bounds(&b).start(), b.stop());
        assert_eq!(w.prev_bounds(&b).stop(), b.start());
    }
}

#[test]
fn test_calendar_windows_walk_months() {
    let w = Window::new(dur("1mo"), dur("1mo"), Duration::ZERO).unwrap();
    let mut b = w.get_latest_bounds(t("2023-11-20T08:00:00Z"));
    let mut starts = Vec::new();
    for _ in 0..4 {
        starts.push(b.start().to_string());
        b = w.next_bounds(&b);
    }
    assert_eq!(
        starts,
        vec![
            "2023-11-01T00:00:00Z",
            "2023-12-01T00:00:00Z",
            "2024-01-01T00:00:00Z",
            "2024-02-01T00:00:00Z",
        ]
    );
    // March 2024.
    assert_eq!(b.length(), Duration::hours(31 * 24));
}

#[test]
fn test_overlapping_bounds_cover_range() {
    let w = Window::new(dur("1h"), dur("3h"), Duration::ZERO).unwrap();
    let start = t("2024-01-01T05:00:00Z");
    let stop = t("2024-01-01T07:00:00Z");
    let bounds = w.get_overlapping_bounds(start, stop);

    let starts: Vec<String> = bounds.iter().map(|b| b.start().to_string()).collect();
    assert_eq!(
        starts,
        vec![
            "2024-01-01T06:00:00Z",
            "2024-01-01T05:00:00Z",
            "2024-01-01T04:00:00Z",
            "2024-01-01T03:00:00Z",
        ]
    );
    let range = Bounds::new(start, stop);
    assert!(bounds.iter().all(|b| b.overlaps(&range)));
    assert!(w.get_overlapping_bounds(stop, start).is_empty());
}

#[test]
fn test_window_serde() {
    let w: Window = serde_json::from_str(r#"{"every":"5m","period":"-5m","offset":"30s"}"#).unwrap();
    assert_eq!(w.period(), dur("-5m"));
    assert_eq!(w.zero(), t("1970-01-01T00:00:30Z"));

    let back: Window = serde_yaml::from_str(&serde_yaml::to_string(&w).unwrap()).unwrap();
    assert_eq!(back, w);

    assert!(serde_json::from_str::<Window>(r#"{"every":"0s","period":"1m","offset":"0s"}"#).is_err());
}

#[test]
fn test_invalid_every() {
    for every in ["0s", "-1m", "1mo1d"] {
        let err = Window::new(dur(every), dur("1m"), Duration::ZERO).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid, "{}", every);
    }
}

fn readings() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("_time", DataType::Timestamp(TimeUnit::Nanosecond, None), false),
        Field::new("host", DataType::Utf8, false),
        Field::new("_value", DataType::Float64, false),
    ]));
    let times = ["2024-01-31T23:00:00Z", "2024-02-10T00:00:00Z", "2024-01-05T00:00:00Z", "2024-02-29T12:00:00Z"]
        .iter()
        .map(|s| t(s).nanos())
        .collect::<Vec<_>>();
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(TimestampNanosecondArray::from(times)),
            Arc::new(StringArray::from(vec!["a", "b", "a", "a"])),
            Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0])),
        ],
    )
    .unwrap()
}

#[test]
fn test_monthly_windows_from_config() {
    let spec = GroupingSpec::from_yaml_str("group_by: [host]\nwindow: { every: 1mo }\n").unwrap();
    let keyed = spec.key_by_function().unwrap().key_by(&readings()).unwrap();

    let summary: Vec<(String, String, Vec<f64>)> = keyed
        .iter()
        .map(|kb| {
            let host = kb.key.label_value("host").unwrap().to_string();
            let start = kb.key.label_value("_start").unwrap().to_string();
            let idx = kb.batch.schema().index_of("_value").unwrap();
            let values = kb.batch.column(idx).as_primitive::<Float64Type>().values().to_vec();
            (host, start, values)
        })
        .collect();

    assert_eq!(
        summary,
        vec![
            ("a".to_string(), "2024-01-01T00:00:00Z".to_string(), vec![1.0, 3.0]),
            ("a".to_string(), "2024-02-01T00:00:00Z".to_string(), vec![4.0]),
            ("b".to_string(), "2024-02-01T00:00:00Z".to_string(), vec![2.0]),
        ]
    );
}
