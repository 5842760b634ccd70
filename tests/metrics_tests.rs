/// Integration tests for the metrics client: envelope decoding, per-user
/// paths and failure handling.
mod common;

use common::FakeApi;
use fintiva::activity::events::{EventKind, EventLog};
use fintiva::activity::reporter;
use fintiva::metrics::{MetricsClient, ParcelPoint, QuarterPoint};

fn metrics(api: &FakeApi) -> MetricsClient {
    MetricsClient::new(api.client(), EventLog::disabled())
}

#[test]
fn quarterly_items_are_kept_in_order() {
    let api = FakeApi::fixed(
        200,
        r#"{"items":[{"trimestre":"Q4-2024","total":800},{"trimestre":"Q1-2025","total":1234.5}]}"#,
    );

    let points = metrics(&api).fetch_quarterly_expenses(42);
    assert_eq!(
        points,
        vec![
            QuarterPoint {
                period: "Q4-2024".into(),
                total: 800.0
            },
            QuarterPoint {
                period: "Q1-2025".into(),
                total: 1234.5
            },
        ]
    );
    assert_eq!(api.requests()[0].path, "/metrics/gastos-trimestrales/42");
    assert_eq!(api.requests()[0].method, "GET");
}

#[test]
fn parcel_counts_are_decoded() {
    let api = FakeApi::fixed(
        200,
        r#"{"items":[{"parcela":"Norte","cultivos":3},{"parcela":"Sur","cultivos":0}]}"#,
    );

    let points = metrics(&api).fetch_parcel_crop_counts(5);
    assert_eq!(
        points,
        vec![
            ParcelPoint {
                parcel: "Norte".into(),
                crop_count: 3
            },
            ParcelPoint {
                parcel: "Sur".into(),
                crop_count: 0
            },
        ]
    );
    assert_eq!(api.requests()[0].path, "/metrics/parcelas-cultivos/5");
}

#[test]
fn missing_items_is_an_empty_series() {
    let api = FakeApi::fixed(200, "{}");
    let client = metrics(&api);
    assert!(client.fetch_quarterly_expenses(1).is_empty());
    assert!(client.fetch_parcel_crop_counts(1).is_empty());
    assert!(client.try_fetch_quarterly_expenses(1).unwrap().is_empty());
}

#[test]
fn missing_totals_default_to_zero() {
    let api = FakeApi::fixed(200, r#"{"items":[{"trimestre":"Q2-2025"}]}"#);
    let points = metrics(&api).fetch_quarterly_expenses(1);
    assert_eq!(points[0].total, 0.0);
}

#[test]
fn server_error_is_empty_and_logged() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("events.jsonl");
    let api = FakeApi::fixed(500, r#"{"detail":"boom"}"#);
    let client = MetricsClient::new(api.client(), EventLog::to_file(&log_path));

    assert!(client.fetch_quarterly_expenses(9).is_empty());
    assert!(client.fetch_parcel_crop_counts(9).is_empty());
    assert!(client.try_fetch_parcel_crop_counts(9).is_err());

    let events = reporter::read_all_events(&log_path);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind == EventKind::MetricsFetchFailed));
    assert_eq!(events[0].user_id, Some(9));
    assert_eq!(
        events[0].resource.as_deref(),
        Some("/metrics/gastos-trimestrales/9")
    );
}

#[test]
fn malformed_body_is_empty() {
    let api = FakeApi::fixed(200, "<html>not json</html>");
    assert!(metrics(&api).fetch_quarterly_expenses(1).is_empty());
}

#[test]
fn sentinel_user_is_requested_verbatim() {
    let api = FakeApi::fixed(200, r#"{"items":[]}"#);
    metrics(&api).fetch_parcel_crop_counts(0);
    assert_eq!(api.requests()[0].path, "/metrics/parcelas-cultivos/0");
}
