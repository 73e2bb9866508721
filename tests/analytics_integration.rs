//! End-to-end analytics tests: tracking visits and aggregating summaries.

use curt::allocator::CodeAllocator;
use curt::analytics::{AnalyticsAggregator, AnalyticsCollector, GeoResolver};
use curt::models::NewVisit;
use curt::storage::{SqliteStorage, Storage};
use std::sync::Arc;

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

async fn create_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn collector(storage: &Arc<dyn Storage>) -> AnalyticsCollector {
    AnalyticsCollector::new(Arc::clone(storage), GeoResolver::new(None).unwrap(), None)
}

/// Visit row with a chosen entry time and breakdown values, bypassing the
/// collector so tests control the time buckets.
fn visit(code: &str, entry_time: &str, platform: &str, ip: &str) -> NewVisit {
    NewVisit {
        code: code.to_string(),
        entry_time: entry_time.to_string(),
        response_time: "0.01".to_string(),
        platform: platform.to_string(),
        browser: "Chrome-91.0.4472".to_string(),
        client_ip: ip.to_string(),
        city: "Unknown".to_string(),
        region: "Unknown".to_string(),
        country: "Unknown".to_string(),
        latitude: String::new(),
        longitude: String::new(),
        distance: "0.0000000000".to_string(),
    }
}

#[tokio::test]
async fn test_shorten_track_analyze_scenario() {
    let storage = create_storage().await;
    let allocator = CodeAllocator::new(Arc::clone(&storage));
    let collector = collector(&storage);
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    let mapping = allocator
        .shorten("https://example.com/page", None, false, None)
        .await
        .unwrap();
    assert_eq!(mapping.code.len(), 4);

    collector
        .track(&mapping.code, CHROME_UA, "203.0.113.7".parse().unwrap(), 0.0123)
        .await
        .unwrap();

    assert_eq!(collector.entry_count(&mapping.code).await.unwrap(), 1);
    assert_eq!(
        collector.unique_visitor_count(&mapping.code).await.unwrap(),
        1
    );

    let summary = aggregator.analyze(&mapping.code).await.unwrap();
    assert_eq!(summary.total_entries, 1);
    assert_eq!(summary.unique_visitors, 1);
    assert_eq!(summary.entries.len(), 1);
    assert!((summary.average_response_time.unwrap() - 0.0123).abs() < 1e-9);

    assert_eq!(summary.top_browsers.len(), 1);
    assert!(summary.top_browsers[0].value.starts_with("Chrome-"));
    assert_eq!(summary.top_platforms.len(), 1);

    // No GeoIP database: the sentinel location is what gets aggregated.
    assert_eq!(summary.top_countries[0].value, "Unknown");
    assert_eq!(summary.average_distance_km, Some(0.0));
}

#[tokio::test]
async fn test_unique_visitors_counts_distinct_ips() {
    let storage = create_storage().await;
    let collector = collector(&storage);

    for ip in ["203.0.113.7", "203.0.113.7", "198.51.100.1"] {
        collector
            .track("abcd", CHROME_UA, ip.parse().unwrap(), 0.01)
            .await
            .unwrap();
    }

    assert_eq!(collector.entry_count("abcd").await.unwrap(), 3);
    assert_eq!(collector.unique_visitor_count("abcd").await.unwrap(), 2);
}

#[tokio::test]
async fn test_analyze_with_no_visits_is_empty_not_an_error() {
    let storage = create_storage().await;
    let aggregator = AnalyticsAggregator::new(storage);

    let summary = aggregator.analyze("ghost").await.unwrap();
    assert_eq!(summary.total_entries, 0);
    assert_eq!(summary.unique_visitors, 0);
    assert!(summary.entries.is_empty());
    assert!(summary.top_hours.is_empty());
    assert!(summary.top_days.is_empty());
    assert!(summary.top_months.is_empty());
    assert!(summary.average_response_time.is_none());
    assert!(summary.average_distance_km.is_none());
    assert!(summary.top_platforms.is_empty());
    assert!(summary.top_countries.is_empty());
}

#[tokio::test]
async fn test_modal_time_buckets_return_all_tied_values() {
    let storage = create_storage().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    for (entry, ip) in [
        ("01-01-2024.10:00:00", "203.0.113.1"),
        ("01-01-2024.10:30:00", "203.0.113.2"),
        ("02-01-2024.14:00:00", "203.0.113.3"),
        ("03-02-2024.14:10:00", "203.0.113.4"),
    ] {
        storage
            .insert_visit(&visit("abcd", entry, "Windows", ip))
            .await
            .unwrap();
    }

    let summary = aggregator.analyze("abcd").await.unwrap();
    // Hours 10 and 14 are tied; both come back, in first-seen order.
    assert_eq!(summary.top_hours, vec![10, 14]);
    assert_eq!(summary.top_days, vec![1]);
    assert_eq!(summary.top_months, vec![1]);
}

#[tokio::test]
async fn test_top_n_tie_break_is_stable_across_calls() {
    let storage = create_storage().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    for (i, platform) in ["Windows", "Linux", "Windows", "Linux", "Mac OS X"]
        .iter()
        .enumerate()
    {
        storage
            .insert_visit(&visit(
                "abcd",
                "01-01-2024.10:00:00",
                platform,
                &format!("203.0.113.{i}"),
            ))
            .await
            .unwrap();
    }

    let first = aggregator.analyze("abcd").await.unwrap();
    assert_eq!(first.top_platforms.len(), 3);
    assert_eq!(first.top_platforms[0].value, "Windows");
    assert_eq!(first.top_platforms[0].count, 2);
    assert_eq!(first.top_platforms[1].value, "Linux");
    assert_eq!(first.top_platforms[1].count, 2);
    assert_eq!(first.top_platforms[2].value, "Mac OS X");

    let second = aggregator.analyze("abcd").await.unwrap();
    assert_eq!(first.top_platforms, second.top_platforms);
}

#[tokio::test]
async fn test_top_lists_are_capped_at_three_and_ten() {
    let storage = create_storage().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    for i in 0..12 {
        let mut v = visit(
            "abcd",
            "01-01-2024.10:00:00",
            &format!("platform-{i}"),
            &format!("203.0.113.{i}"),
        );
        v.country = format!("country-{i}");
        storage.insert_visit(&v).await.unwrap();
    }

    let summary = aggregator.analyze("abcd").await.unwrap();
    assert_eq!(summary.top_platforms.len(), 3);
    assert_eq!(summary.top_countries.len(), 10);
}

#[tokio::test]
async fn test_summary_serializes_with_explicit_field_names() {
    let storage = create_storage().await;
    let collector = collector(&storage);
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    collector
        .track("abcd", CHROME_UA, "203.0.113.7".parse().unwrap(), 0.0123)
        .await
        .unwrap();

    // Consumers get a fixed-shape document, not an ad hoc map.
    let json = serde_json::to_value(aggregator.analyze("abcd").await.unwrap()).unwrap();
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["unique_visitors"], 1);
    assert!(json["average_response_time"].as_f64().is_some());
    assert!(json["top_browsers"][0]["value"]
        .as_str()
        .unwrap()
        .starts_with("Chrome-"));
    assert!(json["top_hours"].is_array());
}

#[tokio::test]
async fn test_delete_all_empties_a_code() {
    let storage = create_storage().await;
    let collector = collector(&storage);

    for _ in 0..4 {
        collector
            .track("abcd", CHROME_UA, "203.0.113.7".parse().unwrap(), 0.01)
            .await
            .unwrap();
    }

    assert_eq!(collector.delete_all("abcd").await.unwrap(), 4);
    assert_eq!(collector.entry_count("abcd").await.unwrap(), 0);
    assert!(collector.delete_all("abcd").await.unwrap() == 0);
}
