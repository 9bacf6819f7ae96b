//! End-to-end runs against a fake upstream, no network involved

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use airsheet::orchestrator::TIMESTAMP_FORMAT;
use airsheet::{
    ApiKey, CsvFileSink, FetchError, FetchOrchestrator, KeyPool, Location, LocationFetcher,
    OutputSink, ResultTable, WeatherProvider,
};
use airsheet::openweather::{AirPollution, CurrentWeather};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rstest::rstest;
use serde_json::json;

/// Serves fixed payloads per city; cities in `broken` answer HTTP 500.
struct FakeUpstream {
    broken: Vec<String>,
    calls_per_key: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl FakeUpstream {
    fn new(broken: &[&str]) -> Self {
        Self {
            broken: broken.iter().map(|s| s.to_string()).collect(),
            calls_per_key: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn record_call(&self, key: &ApiKey) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_per_key
            .lock()
            .unwrap()
            .entry(key.secret().to_string())
            .or_default() += 1;
    }
}

#[async_trait]
impl WeatherProvider for FakeUpstream {
    async fn current_weather(
        &self,
        location: &Location,
        key: &ApiKey,
    ) -> Result<CurrentWeather, FetchError> {
        self.record_call(key);
        if self.broken.contains(&location.name) {
            return Err(FetchError::Status(500));
        }
        Ok(serde_json::from_value(json!({
            "weather": [{"description": "broken clouds", "icon": "04n"}],
            "main": {"temp": 26.78, "pressure": 1010, "humidity": 83},
            "visibility": 5000,
            "wind": {"speed": 10},
            "clouds": {"all": 75},
            "sys": {"sunrise": 1_710_376_260, "sunset": 1_710_419_520},
            "timezone": 19800
        }))
        .unwrap())
    }

    async fn air_pollution(
        &self,
        location: &Location,
        key: &ApiKey,
    ) -> Result<AirPollution, FetchError> {
        self.record_call(key);
        if self.broken.contains(&location.name) {
            return Err(FetchError::Status(500));
        }
        Ok(serde_json::from_value(json!({"list": [{
            "main": {"aqi": 4},
            "components": {"co": 701.6, "no": 0.0, "no2": 18.3, "o3": 40.1,
                           "so2": 12.0, "pm10": 88.4, "nh3": 6.2}
        }]}))
        .unwrap())
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    tables: Arc<Mutex<Vec<ResultTable>>>,
}

#[async_trait]
impl OutputSink for RecordingSink {
    async fn publish(&self, table: &ResultTable) -> airsheet::Result<()> {
        self.tables.lock().unwrap().push(table.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

fn tamil_nadu() -> Vec<Location> {
    vec![
        Location::new(13.0827, 80.2707, "Chennai"),
        Location::new(11.0168, 76.9558, "Coimbatore"),
        Location::new(10.7905, 78.7047, "Tiruchirappalli"),
    ]
}

fn build(
    upstream: FakeUpstream,
    keys: &[&str],
    ceiling: u32,
    sink: Box<dyn OutputSink>,
) -> FetchOrchestrator<FakeUpstream> {
    let pool = Arc::new(KeyPool::new(keys.iter().copied(), ceiling, Duration::ZERO).unwrap());
    let fetcher = LocationFetcher::new(upstream, pool, "http://openweathermap.org/img/wn");
    FetchOrchestrator::new(fetcher, sink).with_concurrency(15)
}

fn at(stamp: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).unwrap()
}

#[tokio::test]
async fn broken_location_is_absent_from_published_table() {
    let sink = RecordingSink::default();
    let orchestrator = build(
        FakeUpstream::new(&["Coimbatore"]),
        &["k1", "k2"],
        55,
        Box::new(sink.clone()),
    );

    let table = orchestrator
        .run_at(&tamil_nadu(), at("2025-03-14 09:30:00"))
        .await
        .unwrap();

    let tables = sink.tables.lock().unwrap();
    assert_eq!(tables.len(), 1, "published exactly once");
    assert_eq!(tables[0], table);

    let rows = table.records();
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].latitude, rows[0].longitude), (13.0827, 80.2707));
    assert_eq!(rows[0].city, "Chennai");
    assert_eq!(rows[1].city, "Tiruchirappalli");
    assert_eq!((rows[1].latitude, rows[1].longitude), (10.7905, 78.7047));

    // Two good locations take one attempt each, the broken one three.
    let upstream = orchestrator.fetcher().provider();
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 2 * (1 + 3 + 1));
    let per_key = upstream.calls_per_key.lock().unwrap();
    assert!(per_key.contains_key("k1") && per_key.contains_key("k2"));
}

#[tokio::test]
async fn shaped_values_follow_unit_rules() {
    let orchestrator = build(
        FakeUpstream::new(&[]),
        &["k1"],
        55,
        Box::new(RecordingSink::default()),
    );

    let table = orchestrator
        .run_at(&tamil_nadu()[..1], at("2025-03-14 09:30:00"))
        .await
        .unwrap();
    let row = &table.records()[0];

    assert_eq!(row.weather, "Broken Clouds");
    assert_eq!(row.weather_icon, "http://openweathermap.org/img/wn/04n@2x.png");
    assert_eq!(row.temperature, "26.78°C");
    assert_eq!(row.wind_speed, "36.0 km/h");
    assert_eq!(row.visibility, "5.0 km");
    assert_eq!(row.wind_degree, "0°");
    assert_eq!(row.cloud_coverage, "75%");
    assert_eq!(row.aqi, 4);
    assert_eq!(row.no, "0.0");
    assert_eq!(row.pm2_5, "0");
    assert_eq!(row.last_updated, "2025-03-14 09:30:00");
}

#[tokio::test]
async fn consecutive_runs_differ_only_in_timestamp() {
    let orchestrator = build(
        FakeUpstream::new(&[]),
        &["k1", "k2"],
        55,
        Box::new(RecordingSink::default()),
    );

    let first = orchestrator
        .run_at(&tamil_nadu(), at("2025-03-14 09:30:00"))
        .await
        .unwrap();
    let second = orchestrator
        .run_at(&tamil_nadu(), at("2025-03-14 10:30:00"))
        .await
        .unwrap();

    assert_ne!(first, second);
    let strip = |t: &ResultTable| {
        t.records()
            .iter()
            .map(|r| r.without_timestamp())
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&first), strip(&second));
}

#[tokio::test]
async fn exhausted_key_is_skipped_for_the_rest_of_the_run() {
    let sink = RecordingSink::default();
    // One dual-call puts a key at the ceiling of 2.
    let pool = Arc::new(KeyPool::new(["a", "b"], 2, Duration::ZERO).unwrap());
    let fetcher = LocationFetcher::new(
        FakeUpstream::new(&[]),
        Arc::clone(&pool),
        "http://openweathermap.org/img/wn",
    );
    let orchestrator = FetchOrchestrator::new(fetcher, Box::new(sink)).with_concurrency(1);

    orchestrator
        .run_at(&tamil_nadu()[..1], at("2025-03-14 09:30:00"))
        .await
        .unwrap();
    assert_eq!(pool.snapshot(), vec![2, 0]);

    assert_eq!(pool.acquire().await.secret(), "b");
    assert_eq!(pool.acquire().await.secret(), "b");
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(15)]
#[tokio::test]
async fn every_location_resolved_once_regardless_of_width(#[case] width: usize) {
    let upstream = FakeUpstream::new(&[]);
    let pool = Arc::new(KeyPool::new(["k1", "k2", "k3"], 55, Duration::ZERO).unwrap());
    let fetcher = LocationFetcher::new(upstream, pool, "http://openweathermap.org/img/wn");
    let orchestrator =
        FetchOrchestrator::new(fetcher, Box::new(RecordingSink::default())).with_concurrency(width);

    let table = orchestrator
        .run_at(&tamil_nadu(), at("2025-03-14 09:30:00"))
        .await
        .unwrap();

    let cities: Vec<&str> = table.records().iter().map(|r| r.city.as_str()).collect();
    assert_eq!(cities, vec!["Chennai", "Coimbatore", "Tiruchirappalli"]);
}

#[tokio::test]
async fn csv_sink_receives_full_table() {
    let path = std::env::temp_dir().join(format!("airsheet-it-{}.csv", std::process::id()));
    let orchestrator = build(
        FakeUpstream::new(&["Chennai"]),
        &["k1"],
        55,
        Box::new(CsvFileSink::new(&path)),
    );

    orchestrator
        .run_at(&tamil_nadu(), at("2025-03-14 09:30:00"))
        .await
        .unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Latitude,Longitude,City,Weather"));
    assert!(lines[0].ends_with("NH₃,Last Updated"));
    assert!(lines[1].contains("Coimbatore"));
    assert!(lines[2].contains("Tiruchirappalli"));

    std::fs::remove_file(&path).unwrap();
}
