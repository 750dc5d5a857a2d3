use actix_web::{test, App};
use chrono::TimeZone;

use nodestatus::{ChainReport, ProducerInfo, ProducerReport, ServiceKind};
use nodestatus_server::{publish_report, routes};

fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("nodestatus-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn sample_report() -> ChainReport {
    let mut report = ProducerReport::new(&ProducerInfo::new("bpa", "https://bpa.example", 1, true));
    report.register_endpoint("https://api.bpa.example");
    report.mark_healthy(ServiceKind::Api, "https://api.bpa.example");
    report.endpoint_ok("https://api.bpa.example", "API node https://api.bpa.example is responding correctly");
    let now = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    ChainReport::collect(&[report], now)
}

#[actix_rt::test]
async fn test_health_returns_ok() {
    let dir = scratch_dir("health");
    std::fs::create_dir_all(&dir).unwrap();
    let app = test::init_service(App::new().configure(routes::configure(dir))).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"OK");
}

#[actix_rt::test]
async fn test_published_report_is_served() {
    let dir = scratch_dir("serve");
    let report = sample_report();
    let path = publish_report(&dir, "abc123", &report).await.unwrap();
    assert_eq!(path, dir.join("abc123.json"));
    assert!(!dir.join(".abc123.json.tmp").exists());

    let app = test::init_service(App::new().configure(routes::configure(dir.clone()))).await;
    let req = test::TestRequest::get().uri("/abc123.json").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let served: ChainReport = test::read_body_json(resp).await;
    assert_eq!(served, report);
    assert_eq!(served.last_update, "01/06/24 12:00:00 UTC");
    assert_eq!(served.healthy_api_endpoints, vec!["https://api.bpa.example"]);

    let req = test::TestRequest::get().uri("/missing.json").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[actix_rt::test]
async fn test_republishing_replaces_the_document() {
    let dir = scratch_dir("replace");
    publish_report(&dir, "abc123", &sample_report()).await.unwrap();

    let empty = ChainReport::collect(&[], chrono::Utc::now());
    publish_report(&dir, "abc123", &empty).await.unwrap();

    let text = std::fs::read_to_string(dir.join("abc123.json")).unwrap();
    let on_disk: ChainReport = serde_json::from_str(&text).unwrap();
    assert!(on_disk.producers.is_empty());
    assert!(text.contains("\n  \"producers\""));

    std::fs::remove_dir_all(&dir).unwrap();
}
