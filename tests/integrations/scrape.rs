//! Integration tests for the scrape endpoint served by a running application.

use anyhow::Result;
use dns_exporter::dns::test_utils::FakeDnsClient;
use hickory_resolver::proto::rr::RecordType;
use std::{sync::Arc, time::Duration};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::app::{TestApp, TestAppBuilder};

const NS: &str = "10.0.0.1:53";

/// Value of the first sample line for `name` whose labels contain every fragment.
fn sample(body: &str, name: &str, fragments: &[&str]) -> Option<f64> {
    body.lines()
        .filter(|line| line.starts_with(&format!("{name}{{")))
        .find(|line| fragments.iter().all(|f| line.contains(f)))
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

async fn scrape_until(app: &TestApp, name: &str) -> Result<String> {
    let url = format!("http://{}/metrics", app.metrics_addr());
    for _ in 0..50 {
        let body = reqwest::get(&url).await?.text().await?;
        if body.contains(name) {
            return Ok(body);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("{} never appeared at {}", name, url)
}

#[tokio::test]
async fn test_metrics_endpoint_serves_probe_results() -> Result<()> {
    let client = Arc::new(FakeDnsClient::new());
    client.add_answers(
        NS,
        "example.com",
        vec![RecordType::CNAME, RecordType::A, RecordType::A],
        Duration::from_millis(12),
    );

    let app = TestAppBuilder::new()
        .with_config_modifier(|c| helpers::resolve(c, "example.com", &["10.0.0.1"]))
        .with_dns_client(client)
        .build()
        .await?;

    let body = scrape_until(&app, "dns_last_sweep_timestamp_seconds").await?;

    assert_eq!(
        sample(&body, "dns_resolver_responded", &["nameserver=\"10.0.0.1:53\""]),
        Some(1.0)
    );
    assert_eq!(
        sample(
            &body,
            "dns_lookup_success",
            &["nameserver=\"10.0.0.1:53\"", "domain=\"example.com\""]
        ),
        Some(1.0)
    );
    assert_eq!(
        sample(&body, "dns_lookup_num_answers", &["record_type=\"A\""]),
        Some(2.0)
    );
    assert_eq!(
        sample(&body, "dns_lookup_num_answers", &["record_type=\"CNAME\""]),
        Some(1.0)
    );
    let rtt = sample(&body, "dns_resolver_rtt", &["nameserver=\"10.0.0.1:53\""]).unwrap();
    assert!((rtt - 0.012).abs() < 1e-9);
    assert!(body.contains("# HELP dns_lookup_success"));

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_custom_namespace_prefixes_metrics() -> Result<()> {
    let client = Arc::new(FakeDnsClient::new());
    client.add_answers(NS, "example.com", vec![RecordType::A], Duration::from_millis(1));

    let app = TestAppBuilder::new()
        .with_config_modifier(|c| {
            c.exporter.namespace = "edge".to_string();
            helpers::resolve(c, "example.com", &[NS]);
        })
        .with_dns_client(client)
        .build()
        .await?;

    let body = scrape_until(&app, "edge_lookup_success").await?;
    assert!(!body.contains("dns_lookup_success"));

    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_landing_page_links_to_metrics() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;

    let response = reqwest::get(format!("http://{}/", app.metrics_addr())).await?;
    assert!(response.status().is_success());
    let body = response.text().await?;
    assert!(body.contains("href='/metrics'"));

    app.shutdown(Duration::from_secs(5)).await
}
