//! Managed rendering service error handling against a local listener.

use chrono::Utc;
use eventide_browser::RateLimiter;
use eventide_core::SourceId;
use eventide_scraper::{ExtractionStrategy, ManagedServiceStrategy, ScrapeError};
use eventide_sources::{EventSource, ScrapeConfig, Selectors, SourceType};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const TOKEN: &str = "s3cret-service-token";

fn source(url: &str) -> EventSource {
    let now = Utc::now();
    EventSource {
        id: SourceId::new("city-arts").expect("valid id"),
        name: "City Arts".to_string(),
        url: url.to_string(),
        source_type: SourceType::Website,
        category: None,
        is_active: true,
        scrape_config: ScrapeConfig {
            selectors: Some(Selectors {
                event_container: ".event".to_string(),
                title: "h2".to_string(),
                ..Selectors::default()
            }),
            ..ScrapeConfig::default()
        },
        error_count: 0,
        last_scraped_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().expect("http client")
}

/// Answers every request with 429 and `Retry-After: 1`.
async fn throttling_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = "HTTP/1.1 429 Too Many Requests\r\nRetry-After: 1\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn request_errors_do_not_leak_the_token() {
    // Nothing listens on the discard port.
    let strategy = ManagedServiceStrategy::new(
        client(),
        "http://127.0.0.1:9",
        Some(TOKEN.to_string()),
        RateLimiter::new(0),
    );

    let err = strategy
        .extract(&source("https://arts.example.org/events"))
        .await
        .expect_err("service unreachable");
    assert!(matches!(err, ScrapeError::Extraction(_)));
    assert!(!err.to_string().contains(TOKEN));
}

#[tokio::test]
async fn throttled_service_pushes_back_the_host() {
    let limiter = RateLimiter::new(0);
    let base = throttling_service().await;
    let strategy = ManagedServiceStrategy::new(client(), &base, Some(TOKEN.to_string()), limiter.clone());
    let venue = source("https://arts.example.org/events");

    let err = strategy.extract(&venue).await.expect_err("throttled");
    assert!(matches!(err, ScrapeError::RateLimited { retry_after } if retry_after == Duration::from_secs(1)));
    assert!(!err.to_string().contains(TOKEN));

    let waited = limiter.acquire(&venue.url, None).await.expect("acquire slot");
    assert!(waited >= Duration::from_millis(500));
}
