// HTTP access to the catalog pages

use crate::{
    config::Settings,
    error::{TrackerError, TrackerResult},
};
use anyhow::{Context, Result};
use reqwest::{
    Client, Proxy,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use std::time::Duration;

// Shared client: user agent, extra headers, per-request timeout, session cookies
// and an optional proxy.
// HTTP_PROXY/HTTPS_PROXY from the environment are still honored when no proxy_url is set.
pub fn build_client(settings: &Settings) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &settings.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name '{}'", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header '{}'", name))?;
        headers.insert(name, value);
    }

    let mut builder = Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(headers)
        // WooCommerce hands out a session cookie on the first page; later pages expect it back
        .cookie_store(true)
        .timeout(Duration::from_secs(settings.request_timeout_secs));

    if let Some(proxy_url) = settings.proxy_url.as_deref().filter(|p| !p.is_empty()) {
        let proxy = Proxy::all(proxy_url).context("Failed to parse proxy_url")?;
        builder = builder.proxy(proxy);
        tracing::info!("Routing catalog requests through configured proxy.");
    }

    builder.build().context("Failed to build reqwest client")
}

/// Fetches one catalog page. Timeouts, connection failures and non-2xx
/// statuses all surface as `TrackerError::Network`.
pub async fn fetch_page(client: &Client, url: &str) -> TrackerResult<String> {
    tracing::debug!(url, "Fetching page");

    let network = |source| TrackerError::Network {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(network)?;
    let status = response.status();
    tracing::debug!(url, status = %status, "Received response status");

    let body = response
        .error_for_status()
        .map_err(network)?
        .text()
        .await
        .map_err(network)?;

    tracing::debug!(url, body_len = body.len(), "Read page body");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> Settings {
        let builder = Settings::builder()
            .unwrap()
            .set_override("user_agent", "tracker-test/1.0")
            .unwrap()
            .set_override("headers.referer", "https://yoursite.com/")
            .unwrap();
        Settings::from_builder(builder).unwrap()
    }

    #[tokio::test]
    async fn fetch_page_sends_configured_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/shop/"))
            .and(header("user-agent", "tracker-test/1.0"))
            .and(header("referer", "https://yoursite.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = build_client(&settings()).unwrap();
        let body = fetch_page(&client, &format!("{}/shop/", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn session_cookie_is_sent_on_later_pages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/shop/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "woocommerce_session=abc123; Path=/")
                    .set_body_string("<html>first</html>"),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/shop/page/2/"))
            .and(header("cookie", "woocommerce_session=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>second</html>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = build_client(&settings()).unwrap();
        fetch_page(&client, &format!("{}/shop/", mock_server.uri())).await.unwrap();
        let body = fetch_page(&client, &format!("{}/shop/page/2/", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(body, "<html>second</html>");
    }

    #[tokio::test]
    async fn non_success_status_is_a_network_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/shop/page/2/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = build_client(&settings()).unwrap();
        let url = format!("{}/shop/page/2/", mock_server.uri());
        let err = fetch_page(&client, &url).await.unwrap_err();

        match err {
            TrackerError::Network { url: failed, source } => {
                assert_eq!(failed, url);
                assert_eq!(source.status().map(|s| s.as_u16()), Some(503));
            }
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let client = build_client(&settings()).unwrap();
        // Port 9 (discard) on localhost is not expected to be listening
        let err = fetch_page(&client, "http://127.0.0.1:9/shop/").await.unwrap_err();
        assert!(matches!(err, TrackerError::Network { .. }));
    }

    #[test]
    fn invalid_header_value_is_rejected() {
        let builder = Settings::builder()
            .unwrap()
            .set_override("headers.referer", "line\nbreak")
            .unwrap();
        let settings = Settings::from_builder(builder).unwrap();
        assert!(build_client(&settings).is_err());
    }
}
