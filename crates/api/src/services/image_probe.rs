//! Liveness check for listing image URLs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use secure_commerce_core::{ImageUrl, is_image_content_type};

/// Confirms that a URL currently serves an image.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    /// `true` only if the URL answered with an image content type.
    async fn is_live_image(&self, url: &ImageUrl) -> bool;
}

/// Probes with an HTTP `HEAD` request under a fixed time budget.
///
/// Fails closed: timeouts, transport errors, error statuses and missing or
/// non-image `Content-Type` headers all count as "not an image".
#[derive(Debug, Clone)]
pub struct HttpImageProbe {
    client: reqwest::Client,
}

impl HttpImageProbe {
    /// Create a probe whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("secure-commerce/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn is_live_image(&self, url: &ImageUrl) -> bool {
        let response = match self.client.head(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::info!(url = %url.as_str(), error = %e, "image probe failed");
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::info!(url = %url.as_str(), status = %response.status(), "image probe rejected");
            return false;
        }

        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(is_image_content_type)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, http::header, routing::get};
    use tokio::net::TcpListener;

    use super::*;

    const BUDGET: Duration = Duration::from_millis(200);

    /// Serve a few fixed responses on an ephemeral loopback port.
    async fn image_host() -> String {
        let app = Router::new()
            .route("/ok.png", get(|| async { ([(header::CONTENT_TYPE, "image/png")], "") }))
            .route(
                "/page.png",
                get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html></html>") }),
            )
            .route(
                "/slow.png",
                get(|| async {
                    tokio::time::sleep(BUDGET * 5).await;
                    ([(header::CONTENT_TYPE, "image/png")], "")
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn probe(path: &str) -> bool {
        let host = image_host().await;
        let url = ImageUrl::parse(&format!("{host}{path}")).unwrap();
        HttpImageProbe::new(BUDGET).unwrap().is_live_image(&url).await
    }

    #[tokio::test]
    async fn test_image_content_type_is_accepted() {
        assert!(probe("/ok.png").await);
    }

    #[tokio::test]
    async fn test_html_response_is_rejected() {
        assert!(!probe("/page.png").await);
    }

    #[tokio::test]
    async fn test_slow_host_fails_closed() {
        let started = std::time::Instant::now();
        assert!(!probe("/slow.png").await);
        assert!(started.elapsed() < BUDGET * 5);
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        assert!(!probe("/missing.png").await);
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_closed() {
        let probe = HttpImageProbe::new(BUDGET).unwrap();
        // Port 9 on loopback (discard) is closed on test machines.
        let url = ImageUrl::parse("http://127.0.0.1:9/missing.png").unwrap();
        assert!(!probe.is_live_image(&url).await);
    }
}
