/// Network capability used by the uploader, plus the HTTPS implementation
use futures_util::future::BoxFuture;
use log::debug;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport setup failed: {0}")]
    Setup(String),
    #[error("request timed out")]
    Timeout,
    #[error("connection error: {0}")]
    Connect(String),
    #[error("request error: {0}")]
    Request(String),
}

/// What the collector answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInfo {
    pub status: u16,
    /// Response body size in bytes
    pub content_length: u64,
}

impl StatusInfo {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync {
    /// POST a JSON body; any HTTP answer is `Ok`, only failing to get one is `Err`
    fn post_json<'a>(
        &'a self,
        endpoint: &'a Url,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<StatusInfo, TransportError>>;
}

/// reqwest-backed transport with a fixed per-request timeout
pub struct HttpsTransport {
    client: reqwest::Client,
}

impl HttpsTransport {
    pub fn new(
        timeout: Duration,
        ca_cert_path: Option<&Path>,
        require_https: bool,
    ) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .https_only(require_https)
            .user_agent(concat!("rust-telemetry-node/", env!("CARGO_PKG_VERSION")));

        if let Some(path) = ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                TransportError::Setup(format!("Error loading CA cert {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| TransportError::Setup(format!("Invalid CA cert: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Setup(format!("HTTP client builder error: {}", e)))?;

        Ok(HttpsTransport { client })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

impl Transport for HttpsTransport {
    fn post_json<'a>(
        &'a self,
        endpoint: &'a Url,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<StatusInfo, TransportError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(endpoint.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(classify)?;

            let status = response.status().as_u16();
            let declared = response.content_length();
            let received = response.bytes().await.map_err(classify)?;
            debug!("Collector replied {} with {} byte(s)", status, received.len());

            Ok(StatusInfo {
                status,
                content_length: declared.unwrap_or(received.len() as u64),
            })
        })
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted reply for one request
    pub enum Reply {
        Status(u16),
        Fail,
        Hang,
    }

    /// Records every body it receives and answers from a script (default 200)
    #[derive(Default)]
    pub struct FakeTransport {
        replies: Mutex<VecDeque<Reply>>,
        pub bodies: Mutex<Vec<Vec<u8>>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn then(self, reply: Reply) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        pub fn calls(&self) -> usize {
            self.bodies.lock().unwrap().len()
        }
    }

    impl Transport for FakeTransport {
        fn post_json<'a>(
            &'a self,
            _endpoint: &'a Url,
            body: Vec<u8>,
        ) -> BoxFuture<'a, Result<StatusInfo, TransportError>> {
            self.bodies.lock().unwrap().push(body);
            let reply = self.replies.lock().unwrap().pop_front();
            Box::pin(async move {
                match reply.unwrap_or(Reply::Status(200)) {
                    Reply::Status(status) => Ok(StatusInfo {
                        status,
                        content_length: 0,
                    }),
                    Reply::Fail => Err(TransportError::Connect("connection refused".into())),
                    Reply::Hang => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Err(TransportError::Timeout)
                    }
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Router};
    use std::net::SocketAddr;
    use tokio::task::JoinHandle;

    async fn spawn_collector(router: Router) -> (Url, JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let url = Url::parse(&format!("http://{addr}/sensors/upload")).unwrap();
        (url, handle)
    }

    fn plain_http(timeout: Duration) -> HttpsTransport {
        HttpsTransport::new(timeout, None, false).unwrap()
    }

    #[test]
    fn status_classification() {
        let ok = |status| StatusInfo {
            status,
            content_length: 0,
        };
        assert!(ok(200).is_success());
        assert!(ok(204).is_success());
        assert!(!ok(199).is_success());
        assert!(!ok(301).is_success());
        assert!(!ok(500).is_success());
    }

    #[tokio::test]
    async fn posts_json_and_reports_status() {
        let router = Router::new().route(
            "/sensors/upload",
            post(|headers: axum::http::HeaderMap, body: String| async move {
                assert_eq!(headers["content-type"], "application/json");
                (StatusCode::CREATED, format!("got {}", body.len()))
            }),
        );
        let (url, handle) = spawn_collector(router).await;

        let info = plain_http(Duration::from_secs(5))
            .post_json(&url, b"[]".to_vec())
            .await
            .unwrap();
        handle.abort();

        assert_eq!(info.status, 201);
        assert!(info.is_success());
        assert_eq!(info.content_length, "got 2".len() as u64);
    }

    #[tokio::test]
    async fn error_status_is_not_a_transport_error() {
        let router = Router::new().route(
            "/sensors/upload",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let (url, handle) = spawn_collector(router).await;

        let info = plain_http(Duration::from_secs(5))
            .post_json(&url, b"[]".to_vec())
            .await
            .unwrap();
        handle.abort();

        assert_eq!(info.status, 503);
        assert!(!info.is_success());
    }

    #[tokio::test]
    async fn slow_collector_times_out() {
        let router = Router::new().route(
            "/sensors/upload",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        );
        let (url, handle) = spawn_collector(router).await;

        let result = plain_http(Duration::from_millis(100))
            .post_json(&url, b"[]".to_vec())
            .await;
        handle.abort();

        assert!(matches!(result, Err(TransportError::Timeout)));
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{addr}/sensors/upload")).unwrap();

        let result = plain_http(Duration::from_secs(5))
            .post_json(&url, b"[]".to_vec())
            .await;

        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn https_only_rejects_plain_http() {
        let url = Url::parse("http://127.0.0.1:9/sensors/upload").unwrap();
        let transport = HttpsTransport::new(Duration::from_secs(1), None, true).unwrap();

        let result = transport.post_json(&url, b"[]".to_vec()).await;

        assert!(matches!(result, Err(TransportError::Request(_))));
    }

    #[test]
    fn missing_ca_cert_fails_setup() {
        let result = HttpsTransport::new(
            Duration::from_secs(1),
            Some(Path::new("/nonexistent/ca.pem")),
            true,
        );
        assert!(matches!(result, Err(TransportError::Setup(_))));
    }
}
