use poolwatch_config::Config;
use reqwest::Client as HttpClient;
use serde::Serialize;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use strum::Display;

/// Why a poll cycle produced no sample.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PollError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream answered with status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("response is not valid JSON: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, Display, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FailureKind {
    Fetch,
    Parse,
}

impl PollError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PollError::Parse(_) => FailureKind::Parse,
            PollError::Timeout(_) | PollError::Status(_) | PollError::Transport(_) => FailureKind::Fetch,
        }
    }
}

/// Source of the raw status document.
pub trait Fetcher: Send + Sync {
    /// Fetch the document body once.
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<String, PollError>> + Send + '_>>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<String, PollError>> + Send + '_>> {
        (**self).fetch()
    }
}

/// Fetches the status document with a plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: HttpClient,
    url: url::Url,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: HttpClient, url: url::Url, timeout: Duration) -> Self {
        Self { client, url, timeout }
    }

    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let client = HttpClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(
            client,
            config.json_url.clone(),
            config.effective_fetch_timeout(),
        ))
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    fn transport_error(&self, error: reqwest::Error) -> PollError {
        if error.is_timeout() {
            PollError::Timeout(self.timeout)
        } else {
            PollError::Transport(error.to_string())
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<String, PollError>> + Send + '_>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url.clone())
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(PollError::Status(status.as_u16()));
            }

            response.text().await.map_err(|e| self.transport_error(e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{
            AsyncReadExt,
            AsyncWriteExt,
        },
        net::TcpListener,
    };

    /// Serves exactly one canned HTTP response on a local port.
    async fn serve_once(response: &'static str) -> url::Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{address}/pool.json").parse().unwrap()
    }

    fn fetcher(url: url::Url) -> HttpFetcher {
        HttpFetcher::new(HttpClient::new(), url, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn fetches_body() {
        let url = serve_once(concat!(
            "HTTP/1.1 200 OK\r\ncontent-length: 13\r\nconnection: close\r\n\r\n",
            "{\"workers\":1}",
        ))
        .await;
        assert_eq!(fetcher(url).fetch().await.unwrap(), "{\"workers\":1}");
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let url = serve_once(concat!(
            "HTTP/1.1 503 Service Unavailable\r\n",
            "content-length: 0\r\nconnection: close\r\n\r\n",
        ))
        .await;
        let error = fetcher(url).fetch().await.unwrap_err();
        assert_eq!(error, PollError::Status(503));
        assert_eq!(error.kind(), FailureKind::Fetch);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{address}/").parse().unwrap();
        let error = fetcher(url).fetch().await.unwrap_err();
        assert_eq!(error.kind(), FailureKind::Fetch);
    }
}
