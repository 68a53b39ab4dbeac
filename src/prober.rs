use std::time::{Duration, Instant};

use log::debug;
use reqwest::{Client, Url};
use thiserror::Error;

use crate::sample::Latency;

/// Reasons a probe did not produce a measurement. These never leave the
/// prober: every variant is reported as [`Latency::Failed`].
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// One timed round trip to a fixed target.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Performs exactly one request. Never fails: errors and timeouts come
    /// back as [`Latency::Failed`].
    async fn probe(&self) -> Latency;
}

/// Measures the time for a single HTTP GET to complete.
pub struct HttpProber {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, endpoint, timeout))
    }

    pub fn with_client(client: Client, endpoint: Url, timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            timeout,
        }
    }

    async fn round_trip(&self) -> Result<Duration, ProbeError> {
        let start = Instant::now();

        // Dropping the pending request on timeout aborts the connection.
        let response = tokio::time::timeout(self.timeout, self.client.get(self.endpoint.clone()).send())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        let elapsed = start.elapsed();
        debug!("{} answered {} in {:?}", self.endpoint, response.status(), elapsed);
        Ok(elapsed)
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self) -> Latency {
        match self.round_trip().await {
            Ok(elapsed) => Latency::measured(round_millis(elapsed)),
            Err(e) => {
                debug!("probe of {} failed: {}", self.endpoint, e);
                Latency::Failed
            }
        }
    }
}

fn round_millis(elapsed: Duration) -> u32 {
    let ms = (elapsed.as_secs_f64() * 1000.0).round();
    if ms >= u32::MAX as f64 { u32::MAX } else { ms as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_prober(addr: std::net::SocketAddr, timeout: Duration) -> HttpProber {
        let client = Client::builder().no_proxy().build().unwrap();
        let url = Url::parse(&format!("http://{addr}/ping.txt")).unwrap();
        HttpProber::with_client(client, url, timeout)
    }

    #[test]
    fn rounds_to_nearest_millisecond() {
        assert_eq!(round_millis(Duration::from_micros(20_400)), 20);
        assert_eq!(round_millis(Duration::from_micros(20_500)), 21);
        assert_eq!(round_millis(Duration::ZERO), 0);
    }

    #[tokio::test]
    async fn responding_endpoint_is_measured() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\npong")
                .await;
        });

        let prober = local_prober(addr, Duration::from_millis(999));
        let latency = prober.probe().await;
        assert!(matches!(latency, Latency::Measured(ms) if ms < 999));
    }

    #[tokio::test]
    async fn error_status_still_counts_as_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
        });

        let prober = local_prober(addr, Duration::from_millis(999));
        assert!(!prober.probe().await.is_failure());
    }

    #[tokio::test]
    async fn silent_endpoint_fails_at_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Never answer; report when the client hangs up.
            let mut buf = [0u8; 1024];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
            let _ = closed_tx.send(());
        });

        let timeout = Duration::from_millis(200);
        let prober = local_prober(addr, timeout);
        let start = Instant::now();
        let latency = prober.probe().await;
        let elapsed = start.elapsed();

        assert_eq!(latency, Latency::Failed);
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(500));

        // The client and its pool are still alive: the timeout alone closed the request.
        tokio::time::timeout(Duration::from_secs(2), closed_rx)
            .await
            .expect("request was not aborted")
            .unwrap();
        drop(prober);
    }

    #[tokio::test]
    async fn refused_connection_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = local_prober(addr, Duration::from_millis(999));
        assert_eq!(prober.probe().await, Latency::Failed);
    }
}
