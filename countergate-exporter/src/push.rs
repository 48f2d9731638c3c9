//! Push delivery to a Prometheus Pushgateway.
//!
//! The sink is driven by a periodic flush. Each flush renders the batch and
//! PUTs it to `<gateway>/metrics/job/<source>/instance/<instance>`. Failures
//! are logged and dropped; the next flush carries fresh data.

use std::sync::Arc;
use std::time::Duration;

use countergate_common::{Counter, SharedCounterStore};
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::config::PushConfig;
use crate::converter::to_text;
use crate::stats::{DeliveryStats, SharedStats};

/// Job name used when no source is configured.
pub const UNKNOWN_JOB: &str = "unknown";

/// Push delivery errors.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Pushgateway address could not be resolved: {0}")]
    Resolve(String),
    #[error("Push request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Pushgateway rejected push with status {0}")]
    Status(u16),
}

/// Result of a single flush that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The batch was accepted by the gateway.
    Sent,
    /// Nothing was sent: push disabled, or the sink is degraded or closed.
    Skipped,
}

/// Resolved Pushgateway target and the transport used to reach it.
#[derive(Debug, Clone)]
pub struct PushConnection {
    client: reqwest::Client,
    url: Url,
}

impl PushConnection {
    /// Resolve the push URL and build a client with a bounded timeout.
    ///
    /// `source` defaults to `"unknown"`, `instance` to the local host name.
    pub fn resolve(
        config: &PushConfig,
        source: Option<&str>,
        instance: Option<&str>,
    ) -> Result<Self, DeliveryError> {
        let base = config
            .connection
            .base_uri()
            .map_err(|e| DeliveryError::Resolve(e.to_string()))?;

        let job = source.filter(|s| !s.is_empty()).unwrap_or(UNKNOWN_JOB);
        let instance = match instance.filter(|i| !i.is_empty()) {
            Some(i) => i.to_string(),
            None => local_hostname(),
        };

        let url = Url::parse(&format!(
            "{}/metrics/job/{}/instance/{}",
            base, job, instance
        ))
        .map_err(|e| DeliveryError::Resolve(format!("invalid push URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self { client, url })
    }

    /// The resolved push URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// PUT an exposition body to the gateway.
    pub async fn put(&self, body: String) -> Result<(), DeliveryError> {
        let response = self
            .client
            .put(self.url.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        Ok(())
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[derive(Debug)]
enum SinkState {
    Closed,
    /// Open, but the gateway address could not be resolved.
    Degraded,
    Connected(PushConnection),
}

/// Pushgateway sink with an explicit open/close lifecycle.
pub struct PushSink {
    config: PushConfig,
    source: Option<String>,
    instance: Option<String>,
    state: SinkState,
    stats: SharedStats,
}

impl PushSink {
    /// Create a closed sink.
    pub fn new(config: PushConfig, source: Option<String>, instance: Option<String>) -> Self {
        Self {
            config,
            source,
            instance,
            state: SinkState::Closed,
            stats: Arc::new(DeliveryStats::new()),
        }
    }

    /// Share delivery statistics with other components.
    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = stats;
        self
    }

    /// Resolve the gateway address. Does nothing if already open.
    ///
    /// A resolution failure is logged and leaves the sink open but degraded:
    /// every later flush is a no-op until the sink is closed and reopened.
    pub fn open(&mut self) {
        if self.is_open() {
            return;
        }

        match PushConnection::resolve(
            &self.config,
            self.source.as_deref(),
            self.instance.as_deref(),
        ) {
            Ok(connection) => {
                info!(url = %connection.url(), "Pushgateway sink opened");
                self.state = SinkState::Connected(connection);
            }
            Err(e) => {
                warn!(error = %e, "Connection to Pushgateway is not configured");
                self.state = SinkState::Degraded;
            }
        }
    }

    /// Release the transport and forget the resolved address.
    pub fn close(&mut self) {
        if self.is_open() {
            debug!("Pushgateway sink closed");
        }
        self.state = SinkState::Closed;
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, SinkState::Closed)
    }

    /// Whether the sink is open with a resolved gateway address.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SinkState::Connected(_))
    }

    /// The resolved push URL, if connected.
    pub fn url(&self) -> Option<&Url> {
        match &self.state {
            SinkState::Connected(connection) => Some(connection.url()),
            _ => None,
        }
    }

    /// Send a batch to the gateway.
    ///
    /// An empty batch is still sent, replacing the group with an empty body.
    /// The body carries no `source`/`instance` labels; the gateway derives
    /// them from the job and instance path segments.
    pub async fn save(&self, counters: &[Counter]) -> Result<PushOutcome, DeliveryError> {
        let connection = match &self.state {
            SinkState::Connected(connection) if self.config.enabled => connection,
            _ => return Ok(PushOutcome::Skipped),
        };

        let body = to_text(Some(counters), None, None);
        connection.put(body).await?;
        Ok(PushOutcome::Sent)
    }

    /// Flush callback: send a batch, logging and dropping any failure.
    pub async fn flush(&self, counters: &[Counter]) {
        match self.save(counters).await {
            Ok(PushOutcome::Sent) => {
                self.stats.record_push_sent();
                trace!(counters = counters.len(), "Pushed metrics");
            }
            Ok(PushOutcome::Skipped) => {
                self.stats.record_push_skipped();
            }
            Err(e) => {
                self.stats.record_push_failed();
                error!(error = %e, "Failed to push metrics to Pushgateway");
            }
        }
    }
}

/// Periodic driver that flushes the counter store into a push sink.
pub struct PushTask {
    sink: PushSink,
    store: SharedCounterStore,
    interval: Duration,
}

impl PushTask {
    pub fn new(sink: PushSink, store: SharedCounterStore, interval: Duration) -> Self {
        Self {
            sink,
            store,
            interval,
        }
    }

    /// Open the sink and flush on every tick until shutdown, then close it.
    ///
    /// A flush in progress is not interrupted; its duration is bounded by the
    /// client timeout.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.sink.open();

        let mut interval = tokio::time::interval(self.interval);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let counters = self.store.get_all();
                    self.sink.flush(&counters).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.sink.close();
        info!("Push task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use axum::Router;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use countergate_common::MemoryCounterStore;
    use parking_lot::Mutex;
    use std::net::SocketAddr;

    #[derive(Debug, Clone)]
    struct Received {
        method: Method,
        path: String,
        content_type: String,
        body: String,
    }

    type Requests = Arc<Mutex<Vec<Received>>>;

    /// Start a fake gateway that records requests and answers with `status`.
    async fn start_gateway(status: StatusCode) -> (SocketAddr, Requests) {
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let router = Router::new().fallback(
            move |method: Method, uri: Uri, headers: HeaderMap, body: String| {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().push(Received {
                        method,
                        path: uri.path().to_string(),
                        content_type: headers
                            .get("content-type")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string(),
                        body,
                    });
                    status
                }
            },
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        (addr, requests)
    }

    fn push_config(addr: SocketAddr) -> PushConfig {
        PushConfig {
            connection: ConnectionConfig {
                host: Some(addr.ip().to_string()),
                port: Some(addr.port()),
                ..Default::default()
            },
            timeout_secs: 5,
            ..Default::default()
        }
    }

    fn batch() -> Vec<Counter> {
        vec![
            Counter::increment("MyService1.MyCommand1.exec_count", 2),
            Counter::last_value("queue.default.sent_messages", 4.0),
        ]
    }

    #[test]
    fn test_resolve_url() {
        let config = PushConfig {
            connection: ConnectionConfig {
                uri: Some("http://gateway:9091/".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let connection = PushConnection::resolve(&config, Some("MyApp"), Some("host1")).unwrap();
        assert_eq!(
            connection.url().as_str(),
            "http://gateway:9091/metrics/job/MyApp/instance/host1"
        );
    }

    #[test]
    fn test_resolve_defaults_job_and_instance() {
        let config = PushConfig {
            connection: ConnectionConfig {
                host: Some("gateway".to_string()),
                port: Some(9091),
                ..Default::default()
            },
            ..Default::default()
        };

        let connection = PushConnection::resolve(&config, None, None).unwrap();
        let path = connection.url().path().to_string();
        assert!(path.starts_with("/metrics/job/unknown/instance/"));
        assert!(path.len() > "/metrics/job/unknown/instance/".len());
    }

    #[test]
    fn test_resolve_without_connection_fails() {
        let result = PushConnection::resolve(&PushConfig::default(), None, None);
        assert!(matches!(result, Err(DeliveryError::Resolve(_))));
    }

    #[test]
    fn test_open_degrades_without_connection() {
        let mut sink = PushSink::new(PushConfig::default(), None, None);
        assert!(!sink.is_open());

        sink.open();
        assert!(sink.is_open());
        assert!(!sink.is_connected());
        assert!(sink.url().is_none());
    }

    #[test]
    fn test_close_and_reopen() {
        let config = PushConfig {
            connection: ConnectionConfig {
                uri: Some("http://gateway:9091".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut sink = PushSink::new(config, Some("app".to_string()), Some("i1".to_string()));

        sink.open();
        assert!(sink.is_connected());

        sink.close();
        assert!(!sink.is_open());
        assert!(sink.url().is_none());

        sink.open();
        assert_eq!(
            sink.url().map(|u| u.as_str()),
            Some("http://gateway:9091/metrics/job/app/instance/i1")
        );
    }

    #[tokio::test]
    async fn test_flush_puts_exposition_body() {
        let (addr, requests) = start_gateway(StatusCode::OK).await;
        let stats = Arc::new(DeliveryStats::new());
        let mut sink = PushSink::new(
            push_config(addr),
            Some("MyApp".to_string()),
            Some("MyInstance".to_string()),
        )
        .with_stats(stats.clone());
        sink.open();

        assert_eq!(sink.save(&batch()).await.unwrap(), PushOutcome::Sent);

        let received = requests.lock().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].method, Method::PUT);
        assert_eq!(received[0].path, "/metrics/job/MyApp/instance/MyInstance");
        assert_eq!(received[0].content_type, "text/plain");
        assert_eq!(
            received[0].body,
            "# TYPE exec_count gauge\nexec_count{service=\"MyService1\",command=\"MyCommand1\"} 2\n\
             # TYPE queue_sent_messages gauge\nqueue_sent_messages{queue=\"default\"} 4\n"
        );

        sink.flush(&batch()).await;
        assert_eq!(stats.snapshot().pushes_sent, 1);
        assert_eq!(requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_error_status_is_reported_and_swallowed() {
        let (addr, requests) = start_gateway(StatusCode::INTERNAL_SERVER_ERROR).await;
        let stats = Arc::new(DeliveryStats::new());
        let mut sink = PushSink::new(push_config(addr), None, None).with_stats(stats.clone());
        sink.open();

        let result = sink.save(&batch()).await;
        assert!(matches!(result, Err(DeliveryError::Status(500))));

        sink.flush(&batch()).await;
        sink.flush(&batch()).await;
        assert_eq!(stats.snapshot().pushes_failed, 2);
        assert_eq!(requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_is_swallowed() {
        // Bind and drop a listener to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let stats = Arc::new(DeliveryStats::new());
        let mut sink = PushSink::new(push_config(addr), None, None).with_stats(stats.clone());
        sink.open();

        assert!(matches!(
            sink.save(&batch()).await,
            Err(DeliveryError::Transport(_))
        ));

        sink.flush(&batch()).await;
        assert_eq!(stats.snapshot().pushes_failed, 1);
    }

    #[tokio::test]
    async fn test_disabled_push_sends_nothing() {
        let (addr, requests) = start_gateway(StatusCode::OK).await;
        let config = PushConfig {
            enabled: false,
            ..push_config(addr)
        };
        let mut sink = PushSink::new(config, None, None);
        sink.open();

        for _ in 0..5 {
            assert_eq!(sink.save(&batch()).await.unwrap(), PushOutcome::Skipped);
            sink.flush(&batch()).await;
        }
        assert!(requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_degraded_sink_sends_nothing() {
        let (_addr, requests) = start_gateway(StatusCode::OK).await;
        let mut sink = PushSink::new(PushConfig::default(), None, None);
        sink.open();

        for _ in 0..5 {
            assert_eq!(sink.save(&batch()).await.unwrap(), PushOutcome::Skipped);
        }
        assert!(requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_closed_sink_is_skipped() {
        let (addr, requests) = start_gateway(StatusCode::OK).await;
        let sink = PushSink::new(push_config(addr), None, None);

        assert_eq!(sink.save(&batch()).await.unwrap(), PushOutcome::Skipped);
        assert_eq!(sink.save(&[]).await.unwrap(), PushOutcome::Skipped);
        assert!(requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_pushed() {
        let (addr, requests) = start_gateway(StatusCode::OK).await;
        let mut sink = PushSink::new(push_config(addr), Some("app".to_string()), None);
        sink.open();

        assert_eq!(sink.save(&[]).await.unwrap(), PushOutcome::Sent);

        let received = requests.lock().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].method, Method::PUT);
        assert!(received[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_unresponsive_gateway_times_out() {
        // Accept connections but never answer.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = PushConfig {
            timeout_secs: 1,
            ..push_config(addr)
        };
        let stats = Arc::new(DeliveryStats::new());
        let mut sink = PushSink::new(config, None, None).with_stats(stats.clone());
        sink.open();

        let started = std::time::Instant::now();
        sink.flush(&batch()).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(900), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(5), "elapsed {:?}", elapsed);
        assert_eq!(stats.snapshot().pushes_failed, 1);

        match sink.save(&batch()).await {
            Err(DeliveryError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_push_task_flushes_until_shutdown() {
        let (addr, requests) = start_gateway(StatusCode::OK).await;
        let store = Arc::new(MemoryCounterStore::new());
        store.record(Counter::increment("hits", 3));

        let sink = PushSink::new(push_config(addr), Some("app".to_string()), None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = PushTask::new(sink, store.clone(), Duration::from_millis(50));
        let handle = tokio::spawn(task.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(400)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let received = requests.lock().clone();
        assert!(!received.is_empty());
        assert_eq!(received[0].body, "# TYPE hits gauge\nhits 3\n");
    }
}
