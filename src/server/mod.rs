pub mod protocol;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::Config;
use crate::server::protocol::{
    BulkEncodeResponse, DeleteResponse, EncodeQueryResponse, EncodeResponse, IngestResponse,
    ListResponse, Request, Response, SearchResponse, StatusResponse, decode_length, encode_message,
};
use crate::services::pipeline::EncodeOptions;
use crate::services::{Encoder, MetricsStore, Pipeline, create_backend};

pub struct DaemonServer {
    config: Config,
    socket_path: PathBuf,
    pipeline: Pipeline,
    metrics: Option<MetricsStore>,
    last_request: Arc<RwLock<Instant>>,
    requests_served: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl DaemonServer {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let socket_path = config.socket_path();
        let dimension = config.embedding.dimension as usize;

        eprintln!("Connecting to embedding server: {}", config.embedding.url);
        let embedding_client = crate::services::EmbeddingClient::new(&config.embedding)?;

        eprintln!(
            "Opening record store: {} ({})",
            config.store.url, config.store.driver
        );
        let store = create_backend(&config.store, dimension).await?;
        store.ensure_ready().await?;

        let pipeline = Pipeline::new(Encoder::new(Arc::new(embedding_client)), store);

        let metrics = if config.metrics.enabled {
            if let Some(path) = Config::metrics_db_path() {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                match MetricsStore::open(&path) {
                    Ok(store) => {
                        store.cleanup(config.metrics.retention_days);
                        eprintln!(
                            "Metrics enabled (retention: {} days)",
                            config.metrics.retention_days
                        );
                        Some(store)
                    }
                    Err(e) => {
                        eprintln!("Warning: Failed to open metrics database: {}", e);
                        None
                    }
                }
            } else {
                None
            }
        } else {
            None
        };

        Ok(Self {
            config,
            socket_path,
            pipeline,
            metrics,
            last_request: Arc::new(RwLock::new(Instant::now())),
            requests_served: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn run(&self) -> Result<(), std::io::Error> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        self.write_pid_file()?;

        eprintln!("Daemon listening on: {}", self.socket_path.display());
        eprintln!("Idle timeout: {}s", self.config.daemon.idle_timeout_secs);

        let idle_timeout = Duration::from_secs(self.config.daemon.idle_timeout_secs);
        let check_interval = Duration::from_secs(10);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            *self.last_request.write().await = Instant::now();
                            self.handle_connection(stream).await;
                        }
                        Err(e) => {
                            eprintln!("Accept error: {}", e);
                        }
                    }
                }
                _ = tokio::time::sleep(check_interval) => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    let last = *self.last_request.read().await;
                    if last.elapsed() > idle_timeout {
                        eprintln!("Idle timeout reached, shutting down");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("Received SIGINT, shutting down");
                    break;
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    async fn handle_connection(&self, mut stream: tokio::net::UnixStream) {
        let mut len_buf = [0u8; 4];

        while stream.read_exact(&mut len_buf).await.is_ok() {
            let len = decode_length(&len_buf);
            if len > 64 * 1024 * 1024 {
                break;
            }

            let mut msg_buf = vec![0u8; len];
            if stream.read_exact(&mut msg_buf).await.is_err() {
                break;
            }

            let request: Request = match serde_json::from_slice(&msg_buf) {
                Ok(r) => r,
                Err(e) => {
                    let response = Response::error(format!("invalid request: {}", e));
                    if let Ok(encoded) = encode_message(&response) {
                        let _ = stream.write_all(&encoded).await;
                    }
                    continue;
                }
            };

            let response = self.handle_request(request).await;
            self.requests_served.fetch_add(1, Ordering::Relaxed);

            if let Ok(encoded) = encode_message(&response)
                && stream.write_all(&encoded).await.is_err()
            {
                break;
            }

            if matches!(response, Response::ShutdownAck) {
                self.shutdown.store(true, Ordering::Relaxed);
                break;
            }
        }
    }

    async fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::Shutdown => {
                self.shutdown.store(true, Ordering::Relaxed);
                Response::ShutdownAck
            }

            Request::Status => {
                let last = *self.last_request.read().await;
                let record_count = self
                    .pipeline
                    .store()
                    .info()
                    .await
                    .ok()
                    .flatten()
                    .map_or(0, |info| info.record_count);
                let metrics_summary = self
                    .metrics
                    .as_ref()
                    .map(|m| m.get_summary(self.config.metrics.retention_days));
                Response::Status(StatusResponse {
                    running: true,
                    embedding_url: self.config.embedding.url.clone(),
                    store_driver: self.config.store.driver.to_string(),
                    collection: self.pipeline.store().collection().to_string(),
                    record_count,
                    idle_secs: last.elapsed().as_secs(),
                    requests_served: self.requests_served.load(Ordering::Relaxed),
                    metrics: metrics_summary,
                })
            }

            Request::Ingest(req) => {
                self.timed("ingest", async {
                    let opts = EncodeOptions {
                        batch_size: req.batch_size,
                        chunk_size: req.chunk_size,
                    };
                    self.pipeline
                        .ingest(&req.text, &req.reference_id, req.language, req.meta, &opts)
                        .await
                        .map(|chunks| Response::Ingested(IngestResponse { chunks }))
                })
                .await
            }

            Request::Search(req) => {
                self.timed("search", async {
                    self.pipeline
                        .search(&req.query, req.language.as_deref(), req.cutoff, req.top_k)
                        .await
                        .map(|results| {
                            Response::Results(SearchResponse {
                                results: results.results,
                            })
                        })
                })
                .await
            }

            Request::Delete(req) => {
                self.timed("delete", async {
                    self.pipeline
                        .delete(&req.id)
                        .await
                        .map(|_| Response::Deleted(DeleteResponse { count: None }))
                })
                .await
            }

            Request::DeleteByReference(req) => {
                self.timed("delete_by_reference", async {
                    self.pipeline
                        .delete_by_reference(&req.reference_id)
                        .await
                        .map(|count| Response::Deleted(DeleteResponse { count: Some(count) }))
                })
                .await
            }

            Request::ListByReference(req) => {
                self.timed("list_by_reference", async {
                    self.pipeline
                        .list_by_reference(&req.reference_id)
                        .await
                        .map(|records| Response::Records(ListResponse { records }))
                })
                .await
            }

            Request::Encode(req) => {
                self.timed("encode", async {
                    let opts = EncodeOptions {
                        batch_size: req.batch_size,
                        chunk_size: req.chunk_size,
                    };
                    self.pipeline
                        .encode(&req.text, &opts)
                        .await
                        .map(|chunks| Response::Encoded(EncodeResponse { chunks }))
                })
                .await
            }

            Request::EncodeQuery(req) => {
                self.timed("encode_query", async {
                    self.pipeline
                        .encode_query(&req.text)
                        .await
                        .map(|embedding| {
                            Response::QueryEmbedding(EncodeQueryResponse { embedding })
                        })
                })
                .await
            }

            Request::BulkEncode(req) => {
                self.timed("bulk_encode", async {
                    let opts = EncodeOptions {
                        batch_size: req.batch_size,
                        chunk_size: req.chunk_size,
                    };
                    self.pipeline
                        .bulk_encode(&req.items, &opts)
                        .await
                        .map(|chunks| Response::BulkEncoded(BulkEncodeResponse { chunks }))
                })
                .await
            }
        }
    }

    async fn timed<F, E>(&self, operation: &str, fut: F) -> Response
    where
        F: std::future::Future<Output = Result<Response, E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let result = fut.await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let success = result.is_ok();
        if let Some(ref metrics) = self.metrics {
            metrics.record(operation, latency_ms, success);
        }
        match result {
            Ok(response) => response,
            Err(e) => Response::error(e.to_string()),
        }
    }

    fn write_pid_file(&self) -> Result<(), std::io::Error> {
        let pid_path = self.config.pid_path();
        std::fs::write(&pid_path, std::process::id().to_string())
    }

    fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.socket_path);
        let _ = std::fs::remove_file(self.config.pid_path());
        eprintln!("Daemon stopped");
    }
}

pub async fn run_daemon(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = DaemonServer::new(config).await?;
    server.run().await?;
    Ok(())
}
