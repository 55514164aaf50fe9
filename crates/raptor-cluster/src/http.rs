//! HTTP/JSON node agent.
//!
//! Speaks plain HTTP/1.1 to spawnpoint daemons:
//!
//! - `GET  {source}/spawnpoints` → JSON array of [`NodeInfo`]
//! - `GET  {node}/inspect` → [`NodeInspection`]
//! - `POST {node}/services/{name}` with a [`LaunchConfig`] body → newline-delimited
//!   JSON [`StatusLine`]s for as long as the daemon keeps the response open

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, Response, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use raptor_core::config::AgentConfig;
use raptor_core::{LaunchConfig, NodeInfo};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::agent::{NodeAgent, NodeInspection, StatusLine, StatusStream};
use crate::error::{ClusterError, ClusterResult};

const USER_AGENT: &str = "raptor/0.1";
const STATUS_BUFFER: usize = 64;

/// [`NodeAgent`] over HTTP/1.1.
#[derive(Debug, Clone)]
pub struct HttpNodeAgent {
    request_timeout: Duration,
}

impl HttpNodeAgent {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.request_timeout())
    }

    /// Connect and send one request, returning once response headers arrive.
    async fn send(&self, method: Method, url: &str, body: Bytes) -> ClusterResult<Response<Incoming>> {
        let fut = async {
            let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| transport(url, e))?;
            let address = authority(&uri).ok_or_else(|| ClusterError::Transport {
                uri: url.to_string(),
                reason: "only http:// URIs with a host are supported".to_string(),
            })?;

            let stream = tokio::net::TcpStream::connect(&address)
                .await
                .map_err(|e| transport(url, e))?;
            let io = TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| transport(url, e))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(error = %e, "node agent connection closed");
                }
            });

            let path = uri.path_and_query().map_or("/", |p| p.as_str());
            let req = Request::builder()
                .method(method)
                .uri(path)
                .header("host", address.as_str())
                .header("user-agent", USER_AGENT)
                .header("content-type", "application/json")
                .body(Full::new(body))
                .map_err(|e| transport(url, e))?;

            sender.send_request(req).await.map_err(|e| transport(url, e))
        };

        let response = tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| ClusterError::Timeout {
                uri: url.to_string(),
                after: self.request_timeout,
            })??;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = match response.into_body().collect().await {
            Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).trim().to_string(),
            Err(_) => String::new(),
        };
        Err(ClusterError::Status {
            uri: url.to_string(),
            status,
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ClusterResult<T> {
        let response = self.send(Method::GET, url, Bytes::new()).await?;
        let body = tokio::time::timeout(self.request_timeout, response.into_body().collect())
            .await
            .map_err(|_| ClusterError::Timeout {
                uri: url.to_string(),
                after: self.request_timeout,
            })?
            .map_err(|e| transport(url, e))?
            .to_bytes();

        serde_json::from_slice(&body).map_err(|e| ClusterError::Decode {
            uri: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for HttpNodeAgent {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

#[async_trait]
impl NodeAgent for HttpNodeAgent {
    async fn scan(&self, source: &str) -> ClusterResult<Vec<NodeInfo>> {
        self.get_json(&join(source, "spawnpoints")).await
    }

    async fn inspect(&self, node_uri: &str) -> ClusterResult<NodeInspection> {
        self.get_json(&join(node_uri, "inspect")).await
    }

    async fn deploy(&self, config: &LaunchConfig, node_uri: &str, service: &str) -> ClusterResult<StatusStream> {
        let url = join(node_uri, &format!("services/{service}"));
        let payload = serde_json::to_vec(config).map_err(|e| ClusterError::Decode {
            uri: url.clone(),
            reason: e.to_string(),
        })?;

        let response = self.send(Method::POST, &url, Bytes::from(payload)).await?;
        let (tx, rx) = mpsc::channel(STATUS_BUFFER);
        tokio::spawn(pump_status_lines(url, response.into_body(), tx));
        Ok(rx)
    }
}

/// Forward decoded status lines until the body ends or the receiver goes away.
async fn pump_status_lines(url: String, mut body: Incoming, tx: mpsc::Sender<StatusLine>) {
    let mut decoder = LineDecoder::default();

    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%url, error = %e, "status stream interrupted");
                return;
            }
        };
        let Ok(data) = frame.into_data() else {
            continue;
        };
        for line in decoder.push(&data) {
            if !forward(&url, &line, &tx).await {
                return;
            }
        }
    }

    if let Some(line) = decoder.finish() {
        forward(&url, &line, &tx).await;
    }
}

/// Returns `false` once nobody is listening.
async fn forward(url: &str, line: &str, tx: &mpsc::Sender<StatusLine>) -> bool {
    match serde_json::from_str::<StatusLine>(line) {
        Ok(status) => tx.send(status).await.is_ok(),
        Err(e) => {
            warn!(%url, error = %e, "skipping undecodable status line");
            true
        }
    }
}

/// Splits a byte stream into lines, carrying partial lines across chunks.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Feed a chunk; returns every line it completed. Blank lines are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(line) = to_line(&raw[..raw.len() - 1]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush a trailing line that had no newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        to_line(&rest)
    }
}

fn to_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r').trim();
    (!line.is_empty()).then(|| line.to_string())
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

fn authority(uri: &Uri) -> Option<String> {
    if uri.scheme_str().is_some_and(|s| s != "http") {
        return None;
    }
    let host = uri.host()?;
    Some(format!("{}:{}", host, uri.port_u16().unwrap_or(80)))
}

fn transport(uri: &str, err: impl std::fmt::Display) -> ClusterError {
    ClusterError::Transport {
        uri: uri.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Accept one connection, capture the request, reply with `response`.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if let Some(end) = find(&request, b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{addr}"), handle)
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn agent() -> HttpNodeAgent {
        HttpNodeAgent::new(Duration::from_secs(5))
    }

    #[test]
    fn decoder_carries_partial_lines() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push(b"{\"a\":").is_empty());
        assert_eq!(decoder.push(b"1}\n{\"b\""), vec!["{\"a\":1}"]);
        assert_eq!(decoder.push(b":2}\r\n\n"), vec!["{\"b\":2}"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn decoder_flushes_trailing_line() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push(b"tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn authority_defaults_port() {
        assert_eq!(authority(&"http://node-a/x".parse().unwrap()).as_deref(), Some("node-a:80"));
        assert_eq!(authority(&"http://10.0.0.1:2800".parse().unwrap()).as_deref(), Some("10.0.0.1:2800"));
        assert_eq!(authority(&"https://node-a".parse().unwrap()), None);
    }

    #[test]
    fn join_strips_trailing_slash() {
        assert_eq!(join("http://n:1/", "inspect"), "http://n:1/inspect");
    }

    #[tokio::test]
    async fn scan_decodes_spawnpoints() {
        let body = r#"[{"alias":"n1","uri":"http://n1:2800","available_memory":2048,"available_cpu_shares":4,"metadata":{"arch":"amd64"},"good":true}]"#;
        let (base, server) = serve_once("200 OK", body.to_string()).await;

        let nodes = agent().scan(&base).await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("GET /spawnpoints HTTP/1.1"));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].alias, "n1");
        assert_eq!(nodes[0].available_cpu_shares, 4);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let (base, server) = serve_once("500 Internal Server Error", "boom".to_string()).await;

        let err = agent().inspect(&base).await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, ClusterError::Status { status: 500, ref body, .. } if body == "boom"));
    }

    #[tokio::test]
    async fn deploy_streams_status_lines() {
        let lines = [
            r#"{"timestamp_ns":1,"node_alias":"n1","service":"web","contents":"pulling image"}"#,
            "not json",
            r#"{"timestamp_ns":2,"node_alias":"n1","service":"web","contents":"[SUCCESS] started"}"#,
        ];
        let (base, server) = serve_once("200 OK", lines.join("\n")).await;

        let config = LaunchConfig {
            service_name: "web".into(),
            ..Default::default()
        };
        let mut stream = agent().deploy(&config, &base, "web").await.unwrap();

        let first = stream.recv().await.unwrap();
        let second = stream.recv().await.unwrap();
        assert_eq!(first.contents, "pulling image");
        assert_eq!(second.contents, "[SUCCESS] started");
        assert!(stream.recv().await.is_none());

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /services/web HTTP/1.1"));
        assert!(request.contains("\"web\""));
    }

    #[tokio::test]
    async fn unreachable_node_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = agent().inspect(&format!("http://{addr}")).await.unwrap_err();
        assert!(matches!(err, ClusterError::Transport { .. }));
    }
}
