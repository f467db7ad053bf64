//! HTTP boundary for the analysis engine.
//!
//! A deliberately small, dependency-free HTTP/1.1 server: one listener
//! thread owns the engine and serves requests sequentially. Each request
//! decodes its own frame, runs the pipeline, and drops the buffer on
//! completion; nothing is shared across requests.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::distance::DistanceDisplay;
use crate::frame::{Frame, MAX_IMAGE_BYTES};
use crate::pipeline::{Engine, SceneAnalysis};
use crate::room::RoomMatch;

const MAX_HEADER_BYTES: usize = 8192;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8790".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    engine: Engine,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, engine: Engine) -> Self {
        Self { cfg, engine }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let mut engine = self.engine;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, &mut engine, shutdown_thread) {
                log::error!("analyze api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(listener: TcpListener, engine: &mut Engine, shutdown: Arc<AtomicBool>) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, engine) {
                    log::warn!("analyze api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, engine: &mut Engine) -> Result<()> {
    stream.set_nonblocking(false)?;
    let request = read_request(&mut stream)?;

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => {
            write_json_response(&mut stream, 200, r#"{"status":"ok"}"#)?;
            Ok(())
        }
        ("POST", "/analyze") => handle_analyze(&mut stream, engine, &request.body),
        ("POST", _) | ("GET", _) => {
            write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#)?;
            Ok(())
        }
        _ => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)?;
            Ok(())
        }
    }
}

fn handle_analyze(stream: &mut TcpStream, engine: &mut Engine, body: &[u8]) -> Result<()> {
    // Input errors are rejected here, before any oracle call.
    let frame = match Frame::decode(body) {
        Ok(frame) => frame,
        Err(err) => {
            log::warn!("rejecting undecodable analyze payload: {:#}", err);
            write_json_response(stream, 400, r#"{"error":"bad_image"}"#)?;
            return Ok(());
        }
    };

    match engine.analyze(&frame) {
        Ok(analysis) => {
            let payload = serde_json::to_vec(&AnalyzeResponse::from(&analysis))?;
            write_response(stream, 200, "application/json", &payload)?;
            Ok(())
        }
        Err(err) => {
            // Oracle failures yield one flat error, never partial results.
            log::error!("analyze request failed: {:#}", err);
            write_json_response(stream, 502, r#"{"error":"oracle_unavailable"}"#)?;
            Ok(())
        }
    }
}

/// Outbound response shape.
#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    results: Vec<ObjectResponse>,
    room: RoomMatch,
    scene_description: String,
    labels: Vec<String>,
    detector: String,
}

#[derive(Debug, Serialize)]
struct ObjectResponse {
    label: String,
    confidence: f32,
    distances: DistanceDisplay,
}

impl From<&SceneAnalysis> for AnalyzeResponse {
    fn from(analysis: &SceneAnalysis) -> Self {
        Self {
            results: analysis
                .objects
                .iter()
                .map(|object| ObjectResponse {
                    label: object.label.clone(),
                    confidence: object.confidence,
                    distances: object.distance.display(),
                })
                .collect(),
            room: analysis.room,
            scene_description: analysis.scene_description.clone(),
            labels: analysis.labels.clone(),
            detector: analysis.detector.as_str().to_string(),
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("request header too large"));
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-request"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let header_text = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse())
        .transpose()
        .map_err(|_| anyhow!("invalid content-length"))?
        .unwrap_or(0);
    if content_length > MAX_IMAGE_BYTES {
        return Err(anyhow!("request body exceeds {} bytes", MAX_IMAGE_BYTES));
    }

    let mut body = data.split_off(header_end);
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        body,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        502 => "HTTP/1.1 502 Bad Gateway",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}
