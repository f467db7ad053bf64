use anyhow::Result;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::TcpStream;

use nearsight_kernel::api::{ApiConfig, ApiHandle, ApiServer};
use nearsight_kernel::{
    BoundingBox, DepthMap, Detection, Engine, EngineSettings, StaticNarrator, StubDepth,
    StubDetector,
};

const WIDTH: u32 = 20;
const HEIGHT: u32 = 20;

fn encode_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(WIDTH, HEIGHT, image::Rgb([120, 130, 140]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn depth_map() -> DepthMap {
    let mut values = vec![0.4f32; (WIDTH * HEIGHT) as usize];
    values[0] = 1.0;
    DepthMap::from_raw(WIDTH, HEIGHT, values).unwrap()
}

fn stub_engine() -> Engine {
    let chair = Detection::new(
        "chair",
        0.88,
        BoundingBox::new(5.0, 5.0, 15.0, 15.0).unwrap(),
    );
    Engine::new(
        Box::new(StubDetector::new()),
        Box::new(StubDetector::with_detections(vec![chair])),
        Box::new(StubDepth::with_map(depth_map())),
        Box::new(StaticNarrator::new("a chair near the window")),
        EngineSettings::default(),
    )
}

struct TestApi {
    handle: Option<ApiHandle>,
}

impl TestApi {
    fn spawn(engine: Engine) -> Result<Self> {
        let cfg = ApiConfig {
            addr: "127.0.0.1:0".to_string(),
        };
        let handle = ApiServer::new(cfg, engine).spawn()?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    fn handle(&self) -> &ApiHandle {
        self.handle.as_ref().expect("api handle")
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().expect("failed to stop API server");
        }
    }
}

fn post_analyze(api: &TestApi, body: &[u8]) -> Result<(String, String)> {
    let mut stream = TcpStream::connect(api.handle().addr)?;
    let header = format!(
        "POST /analyze HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    read_response(&mut stream)
}

fn read_response(stream: &mut TcpStream) -> Result<(String, String)> {
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let mut parts = response.splitn(2, "\r\n\r\n");
    let headers = parts.next().unwrap_or("").to_string();
    let body = parts.next().unwrap_or("").to_string();
    Ok((headers, body))
}

#[test]
fn analyze_returns_objects_room_and_description() -> Result<()> {
    let api = TestApi::spawn(stub_engine())?;
    let (headers, body) = post_analyze(&api, &encode_png())?;
    assert!(headers.contains("200 OK"));

    let value: Value = serde_json::from_str(&body)?;
    let results = value["results"].as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["label"], "chair");
    assert_eq!(results[0]["distances"]["from_depth"], "40.00 cm");
    assert!(results[0]["distances"]["from_known_height"]
        .as_str()
        .unwrap()
        .ends_with(" cm"));
    assert!(results[0]["distances"]["final"]
        .as_str()
        .unwrap()
        .ends_with(" cm"));

    // chair is characteristic of the dining room profile
    assert_eq!(value["room"]["category"], "dining room");
    assert_eq!(value["room"]["score"], 1);
    assert_eq!(value["scene_description"], "a chair near the window");
    assert_eq!(value["labels"], serde_json::json!(["chair"]));
    assert_eq!(value["detector"], "specialized");
    Ok(())
}

#[test]
fn undecodable_body_is_a_bad_request() -> Result<()> {
    let api = TestApi::spawn(stub_engine())?;
    let (headers, body) = post_analyze(&api, b"definitely not an image")?;
    assert!(headers.contains("400 Bad Request"));
    assert!(body.contains(r#""error":"bad_image""#));
    Ok(())
}

#[test]
fn empty_body_is_a_bad_request() -> Result<()> {
    let api = TestApi::spawn(stub_engine())?;
    let (headers, body) = post_analyze(&api, b"")?;
    assert!(headers.contains("400 Bad Request"));
    assert!(body.contains("bad_image"));
    Ok(())
}

#[test]
fn oracle_failure_maps_to_bad_gateway() -> Result<()> {
    struct FailingDepth;
    impl nearsight_kernel::DepthBackend for FailingDepth {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn estimate(&mut self, _: &[u8], _: u32, _: u32) -> Result<DepthMap> {
            Err(anyhow::anyhow!("inference error"))
        }
    }

    let engine = Engine::new(
        Box::new(StubDetector::new()),
        Box::new(StubDetector::new()),
        Box::new(FailingDepth),
        Box::new(StaticNarrator::new("unused")),
        EngineSettings::default(),
    );
    let api = TestApi::spawn(engine)?;
    let (headers, body) = post_analyze(&api, &encode_png())?;
    assert!(headers.contains("502 Bad Gateway"));
    assert!(body.contains(r#""error":"oracle_unavailable""#));
    Ok(())
}

#[test]
fn health_endpoint_is_available() -> Result<()> {
    let api = TestApi::spawn(stub_engine())?;
    let mut stream = TcpStream::connect(api.handle().addr)?;
    let request = "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    stream.write_all(request.as_bytes())?;
    let (headers, body) = read_response(&mut stream)?;
    assert!(headers.contains("200 OK"));
    assert!(body.contains(r#""status":"ok""#));
    Ok(())
}

#[test]
fn unknown_path_is_not_found() -> Result<()> {
    let api = TestApi::spawn(stub_engine())?;
    let mut stream = TcpStream::connect(api.handle().addr)?;
    let request = "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    stream.write_all(request.as_bytes())?;
    let (headers, body) = read_response(&mut stream)?;
    assert!(headers.contains("404 Not Found"));
    assert!(body.contains("not_found"));
    Ok(())
}
