//! MJPEG推流 (MJPEG Streaming)
//!
//! `/video_feed` 为每个观看者创建一个消费者: 从最新帧槽位取帧, JPEG编码后按
//! `multipart/x-mixed-replace` 分段输出。HTTP由 axum 提供, 运行在推流线程
//! 自有的 tokio 运行时上。

use std::convert::Infallible;
use std::io::{self, Write};
use std::net::TcpListener;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{info, warn};

use super::capture::interval_for;
use super::frame_cell::LatestFrame;

pub const BOUNDARY: &str = "frame";
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// 无新帧时的轮询间隔
const IDLE_POLL: Duration = Duration::from_millis(10);

const INDEX_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Crossing Assist</title></head>
  <body><img src="/video_feed" alt="live view"></body>
</html>
"#;

/// 编码后帧的去向
pub trait FrameSink {
    fn send(&mut self, jpeg: &[u8]) -> io::Result<()>;
}

/// MJPEG分段写出器
pub struct MjpegWriter<W: Write> {
    inner: W,
}

impl<W: Write> MjpegWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> FrameSink for MjpegWriter<W> {
    fn send(&mut self, jpeg: &[u8]) -> io::Result<()> {
        write!(
            self.inner,
            "--{}\r\nContent-Type: image/jpeg\r\n\r\n",
            BOUNDARY
        )?;
        self.inner.write_all(jpeg)?;
        self.inner.write_all(b"\r\n")?;
        self.inner.flush()
    }
}

/// JPEG编码
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> crate::Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buf)
}

/// 推流消费者, 同一帧只发送一次
pub struct StreamConsumer {
    frames: LatestFrame,
    interval: Duration,
    quality: u8,
    last_seq: u64,
}

impl StreamConsumer {
    pub fn new(frames: LatestFrame, stream_fps: f64, quality: u8) -> Self {
        Self {
            frames,
            interval: interval_for(stream_fps),
            quality,
            last_seq: 0,
        }
    }

    /// 两次发送之间的最小间隔
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 有新帧时编码并发送一帧, 返回是否发送
    pub fn poll<S: FrameSink>(&mut self, sink: &mut S) -> io::Result<bool> {
        let Some(frame) = self.frames.newer_than(self.last_seq) else {
            return Ok(false);
        };
        self.last_seq = frame.seq;
        match encode_jpeg(&frame.image, self.quality) {
            Ok(jpeg) => {
                sink.send(&jpeg)?;
                Ok(true)
            }
            Err(e) => {
                warn!("⚠️  帧 #{} 编码失败: {}", frame.seq, e);
                Ok(false)
            }
        }
    }
}

/// 消费者 → multipart 分段流; 观看者断开时随响应体一起释放
pub fn mjpeg_parts(
    consumer: StreamConsumer,
) -> impl Stream<Item = Result<Vec<u8>, Infallible>> + Send + 'static {
    stream::unfold((consumer, false), |(mut consumer, sent)| async move {
        if sent {
            tokio::time::sleep(consumer.interval()).await;
        }
        loop {
            let mut part = MjpegWriter::new(Vec::new());
            match consumer.poll(&mut part) {
                Ok(true) => return Some((Ok(part.into_inner()), (consumer, true))),
                Ok(false) => tokio::time::sleep(IDLE_POLL).await,
                Err(e) => {
                    warn!("⚠️  分段写出失败: {}", e);
                    return None;
                }
            }
        }
    })
}

/// 推流参数, 每个观看者据此创建自己的消费者
#[derive(Debug, Clone)]
struct StreamState {
    frames: LatestFrame,
    stream_fps: f64,
    quality: u8,
}

/// `/` 预览页, `/video_feed` MJPEG流
pub fn mjpeg_router(frames: LatestFrame, stream_fps: f64, quality: u8) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/video_feed", get(video_feed))
        .with_state(StreamState {
            frames,
            stream_fps,
            quality,
        })
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn video_feed(State(state): State<StreamState>) -> impl IntoResponse {
    info!("👀 观看者接入");
    let consumer = StreamConsumer::new(state.frames, state.stream_fps, state.quality);
    (
        [
            (header::CONTENT_TYPE, MULTIPART_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(mjpeg_parts(consumer)),
    )
}

/// 在当前线程上运行推流服务, 直到监听失败
pub fn serve_mjpeg(
    listener: TcpListener,
    frames: LatestFrame,
    stream_fps: f64,
    quality: u8,
) -> io::Result<()> {
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("mjpeg-worker")
        .enable_all()
        .build()?;

    let app = mjpeg_router(frames, stream_fps, quality);
    info!("📺 MJPEG推流: http://{}/video_feed", addr);
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener)?;
        axum::serve(listener, app).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Read;
    use std::net::{SocketAddr, TcpStream};
    use std::thread;

    #[derive(Default)]
    struct Collect(Vec<Vec<u8>>);

    impl FrameSink for Collect {
        fn send(&mut self, jpeg: &[u8]) -> io::Result<()> {
            self.0.push(jpeg.to_vec());
            Ok(())
        }
    }

    struct Closed;

    impl FrameSink for Closed {
        fn send(&mut self, _jpeg: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "viewer gone"))
        }
    }

    /// 启动推流服务, 返回监听地址
    fn spawn_server(frames: LatestFrame) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || serve_mjpeg(listener, frames, 30.0, 80));
        addr
    }

    /// 发送原始请求, 读取响应直到 `done` 满足
    fn request(addr: SocketAddr, raw: &str, done: impl Fn(&[u8]) -> bool) -> Vec<u8> {
        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.write_all(raw.as_bytes()).unwrap();

        let mut received = Vec::new();
        let mut chunk = [0u8; 4096];
        while !done(&received) {
            let n = client.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed early");
            received.extend_from_slice(&chunk[..n]);
        }
        received
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_mjpeg_part_layout() {
        let mut writer = MjpegWriter::new(Vec::new());
        writer.send(&[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        let out = writer.into_inner();
        let head = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(out.starts_with(head));
        assert_eq!(&out[head.len()..], &[0xFF, 0xD8, 0xFF, 0xD9, b'\r', b'\n']);
    }

    #[test]
    fn test_consumer_sends_each_frame_once() {
        let frames = LatestFrame::new();
        let mut consumer = StreamConsumer::new(frames.clone(), 30.0, 80);
        let mut sink = Collect::default();

        assert!(!consumer.poll(&mut sink).unwrap());
        frames.publish(RgbImage::new(16, 16), 0.0);
        assert!(consumer.poll(&mut sink).unwrap());
        assert!(!consumer.poll(&mut sink).unwrap());
        frames.publish(RgbImage::new(16, 16), 0.1);
        assert!(consumer.poll(&mut sink).unwrap());

        assert_eq!(sink.0.len(), 2);
        assert_eq!(&sink.0[0][..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_consumer_reports_sink_failure() {
        let frames = LatestFrame::new();
        frames.publish(RgbImage::new(8, 8), 0.0);
        let mut consumer = StreamConsumer::new(frames, 30.0, 80);
        assert!(consumer.poll(&mut Closed).is_err());
    }

    #[test]
    fn test_parts_stream_waits_for_first_frame() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let frames = LatestFrame::new();
        let publisher = frames.clone();

        let part = runtime.block_on(async move {
            let mut parts = Box::pin(mjpeg_parts(StreamConsumer::new(frames, 30.0, 80)));
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                publisher.publish(RgbImage::new(8, 8), 0.0);
            });
            parts.next().await
        });

        let Some(Ok(part)) = part else {
            panic!("stream ended without a part");
        };
        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));
        assert!(part.ends_with(b"\r\n"));
    }

    #[test]
    fn test_video_feed_streams_latest_frame() {
        let frames = LatestFrame::new();
        frames.publish(RgbImage::new(32, 24), 0.0);
        let addr = spawn_server(frames);

        let needle = b"Content-Type: image/jpeg\r\n\r\n\xFF\xD8";
        let received = request(
            addr,
            "GET /video_feed HTTP/1.1\r\nHost: test\r\n\r\n",
            |r| contains(r, needle),
        );
        let text = String::from_utf8_lossy(&received).to_lowercase();
        assert!(text.starts_with("http/1.1 200 ok\r\n"));
        assert!(text.contains("multipart/x-mixed-replace; boundary=frame"));
    }

    #[test]
    fn test_unknown_routes_are_not_streamed() {
        let addr = spawn_server(LatestFrame::new());
        let head_done = |r: &[u8]| contains(r, b"\r\n\r\n");

        let not_found = request(
            addr,
            "GET /favicon.ico HTTP/1.1\r\nHost: test\r\n\r\n",
            head_done,
        );
        assert!(not_found.starts_with(b"HTTP/1.1 404"));

        let wrong_method = request(
            addr,
            "POST /video_feed HTTP/1.1\r\nHost: test\r\nContent-Length: 0\r\n\r\n",
            head_done,
        );
        assert!(wrong_method.starts_with(b"HTTP/1.1 405"));
    }

    #[test]
    fn test_index_page_embeds_feed() {
        let addr = spawn_server(LatestFrame::new());
        let page = request(addr, "GET / HTTP/1.1\r\nHost: test\r\n\r\n", |r| {
            contains(r, b"</html>")
        });
        assert!(page.starts_with(b"HTTP/1.1 200"));
        assert!(contains(&page, b"src=\"/video_feed\""));
    }
}
