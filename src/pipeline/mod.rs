/// 视频处理流水线 (Video Processing Pipeline)
///
/// 线程架构, 共享状态只有轨迹存储与最新帧槽位:
/// - Capture:  读帧 → 检测 → 跟踪/告警 → 叠加层 → 发布 (独立线程)
/// - Reaper:   定期清理过期轨迹 (可选线程)
/// - Stream:   MJPEG推流 (axum, 推流线程自有的tokio运行时)
/// - Speech:   告警派发工作线程池 (见 audio)
pub mod capture;
pub mod clock;
pub mod frame_cell;
pub mod overlay;
pub mod processor;
pub mod stream;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

pub use capture::CaptureLoop;
pub use clock::SessionClock;
pub use frame_cell::{LatestFrame, PublishedFrame};
pub use overlay::Overlay;
pub use processor::FrameProcessor;
pub use stream::{
    encode_jpeg, mjpeg_parts, mjpeg_router, serve_mjpeg, FrameSink, MjpegWriter, StreamConsumer,
};

use crate::audio::AlertDispatcher;
use crate::config::AssistConfig;
use crate::detection::{Detector, FrameGeometry};
use crate::input::FrameSource;
use crate::tracking::{SharedTrackStore, SummaryGenerator};

// ========== 会话共享状态 ==========

/// 会话期间各线程共享的只读配置与共享状态
#[derive(Debug, Clone)]
pub struct Session {
    pub config: Arc<AssistConfig>,
    pub geometry: FrameGeometry,
    pub store: SharedTrackStore,
    pub frames: LatestFrame,
    pub clock: SessionClock,
}

impl Session {
    pub fn summary_generator(&self) -> SummaryGenerator {
        SummaryGenerator::new(self.store.clone(), self.geometry.width, &self.config.tracking)
    }
}

/// 启动上下文: 已探测的帧源 + 会话状态
pub struct AssistContext {
    session: Session,
    source: Box<dyn FrameSource>,
}

impl AssistContext {
    /// 探测一次帧源尺寸并固定画面几何
    pub fn start(config: AssistConfig, mut source: Box<dyn FrameSource>) -> anyhow::Result<Self> {
        let (width, height) = source.probe().context("frame source probe failed")?;
        let geometry = FrameGeometry::new(width, height, config.tracking.min_area_divisor);
        info!(
            "📐 画面 {}x{} | 参考向量 ({}, {}) | 最小面积 {:.0}",
            width, height, geometry.reference.dx, geometry.reference.dy, geometry.min_area
        );

        Ok(Self {
            session: Session {
                config: Arc::new(config),
                geometry,
                store: SharedTrackStore::new(),
                frames: LatestFrame::new(),
                clock: SessionClock::start(),
            },
            source,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

// ========== 线程生命周期 ==========

pub struct Pipeline;

impl Pipeline {
    /// 启动采集线程 (以及配置了间隔时的清理线程)
    pub fn spawn(
        ctx: AssistContext,
        detector: Box<dyn Detector>,
        dispatcher: AlertDispatcher,
    ) -> std::io::Result<PipelineHandle> {
        let AssistContext { session, source } = ctx;
        let config = &session.config;
        let running = Arc::new(AtomicBool::new(true));

        let overlay = Overlay::new(config.pipeline.font_path.as_deref());
        let processor = FrameProcessor::new(
            detector,
            session.store.clone(),
            session.geometry,
            config,
            overlay,
        );
        let capture_loop = CaptureLoop::new(
            source,
            processor,
            session.frames.clone(),
            dispatcher,
            session.clock,
            Arc::clone(&running),
            config.pipeline.capture_fps,
            Duration::from_millis(config.pipeline.capture_backoff_ms),
        );
        let capture = thread::Builder::new()
            .name("capture".into())
            .spawn(move || capture_loop.run())?;

        let reaper = match reaper_interval(config.tracking.reaper_interval_secs) {
            Some(interval) => Some(spawn_reaper(&session, interval)?),
            None => None,
        };

        Ok(PipelineHandle {
            session,
            running,
            capture: Some(capture),
            reaper,
        })
    }
}

/// 清理间隔; 非正或无法表示的间隔视为关闭
fn reaper_interval(secs: Option<f64>) -> Option<Duration> {
    let secs = secs.filter(|s| *s > 0.0)?;
    match Duration::try_from_secs_f64(secs) {
        Ok(interval) => Some(interval),
        Err(e) => {
            warn!("⚠️  清理间隔 {}s 无效 ({}), 后台清理关闭", secs, e);
            None
        }
    }
}

struct Reaper {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

fn spawn_reaper(session: &Session, interval: Duration) -> std::io::Result<Reaper> {
    let (stop, stopped) = bounded::<()>(0);
    let store = session.store.clone();
    let clock = session.clock;
    let threshold = session.config.tracking.stale_after_secs;

    let handle = thread::Builder::new().name("reaper".into()).spawn(move || {
        info!("🧹 轨迹清理线程启动, 间隔 {:.1}s", interval.as_secs_f64());
        loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let evicted = store.lock().evict_stale_before(clock.now(), threshold);
                    if !evicted.is_empty() {
                        debug!("定期清理 {} 条轨迹", evicted.len());
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    })?;
    Ok(Reaper { stop, handle })
}

/// 运行中的流水线; 关闭或释放时停止所有线程
pub struct PipelineHandle {
    session: Session,
    running: Arc<AtomicBool>,
    capture: Option<JoinHandle<()>>,
    reaper: Option<Reaper>,
}

impl PipelineHandle {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.capture.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 清除运行标志并等待线程退出; 采集线程退出时释放帧源
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(reaper) = self.reaper.take() {
            drop(reaper.stop);
            if reaper.handle.join().is_err() {
                warn!("⚠️  清理线程异常退出");
            }
        }
        if let Some(capture) = self.capture.take() {
            if capture.join().is_err() {
                warn!("⚠️  采集线程异常退出");
            }
            info!("✅ 流水线已关闭");
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{LogSpeaker, Utterance};
    use crate::config::SpeechConfig;
    use crate::detection::{BBox, Detection};
    use crate::tracking::NO_OBJECTS;
    use image::RgbImage;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// 记录是否被释放
    struct CountingSource {
        dropped: Arc<AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn probe(&mut self) -> anyhow::Result<(u32, u32)> {
            Ok((640, 480))
        }

        fn read(&mut self) -> anyhow::Result<RgbImage> {
            Ok(RgbImage::new(640, 480))
        }
    }

    impl Drop for CountingSource {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoCamera;

    impl FrameSource for NoCamera {
        fn probe(&mut self) -> anyhow::Result<(u32, u32)> {
            anyhow::bail!("camera not found")
        }

        fn read(&mut self) -> anyhow::Result<RgbImage> {
            anyhow::bail!("camera not found")
        }
    }

    fn dispatcher() -> AlertDispatcher {
        let (d, _workers) =
            AlertDispatcher::start(Arc::new(LogSpeaker), SpeechConfig::default(), 1, 8).unwrap();
        d
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_reaper_interval_never_panics() {
        assert_eq!(reaper_interval(None), None);
        assert_eq!(reaper_interval(Some(0.0)), None);
        assert_eq!(reaper_interval(Some(1e300)), None);
        assert_eq!(reaper_interval(Some(f64::NAN)), None);
        assert_eq!(reaper_interval(Some(0.5)), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_start_probes_geometry_once() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let ctx = AssistContext::start(
            AssistConfig::default(),
            Box::new(CountingSource {
                dropped: Arc::clone(&dropped),
            }),
        )
        .unwrap();
        assert_eq!(ctx.session().geometry.width, 640);
        assert_eq!(ctx.session().geometry.reference.dy, 240);
        assert!(AssistContext::start(AssistConfig::default(), Box::new(NoCamera)).is_err());
    }

    #[test]
    fn test_shutdown_joins_capture_and_releases_source() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let mut config = AssistConfig::default();
        config.pipeline.capture_fps = 200.0;
        let ctx = AssistContext::start(
            config,
            Box::new(CountingSource {
                dropped: Arc::clone(&dropped),
            }),
        )
        .unwrap();

        let detector: Box<dyn Detector> = Box::new(|_: &RgbImage| -> anyhow::Result<Vec<Detection>> {
            Ok(vec![Detection::new(1, "car", 0.9, BBox::new(10, 10, 60, 60))])
        });
        let handle = Pipeline::spawn(ctx, detector, dispatcher()).unwrap();
        let session = handle.session().clone();

        assert!(wait_until(|| session.frames.snapshot().is_some()));
        assert!(handle.is_running());
        assert_eq!(
            session.summary_generator().summarize(session.clock.now()),
            "car detected on the left is stationary."
        );

        handle.shutdown();
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reaper_evicts_without_summary_requests() {
        let mut config = AssistConfig::default();
        config.tracking.stale_after_secs = 0.05;
        config.tracking.reaper_interval_secs = Some(0.01);
        config.pipeline.capture_fps = 100.0;
        let ctx = AssistContext::start(
            config,
            Box::new(CountingSource {
                dropped: Arc::new(AtomicUsize::new(0)),
            }),
        )
        .unwrap();

        // 只在第一帧出现一次
        let mut once = Some(Detection::new(9, "person", 0.9, BBox::new(10, 10, 60, 60)));
        let detector: Box<dyn Detector> =
            Box::new(move |_: &RgbImage| -> anyhow::Result<Vec<Detection>> {
                Ok(once.take().into_iter().collect())
            });
        let handle = Pipeline::spawn(ctx, detector, dispatcher()).unwrap();
        let session = handle.session().clone();

        assert!(wait_until(|| session.frames.snapshot().is_some()));
        assert!(wait_until(|| session.store.lock().is_empty()));
        assert_eq!(
            session.summary_generator().summarize(session.clock.now()),
            NO_OBJECTS
        );
        handle.shutdown();
    }

    #[test]
    fn test_summary_utterance_resolves_to_text() {
        let ctx = AssistContext::start(
            AssistConfig::default(),
            Box::new(CountingSource {
                dropped: Arc::new(AtomicUsize::new(0)),
            }),
        )
        .unwrap();
        let text = ctx.session().summary_generator().summarize(0.0);
        assert_eq!(
            Utterance::Summary(text).text(&ctx.session().config.speech),
            NO_OBJECTS
        );
    }
}
