//! 采集线程 (Capture Loop)
//!
//! 读帧 → 处理 → 发布到最新帧槽位 → 派发告警, 按采集帧率节流。
//! 读帧失败时退避后继续, 运行标志清除后退出并释放帧源。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::clock::SessionClock;
use super::frame_cell::LatestFrame;
use super::processor::FrameProcessor;
use crate::audio::{AlertDispatcher, Utterance};
use crate::input::FrameSource;

/// 每秒输出一次的吞吐统计
#[derive(Debug)]
struct CaptureStats {
    frames: u64,
    alerts: u64,
    processing_ms: f64,
    last: Instant,
}

impl CaptureStats {
    fn new() -> Self {
        Self {
            frames: 0,
            alerts: 0,
            processing_ms: 0.0,
            last: Instant::now(),
        }
    }

    fn record(&mut self, elapsed: Duration, alerts: usize) {
        self.frames += 1;
        self.alerts += alerts as u64;
        self.processing_ms += elapsed.as_secs_f64() * 1000.0;

        let window = self.last.elapsed();
        if window >= Duration::from_secs(1) {
            let fps = self.frames as f64 / window.as_secs_f64();
            info!(
                "📊 采集 {:.1} fps | 处理 {:.1} ms/帧 | 告警 {}",
                fps,
                self.processing_ms / self.frames as f64,
                self.alerts
            );
            *self = Self::new();
        }
    }
}

pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    processor: FrameProcessor,
    frames: LatestFrame,
    dispatcher: AlertDispatcher,
    clock: SessionClock,
    running: Arc<AtomicBool>,
    frame_interval: Duration,
    backoff: Duration,
}

impl CaptureLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Box<dyn FrameSource>,
        processor: FrameProcessor,
        frames: LatestFrame,
        dispatcher: AlertDispatcher,
        clock: SessionClock,
        running: Arc<AtomicBool>,
        capture_fps: f64,
        backoff: Duration,
    ) -> Self {
        Self {
            source,
            processor,
            frames,
            dispatcher,
            clock,
            running,
            frame_interval: interval_for(capture_fps),
            backoff,
        }
    }

    /// 处理一帧, 返回触发的告警数
    pub fn step(&mut self) -> anyhow::Result<usize> {
        let frame = self.source.read()?;
        let now = self.clock.now();
        let (annotated, events) = self.processor.process(frame, now);
        let seq = self.frames.publish(annotated, now);

        for event in &events {
            info!("🚨 轨迹 #{} 触发 {:?}", event.track_id, event.kind);
            self.dispatcher.dispatch(Utterance::Alert(event.kind));
        }
        debug!("帧 #{} 已发布 ({} 个告警)", seq, events.len());
        Ok(events.len())
    }

    pub fn run(mut self) {
        info!("🎬 采集线程启动, 目标 {:.0}ms/帧", self.frame_interval.as_secs_f64() * 1000.0);
        let mut stats = CaptureStats::new();

        while self.running.load(Ordering::Acquire) {
            let start = Instant::now();
            match self.step() {
                Ok(alerts) => {
                    let elapsed = start.elapsed();
                    stats.record(elapsed, alerts);
                    std::thread::sleep(self.frame_interval.saturating_sub(elapsed));
                }
                Err(e) => {
                    warn!("⚠️  读帧失败, {}ms 后重试: {:#}", self.backoff.as_millis(), e);
                    std::thread::sleep(self.backoff);
                }
            }
        }
        info!("⏹️  采集线程退出, 释放帧源");
    }
}

/// 帧率 → 帧间隔; 非正帧率或无法表示的间隔表示不节流
pub fn interval_for(fps: f64) -> Duration {
    if fps > 0.0 {
        Duration::try_from_secs_f64(1.0 / fps).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}
