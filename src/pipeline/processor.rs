//! 单帧处理 (Frame Processor)
//! 职责: 调用检测器 → 更新轨迹 → 运动分类/告警去抖 → 绘制叠加层 → 返回 (标注帧, 告警事件)

use image::RgbImage;
use tracing::{debug, error, warn};

use super::overlay::Overlay;
use crate::config::AssistConfig;
use crate::detection::{ClassCategory, ClassTaxonomy, Detection, Detector, FrameGeometry};
use crate::tracking::{
    AlertDebouncer, AlertEvent, MotionClassifier, Observation, SharedTrackStore, SignalState,
};
use crate::Error;

pub struct FrameProcessor {
    detector: Box<dyn Detector>,
    store: SharedTrackStore,
    geometry: FrameGeometry,
    taxonomy: ClassTaxonomy,
    classifier: MotionClassifier,
    debouncer: AlertDebouncer,
    overlay: Overlay,
}

impl FrameProcessor {
    pub fn new(
        detector: Box<dyn Detector>,
        store: SharedTrackStore,
        geometry: FrameGeometry,
        config: &AssistConfig,
        overlay: Overlay,
    ) -> Self {
        Self {
            detector,
            store,
            geometry,
            taxonomy: config.taxonomy(),
            classifier: MotionClassifier::new(
                &geometry,
                config.tracking.approach_cosine,
                config.tracking.dead_zone_px,
            ),
            debouncer: AlertDebouncer::from_config(&config.alerts),
            overlay,
        }
    }

    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// 处理一帧, 检测器失败时只绘制参考线
    pub fn process(&mut self, mut frame: RgbImage, now: f64) -> (RgbImage, Vec<AlertEvent>) {
        self.overlay.reference_line(&mut frame, &self.geometry);

        let detections = match self.detector.detect(&frame) {
            Ok(d) => d,
            Err(e) => {
                warn!("⚠️  检测失败, 跳过本帧: {:#}", e);
                return (frame, Vec::new());
            }
        };

        let mut events = Vec::new();
        for det in &detections {
            match self.apply(&mut frame, det, now, &mut events) {
                Ok(()) => {}
                Err(Error::UnknownTrack(id)) => {
                    // 更新路径上不应出现; 补建轨迹, 不中断本帧
                    error!("❌ 轨迹 #{} 不存在于更新路径, 重新创建", id);
                    self.store.lock().get_or_create(det, now);
                }
                Err(e) => error!("❌ 轨迹 #{} 更新失败: {}", det.track_id, e),
            }
        }
        (frame, events)
    }

    fn apply(
        &self,
        frame: &mut RgbImage,
        det: &Detection,
        now: f64,
        events: &mut Vec<AlertEvent>,
    ) -> crate::Result<()> {
        let centroid = det.bbox.centroid();
        let area = det.bbox.area();
        let category = self.taxonomy.categorize(&det.class_name);

        let mut store = self.store.lock();
        let (track, is_new) = store.get_or_create(det, now);
        let needs_update = !is_new && !track.bbox.contains(centroid);

        if needs_update {
            let mut alerted = false;
            if !category.is_signal() {
                let motion =
                    self.classifier
                        .classify(track.prev_centroid, track.prev_area, centroid, area);
                if let Some(kind) =
                    self.debouncer
                        .decide(&track, Observation::Motion(&motion), det.confidence, now)
                {
                    store.stamp_alert(det.track_id, now)?;
                    events.push(AlertEvent {
                        kind,
                        track_id: det.track_id,
                        timestamp: now,
                    });
                    alerted = true;
                }
            }
            self.overlay
                .motion_arrow(frame, track.prev_centroid, centroid, alerted);
            store.update_baseline(det.track_id, centroid, area, det.bbox)?;
            debug!("↗️  轨迹 #{} 基线更新 {:?}", det.track_id, det.bbox);
        }

        self.overlay.bbox(frame, &det.bbox);
        self.overlay.label(
            frame,
            &det.bbox,
            &format!("{} {:.2}", det.class_name, det.confidence),
        );

        let signal = match category {
            ClassCategory::Signal(color) => {
                if let Some(kind) =
                    self.debouncer
                        .decide(&track, Observation::Signal(color), det.confidence, now)
                {
                    store.stamp_alert(det.track_id, now)?;
                    events.push(AlertEvent {
                        kind,
                        track_id: det.track_id,
                        timestamp: now,
                    });
                }
                Some(SignalState::from(color))
            }
            ClassCategory::Object => None,
        };
        store.record_class(det.track_id, &det.class_name, signal)?;
        store.record_centroid(det.track_id, centroid)?;
        store.touch(det.track_id, now)?;
        Ok(())
    }
}
