//! 检测器接口 (Detector)
//! 职责: 输入一帧 → 返回带跟踪ID的检测结果
//!
//! 检测与ID关联由外部模型完成, 本模块只定义边界以及一个回放实现。

use std::fs;
use std::path::Path;

use anyhow::Context;
use image::RgbImage;
use tracing::{debug, info};

use super::types::Detection;
use crate::Error;

/// 外部检测器 (YOLO跟踪模型等)
///
/// 实现者须保证同一物体在连续帧中的 `track_id` 稳定。
pub trait Detector: Send {
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<Detection>>;
}

impl<F> Detector for F
where
    F: FnMut(&RgbImage) -> anyhow::Result<Vec<Detection>> + Send,
{
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        (*self)(frame)
    }
}

/// 跟踪模型默认置信度阈值
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.3;

/// 回放检测器: 逐帧读取预先录制的检测结果 (JSON Lines)
///
/// 每行是一帧的检测数组:
/// `[{"id": 7, "class": "person", "conf": 0.9, "box": [100, 100, 140, 180]}]`
pub struct ReplayDetector {
    lines: Vec<String>,
    cursor: usize,
    min_confidence: f32,
}

impl ReplayDetector {
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let detector = Self::from_lines(text.lines().map(str::to_owned));
        info!(
            "✅ 回放检测器加载成功: {} ({} 帧)",
            path.display(),
            detector.lines.len()
        );
        Ok(detector)
    }

    pub fn from_lines(lines: impl IntoIterator<Item = String>) -> Self {
        Self {
            lines: lines
                .into_iter()
                .filter(|l| !l.trim().is_empty())
                .collect(),
            cursor: 0,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn remaining(&self) -> usize {
        self.lines.len().saturating_sub(self.cursor)
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, _frame: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        let Some(line) = self.lines.get(self.cursor) else {
            return Ok(Vec::new());
        };
        let frame_no = self.cursor;
        self.cursor += 1;

        let mut detections: Vec<Detection> = serde_json::from_str(line)
            .map_err(|e| Error::Detector(format!("line {}: {}", frame_no + 1, e)))
            .context("malformed replay record")?;
        detections.retain(|d| d.confidence >= self.min_confidence);
        debug!("🎯 [帧{}] 回放 {} 个检测", frame_no, detections.len());
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;

    fn blank() -> RgbImage {
        RgbImage::new(4, 4)
    }

    #[test]
    fn test_replay_yields_frames_in_order_then_empty() {
        let mut det = ReplayDetector::from_lines(vec![
            r#"[{"id": 1, "class": "person", "conf": 0.9, "box": [0, 0, 10, 10]}]"#.to_string(),
            String::new(),
            r#"[]"#.to_string(),
        ]);
        assert_eq!(det.remaining(), 2);

        let first = det.detect(&blank()).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].bbox, BBox::new(0, 0, 10, 10));
        assert!(det.detect(&blank()).unwrap().is_empty());
        assert!(det.detect(&blank()).unwrap().is_empty());
        assert_eq!(det.remaining(), 0);
    }

    #[test]
    fn test_replay_filters_low_confidence() {
        let mut det = ReplayDetector::from_lines(vec![
            r#"[{"id": 1, "class": "car", "conf": 0.2, "box": [0, 0, 10, 10]},
                {"id": 2, "class": "car", "conf": 0.35, "box": [0, 0, 10, 10]}]"#
                .replace('\n', ""),
        ]);
        let dets = det.detect(&blank()).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].track_id, 2);
    }

    #[test]
    fn test_malformed_line_is_an_error_for_that_frame_only() {
        let mut det = ReplayDetector::from_lines(vec![
            "not json".to_string(),
            r#"[{"id": 3, "class": "bicycle", "conf": 0.8, "box": [1, 1, 5, 5]}]"#.to_string(),
        ]);
        assert!(det.detect(&blank()).is_err());
        assert_eq!(det.detect(&blank()).unwrap().len(), 1);
    }
}
