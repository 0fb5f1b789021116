/// 检测系统 (Detection System)
///
/// 外部检测器的边界与共享数据结构
/// - Detector: 目标检测 + 跟踪ID (外部能力)
/// - Types:    检测框、类别、画面几何
pub mod detector;
pub mod types;

pub use detector::{Detector, ReplayDetector, DEFAULT_MIN_CONFIDENCE};
pub use types::{
    BBox, ClassCategory, ClassTaxonomy, Detection, FrameGeometry, Point, SignalColor, Vector,
};
